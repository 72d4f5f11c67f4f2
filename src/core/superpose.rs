//! Superposition algebra for station contributions.
//!
//! Contributions from independent pairs touching the same station add up.
//! [`Superpose::superpose`] must be associative and commutative; that is what
//! lets partial results be reduced in any order after a distributed round.
//! [`Accumulator`] supplies the identity element, so value types never need a
//! meaningful "zero" of their own (an adjoint source has no natural length
//! before the first contribution arrives).

/// Associative, commutative combination (`a ⊕ b`).
pub trait Superpose: Sized {
    fn superpose(self, other: Self) -> Self;
}

/// Amplitude scaling by a real factor.
pub trait Scale: Sized {
    fn scale(self, factor: f64) -> Self;
}

impl Superpose for f64 {
    #[inline]
    fn superpose(self, other: Self) -> Self {
        self + other
    }
}

impl Scale for f64 {
    #[inline]
    fn scale(self, factor: f64) -> Self {
        self * factor
    }
}

impl Superpose for i64 {
    #[inline]
    fn superpose(self, other: Self) -> Self {
        self + other
    }
}

impl Superpose for Vec<f64> {
    /// Sample-wise sum; the shorter series is zero-padded.
    fn superpose(self, other: Self) -> Self {
        let (mut long, short) = if self.len() >= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        for (a, b) in long.iter_mut().zip(short) {
            *a += b;
        }
        long
    }
}

impl Scale for Vec<f64> {
    fn scale(mut self, factor: f64) -> Self {
        self.iter_mut().for_each(|v| *v *= factor);
        self
    }
}

/// Monoid wrapper: an explicit empty state plus `⊕`.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator<T> {
    value: Option<T>,
}

impl<T> Default for Accumulator<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Accumulator<T> {
    /// Identity element.
    pub const fn empty() -> Self {
        Self { value: None }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub fn into_inner(self) -> Option<T> {
        self.value
    }
}

impl<T: Superpose> Accumulator<T> {
    pub fn push(&mut self, contribution: T) {
        self.value = Some(match self.value.take() {
            Some(acc) => acc.superpose(contribution),
            None => contribution,
        });
    }

    /// Combine two accumulators; empty is the identity on both sides.
    pub fn combine(mut self, other: Self) -> Self {
        if let Some(v) = other.value {
            self.push(v);
        }
        self
    }
}

impl<T: Superpose> FromIterator<T> for Accumulator<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut acc = Self::empty();
        for item in iter {
            acc.push(item);
        }
        acc
    }
}
