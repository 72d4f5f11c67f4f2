//! Weighted merge of single-station and double-difference values.
//!
//! For every station-component key in either input:
//!
//! ```text
//! merged = ∅
//! single present: merged = merged ⊕ norm[c] * single_weight * single
//! dd present:     merged = merged ⊕ norm[c] * dd_weight     * dd
//! ```
//!
//! Keys end in their component letter (`II_AAK_MXZ` -> `Z`). An absent side
//! contributes nothing; it is never treated as a zero value.

use std::collections::{BTreeMap, BTreeSet};

use super::normalization::{MergeWeights, NormalizationTable};
use crate::core::model::Component;
use crate::core::superpose::{Accumulator, Scale, Superpose};
use crate::error::{DdError, Result};

/// Component tag of a station-component key: its last character.
pub fn component_of_key(key: &str) -> Option<Component> {
    key.chars().last().map(|c| c.to_string())
}

/// Merge both sides of one key. `None` only when both sides are absent.
pub fn merge_one<V>(single: Option<V>, dd: Option<V>, factor: f64, weights: MergeWeights) -> Option<V>
where
    V: Superpose + Scale,
{
    let mut merged = Accumulator::empty();
    if let Some(single) = single {
        merged.push(single.scale(factor * weights.single_weight));
    }
    if let Some(dd) = dd {
        merged.push(dd.scale(factor * weights.dd_weight));
    }
    merged.into_inner()
}

/// Union merge of both result sets; one output entry per key.
pub fn merge_weighted<V>(
    mut single: BTreeMap<String, V>,
    mut dd: BTreeMap<String, V>,
    norm: &NormalizationTable,
    weights: MergeWeights,
) -> Result<BTreeMap<String, V>>
where
    V: Superpose + Scale,
{
    let keys: BTreeSet<String> = single.keys().chain(dd.keys()).cloned().collect();
    log::info!(
        "Merging {} keys ({} single, {} double-difference)",
        keys.len(),
        single.len(),
        dd.len()
    );

    let mut merged = BTreeMap::new();
    for key in keys {
        let component = component_of_key(&key).ok_or_else(|| DdError::MissingNormalization(key.clone()))?;
        let factor = norm.get(&component)?;
        if let Some(value) = merge_one(single.remove(&key), dd.remove(&key), factor, weights) {
            merged.insert(key, value);
        }
    }
    Ok(merged)
}
