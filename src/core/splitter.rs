//! Balanced job partitioning.

use std::ops::Range;

use crate::error::{ConfigError, Result};

/// Index range of slice `rank` when `n_jobs` are split over `n_workers`.
///
/// The first `n_jobs % n_workers` slices get one extra job.
#[inline]
pub fn slice_range(n_jobs: usize, n_workers: usize, rank: usize) -> Range<usize> {
    debug_assert!(n_workers >= 1 && rank < n_workers);
    let k = n_jobs / n_workers;
    let m = n_jobs % n_workers;
    let start = rank * k + rank.min(m);
    let end = (rank + 1) * k + (rank + 1).min(m);
    start..end
}

/// Split `jobs` into `n_workers` contiguous slices whose sizes differ by at most one.
///
/// Slices cover the input exactly once and in order. Zero workers is
/// `ConfigError::InvalidWorkerCount`.
pub fn split_jobs<T>(jobs: &[T], n_workers: usize) -> Result<Vec<&[T]>> {
    check_workers(n_workers)?;
    Ok((0..n_workers)
        .map(|rank| &jobs[slice_range(jobs.len(), n_workers, rank)])
        .collect())
}

/// Owned variant of [`split_jobs`], used when slices are shipped to workers.
pub fn split_jobs_owned<T>(jobs: Vec<T>, n_workers: usize) -> Result<Vec<Vec<T>>> {
    check_workers(n_workers)?;
    let n_jobs = jobs.len();
    let mut iter = jobs.into_iter();
    Ok((0..n_workers)
        .map(|rank| iter.by_ref().take(slice_range(n_jobs, n_workers, rank).len()).collect())
        .collect())
}

pub(crate) fn check_workers(n_workers: usize) -> Result<()> {
    if n_workers == 0 {
        return Err(ConfigError::InvalidWorkerCount(n_workers).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DdError;

    #[test]
    fn test_split_uneven() {
        let jobs: Vec<u32> = (0..10).collect();
        let slices = split_jobs(&jobs, 3).unwrap();
        assert_eq!(slices, vec![&[0u32, 1, 2, 3][..], &[4u32, 5, 6][..], &[7u32, 8, 9][..]]);
    }

    #[test]
    fn test_split_fewer_jobs_than_workers() {
        let jobs = [1, 2];
        let slices = split_jobs(&jobs, 4).unwrap();
        assert_eq!(slices.len(), 4);
        assert_eq!(slices[0], &[1]);
        assert_eq!(slices[1], &[2]);
        assert!(slices[2].is_empty());
        assert!(slices[3].is_empty());
    }

    #[test]
    fn test_split_empty() {
        let jobs: [u8; 0] = [];
        let slices = split_jobs(&jobs, 3).unwrap();
        assert_eq!(slices.len(), 3);
        assert!(slices.iter().all(|s| s.is_empty()));
    }

    #[test]
    fn test_split_owned_matches_borrowed() {
        let jobs: Vec<usize> = (0..17).collect();
        let borrowed: Vec<Vec<usize>> = split_jobs(&jobs, 5).unwrap().into_iter().map(|s| s.to_vec()).collect();
        assert_eq!(split_jobs_owned(jobs, 5).unwrap(), borrowed);
    }

    #[test]
    fn test_split_single_worker() {
        let jobs = ["a", "b", "c"];
        assert_eq!(split_jobs(&jobs, 1).unwrap(), vec![&jobs[..]]);
    }

    #[test]
    fn test_split_zero_workers_rejected() {
        let jobs = [1, 2, 3];
        assert!(matches!(
            split_jobs(&jobs, 0),
            Err(DdError::Config(ConfigError::InvalidWorkerCount(0)))
        ));
        assert!(split_jobs_owned(jobs.to_vec(), 0).is_err());
    }
}
