//! Distributed rounds: split, scatter, compute, gather, merge.
//!
//! # Round protocol
//!
//! ```text
//! coordinator: split(jobs, W) ─scatter─▶ every rank evaluates f over its slice
//!                                          (key-wise insert into a local map)
//!              merged map ◀─gather── union of the W partial maps
//! ```
//!
//! Keys must be unique across the whole round. A duplicate inside one slice
//! or across slices is reported as `DdError::DuplicateKey`. Any job failure
//! aborts the round; there is no partial-result path.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt::Debug;

use rayon::prelude::*;

use super::transport::{Role, Transport};
use crate::core::splitter::{check_workers, split_jobs, split_jobs_owned};
use crate::error::{DdError, Result};

/// What a participant ships back to the coordinator after its slice.
pub type PartialResult<K, V> = Result<BTreeMap<K, V>>;

fn insert_unique<K: Ord + Debug, V>(map: &mut BTreeMap<K, V>, key: K, value: V) -> Result<()> {
    match map.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
        Entry::Occupied(slot) => Err(DdError::DuplicateKey(format!("{:?}", slot.key()))),
    }
}

/// Evaluate `f` over one slice, accumulating its mappings into one map.
pub fn evaluate_slice<J, K, V, M, F>(jobs: &[J], report_progress: bool, f: &F) -> PartialResult<K, V>
where
    K: Ord + Debug,
    F: Fn(&J) -> Result<M>,
    M: IntoIterator<Item = (K, V)>,
{
    let mut results = BTreeMap::new();
    let total = jobs.len();
    for (done, job) in jobs.iter().enumerate() {
        for (key, value) in f(job)? {
            insert_unique(&mut results, key, value)?;
        }
        if report_progress {
            log::debug!("~{}% done.", (done + 1) * 100 / total);
        }
    }
    Ok(results)
}

/// Union of per-worker maps. Keys are disjoint when jobs are.
pub fn merge_partials<K: Ord + Debug, V>(partials: Vec<BTreeMap<K, V>>) -> Result<BTreeMap<K, V>> {
    let mut merged = BTreeMap::new();
    for partial in partials {
        for (key, value) in partial {
            insert_unique(&mut merged, key, value)?;
        }
    }
    Ok(merged)
}

/// One SPMD round over `transport`. Every participant calls this.
///
/// Only the coordinator's `jobs` are used. The coordinator gets
/// `Ok(Some(merged))`; workers get `Ok(None)` once their partial is sent. A
/// worker whose slice failed ships the failure and returns it as well.
pub fn run_distributed<T, J, K, V, M, F>(
    transport: &T,
    jobs: Option<Vec<J>>,
    f: F,
) -> Result<Option<BTreeMap<K, V>>>
where
    T: Transport<J, PartialResult<K, V>>,
    K: Ord + Debug,
    F: Fn(&J) -> Result<M>,
    M: IntoIterator<Item = (K, V)>,
{
    let role = transport.role();
    let slices = match role {
        Role::Coordinator => {
            let jobs = jobs.unwrap_or_default();
            log::debug!(
                "Scattering {} jobs over {} participants",
                jobs.len(),
                transport.size()
            );
            Some(split_jobs_owned(jobs, transport.size())?)
        }
        Role::Worker(_) => None,
    };

    let mine = transport.scatter(slices)?;
    let partial = evaluate_slice(&mine, role.is_coordinator(), &f);
    let local_failure = match (role, &partial) {
        (Role::Worker(rank), Err(e)) => {
            log::error!("worker {rank}: slice failed: {e}");
            Some(replicate(e))
        }
        _ => None,
    };

    match transport.gather(partial)? {
        None => local_failure.map_or(Ok(None), Err),
        Some(partials) => {
            let partials = partials.into_iter().collect::<Result<Vec<_>>>()?;
            merge_partials(partials).map(Some)
        }
    }
}

/// Local copy of a failure whose original is shipped to the coordinator.
fn replicate(err: &DdError) -> DdError {
    match err {
        DdError::Job { index, message } => DdError::Job {
            index: *index,
            message: message.clone(),
        },
        DdError::DuplicateKey(key) => DdError::DuplicateKey(key.clone()),
        other => DdError::Transport(format!("local slice failed: {other}")),
    }
}

/// Single-process round: the W slices are evaluated in parallel on the rayon
/// pool. Partition and merge match [`run_distributed`] exactly.
pub fn run_pooled<J, K, V, M, F>(jobs: &[J], n_workers: usize, f: F) -> Result<BTreeMap<K, V>>
where
    J: Sync,
    K: Ord + Debug + Send,
    V: Send,
    F: Fn(&J) -> Result<M> + Sync,
    M: IntoIterator<Item = (K, V)>,
{
    let partials: Vec<PartialResult<K, V>> = split_jobs(jobs, n_workers)?
        .into_par_iter()
        .enumerate()
        .map(|(rank, slice)| evaluate_slice(slice, rank == 0, &f))
        .collect();
    let partials = partials.into_iter().collect::<Result<Vec<_>>>()?;
    merge_partials(partials)
}

/// How the orchestrators execute one round per component.
pub trait RoundExecutor<K, V> {
    fn role(&self) -> Role;

    fn workers(&self) -> usize;

    /// Run `f` over `jobs`. Only the coordinator's `jobs` matter; only the
    /// coordinator gets `Some`.
    fn run_round<F, M>(&self, jobs: Vec<usize>, f: F) -> Result<Option<BTreeMap<K, V>>>
    where
        F: Fn(&usize) -> Result<M> + Sync,
        M: IntoIterator<Item = (K, V)>;
}

/// Rayon-backed executor; the calling thread is always the coordinator.
#[derive(Debug, Clone, Copy)]
pub struct Pooled {
    workers: usize,
}

impl Pooled {
    /// Zero workers is `ConfigError::InvalidWorkerCount`.
    pub fn new(workers: usize) -> Result<Self> {
        check_workers(workers)?;
        Ok(Self { workers })
    }
}

impl Default for Pooled {
    /// One slice per thread of the current rayon pool.
    fn default() -> Self {
        Self {
            workers: rayon::current_num_threads().max(1),
        }
    }
}

impl<K: Ord + Debug + Send, V: Send> RoundExecutor<K, V> for Pooled {
    fn role(&self) -> Role {
        Role::Coordinator
    }

    fn workers(&self) -> usize {
        self.workers
    }

    fn run_round<F, M>(&self, jobs: Vec<usize>, f: F) -> Result<Option<BTreeMap<K, V>>>
    where
        F: Fn(&usize) -> Result<M> + Sync,
        M: IntoIterator<Item = (K, V)>,
    {
        run_pooled(&jobs, self.workers, f).map(Some)
    }
}

/// Executor over an explicit [`Transport`] endpoint (one per participant).
pub struct Spmd<T>(pub T);

impl<K, V, T> RoundExecutor<K, V> for Spmd<T>
where
    K: Ord + Debug,
    T: Transport<usize, PartialResult<K, V>>,
{
    fn role(&self) -> Role {
        self.0.role()
    }

    fn workers(&self) -> usize {
        self.0.size()
    }

    fn run_round<F, M>(&self, jobs: Vec<usize>, f: F) -> Result<Option<BTreeMap<K, V>>>
    where
        F: Fn(&usize) -> Result<M> + Sync,
        M: IntoIterator<Item = (K, V)>,
    {
        run_distributed(&self.0, Some(jobs), f)
    }
}
