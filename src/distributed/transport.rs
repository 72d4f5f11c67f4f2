//! Scatter/gather transports.
//!
//! A round is SPMD: every participant calls `scatter` then `gather` exactly
//! once. The coordinator supplies one job slice per rank to `scatter` and
//! receives every rank's partial result from `gather`; workers pass `None` and
//! get `None` back. Workers never talk to each other.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::core::splitter::check_workers;
use crate::error::{DdError, Result};

/// Participant role in a round. Rank 0 is always the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Coordinator,
    Worker(usize),
}

impl Role {
    pub fn rank(&self) -> usize {
        match self {
            Role::Coordinator => 0,
            Role::Worker(rank) => *rank,
        }
    }

    pub fn is_coordinator(&self) -> bool {
        matches!(self, Role::Coordinator)
    }
}

pub trait Transport<J, P> {
    fn role(&self) -> Role;

    /// Number of participants, coordinator included.
    fn size(&self) -> usize;

    /// Distribute job slices. The coordinator passes exactly `size()` slices
    /// (slice `r` goes to rank `r`); workers pass `None`. Returns this
    /// participant's slice.
    fn scatter(&self, slices: Option<Vec<Vec<J>>>) -> Result<Vec<J>>;

    /// Collect partial results on the coordinator, ordered by rank.
    /// Workers get `None`.
    fn gather(&self, partial: P) -> Result<Option<Vec<P>>>;
}

fn expect_slices<J>(slices: Option<Vec<Vec<J>>>, size: usize) -> Result<Vec<Vec<J>>> {
    match slices {
        Some(slices) if slices.len() == size => Ok(slices),
        Some(slices) => Err(DdError::Transport(format!(
            "coordinator scattered {} slices to {} participants",
            slices.len(),
            size
        ))),
        None => Err(DdError::Transport(
            "coordinator must supply job slices to scatter".to_string(),
        )),
    }
}

/// Single-participant transport: the coordinator is the whole pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoloTransport;

impl<J, P> Transport<J, P> for SoloTransport {
    fn role(&self) -> Role {
        Role::Coordinator
    }

    fn size(&self) -> usize {
        1
    }

    fn scatter(&self, slices: Option<Vec<Vec<J>>>) -> Result<Vec<J>> {
        let mut slices = expect_slices(slices, 1)?;
        Ok(slices.pop().unwrap_or_default())
    }

    fn gather(&self, partial: P) -> Result<Option<Vec<P>>> {
        Ok(Some(vec![partial]))
    }
}

enum Endpoint<J, P> {
    Coordinator {
        job_txs: Vec<Sender<Vec<J>>>,
        partial_rx: Receiver<(usize, P)>,
    },
    Worker {
        rank: usize,
        job_rx: Receiver<Vec<J>>,
        partial_tx: Sender<(usize, P)>,
    },
}

/// In-process transport over crossbeam channels, one endpoint per thread.
///
/// A participant that drops its endpoint (panic, early error return)
/// disconnects its channels, so peers fail with `DdError::Transport` instead
/// of blocking forever.
pub struct ChannelTransport<J, P> {
    size: usize,
    endpoint: Endpoint<J, P>,
}

impl<J, P> ChannelTransport<J, P> {
    /// Build a group of `size` connected endpoints, indexed by rank.
    pub fn group(size: usize) -> Result<Vec<Self>> {
        check_workers(size)?;

        let (partial_tx, partial_rx) = unbounded();
        let mut job_txs = Vec::with_capacity(size - 1);
        let mut workers = Vec::with_capacity(size - 1);

        for rank in 1..size {
            let (job_tx, job_rx) = unbounded();
            job_txs.push(job_tx);
            workers.push(ChannelTransport {
                size,
                endpoint: Endpoint::Worker {
                    rank,
                    job_rx,
                    partial_tx: partial_tx.clone(),
                },
            });
        }

        let mut group = Vec::with_capacity(size);
        group.push(ChannelTransport {
            size,
            endpoint: Endpoint::Coordinator {
                job_txs,
                partial_rx,
            },
        });
        group.extend(workers);
        Ok(group)
    }
}

impl<J, P> Transport<J, P> for ChannelTransport<J, P> {
    fn role(&self) -> Role {
        match &self.endpoint {
            Endpoint::Coordinator { .. } => Role::Coordinator,
            Endpoint::Worker { rank, .. } => Role::Worker(*rank),
        }
    }

    fn size(&self) -> usize {
        self.size
    }

    fn scatter(&self, slices: Option<Vec<Vec<J>>>) -> Result<Vec<J>> {
        match &self.endpoint {
            Endpoint::Coordinator { job_txs, .. } => {
                let mut slices = expect_slices(slices, self.size)?.into_iter();
                let own = slices.next().unwrap_or_default();
                for (rank, (tx, slice)) in job_txs.iter().zip(slices).enumerate() {
                    tx.send(slice).map_err(|_| {
                        DdError::Transport(format!("worker {} disconnected before scatter", rank + 1))
                    })?;
                }
                Ok(own)
            }
            Endpoint::Worker { rank, job_rx, .. } => {
                if slices.is_some() {
                    log::warn!("worker {rank}: ignoring job slices passed to scatter");
                }
                job_rx.recv().map_err(|_| {
                    DdError::Transport(format!("worker {rank}: coordinator disconnected during scatter"))
                })
            }
        }
    }

    fn gather(&self, partial: P) -> Result<Option<Vec<P>>> {
        match &self.endpoint {
            Endpoint::Coordinator { partial_rx, .. } => {
                let mut by_rank: Vec<Option<P>> = (0..self.size).map(|_| None).collect();
                by_rank[0] = Some(partial);
                for _ in 1..self.size {
                    let (rank, p) = partial_rx.recv().map_err(|_| {
                        DdError::Transport("worker disconnected during gather".to_string())
                    })?;
                    by_rank[rank] = Some(p);
                }
                Ok(Some(by_rank.into_iter().flatten().collect()))
            }
            Endpoint::Worker {
                rank, partial_tx, ..
            } => {
                partial_tx.send((*rank, partial)).map_err(|_| {
                    DdError::Transport(format!("worker {rank}: coordinator disconnected during gather"))
                })?;
                Ok(None)
            }
        }
    }
}

/// Run `body` once per participant of a fresh [`ChannelTransport`] group,
/// each on its own thread. Results are returned in rank order.
pub fn run_spmd<J, P, R, F>(size: usize, body: F) -> Result<Vec<R>>
where
    J: Send,
    P: Send,
    R: Send,
    F: Fn(ChannelTransport<J, P>) -> R + Sync,
{
    let transports = ChannelTransport::group(size)?;
    let body = &body;
    std::thread::scope(|s| {
        let handles: Vec<_> = transports
            .into_iter()
            .map(|transport| s.spawn(move || body(transport)))
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle
                    .join()
                    .map_err(|_| DdError::Transport(format!("participant {rank} panicked")))
            })
            .collect()
    })
}
