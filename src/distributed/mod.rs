//! Worker pool coordination.
//!
//! - `transport` - the scatter/gather seam (`Transport`), with a
//!   single-participant and an in-process multi-thread implementation
//! - `coordinator` - one round of split/scatter/compute/gather/merge, plus the
//!   `RoundExecutor` used by the orchestrators

pub mod coordinator;
pub mod transport;

pub use coordinator::{PartialResult, Pooled, RoundExecutor, Spmd, run_distributed, run_pooled};
pub use transport::{ChannelTransport, Role, SoloTransport, Transport, run_spmd};
