//! Double-difference adjoint source aggregation and weighted merge.
//!
//! Pairs of measurement windows on two stations are evaluated in distributed
//! rounds, the per-pair halves are folded into one value per station, and the
//! result is merged with single-station adjoint sources using per-component
//! normalization.

pub mod core;
pub mod defaults;
pub mod distributed;
pub mod error;
pub mod params;
pub mod pipelines;

pub use error::{ConfigError, DdError, Result};
