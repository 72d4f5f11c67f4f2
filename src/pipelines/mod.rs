//! Double-difference workflow stages.
//!
//! - `filter`: rejected-pair removal and paired/single window partition
//! - `aggregate`: per-pair halves folded into per-station values
//! - `normalization`: per-component single vs double-difference scaling
//! - `merge`: weighted union merge of both result sets
//! - `archive`: adjoint source container seam and its JSON implementation
//! - `orchestrator`: complete runs built from the stages above

pub mod aggregate;
pub mod archive;
pub mod filter;
pub mod merge;
pub mod normalization;
pub mod orchestrator;
