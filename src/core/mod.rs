//! Core data model and algebra.
//!
//! This module contains the pieces every workflow shares: the pair/window
//! model, the job splitter, and the superposition algebra that makes station
//! contributions reducible in any order.

pub mod adjoint;
pub mod io;
pub mod model;
pub mod splitter;
pub mod superpose;
