//! End-to-end harness for the TA pipeline
//!
//! Drives a fully wired [`Pipeline`] over the in-memory store without
//! spawning tasks: [`Harness::pump`] polls every subscriber until the bus is
//! quiet, so scenarios stay deterministic.

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::Harness;
