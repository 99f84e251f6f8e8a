//! Analysis modules.
//!
//! Summarization of the per-run error records.

pub mod aggregator;

pub use aggregator::*;
