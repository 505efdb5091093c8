//! Matching algorithms
//!
//! `context` holds the per-pass arena and fill distribution; `continuous`
//! and `batch` walk the materialized book sides; `finalize` writes results
//! back to storage and settles funds.

pub mod batch;
pub mod context;
pub mod continuous;
pub mod finalize;

pub use context::MatchingContext;
pub use finalize::finalize_matching;
