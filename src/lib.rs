//! Weak-supervision label aggregation and evaluation.
//!
//! Label function columns are sampled into subsets, a generative label
//! model turns each subset's votes into per-candidate marginals, the
//! marginals are scored against curated truth, and sentence-level
//! predictions are aggregated into knowledge graph edges.

pub mod cli;
pub mod config;
pub mod data;
pub mod edges;
pub mod error;
pub mod experiment;
pub mod labeling;
pub mod logging;
pub mod metrics;
pub mod model;

pub use error::{Error, Result};
