//! Label function bookkeeping: subset sampling and evidence heuristics.

pub mod conclusion;
pub mod sampler;

pub use sampler::{sample, with_baseline};
