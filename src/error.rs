//! Error taxonomy for the aggregation and evaluation core.

use thiserror::Error;

use crate::data::Split;

/// Errors raised by the library layer. The CLI wraps these in `anyhow`.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid sizes, empty matrices, mismatched columns across splits.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("label model did not converge after {iterations} iterations (max parameter delta {delta:.3e})")]
    NonConvergence { iterations: usize, delta: f64 },
    /// Single-class ground truth: AUROC/AUPR cannot be computed.
    #[error("metric undefined: ground truth has {positives} positive and {negatives} negative labels")]
    UndefinedMetric { positives: usize, negatives: usize },
    #[error("data integrity error in {split} split: {detail}")]
    DataIntegrity { split: Split, detail: String },
    #[error("candidate_id {0} missing from candidate table")]
    UnknownCandidate(i64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn config(detail: impl Into<String>) -> Self {
        Self::Configuration(detail.into())
    }

    pub(crate) fn integrity(split: Split, detail: impl Into<String>) -> Self {
        Self::DataIntegrity {
            split,
            detail: detail.into(),
        }
    }

    /// Short machine-readable tag used in the `status` column of result tables.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::NonConvergence { .. } => "non_convergence",
            Self::UndefinedMetric { .. } => "undefined",
            Self::DataIntegrity { .. } | Self::UnknownCandidate(_) => "data_integrity_error",
            Self::Io(_) | Self::Csv(_) | Self::Polars(_) | Self::Json(_) => "io_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
