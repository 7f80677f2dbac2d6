//! Generative label aggregation: turning label function votes into marginals.

pub mod generative;
pub mod grid;

use ndarray::ArrayView2;
use serde::Serialize;

use crate::{data::labels::Label, error::Result};

pub use generative::{GenerativeModel, FittedGenerativeModel};
pub use grid::{sweep, GridPoint};

/// Learned parameters of one label function column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LfWeight {
    /// Position of the column inside the matrix the model was fit on.
    pub column: usize,
    /// Fraction of candidates the label function voted on.
    pub propensity: f64,
    /// P(vote = positive | Y = 1, voted).
    pub accuracy_positive: f64,
    /// P(vote = negative | Y = 0, voted).
    pub accuracy_negative: f64,
    /// Log-odds of the averaged accuracy.
    pub weight: f64,
}

/// A fitted model able to score label matrices with the same column layout.
pub trait MarginalsProvider: Send + Sync {
    /// P(Y = 1 | votes) for every row, each in `[0, 1]`.
    fn predict_marginals(&self, matrix: ArrayView2<'_, Label>) -> Result<Vec<f64>>;

    fn weights(&self) -> Vec<LfWeight>;

    fn class_prior(&self) -> f64;
}

/// An unfitted label model. Fitting never looks at ground truth.
pub trait LabelModel: Send + Sync {
    type Fitted: MarginalsProvider;

    fn fit(&self, matrix: ArrayView2<'_, Label>) -> Result<Self::Fitted>;

    /// Same model with a different L2-style regularization strength.
    fn with_regularization(&self, strength: f64) -> Self
    where
        Self: Sized;

    fn regularization(&self) -> f64;
}
