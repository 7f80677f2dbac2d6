//! Regularization sweeps: one model fit per strength.

use ndarray::ArrayView2;
use rayon::prelude::*;
use tracing::debug;

use crate::{
    data::labels::Label,
    error::{Error, Result},
    model::LabelModel,
};

/// Outcome of fitting at one regularization strength.
#[derive(Debug)]
pub struct GridPoint<F> {
    pub regularization: f64,
    pub fitted: Result<F>,
}

/// Check a regularization grid before any fitting starts.
pub fn validate_grid(strengths: &[f64]) -> Result<()> {
    if strengths.is_empty() {
        return Err(Error::config("regularization grid is empty"));
    }
    if let Some(bad) = strengths.iter().find(|s| !s.is_finite() || **s < 0.0) {
        return Err(Error::config(format!(
            "regularization strength {bad} must be finite and non-negative"
        )));
    }
    Ok(())
}

/// Fit `model` at every strength in `strengths`, in parallel.
///
/// Every strength yields a point in grid order; a failed fit is kept as an
/// `Err` so sibling strengths are still reported.
pub fn sweep<M: LabelModel>(
    model: &M,
    train: ArrayView2<'_, Label>,
    strengths: &[f64],
) -> Result<Vec<GridPoint<M::Fitted>>> {
    validate_grid(strengths)?;
    Ok(strengths
        .par_iter()
        .map(|&regularization| {
            let fitted = model.with_regularization(regularization).fit(train);
            if let Err(err) = &fitted {
                debug!(regularization, %err, "label model fit failed");
            }
            GridPoint {
                regularization,
                fitted,
            }
        })
        .collect())
}
