//! Performance evaluation of marginals against curated ground truth.

pub mod curves;
pub mod performance;

use serde::Serialize;

use crate::error::{Error, Result};

pub use curves::{auc, precision_recall_curve, roc_curve, PrCurve, RocCurve};
pub use performance::{best_per_trial, sort_records, summarise, PerformanceRecord, PerformanceSummary};

/// AUROC/AUPR plus the curves they integrate.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub auroc: f64,
    pub aupr: f64,
    pub roc: RocCurve,
    pub pr: PrCurve,
}

/// Score `marginals` against binary `truth`.
///
/// Single-class truth yields [`Error::UndefinedMetric`]; callers record that
/// as an undefined row instead of aborting.
pub fn evaluate(truth: &[bool], marginals: &[f64]) -> Result<Evaluation> {
    if truth.len() != marginals.len() {
        return Err(Error::config(format!(
            "{} truth labels but {} marginals",
            truth.len(),
            marginals.len()
        )));
    }
    if let Some(bad) = marginals.iter().find(|m| !m.is_finite()) {
        return Err(Error::config(format!("marginal {bad} is not finite")));
    }
    let positives = truth.iter().filter(|t| **t).count();
    let negatives = truth.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(Error::UndefinedMetric {
            positives,
            negatives,
        });
    }

    let roc = roc_curve(truth, marginals)?;
    let pr = precision_recall_curve(truth, marginals)?;
    Ok(Evaluation {
        auroc: auc(&roc.false_positive_rate, &roc.true_positive_rate),
        aupr: auc(&pr.recall, &pr.precision),
        roc,
        pr,
    })
}
