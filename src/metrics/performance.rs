//! Performance tables accumulated across sampling trials.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    data::Split,
    error::Result,
    metrics::Evaluation,
};

/// One (label function count, trial, strength, split) result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceRecord {
    /// Number of sampled label functions on top of the baseline; 0 for the baseline.
    pub lf_num: usize,
    pub trial: usize,
    pub regularization: f64,
    pub split: Split,
    /// NaN when undefined or failed.
    pub auroc: f64,
    pub aupr: f64,
    pub status: String,
}

impl PerformanceRecord {
    pub fn from_evaluation(
        lf_num: usize,
        trial: usize,
        regularization: f64,
        split: Split,
        evaluation: &Result<Evaluation>,
    ) -> Self {
        let (auroc, aupr, status) = match evaluation {
            Ok(eval) => (eval.auroc, eval.aupr, "ok".to_string()),
            Err(err) => (f64::NAN, f64::NAN, err.status().to_string()),
        };
        Self {
            lf_num,
            trial,
            regularization,
            split,
            auroc,
            aupr,
            status,
        }
    }

    pub fn failed(lf_num: usize, trial: usize, regularization: f64, split: Split, status: &str) -> Self {
        Self {
            lf_num,
            trial,
            regularization,
            split,
            auroc: f64::NAN,
            aupr: f64::NAN,
            status: status.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Sort key: label function count, then trial, then strength.
pub fn sort_records(records: &mut [PerformanceRecord]) {
    records.sort_by(|a, b| {
        a.lf_num
            .cmp(&b.lf_num)
            .then(a.trial.cmp(&b.trial))
            .then(a.regularization.total_cmp(&b.regularization))
    });
}

/// Best-AUROC strength per (lf_num, trial) among rows with defined metrics.
pub fn best_per_trial(records: &[PerformanceRecord]) -> Vec<PerformanceRecord> {
    let mut best: BTreeMap<(usize, usize), &PerformanceRecord> = BTreeMap::new();
    for record in records.iter().filter(|r| r.is_ok()) {
        best.entry((record.lf_num, record.trial))
            .and_modify(|current| {
                if record.auroc > current.auroc {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    best.into_values().cloned().collect()
}

/// Mean and 95% interval half-width of AUROC/AUPR for one label function count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub lf_num: usize,
    pub trials: usize,
    pub failed: usize,
    pub auroc_mean: f64,
    pub auroc_ci: f64,
    pub aupr_mean: f64,
    pub aupr_ci: f64,
}

/// Summarise the best strength of each trial, grouped by label function count.
pub fn summarise(records: &[PerformanceRecord]) -> Vec<PerformanceSummary> {
    let mut failed: BTreeMap<usize, usize> = BTreeMap::new();
    for record in records.iter().filter(|r| !r.is_ok()) {
        *failed.entry(record.lf_num).or_insert(0) += 1;
    }

    let mut grouped: BTreeMap<usize, Vec<PerformanceRecord>> = BTreeMap::new();
    for record in best_per_trial(records) {
        grouped.entry(record.lf_num).or_default().push(record);
    }
    for lf_num in failed.keys() {
        grouped.entry(*lf_num).or_default();
    }

    grouped
        .into_iter()
        .map(|(lf_num, rows)| {
            let aurocs: Vec<f64> = rows.iter().map(|r| r.auroc).collect();
            let auprs: Vec<f64> = rows.iter().map(|r| r.aupr).collect();
            let (auroc_mean, auroc_ci) = mean_ci(&aurocs);
            let (aupr_mean, aupr_ci) = mean_ci(&auprs);
            PerformanceSummary {
                lf_num,
                trials: rows.len(),
                failed: failed.get(&lf_num).copied().unwrap_or(0),
                auroc_mean,
                auroc_ci,
                aupr_mean,
                aupr_ci,
            }
        })
        .collect()
}

fn mean_ci(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, 1.96 * (var / n).sqrt())
}
