//! ROC and precision-recall curve tracing over distinct score thresholds.

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RocCurve {
    pub false_positive_rate: Vec<f64>,
    pub true_positive_rate: Vec<f64>,
    /// Decreasing; the first entry is `+inf` for the (0, 0) point.
    pub thresholds: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrCurve {
    /// One entry longer than `thresholds`; ends with precision 1.
    pub precision: Vec<f64>,
    /// One entry longer than `thresholds`; ends with recall 0.
    pub recall: Vec<f64>,
    /// Increasing.
    pub thresholds: Vec<f64>,
}

/// Cumulative true/false positive counts at each distinct threshold, scanning
/// from the highest score down. Callers guarantee finite scores.
struct Counts {
    tps: Vec<f64>,
    fps: Vec<f64>,
    thresholds: Vec<f64>,
}

fn binary_clf_counts(truth: &[bool], scores: &[f64]) -> Result<Counts> {
    if truth.len() != scores.len() {
        return Err(Error::config(format!(
            "{} truth labels but {} scores",
            truth.len(),
            scores.len()
        )));
    }
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));

    let mut counts = Counts {
        tps: Vec::new(),
        fps: Vec::new(),
        thresholds: Vec::new(),
    };
    let (mut tp, mut fp) = (0.0, 0.0);
    for (rank, &idx) in order.iter().enumerate() {
        if truth[idx] {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_tie = order
            .get(rank + 1)
            .map_or(true, |next| scores[*next] != scores[idx]);
        if last_of_tie {
            counts.tps.push(tp);
            counts.fps.push(fp);
            counts.thresholds.push(scores[idx]);
        }
    }
    Ok(counts)
}

/// Receiver operating characteristic. Undefined (NaN rates) for single-class truth.
pub fn roc_curve(truth: &[bool], scores: &[f64]) -> Result<RocCurve> {
    let counts = binary_clf_counts(truth, scores)?;
    let total_tp = counts.tps.last().copied().unwrap_or(0.0);
    let total_fp = counts.fps.last().copied().unwrap_or(0.0);

    let mut curve = RocCurve {
        false_positive_rate: vec![0.0],
        true_positive_rate: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    for ((tp, fp), threshold) in counts.tps.iter().zip(&counts.fps).zip(&counts.thresholds) {
        curve.false_positive_rate.push(fp / total_fp);
        curve.true_positive_rate.push(tp / total_tp);
        curve.thresholds.push(*threshold);
    }
    Ok(curve)
}

/// Precision-recall pairs, stopping once full recall is reached.
pub fn precision_recall_curve(truth: &[bool], scores: &[f64]) -> Result<PrCurve> {
    let counts = binary_clf_counts(truth, scores)?;
    let total_tp = counts.tps.last().copied().unwrap_or(0.0);

    let mut curve = PrCurve::default();
    if let Some(last) = counts.tps.iter().position(|tp| *tp == total_tp) {
        for i in (0..=last).rev() {
            let (tp, fp) = (counts.tps[i], counts.fps[i]);
            curve.precision.push(tp / (tp + fp));
            curve.recall.push(tp / total_tp);
            curve.thresholds.push(counts.thresholds[i]);
        }
    }
    curve.precision.push(1.0);
    curve.recall.push(0.0);
    Ok(curve)
}

/// Area under a monotone curve by the trapezoidal rule.
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    let area: f64 = x
        .windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum();
    area.abs()
}
