//! Edge-level decisions: statistic comparison, precision-driven cutoffs and
//! fixed-cutoff recall against the reference knowledge graph.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use crate::{
    edges::{GroupedEdge, Statistic},
    error::Result,
    metrics::{evaluate, Evaluation},
};

/// Curves of one candidate scoring statistic against the reference flag.
#[derive(Debug)]
pub struct StatisticComparison {
    pub statistic: Statistic,
    pub evaluation: Result<Evaluation>,
}

/// Edges passing the minimal threshold that achieves `precision_target`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdRow {
    pub precision_target: f64,
    pub score_threshold: f64,
    pub edges_existing: usize,
    pub edges_novel: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutoffReport {
    pub statistic: Statistic,
    pub cutoff: f64,
    /// Fraction of reference edges scored above the cutoff; NaN without reference edges.
    pub recall: f64,
    pub edges_existing: usize,
    pub edges_novel: usize,
    pub total_existing: usize,
}

fn labels_and_scores(edges: &[GroupedEdge], statistic: Statistic) -> (Vec<bool>, Vec<f64>) {
    edges
        .iter()
        .map(|edge| (edge.in_reference_kb, statistic.score(edge)))
        .unzip()
}

/// ROC/PR evaluation of max, mean and median scoring.
pub fn compare_statistics(edges: &[GroupedEdge]) -> Vec<StatisticComparison> {
    Statistic::ALL
        .iter()
        .map(|statistic| {
            let (truth, scores) = labels_and_scores(edges, *statistic);
            StatisticComparison {
                statistic: *statistic,
                evaluation: evaluate(&truth, &scores),
            }
        })
        .collect()
}

/// The statistic with the highest AUROC; AUPR breaks ties, then max > mean > median.
pub fn dominant_statistic(comparisons: &[StatisticComparison]) -> Option<Statistic> {
    comparisons
        .iter()
        .enumerate()
        .filter_map(|(rank, c)| c.evaluation.as_ref().ok().map(|e| (rank, c.statistic, e)))
        .max_by(|(rank_a, _, a), (rank_b, _, b)| {
            a.auroc
                .total_cmp(&b.auroc)
                .then(a.aupr.total_cmp(&b.aupr))
                .then(rank_b.cmp(rank_a))
        })
        .map(|(_, statistic, _)| statistic)
}

/// For every distinct achieved precision level, the minimal score threshold
/// reaching it and the edges that threshold admits.
///
/// Precision levels are rounded to two decimals; a level rounded to zero is
/// replaced by the lowest precision actually achieved. Levels no raw
/// threshold reaches are skipped. Rows come out by descending target.
pub fn threshold_search(edges: &[GroupedEdge], statistic: Statistic) -> Result<Vec<ThresholdRow>> {
    let (truth, scores) = labels_and_scores(edges, statistic);
    let evaluation = evaluate(&truth, &scores)?;
    let points: Vec<(f64, f64)> = evaluation
        .pr
        .precision
        .iter()
        .copied()
        .zip(evaluation.pr.thresholds.iter().copied())
        .collect();
    let min_precision = points
        .iter()
        .map(|(precision, _)| *precision)
        .fold(f64::INFINITY, f64::min);

    let mut targets: Vec<f64> = points
        .iter()
        .map(|(precision, _)| {
            let rounded = (precision * 100.0).round() / 100.0;
            if rounded == 0.0 {
                min_precision
            } else {
                rounded
            }
        })
        .collect();
    targets.sort_by(|a, b| b.total_cmp(a));
    targets.dedup();

    let rows: Vec<ThresholdRow> = targets
        .into_iter()
        .filter_map(|target| {
            let cutoff = points
                .iter()
                .filter(|(precision, _)| *precision >= target)
                .map(|(_, threshold)| *threshold)
                .min_by(f64::total_cmp)?;
            let (edges_existing, edges_novel) =
                count_passing(edges, statistic, |score| score >= cutoff);
            Some(ThresholdRow {
                precision_target: target,
                score_threshold: cutoff,
                edges_existing,
                edges_novel,
            })
        })
        .collect();
    debug!(%statistic, rows = rows.len(), "precision threshold search complete");
    Ok(rows)
}

/// Recall and edge counts at a fixed cutoff; an edge passes when its score is strictly above it.
pub fn recall_at_cutoff(edges: &[GroupedEdge], statistic: Statistic, cutoff: f64) -> CutoffReport {
    let (edges_existing, edges_novel) = count_passing(edges, statistic, |score| score > cutoff);
    let total_existing = edges.iter().filter(|edge| edge.in_reference_kb).count();
    let recall = match total_existing {
        0 => f64::NAN,
        total => edges_existing as f64 / total as f64,
    };
    CutoffReport {
        statistic,
        cutoff,
        recall,
        edges_existing,
        edges_novel,
        total_existing,
    }
}

fn count_passing(
    edges: &[GroupedEdge],
    statistic: Statistic,
    passes: impl Fn(f64) -> bool,
) -> (usize, usize) {
    edges
        .iter()
        .filter(|edge| passes(statistic.score(edge)))
        .fold((0, 0), |(existing, novel), edge| {
            if edge.in_reference_kb {
                (existing + 1, novel)
            } else {
                (existing, novel + 1)
            }
        })
}

/// Order used when printing comparisons: best AUROC first, undefined last.
pub fn by_auroc_desc(a: &StatisticComparison, b: &StatisticComparison) -> Ordering {
    match (&a.evaluation, &b.evaluation) {
        (Ok(x), Ok(y)) => y.auroc.total_cmp(&x.auroc),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => Ordering::Equal,
    }
}
