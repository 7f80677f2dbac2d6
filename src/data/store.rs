//! Tab-separated output tables written through polars data frames.

use std::{fs::File, path::Path};

use polars::prelude::{CsvWriter, DataFrame, NamedFrom, SerWriter, Series};
use serde::Serialize;
use tracing::info;

use crate::{
    data::statistics::SplitStatistics,
    edges::{CutoffReport, GroupedEdge, StatisticComparison, ThresholdRow},
    error::Result,
    experiment::{MarginalRow, WeightRow},
    metrics::{PerformanceRecord, PerformanceSummary},
};

/// Write `df` as TSV, creating parent directories.
pub fn write_tsv(path: &Path, df: &mut DataFrame) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b'\t')
        .finish(df)?;
    info!(path = %path.display(), rows = df.height(), "wrote table");
    Ok(())
}

/// Pretty-printed JSON side file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    info!(path = %path.display(), "wrote json");
    Ok(())
}

pub fn performance_frame(records: &[PerformanceRecord]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(
            "lf_num".into(),
            records.iter().map(|r| r.lf_num as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "trial".into(),
            records.iter().map(|r| r.trial as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "regularization".into(),
            records.iter().map(|r| r.regularization).collect::<Vec<_>>(),
        ),
        Series::new(
            "auroc".into(),
            records.iter().map(|r| r.auroc).collect::<Vec<_>>(),
        ),
        Series::new(
            "aupr".into(),
            records.iter().map(|r| r.aupr).collect::<Vec<_>>(),
        ),
        Series::new(
            "status".into(),
            records
                .iter()
                .map(|r| r.status.clone())
                .collect::<Vec<_>>(),
        ),
    ])?)
}

pub fn summary_frame(rows: &[PerformanceSummary]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(
            "lf_num".into(),
            rows.iter().map(|r| r.lf_num as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "trials".into(),
            rows.iter().map(|r| r.trials as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "failed".into(),
            rows.iter().map(|r| r.failed as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "auroc_mean".into(),
            rows.iter().map(|r| r.auroc_mean).collect::<Vec<_>>(),
        ),
        Series::new(
            "auroc_ci".into(),
            rows.iter().map(|r| r.auroc_ci).collect::<Vec<_>>(),
        ),
        Series::new(
            "aupr_mean".into(),
            rows.iter().map(|r| r.aupr_mean).collect::<Vec<_>>(),
        ),
        Series::new(
            "aupr_ci".into(),
            rows.iter().map(|r| r.aupr_ci).collect::<Vec<_>>(),
        ),
    ])?)
}

pub fn marginals_frame(rows: &[MarginalRow]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(
            "lf_num".into(),
            rows.iter().map(|r| r.lf_num as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "trial".into(),
            rows.iter().map(|r| r.trial as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "regularization".into(),
            rows.iter().map(|r| r.regularization).collect::<Vec<_>>(),
        ),
        Series::new(
            "candidate_id".into(),
            rows.iter().map(|r| r.candidate_id).collect::<Vec<_>>(),
        ),
        Series::new(
            "marginal".into(),
            rows.iter().map(|r| r.marginal).collect::<Vec<_>>(),
        ),
    ])?)
}

pub fn weights_frame(rows: &[WeightRow]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(
            "lf_num".into(),
            rows.iter().map(|r| r.lf_num as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "trial".into(),
            rows.iter().map(|r| r.trial as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "regularization".into(),
            rows.iter().map(|r| r.regularization).collect::<Vec<_>>(),
        ),
        Series::new(
            "lf_index".into(),
            rows.iter().map(|r| r.lf_index as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "lf_name".into(),
            rows.iter().map(|r| r.lf_name.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "propensity".into(),
            rows.iter().map(|r| r.weight.propensity).collect::<Vec<_>>(),
        ),
        Series::new(
            "accuracy_positive".into(),
            rows.iter()
                .map(|r| r.weight.accuracy_positive)
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "accuracy_negative".into(),
            rows.iter()
                .map(|r| r.weight.accuracy_negative)
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "weight".into(),
            rows.iter().map(|r| r.weight.weight).collect::<Vec<_>>(),
        ),
    ])?)
}

pub fn edges_frame(edges: &[GroupedEdge]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(
            "entity_id_1".into(),
            edges.iter().map(|e| e.entity_id_1.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "entity_id_2".into(),
            edges.iter().map(|e| e.entity_id_2.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "entity_1_name".into(),
            edges
                .iter()
                .map(|e| e.entity_1_name.clone())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "entity_2_name".into(),
            edges
                .iter()
                .map(|e| e.entity_2_name.clone())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "max_score".into(),
            edges.iter().map(|e| e.max_score).collect::<Vec<_>>(),
        ),
        Series::new(
            "mean_score".into(),
            edges.iter().map(|e| e.mean_score).collect::<Vec<_>>(),
        ),
        Series::new(
            "median_score".into(),
            edges.iter().map(|e| e.median_score).collect::<Vec<_>>(),
        ),
        Series::new(
            "in_reference_kb".into(),
            edges.iter().map(|e| e.in_reference_kb).collect::<Vec<_>>(),
        ),
        Series::new(
            "split".into(),
            edges.iter().map(|e| e.split.as_str()).collect::<Vec<_>>(),
        ),
        Series::new(
            "candidates".into(),
            edges.iter().map(|e| e.candidates as i64).collect::<Vec<_>>(),
        ),
    ])?)
}

pub fn comparison_frame(comparisons: &[StatisticComparison]) -> Result<DataFrame> {
    let metric = |c: &StatisticComparison, pick: fn(&crate::metrics::Evaluation) -> f64| {
        c.evaluation.as_ref().map(pick).unwrap_or(f64::NAN)
    };
    Ok(DataFrame::new(vec![
        Series::new(
            "statistic".into(),
            comparisons
                .iter()
                .map(|c| c.statistic.as_str())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "auroc".into(),
            comparisons
                .iter()
                .map(|c| metric(c, |e| e.auroc))
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "aupr".into(),
            comparisons
                .iter()
                .map(|c| metric(c, |e| e.aupr))
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "status".into(),
            comparisons
                .iter()
                .map(|c| match &c.evaluation {
                    Ok(_) => "ok",
                    Err(err) => err.status(),
                })
                .collect::<Vec<_>>(),
        ),
    ])?)
}

pub fn threshold_frame(rows: &[ThresholdRow]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(
            "precision_target".into(),
            rows.iter().map(|r| r.precision_target).collect::<Vec<_>>(),
        ),
        Series::new(
            "score_threshold".into(),
            rows.iter().map(|r| r.score_threshold).collect::<Vec<_>>(),
        ),
        Series::new(
            "edges_existing".into(),
            rows.iter().map(|r| r.edges_existing as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "edges_novel".into(),
            rows.iter().map(|r| r.edges_novel as i64).collect::<Vec<_>>(),
        ),
    ])?)
}

pub fn cutoff_frame(report: &CutoffReport) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new("statistic".into(), vec![report.statistic.as_str()]),
        Series::new("cutoff".into(), vec![report.cutoff]),
        Series::new("recall".into(), vec![report.recall]),
        Series::new("edges_existing".into(), vec![report.edges_existing as i64]),
        Series::new("edges_novel".into(), vec![report.edges_novel as i64]),
        Series::new("total_existing".into(), vec![report.total_existing as i64]),
    ])?)
}

pub fn statistics_frame(rows: &[SplitStatistics]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(
            "split".into(),
            rows.iter().map(|r| r.split.as_str()).collect::<Vec<_>>(),
        ),
        Series::new(
            "candidates".into(),
            rows.iter().map(|r| r.candidates as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "sentences".into(),
            rows.iter().map(|r| r.sentences as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "entity_pairs".into(),
            rows.iter().map(|r| r.entity_pairs as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "in_reference_kb".into(),
            rows.iter().map(|r| r.in_reference_kb as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "reference_pairs".into(),
            rows.iter().map(|r| r.reference_pairs as i64).collect::<Vec<_>>(),
        ),
        Series::new(
            "mean_sentence_length".into(),
            rows.iter().map(|r| r.mean_sentence_length).collect::<Vec<_>>(),
        ),
        Series::new(
            "median_sentence_length".into(),
            rows.iter()
                .map(|r| r.median_sentence_length)
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "max_sentence_length".into(),
            rows.iter()
                .map(|r| r.max_sentence_length as i64)
                .collect::<Vec<_>>(),
        ),
    ])?)
}
