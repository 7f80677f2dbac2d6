//! CLI entry-point for edge aggregation and threshold search.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument, warn};

use crate::{
    config::Settings,
    data::{
        candidates::CandidateTable,
        predictions::{join_candidates, load_predictions},
        store, Split,
    },
    edges::{
        aggregate, compare_statistics, dominant_statistic, recall_at_cutoff,
        threshold::by_auroc_desc, threshold_search, Statistic,
    },
};

/// Args for the `edges` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Sentence predictions (`candidate_id`, `marginal`); defaults to `<data>/predictions.tsv`.
    #[arg(long)]
    pub predictions: Option<PathBuf>,
    /// Candidate table; defaults to `<data>/candidates.tsv`.
    #[arg(long)]
    pub candidates: Option<PathBuf>,
    /// Only keep edges whose first sentence is in this split.
    #[arg(long)]
    pub split: Option<Split>,
    /// Statistic used for thresholds; defaults to the best-AUROC one.
    #[arg(long, value_enum)]
    pub statistic: Option<Statistic>,
    /// Fixed cutoff for the recall report.
    #[arg(long, default_value_t = 0.5)]
    pub cutoff: f64,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    tokio::task::spawn_blocking(move || execute(args, &settings))
        .await
        .context("edge task panicked")?
}

fn execute(args: Args, settings: &Settings) -> Result<()> {
    let candidates_path = args
        .candidates
        .unwrap_or_else(|| settings.join_data("candidates.tsv"));
    let predictions_path = args
        .predictions
        .unwrap_or_else(|| settings.join_data("predictions.tsv"));

    let table = CandidateTable::load(&candidates_path)
        .with_context(|| format!("loading {}", candidates_path.display()))?;
    let predictions = load_predictions(&predictions_path)
        .with_context(|| format!("loading {}", predictions_path.display()))?;
    let joined = join_candidates(&table, &predictions).context("joining predictions to candidates")?;

    let mut edges = aggregate(&joined);
    if let Some(split) = args.split {
        edges.retain(|edge| edge.split == split);
    }
    let out = settings.join_output("edges");
    store::write_tsv(&out.join("grouped_edges.tsv"), &mut store::edges_frame(&edges)?)?;

    let mut comparisons = compare_statistics(&edges);
    let statistic = args
        .statistic
        .or_else(|| dominant_statistic(&comparisons))
        .unwrap_or(Statistic::Max);
    comparisons.sort_by(by_auroc_desc);
    for comparison in &comparisons {
        match &comparison.evaluation {
            Ok(eval) => info!(statistic = %comparison.statistic, auroc = eval.auroc, aupr = eval.aupr, "edge statistic"),
            Err(err) => warn!(statistic = %comparison.statistic, %err, "edge statistic undefined"),
        }
    }
    store::write_tsv(
        &out.join("statistic_comparison.tsv"),
        &mut store::comparison_frame(&comparisons)?,
    )?;

    match threshold_search(&edges, statistic) {
        Ok(rows) => store::write_tsv(
            &out.join("precision_edges_added.tsv"),
            &mut store::threshold_frame(&rows)?,
        )?,
        Err(err) => warn!(%statistic, %err, "skipping precision threshold search"),
    }

    let report = recall_at_cutoff(&edges, statistic, args.cutoff);
    info!(
        %statistic,
        cutoff = report.cutoff,
        recall = report.recall,
        existing = report.edges_existing,
        novel = report.edges_novel,
        "recall at cutoff"
    );
    store::write_tsv(&out.join("recall_at_cutoff.tsv"), &mut store::cutoff_frame(&report)?)?;
    info!(edges = edges.len(), dir = %out.display(), "edge analysis complete");
    Ok(())
}
