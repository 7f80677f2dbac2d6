//! CLI entry-point for candidate table statistics.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::{
    config::Settings,
    data::{candidates::CandidateTable, statistics::split_statistics, store},
};

#[instrument(skip(settings))]
pub async fn run(settings: Settings) -> Result<()> {
    tokio::task::spawn_blocking(move || {
        let path = settings.join_data("candidates.tsv");
        let table = CandidateTable::load(&path)
            .with_context(|| format!("loading {}", path.display()))?;
        let stats = split_statistics(&table);
        for row in &stats {
            info!(
                split = %row.split,
                candidates = row.candidates,
                entity_pairs = row.entity_pairs,
                in_reference_kb = row.in_reference_kb,
                "split statistics"
            );
        }
        store::write_tsv(
            &settings.join_output("dataset_statistics.tsv"),
            &mut store::statistics_frame(&stats)?,
        )?;
        Ok::<_, anyhow::Error>(())
    })
    .await
    .context("statistics task panicked")?
}
