//! Sentence-level prediction ingestion for edge aggregation.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::{
    data::candidates::{CandidateId, CandidateSource},
    edges::CandidatePrediction,
    error::{Error, Result},
};

#[derive(Debug, Clone, Deserialize)]
struct PredictionRow {
    candidate_id: CandidateId,
    #[serde(alias = "pred", alias = "marginal_probability")]
    marginal: f64,
}

/// Read `candidate_id, marginal` rows.
pub fn load_predictions(path: &Path) -> Result<Vec<(CandidateId, f64)>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: PredictionRow = record?;
        if !(0.0..=1.0).contains(&row.marginal) {
            return Err(Error::config(format!(
                "candidate {} has marginal {} outside [0, 1]",
                row.candidate_id, row.marginal
            )));
        }
        rows.push((row.candidate_id, row.marginal));
    }
    info!(path = %path.display(), rows = rows.len(), "loaded sentence predictions");
    Ok(rows)
}

/// Attach entity pair, reference flag and names to each prediction.
pub fn join_candidates<S: CandidateSource + ?Sized>(
    source: &S,
    predictions: &[(CandidateId, f64)],
) -> Result<Vec<CandidatePrediction>> {
    let ids: Vec<CandidateId> = predictions.iter().map(|(id, _)| *id).collect();
    let candidates = source.fetch(&ids)?;
    Ok(candidates
        .into_iter()
        .zip(predictions)
        .map(|(candidate, (_, marginal))| CandidatePrediction {
            entity_id_1: candidate.entity_id_1,
            entity_id_2: candidate.entity_id_2,
            entity_1_name: candidate.entity_1_name,
            entity_2_name: candidate.entity_2_name,
            split: candidate.split,
            in_reference_kb: candidate.in_reference_kb,
            marginal: *marginal,
        })
        .collect())
}
