//! Hand-curated ground truth for the evaluation splits.

use std::{collections::HashMap, path::Path};

use tracing::{info, warn};

use crate::{
    data::{candidates::CandidateId, labels::LabelMatrix, Split},
    error::{Error, Result},
};

/// Curated `candidate_id -> {0,1}` labels for one split.
#[derive(Debug, Clone)]
pub struct CuratedLabels {
    pub split: Split,
    labels: Vec<(CandidateId, bool)>,
}

impl CuratedLabels {
    pub fn new(split: Split, labels: Vec<(CandidateId, bool)>) -> Self {
        Self { split, labels }
    }

    /// Read `candidate_id` and the named truth column; blank truth cells are skipped.
    pub fn load(path: &Path, split: Split, column: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(path)?;
        let headers = reader.headers()?.clone();
        let position = |name: &str| {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                Error::config(format!("{} has no {name} column", path.display()))
            })
        };
        let id_col = position("candidate_id")?;
        let truth_col = position(column)?;

        let mut labels = Vec::new();
        let mut skipped = 0usize;
        for record in reader.records() {
            let record = record?;
            let raw = record.get(truth_col).unwrap_or("").trim();
            let value = match raw {
                "" => {
                    skipped += 1;
                    continue;
                }
                "1" | "1.0" => true,
                "0" | "0.0" => false,
                other => {
                    return Err(Error::integrity(
                        split,
                        format!("curated label {other:?} is not 0/1"),
                    ))
                }
            };
            let id: CandidateId = record[id_col].trim().parse().map_err(|_| {
                Error::integrity(split, format!("invalid candidate_id {:?}", &record[id_col]))
            })?;
            labels.push((id, value));
        }
        if skipped > 0 {
            warn!(%split, skipped, "curated rows without a label were skipped");
        }
        info!(path = %path.display(), %split, labels = labels.len(), "loaded curated labels");
        Ok(Self::new(split, labels))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Join against a label matrix: row positions into the matrix paired with the truth.
    ///
    /// Every curated id must exist in the matrix; a missing join key fails
    /// the split rather than silently shrinking the evaluation set.
    pub fn align(&self, matrix: &LabelMatrix) -> Result<AlignedTruth> {
        let index: HashMap<CandidateId, usize> = matrix
            .candidate_ids()
            .iter()
            .enumerate()
            .map(|(pos, id)| (*id, pos))
            .collect();
        let mut rows = Vec::with_capacity(self.labels.len());
        let mut truth = Vec::with_capacity(self.labels.len());
        for (id, value) in &self.labels {
            let pos = index.get(id).ok_or_else(|| {
                Error::integrity(
                    matrix.split(),
                    format!("curated candidate_id {id} is not in the label matrix"),
                )
            })?;
            rows.push(*pos);
            truth.push(*value);
        }
        Ok(AlignedTruth { rows, truth })
    }
}

/// Curated labels re-expressed as label matrix row positions.
#[derive(Debug, Clone, Default)]
pub struct AlignedTruth {
    pub rows: Vec<usize>,
    pub truth: Vec<bool>,
}

impl AlignedTruth {
    /// Pick out the curated candidates' marginals from a full-split vector.
    pub fn gather(&self, marginals: &[f64]) -> Vec<f64> {
        self.rows.iter().map(|pos| marginals[*pos]).collect()
    }
}
