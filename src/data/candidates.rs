//! Candidate table ingestion and lookup.

use std::{collections::HashMap, path::Path};

use serde::Deserialize;
use tracing::info;

use crate::{
    data::{deserialize_flag, Split},
    error::{Error, Result},
};

pub type CandidateId = i64;

/// A sentence together with a pair of tagged entity mentions.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Candidate {
    pub candidate_id: CandidateId,
    pub sentence_id: i64,
    pub entity_id_1: String,
    pub entity_id_2: String,
    pub split: Split,
    #[serde(default)]
    pub sentence_text: String,
    #[serde(default)]
    pub sentence_length: usize,
    #[serde(deserialize_with = "deserialize_flag")]
    pub in_reference_kb: bool,
    #[serde(default)]
    pub entity_1_name: Option<String>,
    #[serde(default)]
    pub entity_2_name: Option<String>,
}

/// Anything able to resolve candidate ids to typed candidate rows.
pub trait CandidateSource {
    /// Returns rows in the order of `ids`; an unknown id is an error.
    fn fetch(&self, ids: &[CandidateId]) -> Result<Vec<Candidate>>;
}

/// In-memory candidate table loaded from a TSV file.
#[derive(Debug, Default, Clone)]
pub struct CandidateTable {
    rows: Vec<Candidate>,
    index: HashMap<CandidateId, usize>,
}

impl CandidateTable {
    pub fn new(rows: Vec<Candidate>) -> Result<Self> {
        let mut index = HashMap::with_capacity(rows.len());
        for (pos, row) in rows.iter().enumerate() {
            if index.insert(row.candidate_id, pos).is_some() {
                return Err(Error::integrity(
                    row.split,
                    format!("duplicate candidate_id {} in candidate table", row.candidate_id),
                ));
            }
        }
        Ok(Self { rows, index })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(path)?;
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: Candidate = record?;
            rows.push(row);
        }
        info!(path = %path.display(), rows = rows.len(), "loaded candidate table");
        Self::new(rows)
    }

    pub fn get(&self, id: CandidateId) -> Option<&Candidate> {
        self.index.get(&id).map(|pos| &self.rows[*pos])
    }

    pub fn in_split(&self, split: Split) -> impl Iterator<Item = &Candidate> {
        self.rows.iter().filter(move |row| row.split == split)
    }
}

impl CandidateSource for CandidateTable {
    fn fetch(&self, ids: &[CandidateId]) -> Result<Vec<Candidate>> {
        ids.iter()
            .map(|id| {
                self.get(*id)
                    .cloned()
                    .ok_or(Error::UnknownCandidate(*id))
            })
            .collect()
    }
}
