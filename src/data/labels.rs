//! Label matrices: per-split grids of label function votes.

use std::{
    collections::HashSet,
    fmt,
    path::Path,
    str::FromStr,
};

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    data::{candidates::CandidateId, Split},
    error::{Error, Result},
};

/// A single label function vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Label {
    #[default]
    Abstain,
    Negative,
    Positive,
}

impl Label {
    pub fn is_vote(self) -> bool {
        !matches!(self, Self::Abstain)
    }
}

/// On-disk encodings of label cells. Decoded once at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelEncoding {
    /// `-1` abstain, `0` negative, `1` positive; empty cells abstain.
    #[default]
    Current,
    /// Sparse legacy files: empty or `0` abstain, `1` positive, `-1` or `2` negative.
    Legacy,
}

impl LabelEncoding {
    pub fn decode(self, cell: &str) -> Option<Label> {
        let cell = cell.trim();
        // Float-formatted exports write `1.0`.
        let cell = cell.strip_suffix(".0").unwrap_or(cell);
        match (self, cell) {
            (_, "") => Some(Label::Abstain),
            (Self::Current, "-1") => Some(Label::Abstain),
            (Self::Current, "0") => Some(Label::Negative),
            (Self::Current, "1") => Some(Label::Positive),
            (Self::Legacy, "0") => Some(Label::Abstain),
            (Self::Legacy, "1") => Some(Label::Positive),
            (Self::Legacy, "-1" | "2") => Some(Label::Negative),
            _ => None,
        }
    }
}

impl FromStr for LabelEncoding {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "current" => Ok(Self::Current),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!("unknown label encoding {other:?}")),
        }
    }
}

impl fmt::Display for LabelEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}

/// Candidates × label functions grid for one split.
#[derive(Debug, Clone)]
pub struct LabelMatrix {
    split: Split,
    candidate_ids: Vec<CandidateId>,
    lf_names: Vec<String>,
    labels: Array2<Label>,
}

impl LabelMatrix {
    pub fn new(
        split: Split,
        candidate_ids: Vec<CandidateId>,
        lf_names: Vec<String>,
        labels: Array2<Label>,
    ) -> Result<Self> {
        if labels.nrows() != candidate_ids.len() || labels.ncols() != lf_names.len() {
            return Err(Error::config(format!(
                "{split} label matrix shape {:?} does not match {} candidates × {} label functions",
                labels.dim(),
                candidate_ids.len(),
                lf_names.len()
            )));
        }
        let mut seen = HashSet::with_capacity(candidate_ids.len());
        if let Some(dup) = candidate_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(Error::integrity(
                split,
                format!("duplicate candidate_id {dup} in label matrix"),
            ));
        }
        Ok(Self {
            split,
            candidate_ids,
            lf_names,
            labels,
        })
    }

    /// Build from `-1/0/1` codes, naming label functions `lf_0..lf_k`.
    pub fn from_codes(split: Split, candidate_ids: Vec<CandidateId>, rows: &[Vec<i8>]) -> Result<Self> {
        let ncols = rows.first().map(Vec::len).unwrap_or(0);
        let mut cells = Vec::with_capacity(rows.len() * ncols);
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != ncols {
                return Err(Error::config(format!(
                    "row {row_idx} has {} label functions, expected {ncols}",
                    row.len()
                )));
            }
            for code in row {
                let label = LabelEncoding::Current
                    .decode(&code.to_string())
                    .ok_or_else(|| Error::config(format!("invalid label code {code}")))?;
                cells.push(label);
            }
        }
        let labels = Array2::from_shape_vec((rows.len(), ncols), cells)
            .map_err(|err| Error::config(err.to_string()))?;
        let lf_names = (0..ncols).map(|idx| format!("lf_{idx}")).collect();
        Self::new(split, candidate_ids, lf_names, labels)
    }

    /// Read a TSV with a `candidate_id` column followed by one column per label function.
    pub fn load(path: &Path, split: Split, encoding: LabelEncoding) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(false)
            .from_path(path)?;
        let headers = reader.headers()?.clone();
        let id_col = headers
            .iter()
            .position(|h| h == "candidate_id")
            .ok_or_else(|| {
                Error::config(format!("{} has no candidate_id column", path.display()))
            })?;
        let lf_cols: Vec<usize> = (0..headers.len()).filter(|idx| *idx != id_col).collect();
        let lf_names: Vec<String> = lf_cols.iter().map(|idx| headers[*idx].to_string()).collect();

        let mut candidate_ids = Vec::new();
        let mut cells = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let id: CandidateId = record[id_col].trim().parse().map_err(|_| {
                Error::integrity(
                    split,
                    format!("row {line}: invalid candidate_id {:?}", &record[id_col]),
                )
            })?;
            candidate_ids.push(id);
            for col in &lf_cols {
                let raw = record.get(*col).unwrap_or("");
                let label = encoding.decode(raw).ok_or_else(|| {
                    Error::config(format!(
                        "row {line}, column {}: value {raw:?} is not a {encoding} label",
                        &headers[*col]
                    ))
                })?;
                cells.push(label);
            }
        }

        let labels = Array2::from_shape_vec((candidate_ids.len(), lf_names.len()), cells)
            .map_err(|err| Error::config(err.to_string()))?;
        info!(
            path = %path.display(),
            %split,
            candidates = candidate_ids.len(),
            label_functions = lf_names.len(),
            "loaded label matrix"
        );
        Self::new(split, candidate_ids, lf_names, labels)
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn candidate_ids(&self) -> &[CandidateId] {
        &self.candidate_ids
    }

    pub fn lf_names(&self) -> &[String] {
        &self.lf_names
    }

    pub fn n_candidates(&self) -> usize {
        self.labels.nrows()
    }

    pub fn n_label_functions(&self) -> usize {
        self.labels.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, Label> {
        self.labels.view()
    }

    /// Copy out the given label function columns, in the given order.
    pub fn select(&self, columns: &[usize]) -> Result<Array2<Label>> {
        if columns.is_empty() {
            return Err(Error::config("empty label function subset"));
        }
        if let Some(bad) = columns.iter().find(|col| **col >= self.n_label_functions()) {
            return Err(Error::config(format!(
                "label function index {bad} out of range for {} columns",
                self.n_label_functions()
            )));
        }
        Ok(self.labels.select(Axis(1), columns))
    }
}

/// The three split matrices, checked for a shared column layout.
#[derive(Debug, Clone)]
pub struct LabelStore {
    pub train: LabelMatrix,
    pub dev: LabelMatrix,
    pub test: LabelMatrix,
}

impl LabelStore {
    pub fn new(train: LabelMatrix, dev: LabelMatrix, test: LabelMatrix) -> Result<Self> {
        for other in [&dev, &test] {
            if other.lf_names() != train.lf_names() {
                return Err(Error::config(format!(
                    "{} label functions do not line up with train ({} vs {} columns)",
                    other.split(),
                    other.n_label_functions(),
                    train.n_label_functions()
                )));
            }
        }
        if train.n_candidates() == 0 {
            return Err(Error::config("train label matrix has no rows"));
        }
        debug!(
            label_functions = train.n_label_functions(),
            train = train.n_candidates(),
            dev = dev.n_candidates(),
            test = test.n_candidates(),
            "label store ready"
        );
        Ok(Self { train, dev, test })
    }

    /// Load `train.tsv`, `dev.tsv` and `test.tsv` from a directory.
    pub fn load_dir(dir: &Path, encoding: LabelEncoding) -> Result<Self> {
        let load = |split: Split| LabelMatrix::load(&dir.join(format!("{split}.tsv")), split, encoding);
        Self::new(load(Split::Train)?, load(Split::Dev)?, load(Split::Test)?)
    }

    pub fn get(&self, split: Split) -> &LabelMatrix {
        match split {
            Split::Train => &self.train,
            Split::Dev => &self.dev,
            Split::Test => &self.test,
        }
    }

    pub fn n_label_functions(&self) -> usize {
        self.train.n_label_functions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_encoding_maps_to_enum() {
        let enc = LabelEncoding::Legacy;
        assert_eq!(enc.decode(""), Some(Label::Abstain));
        assert_eq!(enc.decode("-1"), Some(Label::Negative));
        assert_eq!(enc.decode("1.0"), Some(Label::Positive));
        assert_eq!(enc.decode("7"), None);
    }

    #[test]
    fn select_rejects_out_of_range_columns() {
        let matrix = LabelMatrix::from_codes(Split::Train, vec![1, 2], &[vec![1, -1], vec![0, 1]])
            .unwrap();
        assert_eq!(matrix.select(&[1]).unwrap()[[1, 0]], Label::Positive);
        assert!(matrix.select(&[2]).is_err());
        assert!(matrix.select(&[]).is_err());
    }

    #[test]
    fn store_requires_matching_columns() {
        let train = LabelMatrix::from_codes(Split::Train, vec![1], &[vec![1, 0]]).unwrap();
        let dev = LabelMatrix::from_codes(Split::Dev, vec![2], &[vec![1]]).unwrap();
        let test = LabelMatrix::from_codes(Split::Test, vec![3], &[vec![1, 0]]).unwrap();
        assert!(matches!(
            LabelStore::new(train, dev, test),
            Err(Error::Configuration(_))
        ));
    }
}
