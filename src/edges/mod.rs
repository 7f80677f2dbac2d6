//! Sentence-to-edge aggregation: many candidate predictions per entity pair.

pub mod threshold;

use std::{fmt, str::FromStr};

use clap::ValueEnum;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::data::Split;

pub use threshold::{
    compare_statistics, dominant_statistic, recall_at_cutoff, threshold_search, CutoffReport,
    StatisticComparison, ThresholdRow,
};

/// A sentence-level prediction joined with its candidate's entity pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidatePrediction {
    pub entity_id_1: String,
    pub entity_id_2: String,
    pub entity_1_name: Option<String>,
    pub entity_2_name: Option<String>,
    pub split: Split,
    pub in_reference_kb: bool,
    pub marginal: f64,
}

/// All predictions for one entity pair reduced to summary scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedEdge {
    pub entity_id_1: String,
    pub entity_id_2: String,
    pub entity_1_name: Option<String>,
    pub entity_2_name: Option<String>,
    pub max_score: f64,
    pub mean_score: f64,
    pub median_score: f64,
    /// True if any sentence in the group maps to a reference graph edge.
    pub in_reference_kb: bool,
    /// Split of the first sentence in the group.
    pub split: Split,
    pub candidates: usize,
}

/// Which reduction represents an edge's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Max,
    Mean,
    Median,
}

impl Statistic {
    pub const ALL: [Statistic; 3] = [Statistic::Max, Statistic::Mean, Statistic::Median];

    pub fn score(&self, edge: &GroupedEdge) -> f64 {
        match self {
            Self::Max => edge.max_score,
            Self::Mean => edge.mean_score,
            Self::Median => edge.median_score,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Mean => "mean",
            Self::Median => "median",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Statistic {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(Self::Max),
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            other => Err(format!("unknown statistic {other:?}")),
        }
    }
}

#[derive(Default)]
struct Group {
    scores: Vec<f64>,
    in_reference_kb: bool,
    entity_1_name: Option<String>,
    entity_2_name: Option<String>,
    split: Option<Split>,
}

/// Group predictions by entity pair, in order of first appearance.
pub fn aggregate(predictions: &[CandidatePrediction]) -> Vec<GroupedEdge> {
    let mut groups: IndexMap<(String, String), Group> = IndexMap::new();
    for prediction in predictions {
        let group = groups
            .entry((prediction.entity_id_1.clone(), prediction.entity_id_2.clone()))
            .or_default();
        group.scores.push(prediction.marginal);
        group.in_reference_kb |= prediction.in_reference_kb;
        group.split.get_or_insert(prediction.split);
        if group.entity_1_name.is_none() {
            group.entity_1_name = non_empty(&prediction.entity_1_name);
        }
        if group.entity_2_name.is_none() {
            group.entity_2_name = non_empty(&prediction.entity_2_name);
        }
    }

    let edges: Vec<GroupedEdge> = groups
        .into_iter()
        .filter_map(|((entity_id_1, entity_id_2), group)| {
            let split = group.split?;
            let n = group.scores.len();
            Some(GroupedEdge {
                entity_id_1,
                entity_id_2,
                entity_1_name: group.entity_1_name,
                entity_2_name: group.entity_2_name,
                max_score: group.scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                mean_score: group.scores.iter().sum::<f64>() / n as f64,
                median_score: median(&group.scores),
                in_reference_kb: group.in_reference_kb,
                split,
                candidates: n,
            })
        })
        .collect();
    debug!(
        predictions = predictions.len(),
        edges = edges.len(),
        "aggregated predictions into edges"
    );
    edges
}

impl GroupedEdge {
    /// Re-express the edge as a single prediction scored by `statistic`.
    pub fn as_prediction(&self, statistic: Statistic) -> CandidatePrediction {
        CandidatePrediction {
            entity_id_1: self.entity_id_1.clone(),
            entity_id_2: self.entity_id_2.clone(),
            entity_1_name: self.entity_1_name.clone(),
            entity_2_name: self.entity_2_name.clone(),
            split: self.split,
            in_reference_kb: self.in_reference_kb,
            marginal: statistic.score(self),
        }
    }
}

fn non_empty(name: &Option<String>) -> Option<String> {
    name.as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_even_groups_averages() {
        assert_eq!(median(&[0.25, 1.0, 0.75, 0.5]), 0.625);
        assert_eq!(median(&[0.7]), 0.7);
    }

    #[test]
    fn first_non_empty_name_is_kept() {
        let mut rows = vec![
            CandidatePrediction {
                entity_id_1: "DOID:9352".into(),
                entity_id_2: "3630".into(),
                entity_1_name: Some(" ".into()),
                entity_2_name: None,
                split: Split::Test,
                in_reference_kb: false,
                marginal: 0.3,
            };
            2
        ];
        rows[1].entity_1_name = Some("type 2 diabetes mellitus".into());
        rows[1].entity_2_name = Some("INS".into());
        rows[1].in_reference_kb = true;
        rows[1].split = Split::Dev;
        let edges = aggregate(&rows);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].entity_1_name.as_deref(), Some("type 2 diabetes mellitus"));
        assert_eq!(edges[0].entity_2_name.as_deref(), Some("INS"));
        assert!(edges[0].in_reference_kb);
        assert_eq!(edges[0].split, Split::Test);
        assert_eq!(edges[0].candidates, 2);
    }
}
