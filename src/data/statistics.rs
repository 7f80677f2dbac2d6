//! Per-split summary statistics of the candidate table.

use std::collections::HashSet;

use serde::Serialize;

use crate::data::{candidates::CandidateTable, Split};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitStatistics {
    pub split: Split,
    pub candidates: usize,
    pub sentences: usize,
    pub entity_pairs: usize,
    /// Candidates whose entity pair is an edge of the reference graph.
    pub in_reference_kb: usize,
    /// Distinct entity pairs that are reference edges.
    pub reference_pairs: usize,
    pub mean_sentence_length: f64,
    pub median_sentence_length: f64,
    pub max_sentence_length: usize,
}

pub fn split_statistics(table: &CandidateTable) -> Vec<SplitStatistics> {
    Split::ALL
        .iter()
        .map(|split| {
            let rows: Vec<_> = table.in_split(*split).collect();
            let sentences: HashSet<i64> = rows.iter().map(|c| c.sentence_id).collect();
            let pairs: HashSet<(&str, &str)> = rows
                .iter()
                .map(|c| (c.entity_id_1.as_str(), c.entity_id_2.as_str()))
                .collect();
            let reference_pairs: HashSet<(&str, &str)> = rows
                .iter()
                .filter(|c| c.in_reference_kb)
                .map(|c| (c.entity_id_1.as_str(), c.entity_id_2.as_str()))
                .collect();
            let mut lengths: Vec<usize> = rows.iter().map(|c| c.sentence_length).collect();
            lengths.sort_unstable();

            SplitStatistics {
                split: *split,
                candidates: rows.len(),
                sentences: sentences.len(),
                entity_pairs: pairs.len(),
                in_reference_kb: rows.iter().filter(|c| c.in_reference_kb).count(),
                reference_pairs: reference_pairs.len(),
                mean_sentence_length: mean(&lengths),
                median_sentence_length: median_sorted(&lengths),
                max_sentence_length: lengths.last().copied().unwrap_or(0),
            }
        })
        .collect()
}

fn mean(values: &[usize]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<usize>() as f64 / values.len() as f64
}

fn median_sorted(values: &[usize]) -> f64 {
    match values.len() {
        0 => f64::NAN,
        n if n % 2 == 0 => (values[n / 2 - 1] + values[n / 2]) as f64 / 2.0,
        n => values[n / 2] as f64,
    }
}
