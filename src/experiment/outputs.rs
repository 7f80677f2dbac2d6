//! Persisting an experiment under `<outputs>/<experiment>/`.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    data::{store, Split},
    error::Result,
    experiment::{Batch, ExperimentConfig, ExperimentReport},
    metrics::{summarise, PerformanceRecord},
};

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    experiment: &'a str,
    created_at: DateTime<Utc>,
    config: &'a ExperimentConfig,
    model: &'a serde_json::Value,
    jobs: usize,
    fits: usize,
    failed_fits: usize,
    undefined_records: usize,
    elapsed_secs: f64,
    outputs: Vec<String>,
}

/// Writes each finished batch straight to disk.
///
/// Marginals and weights land once per `lf_num`; the results and summary
/// tables are rewritten after every batch from all records so far.
#[derive(Debug)]
pub struct OutputWriter {
    dir: PathBuf,
    written: BTreeSet<PathBuf>,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: BTreeSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_batch(&mut self, batch: &Batch, records: &[PerformanceRecord]) -> Result<()> {
        let lf_num = batch.lf_num;
        for (split, rows) in &batch.marginals {
            let path = self
                .dir
                .join("marginals")
                .join(format!("{lf_num}_sampled_{split}.tsv"));
            store::write_tsv(&path, &mut store::marginals_frame(rows)?)?;
            self.written.insert(path);
        }
        if !batch.weights.is_empty() {
            let path = self
                .dir
                .join("weights")
                .join(format!("{lf_num}_sampled_weights.tsv"));
            store::write_tsv(&path, &mut store::weights_frame(&batch.weights)?)?;
            self.written.insert(path);
        }
        self.write_results(records)?;
        debug!(lf_num, files = self.written.len(), "batch persisted");
        Ok(())
    }

    fn write_results(&mut self, records: &[PerformanceRecord]) -> Result<()> {
        for split in [Split::Dev, Split::Test] {
            let records: Vec<PerformanceRecord> = records
                .iter()
                .filter(|r| r.split == split)
                .cloned()
                .collect();
            if records.is_empty() {
                continue;
            }
            let results = self.dir.join("results");
            let path = results.join(format!("{split}_sampled_results.tsv"));
            store::write_tsv(&path, &mut store::performance_frame(&records)?)?;
            self.written.insert(path);

            let path = results.join(format!("{split}_sampled_summary.tsv"));
            store::write_tsv(&path, &mut store::summary_frame(&summarise(&records))?)?;
            self.written.insert(path);
        }
        Ok(())
    }

    /// Write `manifest.json` and return every file the run produced.
    pub fn finish(mut self, report: &ExperimentReport, config: &ExperimentConfig) -> Result<Vec<PathBuf>> {
        let manifest_path = self.dir.join("manifest.json");
        let manifest = Manifest {
            experiment: &config.name,
            created_at: Utc::now(),
            config,
            model: &report.model,
            jobs: report.jobs,
            fits: report.fits,
            failed_fits: report.failed_fits,
            undefined_records: report
                .records
                .iter()
                .filter(|r| r.status == "undefined")
                .count(),
            elapsed_secs: report.elapsed.as_secs_f64(),
            outputs: self
                .written
                .iter()
                .filter_map(|p| p.strip_prefix(&self.dir).ok())
                .map(|p| p.display().to_string())
                .collect(),
        };
        store::write_json(&manifest_path, &manifest)?;
        self.written.insert(manifest_path);
        info!(dir = %self.dir.display(), files = self.written.len(), "experiment outputs written");
        Ok(self.written.into_iter().collect())
    }
}
