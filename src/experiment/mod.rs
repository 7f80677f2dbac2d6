//! Label function sampling experiments: baseline plus sampled subsets, each
//! fitted over a regularization grid and scored on the curated splits.

pub mod outputs;

pub use outputs::OutputWriter;

use std::{
    collections::{BTreeMap, BTreeSet},
    time::{Duration, Instant},
};

use ndarray::Array2;
use rayon::{prelude::*, ThreadPoolBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    data::{
        candidates::CandidateId,
        labels::{Label, LabelStore},
        truth::{AlignedTruth, CuratedLabels},
        Split,
    },
    error::{Error, Result},
    labeling::{sample, with_baseline},
    metrics::{evaluate, sort_records, PerformanceRecord},
    model::{grid::validate_grid, sweep, LabelModel, LfWeight, MarginalsProvider},
};

/// Everything that parameterizes one experiment run.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentConfig {
    /// Output directory name under the outputs root.
    pub name: String,
    /// Columns sampled from.
    pub pool: Vec<usize>,
    /// Columns prepended to every subset; also fitted alone as `lf_num` 0.
    pub baseline: Vec<usize>,
    pub sample_sizes: Vec<usize>,
    pub num_trials: usize,
    pub seed: u64,
    pub regularization: Vec<f64>,
    /// Rayon worker count; `None` uses the global pool.
    pub workers: Option<usize>,
}

/// One subset to fit over the whole grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub lf_num: usize,
    pub trial: usize,
    pub columns: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginalRow {
    pub lf_num: usize,
    pub trial: usize,
    pub regularization: f64,
    pub split: Split,
    pub candidate_id: CandidateId,
    pub marginal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightRow {
    pub lf_num: usize,
    pub trial: usize,
    pub regularization: f64,
    /// Column in the full label matrix.
    pub lf_index: usize,
    pub lf_name: String,
    pub weight: LfWeight,
}

#[derive(Debug, Default)]
struct JobOutcome {
    records: Vec<PerformanceRecord>,
    marginals: Vec<MarginalRow>,
    weights: Vec<WeightRow>,
    failed_fits: usize,
}

/// Marginals and weights of one `lf_num`: the baseline or one sample size.
#[derive(Debug, Default)]
pub struct Batch {
    pub lf_num: usize,
    pub trials: usize,
    /// Rows per split, in trial then strength order.
    pub marginals: BTreeMap<Split, Vec<MarginalRow>>,
    pub weights: Vec<WeightRow>,
}

/// Run totals; marginals and weights are handed to the caller batch by batch.
#[derive(Debug)]
pub struct ExperimentReport {
    pub records: Vec<PerformanceRecord>,
    pub jobs: usize,
    pub fits: usize,
    pub failed_fits: usize,
    pub elapsed: Duration,
    /// Hyperparameters of the label model, for the manifest.
    pub model: serde_json::Value,
}

/// Expand the config into jobs: the baseline first, then every sample size
/// in order with `num_trials` trials each.
///
/// Every size is drawn with the same seed, so trial `t` of two sizes shares
/// its random stream.
pub fn plan(config: &ExperimentConfig, n_label_functions: usize) -> Result<Vec<Job>> {
    if let Some(bad) = config
        .pool
        .iter()
        .chain(&config.baseline)
        .find(|idx| **idx >= n_label_functions)
    {
        return Err(Error::config(format!(
            "label function index {bad} out of range for {n_label_functions} columns"
        )));
    }
    if config.num_trials == 0 && !config.sample_sizes.is_empty() {
        return Err(Error::config("num_trials must be positive"));
    }
    let mut sizes = BTreeSet::new();
    if let Some(dup) = config.sample_sizes.iter().find(|size| !sizes.insert(**size)) {
        return Err(Error::config(format!("sample size {dup} listed more than once")));
    }

    let mut jobs = Vec::new();
    if !config.baseline.is_empty() {
        jobs.push(Job {
            lf_num: 0,
            trial: 0,
            columns: with_baseline(&config.baseline, &[]),
        });
    }
    for &size in &config.sample_sizes {
        let subsets = sample(&config.pool, size, config.num_trials, config.seed)?;
        jobs.extend(subsets.into_iter().enumerate().map(|(trial, subset)| Job {
            lf_num: size,
            trial,
            columns: with_baseline(&config.baseline, &subset),
        }));
    }
    if jobs.is_empty() {
        return Err(Error::config("experiment has neither a baseline nor sample sizes"));
    }
    Ok(jobs)
}

/// Run every job of `config`, one `lf_num` at a time.
///
/// After each batch `persist` receives its marginals and weights together
/// with every performance record so far, so finished sample sizes are on
/// disk before the next one starts. An error from `persist` stops the run.
///
/// Failures stay local: a fit that fails becomes failed rows for its
/// strength, and a split whose curated labels do not load or join becomes
/// failed rows for that split only.
pub fn run<M, F>(
    config: &ExperimentConfig,
    model: &M,
    store: &LabelStore,
    curated: &[(Split, Result<CuratedLabels>)],
    mut persist: F,
) -> Result<ExperimentReport>
where
    M: LabelModel + Serialize,
    F: FnMut(&Batch, &[PerformanceRecord]) -> Result<()>,
{
    validate_grid(&config.regularization)?;
    let jobs = plan(config, store.n_label_functions())?;
    let truth = align_truth(store, curated);
    info!(
        experiment = %config.name,
        jobs = jobs.len(),
        strengths = config.regularization.len(),
        evaluated_splits = truth.len(),
        "starting experiment"
    );
    let pool = config
        .workers
        .map(|workers| ThreadPoolBuilder::new().num_threads(workers).build())
        .transpose()
        .map_err(|err| Error::config(format!("cannot build worker pool: {err}")))?;

    let started = Instant::now();
    let mut report = ExperimentReport {
        records: Vec::new(),
        jobs: jobs.len(),
        fits: jobs.len() * config.regularization.len(),
        failed_fits: 0,
        elapsed: Duration::ZERO,
        model: serde_json::to_value(model)?,
    };
    for group in jobs.chunk_by(|a, b| a.lf_num == b.lf_num) {
        let execute = || {
            group
                .par_iter()
                .map(|job| run_job(job, model, store, &truth, &config.regularization))
                .collect::<Vec<_>>()
        };
        let outcomes = match &pool {
            Some(pool) => pool.install(execute),
            None => execute(),
        };

        let mut batch = Batch {
            lf_num: group[0].lf_num,
            trials: group.len(),
            ..Batch::default()
        };
        let mut failed = 0;
        for outcome in outcomes {
            report.records.extend(outcome.records);
            for row in outcome.marginals {
                batch.marginals.entry(row.split).or_default().push(row);
            }
            batch.weights.extend(outcome.weights);
            failed += outcome.failed_fits;
        }
        report.failed_fits += failed;
        sort_records(&mut report.records);
        persist(&batch, &report.records)?;
        info!(lf_num = batch.lf_num, trials = batch.trials, failed_fits = failed, "sample size complete");
    }
    report.elapsed = started.elapsed();
    info!(
        experiment = %config.name,
        fits = report.fits,
        failed_fits = report.failed_fits,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "experiment finished"
    );
    Ok(report)
}

fn align_truth(
    store: &LabelStore,
    curated: &[(Split, Result<CuratedLabels>)],
) -> Vec<(Split, Result<AlignedTruth>)> {
    curated
        .iter()
        .map(|(split, labels)| {
            let aligned = match labels {
                Ok(labels) if labels.split == *split => labels.align(store.get(*split)),
                Ok(labels) => Err(Error::integrity(
                    *split,
                    format!("curated labels belong to the {} split", labels.split),
                )),
                Err(err) => Err(Error::integrity(*split, format!("curated labels did not load: {err}"))),
            };
            if let Err(err) = &aligned {
                warn!(%split, %err, "curated labels unusable; split will be reported as failed");
            }
            (*split, aligned)
        })
        .collect()
}

fn run_job<M: LabelModel>(
    job: &Job,
    model: &M,
    store: &LabelStore,
    truth: &[(Split, Result<AlignedTruth>)],
    grid: &[f64],
) -> JobOutcome {
    let mut outcome = JobOutcome::default();
    let selected: Result<Vec<(Split, Array2<Label>)>> = Split::ALL
        .iter()
        .map(|split| Ok((*split, store.get(*split).select(&job.columns)?)))
        .collect();
    let points = selected.and_then(|selected| {
        let train = selected
            .iter()
            .find(|(split, _)| *split == Split::Train)
            .map(|(_, matrix)| matrix.view())
            .ok_or_else(|| Error::config("train split missing"))?;
        Ok((sweep(model, train, grid)?, selected))
    });
    let (points, selected) = match points {
        Ok(found) => found,
        Err(err) => {
            warn!(lf_num = job.lf_num, trial = job.trial, subset = ?job.columns, %err, "job failed before fitting");
            for &regularization in grid {
                outcome.fail(job, regularization, truth, err.status());
            }
            return outcome;
        }
    };

    for point in points {
        let regularization = point.regularization;
        let fitted = match point.fitted {
            Ok(fitted) => fitted,
            Err(err) => {
                warn!(
                    lf_num = job.lf_num,
                    trial = job.trial,
                    regularization,
                    subset = ?job.columns,
                    %err,
                    "label model fit failed"
                );
                outcome.fail(job, regularization, truth, err.status());
                continue;
            }
        };

        for (split, matrix) in &selected {
            let evaluated = truth.iter().find(|(s, _)| s == split).map(|(_, t)| t);
            let marginals = match fitted.predict_marginals(matrix.view()) {
                Ok(marginals) => marginals,
                Err(err) => {
                    warn!(lf_num = job.lf_num, trial = job.trial, regularization, %split, %err, "prediction failed");
                    if evaluated.is_some() {
                        outcome.records.push(PerformanceRecord::failed(
                            job.lf_num,
                            job.trial,
                            regularization,
                            *split,
                            err.status(),
                        ));
                    }
                    continue;
                }
            };
            if let Some(aligned) = evaluated {
                let record = match aligned {
                    Ok(aligned) => {
                        let evaluation = evaluate(&aligned.truth, &aligned.gather(&marginals));
                        PerformanceRecord::from_evaluation(
                            job.lf_num,
                            job.trial,
                            regularization,
                            *split,
                            &evaluation,
                        )
                    }
                    Err(err) => PerformanceRecord::failed(
                        job.lf_num,
                        job.trial,
                        regularization,
                        *split,
                        err.status(),
                    ),
                };
                outcome.records.push(record);
            }
            let ids = store.get(*split).candidate_ids();
            outcome
                .marginals
                .extend(ids.iter().zip(marginals).map(|(candidate_id, marginal)| MarginalRow {
                    lf_num: job.lf_num,
                    trial: job.trial,
                    regularization,
                    split: *split,
                    candidate_id: *candidate_id,
                    marginal,
                }));
        }

        let names = store.get(Split::Train).lf_names();
        outcome.weights.extend(fitted.weights().into_iter().map(|weight| {
            let lf_index = job.columns[weight.column];
            WeightRow {
                lf_num: job.lf_num,
                trial: job.trial,
                regularization,
                lf_index,
                lf_name: names[lf_index].clone(),
                weight,
            }
        }));
    }
    debug!(lf_num = job.lf_num, trial = job.trial, records = outcome.records.len(), "job complete");
    outcome
}

impl JobOutcome {
    fn fail(&mut self, job: &Job, regularization: f64, truth: &[(Split, Result<AlignedTruth>)], status: &str) {
        self.failed_fits += 1;
        for (split, _) in truth {
            self.records.push(PerformanceRecord::failed(
                job.lf_num,
                job.trial,
                regularization,
                *split,
                status,
            ));
        }
    }
}
