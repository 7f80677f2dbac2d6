//! Runtime configuration for lf-sampler.

use std::{
    env,
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Serialize;

use crate::{data::labels::LabelEncoding, model::GenerativeModel};

/// Application configuration resolved from `.env`, the environment and defaults.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Root folder holding candidates, label matrices and curated labels.
    pub data_dir: PathBuf,
    /// Root folder for experiment and edge outputs.
    pub outputs_dir: PathBuf,
    pub seed: u64,
    pub trials: usize,
    pub regularization: Vec<f64>,
    pub em_max_iterations: usize,
    pub em_tolerance: f64,
    pub em_prior_accuracy: f64,
    /// Wall-clock cap per label model fit.
    pub fit_time_budget: Option<Duration>,
    /// Rayon workers for experiment jobs; unset uses one per core.
    pub workers: Option<usize>,
    pub label_encoding: LabelEncoding,
    /// Column of `curated/{split}.tsv` holding the 0/1 truth.
    pub truth_column: String,
}

impl Settings {
    /// Load configuration from environment with reasonable defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let settings = Self::from_lookup(|name| env::var(name).ok())?;
        std::fs::create_dir_all(&settings.outputs_dir).context("creating outputs dir")?;
        Ok(settings)
    }

    /// Resolve settings through `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let regularization = match var("REGULARIZATION_GRID") {
            Some(raw) => parse_grid(&raw).context("parsing REGULARIZATION_GRID")?,
            None => vec![0.01, 1.26, 2.5, 3.75, 5.0],
        };
        let fit_time_budget = var("FIT_TIME_BUDGET_SECS")
            .map(|raw| parse_value::<f64>("FIT_TIME_BUDGET_SECS", &raw))
            .transpose()?
            .map(|secs| {
                if !secs.is_finite() || secs <= 0.0 {
                    bail!("FIT_TIME_BUDGET_SECS must be a positive number of seconds");
                }
                Ok(Duration::from_secs_f64(secs))
            })
            .transpose()?;
        let workers = var("WORKERS")
            .map(|raw| parse_value::<usize>("WORKERS", &raw))
            .transpose()?
            .filter(|n| *n > 0);

        Ok(Self {
            data_dir: var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            outputs_dir: var("OUTPUTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./outputs")),
            seed: or_default(var("LF_SEED"), "LF_SEED", 100)?,
            trials: or_default(var("LF_TRIALS"), "LF_TRIALS", 50)?,
            regularization,
            em_max_iterations: or_default(var("EM_MAX_ITERATIONS"), "EM_MAX_ITERATIONS", 500)?,
            em_tolerance: or_default(var("EM_TOLERANCE"), "EM_TOLERANCE", 1e-6)?,
            em_prior_accuracy: or_default(var("EM_PRIOR_ACCURACY"), "EM_PRIOR_ACCURACY", 0.7)?,
            fit_time_budget,
            workers,
            label_encoding: or_default(var("LABEL_ENCODING"), "LABEL_ENCODING", LabelEncoding::Current)?,
            truth_column: var("TRUTH_COLUMN").unwrap_or_else(|| "curated".to_string()),
        })
    }

    /// Label model hyperparameters; the strength is set per grid point.
    pub fn generative_model(&self) -> GenerativeModel {
        GenerativeModel {
            prior_accuracy: self.em_prior_accuracy,
            max_iterations: self.em_max_iterations,
            tolerance: self.em_tolerance,
            time_budget: self.fit_time_budget,
            ..GenerativeModel::default()
        }
    }

    /// Convenience helper for derived path segments.
    pub fn join_data<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.data_dir.join(path)
    }

    /// Convenience helper for derived output path segments.
    pub fn join_output<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.outputs_dir.join(path)
    }
}

fn parse_value<T>(name: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|err| anyhow::anyhow!("invalid {name} value {raw:?}: {err}"))
}

fn or_default<T>(raw: Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.map_or(Ok(default), |raw| parse_value(name, &raw))
}

/// Comma-separated regularization strengths.
pub fn parse_grid(raw: &str) -> anyhow::Result<Vec<f64>> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| parse_value::<f64>("regularization strength", part))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_environment() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.seed, 100);
        assert_eq!(settings.trials, 50);
        assert_eq!(settings.regularization, vec![0.01, 1.26, 2.5, 3.75, 5.0]);
        assert_eq!(settings.label_encoding, LabelEncoding::Current);
        assert_eq!(settings.truth_column, "curated");
        assert!(settings.fit_time_budget.is_none());
        assert!(settings.workers.is_none());
    }

    #[test]
    fn overrides_are_parsed_and_bad_values_rejected() {
        let settings = Settings::from_lookup(lookup(&[
            ("REGULARIZATION_GRID", "0.1, 1"),
            ("FIT_TIME_BUDGET_SECS", "2.5"),
            ("WORKERS", "4"),
            ("LABEL_ENCODING", "legacy"),
        ]))
        .unwrap();
        assert_eq!(settings.regularization, vec![0.1, 1.0]);
        assert_eq!(settings.fit_time_budget, Some(Duration::from_millis(2500)));
        assert_eq!(settings.workers, Some(4));
        assert_eq!(settings.label_encoding, LabelEncoding::Legacy);
        assert_eq!(settings.generative_model().time_budget, Some(Duration::from_millis(2500)));

        assert!(Settings::from_lookup(lookup(&[("LF_SEED", "abc")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("FIT_TIME_BUDGET_SECS", "-1")])).is_err());
    }
}
