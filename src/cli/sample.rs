//! CLI entry-point for label function sampling experiments.

use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument, warn};

use crate::{
    config::{parse_grid, Settings},
    data::{
        labels::{LabelEncoding, LabelStore},
        truth::CuratedLabels,
        Split,
    },
    experiment::{self, ExperimentConfig, OutputWriter},
    metrics::summarise,
};

/// Args for the `sample` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Experiment name; outputs land in `<outputs>/<name>/`.
    #[arg(long, default_value = "label_sampling")]
    pub name: String,
    /// Always-on label function columns, e.g. `0..7` or `0,2,5`.
    #[arg(long, value_parser = parse_columns)]
    pub baseline: Option<Columns>,
    /// Columns to sample from; defaults to every non-baseline column.
    #[arg(long, value_parser = parse_columns)]
    pub pool: Option<Columns>,
    /// Subset sizes drawn on top of the baseline.
    #[arg(long, value_delimiter = ',', default_values_t = [1, 6, 11, 16])]
    pub sizes: Vec<usize>,
    /// Do not add a final size covering the whole pool.
    #[arg(long)]
    pub no_full_pool: bool,
    /// Trials per size (default `LF_TRIALS`).
    #[arg(long)]
    pub trials: Option<usize>,
    /// Sampling seed (default `LF_SEED`).
    #[arg(long)]
    pub seed: Option<u64>,
    /// Comma-separated regularization strengths (default `REGULARIZATION_GRID`).
    #[arg(long)]
    pub grid: Option<String>,
    /// Label matrix cell encoding (default `LABEL_ENCODING`).
    #[arg(long)]
    pub encoding: Option<LabelEncoding>,
    /// Rayon workers (default `WORKERS`).
    #[arg(long)]
    pub workers: Option<usize>,
}

/// Parsed column list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns(pub Vec<usize>);

/// Comma-separated indices and half-open `start..end` ranges.
pub fn parse_columns(raw: &str) -> std::result::Result<Columns, String> {
    let mut columns = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once("..") {
            Some((start, end)) => {
                let start: usize = start.trim().parse().map_err(|_| format!("bad range start in {part:?}"))?;
                let end: usize = end.trim().parse().map_err(|_| format!("bad range end in {part:?}"))?;
                if end <= start {
                    return Err(format!("empty range {part:?}"));
                }
                columns.extend(start..end);
            }
            None => columns.push(part.parse().map_err(|_| format!("bad column index {part:?}"))?),
        }
    }
    Ok(Columns(columns))
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    tokio::task::spawn_blocking(move || execute(args, &settings))
        .await
        .context("experiment task panicked")?
}

fn execute(args: Args, settings: &Settings) -> Result<()> {
    let encoding = args.encoding.unwrap_or(settings.label_encoding);
    let store = LabelStore::load_dir(&settings.join_data("label_matrices"), encoding)
        .context("loading label matrices")?;

    // A curated file that fails to load only fails its own split.
    let mut curated = Vec::new();
    for split in [Split::Dev, Split::Test] {
        let path = settings.join_data(format!("curated/{split}.tsv"));
        if !path.exists() {
            warn!(%split, path = %path.display(), "no curated labels; split will not be evaluated");
            continue;
        }
        curated.push((split, CuratedLabels::load(&path, split, &settings.truth_column)));
    }

    let baseline = args.baseline.map(|c| c.0).unwrap_or_default();
    let pool = match args.pool {
        Some(Columns(pool)) => pool,
        None => (0..store.n_label_functions())
            .filter(|idx| !baseline.contains(idx))
            .collect(),
    };
    let mut sample_sizes = args.sizes;
    if !args.no_full_pool && !pool.is_empty() && !sample_sizes.contains(&pool.len()) {
        sample_sizes.push(pool.len());
    }
    if baseline.is_empty() && sample_sizes.is_empty() {
        bail!("nothing to run: no baseline and no sample sizes");
    }
    let regularization = match &args.grid {
        Some(raw) => parse_grid(raw).context("parsing --grid")?,
        None => settings.regularization.clone(),
    };

    let config = ExperimentConfig {
        name: args.name,
        pool,
        baseline,
        sample_sizes,
        num_trials: args.trials.unwrap_or(settings.trials),
        seed: args.seed.unwrap_or(settings.seed),
        regularization,
        workers: args.workers.or(settings.workers),
    };
    let model = settings.generative_model();
    let mut writer = OutputWriter::new(settings.join_output(&config.name));
    let report = experiment::run(&config, &model, &store, &curated, |batch, records| {
        writer.write_batch(batch, records)
    })
    .with_context(|| format!("running experiment into {}", writer.dir().display()))?;
    for split in [Split::Dev, Split::Test] {
        let records: Vec<_> = report
            .records
            .iter()
            .filter(|r| r.split == split)
            .cloned()
            .collect();
        for row in summarise(&records) {
            info!(
                %split,
                lf_num = row.lf_num,
                trials = row.trials,
                failed = row.failed,
                auroc = %format!("{:.3} ± {:.3}", row.auroc_mean, row.auroc_ci),
                aupr = %format!("{:.3} ± {:.3}", row.aupr_mean, row.aupr_ci),
                "sampled performance"
            );
        }
    }
    let dir = writer.dir().to_path_buf();
    let written = writer
        .finish(&report, &config)
        .with_context(|| format!("writing manifest to {}", dir.display()))?;
    info!(files = written.len(), dir = %dir.display(), "sampling experiment complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_accept_ranges_and_lists() {
        assert_eq!(parse_columns("0..3,7").unwrap(), Columns(vec![0, 1, 2, 7]));
        assert_eq!(parse_columns("").unwrap(), Columns::default());
        assert!(parse_columns("5..5").is_err());
        assert!(parse_columns("x").is_err());
    }
}
