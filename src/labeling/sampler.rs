//! Reproducible random subsets of label function columns.

use std::collections::HashSet;

use rand::{rngs::StdRng, seq::index, SeedableRng};
use tracing::debug;

use crate::error::{Error, Result};

/// Draw `num_trials` subsets of `sample_size` label function indices from `pool`.
///
/// When `sample_size` covers the whole pool every trial is the full pool, so
/// downstream code always sees `num_trials` entries. Otherwise each trial is
/// an independent draw without replacement from a single `StdRng` stream
/// seeded with `seed`; identical arguments give identical subsets.
pub fn sample(pool: &[usize], sample_size: usize, num_trials: usize, seed: u64) -> Result<Vec<Vec<usize>>> {
    if sample_size == 0 {
        return Err(Error::config("sample_size must be positive"));
    }
    if pool.is_empty() {
        return Err(Error::config("label function pool is empty"));
    }
    let mut seen = HashSet::with_capacity(pool.len());
    if let Some(dup) = pool.iter().find(|idx| !seen.insert(**idx)) {
        return Err(Error::config(format!(
            "label function pool contains index {dup} more than once"
        )));
    }

    let pool_size = pool.len();
    if sample_size >= pool_size {
        debug!(pool_size, sample_size, num_trials, "sample covers the pool");
        return Ok(vec![pool.to_vec(); num_trials]);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let subsets = (0..num_trials)
        .map(|_| {
            index::sample(&mut rng, pool_size, sample_size)
                .into_iter()
                .map(|pos| pool[pos])
                .collect()
        })
        .collect();
    debug!(pool_size, sample_size, num_trials, seed, "sampled label function subsets");
    Ok(subsets)
}

/// Prefix a sampled subset with the always-on baseline columns.
pub fn with_baseline(baseline: &[usize], subset: &[usize]) -> Vec<usize> {
    let mut seen = HashSet::with_capacity(baseline.len() + subset.len());
    baseline
        .iter()
        .chain(subset)
        .copied()
        .filter(|idx| seen.insert(*idx))
        .collect()
}
