//! Structured logging bootstrap using `tracing`.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crate logs at info, dependencies only when they warn.
const DEFAULT_DIRECTIVES: &str = "warn,lf_sampler=info";

/// Install the global subscriber. `RUST_LOG` overrides the default filter;
/// `verbose` raises the crate's own level to debug.
pub fn init_tracing(verbose: bool) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let default = if verbose {
        "warn,lf_sampler=debug"
    } else {
        DEFAULT_DIRECTIVES
    };
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;

    // Experiment jobs run on rayon workers; thread names tell them apart.
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_level(true)
        .with_thread_names(true)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(fmt_layer).try_init()?;
    tracing::debug!(verbose, "tracing initialised");
    Ok(())
}
