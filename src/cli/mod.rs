//! Command-line interface wiring for lf-sampler.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Settings;

pub mod edges;
pub mod sample;
pub mod stats;

/// Top-level CLI definition.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Label function sampling, generative label aggregation and edge evaluation",
    long_about = None
)]
pub struct Cli {
    /// Log the crate at debug level unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parse CLI arguments from the environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Dispatch the selected sub-command.
    pub async fn dispatch(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::Sample(args) => sample::run(args, settings).await,
            Commands::Edges(args) => edges::run(args, settings).await,
            Commands::Stats => stats::run(settings).await,
        }
    }
}

/// Supported sub-commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fit the label model on the baseline and on sampled label function subsets.
    Sample(sample::Args),
    /// Aggregate sentence predictions into edges and search score thresholds.
    Edges(edges::Args),
    /// Summarise the candidate table per split.
    Stats,
}
