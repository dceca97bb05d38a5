//! Command-line interface components.

use crate::config::{CompressionAlgorithm, InterchangeConfig};
use crate::date_filter::DateBound;
use crate::error::Result;

use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "wepp-interchange")]
#[command(about = "Convert WEPP simulator text output to versioned Parquet interchange artifacts")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a WEPP run directory into interchange artifacts
    Run(RunArgs),
    /// Render the README for an artifact directory
    Docs(DocsArgs),
    /// Inspect the version manifest of an artifact directory
    Version(VersionArgs),
    /// Summarize per-hillslope ash transport
    Ash(AshArgs),
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    /// WEPP working directory (holding `output/`) or the output directory itself
    #[arg(value_name = "WORKDIR")]
    pub workdir: PathBuf,

    /// First calendar year of the simulation, for watershed products
    #[arg(long)]
    pub start_year: Option<i32>,

    /// Run a single product (`element`, `wat`, ..., `chan_out`, `loss_pw0`, ...)
    #[arg(long)]
    pub product: Option<String>,

    /// Parse in-process on one thread
    #[arg(long)]
    pub serial: bool,

    /// Worker count (defaults to the CPU count)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Skip README generation
    #[arg(long)]
    pub no_docs: bool,

    /// Parquet compression algorithm (snappy, zstd, lz4, none)
    #[arg(long, default_value = "snappy")]
    pub compression: String,

    /// Hide progress bars
    #[arg(short, long)]
    pub quiet: bool,
}

impl RunArgs {
    /// Environment configuration with command-line overrides applied
    pub fn config(&self) -> Result<InterchangeConfig> {
        let compression: CompressionAlgorithm = self.compression.parse()?;
        let mut config = InterchangeConfig::from_env()
            .with_compression(compression)
            .with_start_year(self.start_year)
            .with_progress(!self.quiet);
        if self.serial {
            config = config.with_force_serial(true);
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if self.no_docs {
            config = config.without_docs();
        }
        Ok(config)
    }
}

#[derive(ClapArgs, Debug)]
pub struct DocsArgs {
    /// Artifact directory
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Write README.md instead of printing it
    #[arg(long)]
    pub write: bool,
}

#[derive(ClapArgs, Debug)]
pub struct VersionArgs {
    /// Artifact directory
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Remove the directory when its major version differs from this build
    #[arg(long)]
    pub remove_incompatible: bool,
}

#[derive(ClapArgs, Debug)]
pub struct AshArgs {
    /// Directory holding `H<id>_ash.parquet` files
    #[arg(value_name = "ASH_DIR")]
    pub ash_dir: PathBuf,

    /// JSON array of `{wepp_id, area_ha, burn_class}`
    #[arg(long, value_name = "JSON")]
    pub hillslopes: PathBuf,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Skip README generation
    #[arg(long)]
    pub no_docs: bool,
}

impl AshArgs {
    pub fn date_range(&self) -> (Option<DateBound>, Option<DateBound>) {
        (self.start.map(DateBound::from), self.end.map(DateBound::from))
    }
}
