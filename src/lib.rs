//! WEPP Interchange Library
//!
//! Converts the fixed-width text products written by the WEPP erosion
//! simulator into versioned, self-describing Parquet artifacts.
//!
//! This library provides:
//! - Parsers for the six per-hillslope products and the seven watershed products
//! - A parallel write pipeline with deterministic row order and atomic commits
//! - Dataset versioning with a per-directory manifest and major-version refresh
//! - A README generator describing every artifact's columns and units
//! - Ash transport post-processing with date-range filtering

pub mod ash_post;
pub mod cli;
pub mod config;
pub mod constants;
pub mod date_filter;
pub mod docs;
pub mod error;
pub mod header;
pub mod models;
pub mod orchestrator;
pub mod parsers;
pub mod pipeline;
pub mod schema;
pub mod versioning;

pub use config::{CompressionAlgorithm, InterchangeConfig, SentinelSet};
pub use constants::INTERCHANGE_VERSION;
pub use error::{InterchangeError, Result};
pub use models::{ArtifactStats, RunSummary};
pub use orchestrator::{
    InterchangeRun, run_wepp_hillslope_interchange, run_wepp_interchange,
    run_wepp_watershed_interchange,
};
pub use versioning::{
    Version, needs_major_refresh, read_version_manifest, remove_incompatible_interchange,
    write_version_manifest,
};
