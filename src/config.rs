//! Configuration management.
//!
//! Provides the settings shared by the write pipeline and parsers:
//! Parquet compression and row group sizing, worker pool sizing with
//! memory-pressure adaptation, and the configurable sentinel token set.

use crate::constants::{DEFAULT_SENTINELS, FORCE_SERIAL_ENV, WORKERS_ENV};
use crate::error::{InterchangeError, Result};

use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::debug;

/// Supported compression algorithms for artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    /// No compression
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to the parquet crate's compression setting
    pub fn to_parquet_compression(self) -> Compression {
        match self {
            CompressionAlgorithm::Snappy => Compression::SNAPPY,
            CompressionAlgorithm::Zstd => Compression::ZSTD(ZstdLevel::default()),
            CompressionAlgorithm::Lz4 => Compression::LZ4_RAW,
            CompressionAlgorithm::Uncompressed => Compression::UNCOMPRESSED,
        }
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = InterchangeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "snappy" => Ok(Self::Snappy),
            "zstd" => Ok(Self::Zstd),
            "lz4" => Ok(Self::Lz4),
            "none" | "uncompressed" => Ok(Self::Uncompressed),
            other => Err(InterchangeError::Configuration {
                message: format!("unknown compression '{}' (snappy, zstd, lz4, none)", other),
            }),
        }
    }
}

/// Tokens the tokenizer coerces to null
///
/// Any token made only of `*` characters is always treated as missing;
/// the set adds simulator-version specific spellings on top of that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelSet {
    tokens: HashSet<String>,
}

impl Default for SentinelSet {
    fn default() -> Self {
        Self::new(DEFAULT_SENTINELS.iter().copied())
    }
}

impl SentinelSet {
    pub fn new<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            tokens: tokens.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.tokens.insert(token.to_string());
        self
    }

    pub fn is_missing(&self, token: &str) -> bool {
        token.is_empty() || token.chars().all(|c| c == '*') || self.tokens.contains(token)
    }
}

/// System profiling information used to size the worker pool
#[derive(Debug, Clone)]
pub struct SystemProfile {
    /// Number of CPU cores available
    pub cpu_cores: usize,
    /// Total memory in MB
    pub memory_mb: usize,
    /// Fraction of memory currently in use
    pub memory_usage: f64,
}

impl SystemProfile {
    /// Auto-detect system capabilities
    pub fn detect() -> Self {
        use sysinfo::System;

        let mut system = System::new();
        system.refresh_memory();

        let total = system.total_memory();
        let memory_usage = if total == 0 {
            0.0
        } else {
            system.used_memory() as f64 / total as f64
        };

        Self {
            cpu_cores: num_cpus::get(),
            memory_mb: (total / 1024 / 1024) as usize,
            memory_usage,
        }
    }
}

/// Global configuration for interchange processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterchangeConfig {
    /// Worker count for the parse pool (0 = one per CPU core)
    pub workers: usize,

    /// Force the single-threaded in-process path
    pub force_serial: bool,

    /// Memory usage fraction above which the worker count is halved
    pub memory_threshold: f64,

    /// Compression algorithm for artifacts
    pub compression: CompressionAlgorithm,

    /// Maximum rows per Parquet row group
    pub max_row_group_size: usize,

    /// Tokens that coerce to null
    pub sentinels: SentinelSet,

    /// First calendar year of the simulation, for watershed products
    pub start_year: Option<i32>,

    /// Show progress bars while parsing
    pub show_progress: bool,

    /// Render README.md after a full run
    pub write_docs: bool,
}

impl Default for InterchangeConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            force_serial: false,
            memory_threshold: 0.8,
            compression: CompressionAlgorithm::Snappy,
            max_row_group_size: 1024 * 1024,
            sentinels: SentinelSet::default(),
            start_year: None,
            show_progress: false,
            write_docs: true,
        }
    }
}

impl InterchangeConfig {
    /// Default configuration with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Apply `WEPP_INTERCHANGE_FORCE_SERIAL` and `WEPP_INTERCHANGE_WORKERS`
    pub fn apply_env(mut self) -> Self {
        if std::env::var(FORCE_SERIAL_ENV).is_ok_and(|v| v.trim() == "1") {
            debug!("{}=1, using serial parse path", FORCE_SERIAL_ENV);
            self.force_serial = true;
        }
        if let Some(workers) = std::env::var(WORKERS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            self.workers = workers;
        }
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_force_serial(mut self, force_serial: bool) -> Self {
        self.force_serial = force_serial;
        self
    }

    pub fn with_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_start_year(mut self, start_year: Option<i32>) -> Self {
        self.start_year = start_year;
        self
    }

    pub fn with_sentinels(mut self, sentinels: SentinelSet) -> Self {
        self.sentinels = sentinels;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn without_docs(mut self) -> Self {
        self.write_docs = false;
        self
    }

    /// Worker count for `file_count` inputs, adapted to the current system
    pub fn effective_workers(&self, file_count: usize, profile: &SystemProfile) -> usize {
        if self.force_serial {
            return 1;
        }
        let mut workers = if self.workers > 0 {
            self.workers
        } else {
            profile.cpu_cores
        };
        if profile.memory_usage > self.memory_threshold {
            workers = (workers / 2).max(1);
            debug!(
                "Memory pressure detected ({:.1}% used), reducing workers to {}",
                profile.memory_usage * 100.0,
                workers
            );
        }
        workers.min(file_count).max(1)
    }

    pub fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression.to_parquet_compression())
            .set_max_row_group_size(self.max_row_group_size)
            .set_created_by(format!("wepp_interchange {}", env!("CARGO_PKG_VERSION")))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(cpu_cores: usize, memory_usage: f64) -> SystemProfile {
        SystemProfile {
            cpu_cores,
            memory_mb: 16_384,
            memory_usage,
        }
    }

    #[test]
    fn test_sentinels() {
        let sentinels = SentinelSet::default();
        assert!(sentinels.is_missing("******"));
        assert!(sentinels.is_missing("**********"));
        assert!(sentinels.is_missing(""));
        assert!(sentinels.is_missing("NaN"));
        assert!(!sentinels.is_missing("0.0"));

        let custom = SentinelSet::new(["-9999"]);
        assert!(custom.is_missing("-9999"));
        assert!(custom.is_missing("*****"));
        assert!(!custom.is_missing("NaN"));
    }

    #[test]
    fn test_compression_parsing() {
        assert_eq!("ZSTD".parse::<CompressionAlgorithm>().unwrap(), CompressionAlgorithm::Zstd);
        assert_eq!(
            "none".parse::<CompressionAlgorithm>().unwrap(),
            CompressionAlgorithm::Uncompressed
        );
        assert!("brotli9".parse::<CompressionAlgorithm>().is_err());
    }

    #[test]
    fn test_effective_workers() {
        let config = InterchangeConfig::default();
        assert_eq!(config.effective_workers(100, &profile(8, 0.1)), 8);
        assert_eq!(config.effective_workers(3, &profile(8, 0.1)), 3);
        assert_eq!(config.effective_workers(0, &profile(8, 0.1)), 1);
        assert_eq!(config.effective_workers(100, &profile(8, 0.95)), 4);

        let fixed = InterchangeConfig::default().with_workers(2);
        assert_eq!(fixed.effective_workers(100, &profile(8, 0.1)), 2);

        let serial = InterchangeConfig::default().with_force_serial(true);
        assert_eq!(serial.effective_workers(100, &profile(8, 0.1)), 1);
    }

    #[test]
    fn test_system_profile_detection() {
        let profile = SystemProfile::detect();
        assert!(profile.cpu_cores >= 1);
        assert!(profile.memory_usage >= 0.0);
    }
}
