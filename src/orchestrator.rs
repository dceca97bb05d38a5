//! Run orchestration for a WEPP working directory.
//!
//! Resolves the raw `output/` and artifact `interchange/` directories,
//! rebuilds the artifact directory when its manifest is from another major
//! version, runs the requested parsers through the write pipeline and, once
//! every product has committed, stamps the manifest (and renders the README
//! after a full run).
//!
//! A missing raw input produces a zero-row artifact with the declared
//! schema. A parser failure propagates to the caller; artifacts committed
//! before the failure stay in place.

use crate::config::InterchangeConfig;
use crate::constants::{INTERCHANGE_DIR_NAME, INTERCHANGE_VERSION, OUTPUT_DIR_NAME};
use crate::docs::write_readme;
use crate::error::{InterchangeError, Result};
use crate::models::{ArtifactStats, RunSummary};
use crate::parsers::hillslope::{HILLSLOPE_PRODUCTS, HillslopeProduct, hillslope_product};
use crate::parsers::watershed::{
    WATERSHED_REPORTS, WATERSHED_TABLES, WatershedReport, WatershedTable, watershed_report,
    watershed_table,
};
use crate::pipeline::discovery::FileDiscovery;
use crate::pipeline::{PipelineContext, write_rows, write_with_pool};
use crate::versioning::{remove_incompatible_interchange, write_version_manifest};

use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::{fs, task};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// `(output_dir, interchange_dir)` for a working directory
///
/// A working directory that is itself named `output` holds the raw files
/// directly.
pub fn resolve_dirs(workdir: &Path) -> (PathBuf, PathBuf) {
    let output_dir = if workdir.file_name().is_some_and(|name| name == OUTPUT_DIR_NAME) {
        workdir.to_path_buf()
    } else {
        workdir.join(OUTPUT_DIR_NAME)
    };
    (output_dir, workdir.join(INTERCHANGE_DIR_NAME))
}

/// One interchange run over a working directory
#[derive(Debug, Clone)]
pub struct InterchangeRun {
    output_dir: PathBuf,
    interchange_dir: PathBuf,
    ctx: PipelineContext,
}

impl InterchangeRun {
    /// Run over `workdir` with configuration taken from the environment
    pub fn new(workdir: impl AsRef<Path>) -> Self {
        let (output_dir, interchange_dir) = resolve_dirs(workdir.as_ref());
        Self {
            output_dir,
            interchange_dir,
            ctx: PipelineContext::new(InterchangeConfig::from_env()),
        }
    }

    pub fn with_config(mut self, config: InterchangeConfig) -> Self {
        let cancel = self.ctx.cancel.clone();
        self.ctx = PipelineContext::new(config).with_cancel(cancel);
        self
    }

    /// Cancelling `cancel` stops the run before the next artifact commits
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.ctx = self.ctx.with_cancel(cancel);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn interchange_dir(&self) -> &Path {
        &self.interchange_dir
    }

    pub fn config(&self) -> &InterchangeConfig {
        &self.ctx.config
    }

    /// All hillslope and watershed products, then manifest and README
    pub async fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = self.prepare().await?;

        for product in HILLSLOPE_PRODUCTS {
            summary.artifacts.push(self.write_hillslope(&product).await?);
        }
        self.write_watershed_products(&mut summary).await?;

        self.finish(&mut summary, start)?;
        if self.ctx.config.write_docs {
            write_readme(&self.interchange_dir)?;
        }
        Ok(summary)
    }

    /// The six hillslope products
    pub async fn run_hillslopes(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = self.prepare().await?;
        for product in HILLSLOPE_PRODUCTS {
            summary.artifacts.push(self.write_hillslope(&product).await?);
        }
        self.finish(&mut summary, start)?;
        Ok(summary)
    }

    /// The seven watershed parsers
    pub async fn run_watershed(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = self.prepare().await?;
        self.write_watershed_products(&mut summary).await?;
        self.finish(&mut summary, start)?;
        Ok(summary)
    }

    /// A single product by kind: a hillslope kind (`element`, `wat`, ...)
    /// or a watershed kind (`chan_out`, `loss_pw0`, ...)
    pub async fn run_product(&self, kind: &str) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = self.prepare().await?;

        if let Some(product) = hillslope_product(kind) {
            summary.artifacts.push(self.write_hillslope(&product).await?);
        } else if let Some(table) = watershed_table(kind) {
            summary.artifacts.push(self.write_watershed_table(table).await?);
        } else if let Some(report) = watershed_report(kind) {
            summary.artifacts.extend(self.write_watershed_report(report).await?);
        } else {
            return Err(InterchangeError::Configuration {
                message: format!("unknown interchange product '{}'", kind),
            });
        }

        self.finish(&mut summary, start)?;
        Ok(summary)
    }

    /// Drop a stale artifact directory and make sure one exists
    async fn prepare(&self) -> Result<RunSummary> {
        self.ctx.check_cancelled()?;
        let refreshed = remove_incompatible_interchange(&self.interchange_dir)?;
        fs::create_dir_all(&self.interchange_dir).await?;
        debug!(
            "Interchange run: {} -> {} (refreshed: {})",
            self.output_dir.display(),
            self.interchange_dir.display(),
            refreshed
        );

        Ok(RunSummary {
            interchange_dir: self.interchange_dir.clone(),
            refreshed,
            ..RunSummary::default()
        })
    }

    fn finish(&self, summary: &mut RunSummary, start: Instant) -> Result<()> {
        self.ctx.check_cancelled()?;
        write_version_manifest(&self.interchange_dir, INTERCHANGE_VERSION)?;
        summary.processing_time_ms = start.elapsed().as_millis();
        info!(
            "Interchange {} complete: {} artifacts, {} rows from {} files",
            INTERCHANGE_VERSION,
            summary.artifacts.len(),
            summary.total_rows(),
            summary.total_files()
        );
        Ok(())
    }

    async fn write_watershed_products(&self, summary: &mut RunSummary) -> Result<()> {
        for table in WATERSHED_TABLES {
            summary.artifacts.push(self.write_watershed_table(table).await?);
        }
        for report in WATERSHED_REPORTS {
            summary.artifacts.extend(self.write_watershed_report(report).await?);
        }
        Ok(())
    }

    async fn write_hillslope(&self, product: &HillslopeProduct) -> Result<ArtifactStats> {
        let mut discovery = FileDiscovery::new(self.output_dir.clone());
        let files: Vec<PathBuf> = discovery
            .discover_hillslope_files(product.kind)
            .await?
            .into_iter()
            .map(|file| file.path)
            .collect();
        info!("{}: {} hillslope files", product.kind, discovery.hillslope_count());

        let sentinels = self.ctx.config.sentinels.clone();
        let start_year = self.ctx.config.start_year;
        let parse = product.parse;
        write_with_pool(
            &files,
            move |path: &Path| parse(path, &sentinels, start_year),
            (product.schema)(),
            &self.interchange_dir.join(product.artifact),
            &self.ctx,
        )
        .await
    }

    async fn write_watershed_table(&self, table: WatershedTable) -> Result<ArtifactStats> {
        let discovery = FileDiscovery::new(self.output_dir.clone());
        let files: Vec<PathBuf> = discovery
            .discover_watershed_file(table.source)
            .into_iter()
            .collect();
        if files.is_empty() {
            info!("{} not found, writing an empty {}", table.source, table.artifact);
        }

        let sentinels = self.ctx.config.sentinels.clone();
        let start_year = self.ctx.config.start_year;
        let parse = table.parse;
        write_with_pool(
            &files,
            move |path: &Path| parse(path, &sentinels, start_year),
            (table.schema)(),
            &self.interchange_dir.join(table.artifact),
            &self.ctx,
        )
        .await
    }

    async fn write_watershed_report(&self, report: WatershedReport) -> Result<Vec<ArtifactStats>> {
        self.ctx.check_cancelled()?;
        let discovery = FileDiscovery::new(self.output_dir.clone());

        let (tables, files_processed) = match discovery.discover_watershed_file(report.source) {
            Some(path) => {
                let config = self.ctx.config.clone();
                let parse = report.parse;
                let source = path.clone();
                let parsed = task::spawn_blocking(move || {
                    parse(&source, &config.sentinels, config.start_year)
                });

                let tables = tokio::select! {
                    biased;
                    _ = self.ctx.cancel.cancelled() => return Err(InterchangeError::Cancelled),
                    joined = parsed => joined.map_err(|e| InterchangeError::WorkerFailed {
                        path,
                        reason: e.to_string(),
                    })??,
                };
                (tables, 1)
            }
            None => {
                info!("{} not found, writing empty {} tables", report.source, report.kind);
                ((report.empty)(), 0)
            }
        };

        let mut stats = Vec::with_capacity(tables.len());
        for (artifact, schema, rows) in tables {
            self.ctx.check_cancelled()?;
            stats.push(write_rows(
                &self.interchange_dir.join(artifact),
                &schema,
                rows,
                files_processed,
                &self.ctx.config,
            )?);
        }
        Ok(stats)
    }
}

fn run_for(workdir: &Path, start_year: Option<i32>) -> InterchangeRun {
    InterchangeRun::new(workdir)
        .with_config(InterchangeConfig::from_env().with_start_year(start_year))
}

/// Every hillslope and watershed product, the manifest and the README
pub async fn run_wepp_interchange(
    workdir: impl AsRef<Path>,
    start_year: Option<i32>,
) -> Result<RunSummary> {
    run_for(workdir.as_ref(), start_year).run().await
}

pub async fn run_wepp_hillslope_interchange(workdir: impl AsRef<Path>) -> Result<RunSummary> {
    run_for(workdir.as_ref(), None).run_hillslopes().await
}

pub async fn run_wepp_watershed_interchange(
    workdir: impl AsRef<Path>,
    start_year: Option<i32>,
) -> Result<RunSummary> {
    run_for(workdir.as_ref(), start_year).run_watershed().await
}

pub async fn run_wepp_hillslope_element_interchange(
    workdir: impl AsRef<Path>,
) -> Result<RunSummary> {
    run_for(workdir.as_ref(), None).run_product("element").await
}

pub async fn run_wepp_hillslope_wat_interchange(workdir: impl AsRef<Path>) -> Result<RunSummary> {
    run_for(workdir.as_ref(), None).run_product("wat").await
}

pub async fn run_wepp_hillslope_pass_interchange(workdir: impl AsRef<Path>) -> Result<RunSummary> {
    run_for(workdir.as_ref(), None).run_product("pass").await
}

pub async fn run_wepp_hillslope_loss_interchange(workdir: impl AsRef<Path>) -> Result<RunSummary> {
    run_for(workdir.as_ref(), None).run_product("loss").await
}

pub async fn run_wepp_hillslope_soil_interchange(workdir: impl AsRef<Path>) -> Result<RunSummary> {
    run_for(workdir.as_ref(), None).run_product("soil").await
}

pub async fn run_wepp_hillslope_ebe_interchange(workdir: impl AsRef<Path>) -> Result<RunSummary> {
    run_for(workdir.as_ref(), None).run_product("ebe").await
}

pub async fn run_wepp_watershed_chan_out_interchange(
    workdir: impl AsRef<Path>,
    start_year: Option<i32>,
) -> Result<RunSummary> {
    run_for(workdir.as_ref(), start_year).run_product("chan_out").await
}

pub async fn run_wepp_watershed_chanwb_interchange(
    workdir: impl AsRef<Path>,
    start_year: Option<i32>,
) -> Result<RunSummary> {
    run_for(workdir.as_ref(), start_year).run_product("chanwb").await
}

pub async fn run_wepp_watershed_chnwb_interchange(
    workdir: impl AsRef<Path>,
    start_year: Option<i32>,
) -> Result<RunSummary> {
    run_for(workdir.as_ref(), start_year).run_product("chnwb").await
}

pub async fn run_wepp_watershed_ebe_interchange(
    workdir: impl AsRef<Path>,
    start_year: Option<i32>,
) -> Result<RunSummary> {
    run_for(workdir.as_ref(), start_year).run_product("ebe_pw0").await
}

pub async fn run_wepp_watershed_soil_interchange(
    workdir: impl AsRef<Path>,
    start_year: Option<i32>,
) -> Result<RunSummary> {
    run_for(workdir.as_ref(), start_year).run_product("soil_pw0").await
}

pub async fn run_wepp_watershed_loss_interchange(
    workdir: impl AsRef<Path>,
    start_year: Option<i32>,
) -> Result<RunSummary> {
    run_for(workdir.as_ref(), start_year).run_product("loss_pw0").await
}

pub async fn run_wepp_watershed_pass_interchange(
    workdir: impl AsRef<Path>,
    start_year: Option<i32>,
) -> Result<RunSummary> {
    run_for(workdir.as_ref(), start_year).run_product("pass_pw0").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{H_ELEMENT_PARQUET, README_FILENAME, VERSION_MANIFEST_FILENAME};
    use crate::versioning::{Version, read_version_manifest};
    use tempfile::TempDir;

    #[test]
    fn test_resolve_dirs() {
        let (output, interchange) = resolve_dirs(Path::new("/runs/a"));
        assert_eq!(output, PathBuf::from("/runs/a/output"));
        assert_eq!(interchange, PathBuf::from("/runs/a/interchange"));

        let (output, interchange) = resolve_dirs(Path::new("/runs/a/output"));
        assert_eq!(output, PathBuf::from("/runs/a/output"));
        assert_eq!(interchange, PathBuf::from("/runs/a/output/interchange"));
    }

    fn serial_run(workdir: &Path) -> InterchangeRun {
        InterchangeRun::new(workdir)
            .with_config(InterchangeConfig::default().with_force_serial(true))
    }

    #[tokio::test]
    async fn test_empty_workdir_writes_every_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let run = serial_run(temp_dir.path());

        let summary = run.run().await.unwrap();
        assert_eq!(summary.artifacts.len(), 6 + 5 + 10);
        assert_eq!(summary.total_rows(), 0);
        assert!(summary.artifacts.iter().all(|a| a.output_path.exists()));
        assert_eq!(read_version_manifest(run.interchange_dir()), Some(INTERCHANGE_VERSION));
        assert!(run.interchange_dir().join(README_FILENAME).exists());
    }

    #[tokio::test]
    async fn test_single_product_and_unknown_kind() {
        let temp_dir = TempDir::new().unwrap();
        let run = serial_run(temp_dir.path());

        let summary = run.run_product("element").await.unwrap();
        assert_eq!(summary.artifacts.len(), 1);
        assert!(run.interchange_dir().join(H_ELEMENT_PARQUET).exists());
        assert!(run.interchange_dir().join(VERSION_MANIFEST_FILENAME).exists());

        assert!(matches!(
            run.run_product("rainfall").await,
            Err(InterchangeError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_stale_major_is_rebuilt() {
        let temp_dir = TempDir::new().unwrap();
        let run = serial_run(temp_dir.path());
        let stale = run.interchange_dir().join("stale.parquet");
        std::fs::create_dir_all(run.interchange_dir()).unwrap();
        std::fs::write(&stale, b"old").unwrap();
        write_version_manifest(
            run.interchange_dir(),
            Version::new(INTERCHANGE_VERSION.major + 1, 0),
        )
        .unwrap();

        let summary = run.run_hillslopes().await.unwrap();
        assert!(summary.refreshed);
        assert!(!stale.exists());
        assert_eq!(read_version_manifest(run.interchange_dir()), Some(INTERCHANGE_VERSION));
    }

    #[tokio::test]
    async fn test_cancelled_run_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let run = serial_run(temp_dir.path()).with_cancel(cancel);

        assert!(matches!(run.run().await, Err(InterchangeError::Cancelled)));
        assert!(read_version_manifest(run.interchange_dir()).is_none());
    }
}
