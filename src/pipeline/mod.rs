//! Parallel write pipeline.
//!
//! discover (pure) → parse (pool, one file per task) → merge (input order)
//! → write (single artifact, atomic rename). Parsed chunks are written as
//! they arrive; a failure or cancellation at any point drops the temp file
//! and leaves any previous artifact at the target untouched.

pub mod discovery;
pub mod pool;
pub mod writer;

#[cfg(test)]
mod tests;

use self::pool::{ChunkParser, ParsePool};
use self::writer::{ArtifactWriter, write_artifact};

use crate::config::InterchangeConfig;
use crate::error::{InterchangeError, Result};
use crate::models::{ArtifactStats, Row};
use crate::schema::rows_to_batch;

use arrow::datatypes::SchemaRef;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shared state for every write in one run
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub config: Arc<InterchangeConfig>,
    pub cancel: CancellationToken,
}

impl PipelineContext {
    pub fn new(config: InterchangeConfig) -> Self {
        Self {
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(InterchangeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Product name used in logs and schema errors: the artifact stem
pub(crate) fn product_name(target: &Path) -> String {
    target
        .file_name()
        .map(|n| n.to_string_lossy().trim_end_matches(".parquet").to_string())
        .unwrap_or_default()
}

fn progress_bar(len: usize, visible: bool, product: &str) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(product.to_string());
    pb
}

/// Parse `files` with `parser` and write every row to one artifact at `target`
///
/// Output rows follow the order of `files`, then each parser's own order.
/// An empty `files` still writes a readable zero-row artifact.
pub async fn write_with_pool<P>(
    files: &[PathBuf],
    parser: P,
    schema: SchemaRef,
    target: &Path,
    ctx: &PipelineContext,
) -> Result<ArtifactStats>
where
    P: Fn(&Path) -> Result<Vec<Row>> + Send + Sync + 'static,
{
    ctx.check_cancelled()?;

    let start = Instant::now();
    let product = product_name(target);
    let pool = ParsePool::for_files(&ctx.config, files.len());
    debug!("Writing {} from {} files using {:?}", product, files.len(), pool);

    let chunk_parser: ChunkParser = {
        let schema = schema.clone();
        let product = product.clone();
        Arc::new(move |path: &Path| {
            let rows = parser(path)?;
            rows_to_batch(&schema, &product, rows)
        })
    };

    let mut writer = ArtifactWriter::create(target, schema, &ctx.config)?;
    let pb = progress_bar(files.len(), ctx.config.show_progress, &product);
    let mut chunks = pool.parse_all(files.to_vec(), chunk_parser);

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                pb.abandon_with_message(format!("{} cancelled", product));
                return Err(InterchangeError::Cancelled);
            }
            next = chunks.next() => next,
        };
        let Some(chunk) = next else {
            break;
        };
        let batch = chunk?;
        writer.write(&batch)?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    let rows_written = writer.commit()?;
    info!(
        "Wrote {} ({} rows from {} files) in {:.2}s",
        target.display(),
        rows_written,
        files.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(ArtifactStats {
        files_processed: files.len(),
        rows_written,
        output_path: target.to_path_buf(),
    })
}

/// Write already-parsed rows of a single-source product
pub fn write_rows(
    target: &Path,
    schema: &SchemaRef,
    rows: Vec<Row>,
    files_processed: usize,
    config: &InterchangeConfig,
) -> Result<ArtifactStats> {
    let product = product_name(target);
    let batch = rows_to_batch(schema, &product, rows)?;
    let rows_written = write_artifact(target, schema.clone(), &[batch], config)?;
    info!("Wrote {} ({} rows)", target.display(), rows_written);

    Ok(ArtifactStats {
        files_processed,
        rows_written,
        output_path: target.to_path_buf(),
    })
}
