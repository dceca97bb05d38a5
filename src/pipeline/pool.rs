//! Parse pool strategies
//!
//! Both strategies turn an ordered file list into an ordered stream of
//! parsed batches. `Serial` parses in-process on the calling task;
//! `Parallel` hands each file to a blocking worker and reassembles
//! results in input order, keeping at most `workers` parses in flight.

use crate::config::{InterchangeConfig, SystemProfile};
use crate::error::{InterchangeError, Result};

use arrow::record_batch::RecordBatch;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;
use tracing::debug;

/// Per-file parse step shared by every worker
pub type ChunkParser = Arc<dyn Fn(&Path) -> Result<RecordBatch> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePool {
    Serial,
    Parallel { workers: usize },
}

impl ParsePool {
    /// Pick the strategy for `file_count` inputs
    pub fn for_files(config: &InterchangeConfig, file_count: usize) -> Self {
        if config.force_serial {
            return ParsePool::Serial;
        }
        let workers = config.effective_workers(file_count, &SystemProfile::detect());
        ParsePool::Parallel { workers }
    }

    pub fn workers(&self) -> usize {
        match self {
            ParsePool::Serial => 1,
            ParsePool::Parallel { workers } => *workers,
        }
    }

    /// Parse `files` into batches, yielded in the order of `files`
    pub fn parse_all(
        self,
        files: Vec<PathBuf>,
        parser: ChunkParser,
    ) -> BoxStream<'static, Result<RecordBatch>> {
        match self {
            ParsePool::Serial => {
                debug!("Parsing {} files serially", files.len());
                stream::iter(files).map(move |path| parser(&path)).boxed()
            }
            ParsePool::Parallel { workers } => {
                debug!("Parsing {} files with {} workers", files.len(), workers);
                stream::iter(files)
                    .map(move |path| {
                        let parser = Arc::clone(&parser);
                        async move {
                            let worker_path = path.clone();
                            match task::spawn_blocking(move || parser(&worker_path)).await {
                                Ok(result) => result,
                                Err(e) => Err(InterchangeError::WorkerFailed {
                                    path,
                                    reason: e.to_string(),
                                }),
                            }
                        }
                    })
                    .buffered(workers.max(1))
                    .boxed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use crate::schema::{SchemaBuilder, rows_to_batch};
    use arrow::array::AsArray;
    use arrow::datatypes::Int32Type;
    use std::time::Duration;

    fn id_parser() -> ChunkParser {
        let schema = SchemaBuilder::new().int("id", "File id").build();
        Arc::new(move |path: &Path| {
            let id: i64 = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse().ok())
                .unwrap_or(-1);
            // later files finish first
            std::thread::sleep(Duration::from_millis(((10 - id.min(10)) * 3) as u64));
            rows_to_batch(&schema, "ids", vec![vec![Value::Int(id)]])
        })
    }

    async fn collect_ids(pool: ParsePool, files: Vec<PathBuf>) -> Vec<i32> {
        let batches: Vec<_> = pool.parse_all(files, id_parser()).collect().await;
        batches
            .into_iter()
            .map(|b| b.unwrap().column(0).as_primitive::<Int32Type>().value(0))
            .collect()
    }

    #[tokio::test]
    async fn test_parallel_preserves_input_order() {
        let files: Vec<PathBuf> = (1..=8).map(|i| PathBuf::from(i.to_string())).collect();
        let ids = collect_ids(ParsePool::Parallel { workers: 4 }, files.clone()).await;
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());

        let serial = collect_ids(ParsePool::Serial, files).await;
        assert_eq!(serial, ids);
    }

    #[tokio::test]
    async fn test_worker_error_is_yielded_in_place() {
        let failing: ChunkParser = Arc::new(|path: &Path| {
            Err(InterchangeError::malformed(path, 3, "bad row"))
        });
        let results: Vec<_> = ParsePool::Parallel { workers: 2 }
            .parse_all(vec![PathBuf::from("H1.wat.dat")], failing)
            .collect()
            .await;
        assert!(matches!(results[0], Err(InterchangeError::MalformedInput { line: 3, .. })));
    }

    #[test]
    fn test_strategy_selection() {
        let serial = InterchangeConfig::default().with_force_serial(true);
        assert_eq!(ParsePool::for_files(&serial, 10), ParsePool::Serial);

        let parallel = InterchangeConfig::default().with_workers(2);
        // memory pressure on the test host may halve the count
        let workers = ParsePool::for_files(&parallel, 10).workers();
        assert!((1..=2).contains(&workers));
    }
}
