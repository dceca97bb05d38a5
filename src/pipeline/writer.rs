//! Atomic Parquet artifact writer
//!
//! Artifacts are written to a sibling `<name>.tmp` file opened with
//! `create_new`, so a second writer holding the same target fails instead
//! of interleaving. The temp file is renamed over the target only on
//! `commit`; dropping an uncommitted writer removes it.

use crate::config::InterchangeConfig;
use crate::constants::TEMP_SUFFIX;
use crate::error::{InterchangeError, Result};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Sibling temp path used while `target` is being written
pub fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    target.with_file_name(name)
}

/// Parquet writer that only ever exposes complete files at `target`
pub struct ArtifactWriter {
    target: PathBuf,
    temp: PathBuf,
    writer: Option<ArrowWriter<File>>,
    rows: usize,
    committed: bool,
}

impl ArtifactWriter {
    pub fn create(target: &Path, schema: SchemaRef, config: &InterchangeConfig) -> Result<Self> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = temp_path_for(target);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => InterchangeError::TempFileExists { path: temp.clone() },
                _ => InterchangeError::Io(e),
            })?;

        // from here on Drop owns cleanup of the temp file
        let mut artifact = Self {
            target: target.to_path_buf(),
            temp,
            writer: None,
            rows: 0,
            committed: false,
        };
        artifact.writer = Some(ArrowWriter::try_new(
            file,
            schema,
            Some(config.writer_properties()),
        )?);

        debug!("Opened {} for {}", artifact.temp.display(), artifact.target.display());
        Ok(artifact)
    }

    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| InterchangeError::Configuration {
            message: format!("writer for {} already closed", self.target.display()),
        })?;
        writer.write(batch)?;
        self.rows += batch.num_rows();
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Close the file and atomically move it over the target
    pub fn commit(mut self) -> Result<usize> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        std::fs::rename(&self.temp, &self.target)?;
        self.committed = true;

        debug!("Committed {} rows to {}", self.rows, self.target.display());
        Ok(self.rows)
    }
}

impl Drop for ArtifactWriter {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        drop(self.writer.take());
        if let Err(e) = std::fs::remove_file(&self.temp) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove temporary artifact {}: {}", self.temp.display(), e);
            }
        } else {
            debug!("Discarded uncommitted {}", self.temp.display());
        }
    }
}

/// Write a complete set of batches as one artifact
pub fn write_artifact(
    target: &Path,
    schema: SchemaRef,
    batches: &[RecordBatch],
    config: &InterchangeConfig,
) -> Result<usize> {
    let mut writer = ArtifactWriter::create(target, schema, config)?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use crate::schema::{SchemaBuilder, rows_to_batch};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    fn schema() -> SchemaRef {
        SchemaBuilder::new()
            .int("wepp_id", "Hillslope id")
            .measure("P (mm)", "mm", "Precipitation")
            .build()
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let temp = temp_path_for(Path::new("/a/b/H.wat.parquet"));
        assert_eq!(temp, PathBuf::from("/a/b/H.wat.parquet.tmp"));
    }

    #[test]
    fn test_commit_renames_and_round_trips_schema() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("H.wat.parquet");
        let schema = schema();
        let batch = rows_to_batch(
            &schema,
            "H.wat",
            vec![vec![Value::Int(1), Value::Float(2.5)], vec![Value::Int(2), Value::Null]],
        )
        .unwrap();

        let rows =
            write_artifact(&target, schema.clone(), &[batch], &InterchangeConfig::default())
                .unwrap();
        assert_eq!(rows, 2);
        assert!(target.exists());
        assert!(!temp_path_for(&target).exists());

        let builder =
            ParquetRecordBatchReaderBuilder::try_new(File::open(&target).unwrap()).unwrap();
        let read_schema = builder.schema().clone();
        assert_eq!(read_schema.fields(), schema.fields());
        assert_eq!(read_schema.metadata(), schema.metadata());
    }

    #[test]
    fn test_empty_artifact_is_readable() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("empty.parquet");
        let rows = write_artifact(&target, schema(), &[], &InterchangeConfig::default()).unwrap();
        assert_eq!(rows, 0);

        let builder =
            ParquetRecordBatchReaderBuilder::try_new(File::open(&target).unwrap()).unwrap();
        assert_eq!(builder.metadata().file_metadata().num_rows(), 0);
        assert_eq!(builder.schema().fields().len(), 2);
    }

    #[test]
    fn test_dropped_writer_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("H.wat.parquet");
        {
            let _writer =
                ArtifactWriter::create(&target, schema(), &InterchangeConfig::default()).unwrap();
            assert!(temp_path_for(&target).exists());
        }
        assert!(!temp_path_for(&target).exists());
        assert!(!target.exists());
    }

    #[test]
    fn test_existing_temp_file_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("H.wat.parquet");
        std::fs::write(temp_path_for(&target), b"held by someone else").unwrap();

        let result = ArtifactWriter::create(&target, schema(), &InterchangeConfig::default());
        assert!(matches!(result, Err(InterchangeError::TempFileExists { .. })));
        // the other writer's file is untouched
        assert_eq!(std::fs::read(temp_path_for(&target)).unwrap(), b"held by someone else");
    }
}
