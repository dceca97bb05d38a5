//! Input discovery for a WEPP output directory
//!
//! Hillslope products are one file per hillslope named `H<id>.<kind>.dat`;
//! watershed products are single fixed names. Discovery is a pure scan and
//! returns hillslope files ordered by numeric id so that `H2` precedes `H10`.

use crate::error::{InterchangeError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// A discovered per-hillslope input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HillslopeFile {
    pub wepp_id: u32,
    pub path: PathBuf,
}

/// Hillslope id encoded in an `H<id>.*` or `H<id>_*` filename
pub fn wepp_id_from_path(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_prefix('H')?;
    let end = rest.find(|c: char| !c.is_ascii_digit())?;
    if end == 0 || !matches!(rest.as_bytes()[end], b'.' | b'_') {
        return None;
    }
    rest[..end].parse().ok()
}

/// File discovery for one WEPP output directory
#[derive(Debug)]
pub struct FileDiscovery {
    output_dir: PathBuf,
    hillslope_count: usize,
}

impl FileDiscovery {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            hillslope_count: 0,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Hillslopes found by the last hillslope scan
    pub fn hillslope_count(&self) -> usize {
        self.hillslope_count
    }

    /// Find every `H<id>.<kind>.dat`, sorted by id
    ///
    /// A missing output directory yields no files rather than an error.
    pub async fn discover_hillslope_files(&mut self, kind: &str) -> Result<Vec<HillslopeFile>> {
        let pattern = Regex::new(&format!(r"^H(\d+)\.{}\.dat$", regex::escape(kind))).map_err(|e| {
            InterchangeError::Configuration {
                message: format!("invalid hillslope kind '{}': {}", kind, e),
            }
        })?;

        let mut files = Vec::new();
        if !self.output_dir.is_dir() {
            debug!("Output directory {} does not exist", self.output_dir.display());
            self.hillslope_count = 0;
            return Ok(files);
        }

        let mut dir = fs::read_dir(&self.output_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(captures) = pattern.captures(name) else {
                continue;
            };
            match captures[1].parse::<u32>() {
                Ok(wepp_id) if wepp_id > 0 => files.push(HillslopeFile {
                    wepp_id,
                    path: entry.path(),
                }),
                _ => warn!("Skipping {}: hillslope id must be a positive integer", name),
            }
        }

        files.sort_by_key(|f| f.wepp_id);
        self.hillslope_count = files.len();
        debug!(
            "Found {} {} files in {}",
            files.len(),
            kind,
            self.output_dir.display()
        );
        Ok(files)
    }

    /// Path of a single watershed product, if present
    pub fn discover_watershed_file(&self, file_name: &str) -> Option<PathBuf> {
        let path = self.output_dir.join(file_name);
        if path.is_file() {
            Some(path)
        } else {
            debug!("Watershed input {} not found", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_wepp_id_from_path() {
        assert_eq!(wepp_id_from_path(Path::new("/run/output/H12.wat.dat")), Some(12));
        assert_eq!(wepp_id_from_path(Path::new("H3_ash.parquet")), Some(3));
        assert_eq!(wepp_id_from_path(Path::new("Hx.wat.dat")), None);
        assert_eq!(wepp_id_from_path(Path::new("chan.out")), None);
        assert_eq!(wepp_id_from_path(Path::new("H12")), None);
    }

    #[tokio::test]
    async fn test_discovery_sorts_numerically_and_filters_kind() {
        let temp_dir = TempDir::new().unwrap();
        for name in [
            "H10.wat.dat",
            "H2.wat.dat",
            "H1.wat.dat",
            "H1.pass.dat",
            "H0.wat.dat",
            "H3.wat.dat.bak",
            "pw0.wat.dat",
        ] {
            std::fs::write(temp_dir.path().join(name), "").unwrap();
        }

        let mut discovery = FileDiscovery::new(temp_dir.path().to_path_buf());
        let files = discovery.discover_hillslope_files("wat").await.unwrap();
        let ids: Vec<u32> = files.iter().map(|f| f.wepp_id).collect();

        assert_eq!(ids, vec![1, 2, 10]);
        assert_eq!(discovery.hillslope_count(), 3);
        assert!(files[2].path.ends_with("H10.wat.dat"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let mut discovery = FileDiscovery::new(temp_dir.path().join("missing"));
        assert!(discovery.discover_hillslope_files("element").await.unwrap().is_empty());
        assert!(discovery.discover_watershed_file("chan.out").is_none());
    }
}
