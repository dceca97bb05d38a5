//! Dataset versioning and the per-directory manifest.
//!
//! Every artifact schema carries the running [`Version`]; the artifact
//! directory carries `_version.json`. A major mismatch means the directory
//! is stale and gets rebuilt wholesale. Minor bumps are additive.

use crate::constants::{INTERCHANGE_VERSION, VERSION_MANIFEST_FILENAME};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Interchange dataset version, ordered lexicographically by (major, minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse the canonical `"major.minor"` form
    pub fn parse(text: &str) -> Option<Self> {
        let (major, minor) = text.trim().split_once('.')?;
        Some(Self::new(major.parse().ok()?, minor.parse().ok()?))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// On-disk manifest layout
#[derive(Debug, Serialize, Deserialize)]
struct VersionManifest {
    major: u32,
    minor: u32,
    version: String,
}

/// Atomically write `_version.json` into `dir`
pub fn write_version_manifest(dir: &Path, version: Version) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let manifest = VersionManifest {
        major: version.major,
        minor: version.minor,
        version: version.to_string(),
    };
    let body = serde_json::to_vec_pretty(&manifest)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(&body)?;
    temp.as_file().sync_all()?;
    temp.persist(dir.join(VERSION_MANIFEST_FILENAME))
        .map_err(|e| e.error)?;

    debug!("Wrote version manifest {} to {}", version, dir.display());
    Ok(())
}

/// Read the manifest; absent or unparseable manifests yield `None`
pub fn read_version_manifest(dir: &Path) -> Option<Version> {
    let path = dir.join(VERSION_MANIFEST_FILENAME);
    let bytes = std::fs::read(&path).ok()?;

    let manifest: VersionManifest = match serde_json::from_slice(&bytes) {
        Ok(manifest) => manifest,
        Err(e) => {
            warn!("Ignoring malformed manifest {}: {}", path.display(), e);
            return None;
        }
    };

    let version = Version::new(manifest.major, manifest.minor);
    if Version::parse(&manifest.version) != Some(version) {
        warn!(
            "Ignoring manifest {}: version string '{}' disagrees with {}",
            path.display(),
            manifest.version,
            version
        );
        return None;
    }
    Some(version)
}

/// True when `dir` has no usable manifest or its major differs from the running version
pub fn needs_major_refresh(dir: &Path) -> bool {
    needs_major_refresh_against(dir, INTERCHANGE_VERSION)
}

pub fn needs_major_refresh_against(dir: &Path, running: Version) -> bool {
    match read_version_manifest(dir) {
        Some(found) => found.major != running.major,
        None => true,
    }
}

/// Remove `dir` recursively when it needs a major refresh; returns whether it was removed
pub fn remove_incompatible_interchange(dir: &Path) -> Result<bool> {
    remove_incompatible_against(dir, INTERCHANGE_VERSION)
}

pub fn remove_incompatible_against(dir: &Path, running: Version) -> Result<bool> {
    if !dir.exists() || !needs_major_refresh_against(dir, running) {
        return Ok(false);
    }

    info!(
        "Removing incompatible interchange directory {} (running version {})",
        dir.display(),
        running
    );
    std::fs::remove_dir_all(dir)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_version_ordering_is_lexicographic() {
        assert!(Version::new(1, 9) < Version::new(2, 0));
        assert!(Version::new(2, 1) > Version::new(2, 0));
        assert_eq!(Version::new(3, 4).to_string(), "3.4");
        assert_eq!(Version::parse("3.4"), Some(Version::new(3, 4)));
        assert_eq!(Version::parse("3"), None);
    }

    #[test]
    fn test_manifest_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        for version in [Version::new(0, 0), Version::new(1, 2), Version::new(17, 300)] {
            write_version_manifest(temp_dir.path(), version).unwrap();
            assert_eq!(read_version_manifest(temp_dir.path()), Some(version));
        }
    }

    #[test]
    fn test_manifest_content() {
        let temp_dir = TempDir::new().unwrap();
        write_version_manifest(temp_dir.path(), Version::new(4, 7)).unwrap();

        let body =
            std::fs::read_to_string(temp_dir.path().join(VERSION_MANIFEST_FILENAME)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["major"], 4);
        assert_eq!(json["minor"], 7);
        assert_eq!(json["version"], "4.7");

        // only the manifest remains, no stray temp files
        let entries: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_missing_and_malformed_manifest() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(read_version_manifest(temp_dir.path()), None);
        assert!(needs_major_refresh(temp_dir.path()));

        std::fs::write(temp_dir.path().join(VERSION_MANIFEST_FILENAME), "{not json").unwrap();
        assert_eq!(read_version_manifest(temp_dir.path()), None);
        assert!(needs_major_refresh(temp_dir.path()));
    }

    #[test]
    fn test_refresh_policy() {
        let temp_dir = TempDir::new().unwrap();
        let running = INTERCHANGE_VERSION;

        write_version_manifest(temp_dir.path(), running).unwrap();
        assert!(!needs_major_refresh(temp_dir.path()));

        write_version_manifest(temp_dir.path(), Version::new(running.major, running.minor + 1))
            .unwrap();
        assert!(!needs_major_refresh(temp_dir.path()));

        write_version_manifest(temp_dir.path(), Version::new(running.major + 1, 0)).unwrap();
        assert!(needs_major_refresh(temp_dir.path()));
    }

    #[test]
    fn test_remove_incompatible() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("interchange");

        // nothing to remove
        assert!(!remove_incompatible_interchange(&dir).unwrap());

        write_version_manifest(&dir, INTERCHANGE_VERSION).unwrap();
        std::fs::write(dir.join("H.wat.parquet"), b"x").unwrap();
        assert!(!remove_incompatible_interchange(&dir).unwrap());
        assert!(dir.exists());

        write_version_manifest(&dir, Version::new(INTERCHANGE_VERSION.major + 1, 0)).unwrap();
        assert!(remove_incompatible_interchange(&dir).unwrap());
        assert!(!dir.exists());
    }
}
