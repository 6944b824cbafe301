//! Offline reference provider backed by a pristine release tree on disk.
//!
//! Layout: either `<base>/<version>/...` (one tree per release) or the release
//! tree directly at `<base>` when no per-version subdirectory exists.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::errors::{IgdError, Result};
use crate::core::paths::{check_relative_path, to_slash_relative};
use crate::reference::{ReferenceSnapshot, ReferenceSnapshotProvider};
use crate::scanner::fingerprint::ChecksumAlgorithm;

#[derive(Debug, Clone)]
pub struct DirectorySnapshotProvider {
    base: PathBuf,
    algorithm: ChecksumAlgorithm,
}

impl DirectorySnapshotProvider {
    pub fn new(base: impl Into<PathBuf>, algorithm: ChecksumAlgorithm) -> Self {
        Self {
            base: base.into(),
            algorithm,
        }
    }

    fn release_root(&self, version: &str) -> PathBuf {
        let versioned = self.base.join(version);
        if !version.is_empty() && check_relative_path(version).is_ok() && versioned.is_dir() {
            versioned
        } else {
            self.base.clone()
        }
    }
}

impl ReferenceSnapshotProvider for DirectorySnapshotProvider {
    fn fetch_snapshot(&self, version: &str, _locale: &str) -> Result<ReferenceSnapshot> {
        let root = self.release_root(version);
        let unavailable = |details: String| IgdError::ReferenceUnavailable {
            version: version.to_string(),
            details,
        };

        if !root.is_dir() {
            return Err(unavailable(format!(
                "release tree {} is not a directory",
                root.display()
            )));
        }

        let mut checksums = BTreeMap::new();
        let mut stack = vec![root.clone()];
        while let Some(dir) = stack.pop() {
            let entries = fs::read_dir(&dir)
                .map_err(|err| unavailable(format!("{}: {err}", dir.display())))?;
            for entry in entries {
                let entry = entry.map_err(|err| unavailable(err.to_string()))?;
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .map_err(|err| unavailable(format!("{}: {err}", path.display())))?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file() {
                    let Some(relative) = to_slash_relative(&root, &path) else {
                        continue;
                    };
                    let file = fs::File::open(&path)
                        .map_err(|err| unavailable(format!("{}: {err}", path.display())))?;
                    let checksum = self
                        .algorithm
                        .digest_reader(file)
                        .map_err(|err| unavailable(format!("{}: {err}", path.display())))?;
                    checksums.insert(relative, checksum);
                }
            }
        }

        if checksums.is_empty() {
            return Err(unavailable(format!(
                "release tree {} contains no files",
                root.display()
            )));
        }

        Ok(ReferenceSnapshot::new(version, self.algorithm, checksums))
    }

    fn original_file(&self, relative_path: &str, version: &str) -> Result<Vec<u8>> {
        let unavailable = |details: String| IgdError::OriginalFileUnavailable {
            path: relative_path.to_string(),
            version: version.to_string(),
            details,
        };
        check_relative_path(relative_path).map_err(|reason| unavailable(reason.to_string()))?;
        let path: &Path = &self.release_root(version).join(relative_path);
        fs::read(path).map_err(|err| unavailable(format!("{}: {err}", path.display())))
    }

    fn describe(&self) -> String {
        format!("directory:{}", self.base.display())
    }
}
