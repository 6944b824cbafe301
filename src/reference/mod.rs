//! Reference snapshots: the authoritative path → checksum map for a release,
//! plus access to the original bytes of each file.

#![allow(missing_docs)]

pub mod directory;
pub mod http;
pub mod version;

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde_json::Value;

use crate::core::errors::{IgdError, Result};
use crate::core::paths::check_relative_path;
use crate::scanner::fingerprint::ChecksumAlgorithm;

/// Authoritative checksums for one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSnapshot {
    pub version: String,
    pub algorithm: ChecksumAlgorithm,
    /// Keyed by forward-slash relative path; unique by construction.
    pub checksums: BTreeMap<String, String>,
}

impl ReferenceSnapshot {
    /// Build a snapshot, dropping entries whose path could leave the install
    /// root (absolute, `..` segments, empty).
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        algorithm: ChecksumAlgorithm,
        mut checksums: BTreeMap<String, String>,
    ) -> Self {
        let version = version.into();
        checksums.retain(|path, _| match check_relative_path(path) {
            Ok(()) => true,
            Err(reason) => {
                eprintln!(
                    "[IGD-2202] dropping reference entry {path:?} for version {version}: {reason}"
                );
                false
            }
        });
        Self {
            version,
            algorithm,
            checksums,
        }
    }

    /// Parse a checksum service response.
    ///
    /// Accepts both `{"checksums": {path: md5}}` and the version-nested form
    /// `{"checksums": {"<version>": {path: md5}}}`. A missing or empty map is
    /// `ReferenceUnavailable`.
    pub fn from_api_json(version: &str, body: &str) -> Result<Self> {
        let unavailable = |details: String| IgdError::ReferenceUnavailable {
            version: version.to_string(),
            details,
        };

        let value: Value = serde_json::from_str(body)
            .map_err(|err| unavailable(format!("malformed response: {err}")))?;
        let Some(checksums) = value.get("checksums").and_then(Value::as_object) else {
            return Err(unavailable("response carries no checksums".to_string()));
        };

        let map = match checksums.get(version).and_then(Value::as_object) {
            Some(nested) if checksums.len() == 1 => nested,
            _ => checksums,
        };

        let mut parsed = BTreeMap::new();
        for (path, checksum) in map {
            let Some(checksum) = checksum.as_str() else {
                return Err(unavailable(format!(
                    "checksum for {path:?} is not a string"
                )));
            };
            let path = path.trim_start_matches("./").trim_start_matches('/');
            parsed.insert(path.to_string(), checksum.to_ascii_lowercase());
        }

        let snapshot = Self::new(version, ChecksumAlgorithm::Md5, parsed);
        if snapshot.is_empty() {
            return Err(unavailable("checksum list is empty".to_string()));
        }
        Ok(snapshot)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.checksums.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checksums.is_empty()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.checksums.contains_key(path)
    }
}

/// Source of reference snapshots and original file contents.
pub trait ReferenceSnapshotProvider: Send + Sync {
    /// Checksums for `version`/`locale`. Failures, timeouts and empty
    /// responses are all `ReferenceUnavailable`.
    fn fetch_snapshot(&self, version: &str, locale: &str) -> Result<ReferenceSnapshot>;

    /// Original bytes of `relative_path` in release `version`.
    fn original_file(&self, relative_path: &str, version: &str) -> Result<Vec<u8>>;

    /// Short human label used in logs.
    fn describe(&self) -> String;
}

/// In-memory provider for tests and embedding.
#[derive(Debug, Default)]
pub struct StaticSnapshotProvider {
    snapshot: Mutex<Option<ReferenceSnapshot>>,
    originals: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl StaticSnapshotProvider {
    #[must_use]
    pub fn new(snapshot: ReferenceSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            originals: Mutex::new(BTreeMap::new()),
        }
    }

    /// A provider whose fetches always fail.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Register original bytes for a path. The checksum map is left untouched.
    #[must_use]
    pub fn with_original(self, relative_path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.originals
            .lock()
            .insert(relative_path.to_string(), bytes.into());
        self
    }

    pub fn set_snapshot(&self, snapshot: Option<ReferenceSnapshot>) {
        *self.snapshot.lock() = snapshot;
    }
}

impl ReferenceSnapshotProvider for StaticSnapshotProvider {
    fn fetch_snapshot(&self, version: &str, _locale: &str) -> Result<ReferenceSnapshot> {
        match self.snapshot.lock().as_ref() {
            Some(snapshot) if snapshot.version == version && !snapshot.is_empty() => {
                Ok(snapshot.clone())
            }
            Some(snapshot) if snapshot.version != version => Err(IgdError::ReferenceUnavailable {
                version: version.to_string(),
                details: format!("only {} is known", snapshot.version),
            }),
            _ => Err(IgdError::ReferenceUnavailable {
                version: version.to_string(),
                details: "no snapshot configured".to_string(),
            }),
        }
    }

    fn original_file(&self, relative_path: &str, version: &str) -> Result<Vec<u8>> {
        self.originals
            .lock()
            .get(relative_path)
            .cloned()
            .ok_or_else(|| IgdError::OriginalFileUnavailable {
                path: relative_path.to_string(),
                version: version.to_string(),
                details: "not found".to_string(),
            })
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}
