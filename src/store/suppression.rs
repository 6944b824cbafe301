//! Operator-accepted discrepancies, keyed by the md5 of the relative path.
//!
//! Records never expire. Because the key is the path alone, a suppressed file
//! that changes again later stays hidden until the record is removed.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{IgdError, Result};
use crate::scanner::diff::Classification;
use crate::scanner::fingerprint::ChecksumAlgorithm;
use crate::store::{KeyValueStore, SUPPRESSION_NAMESPACE};

/// Lowercase md5 hex of the forward-slash relative path.
#[must_use]
pub fn path_hash(relative_path: &str) -> String {
    ChecksumAlgorithm::Md5.digest_bytes(relative_path.as_bytes())
}

/// One accepted discrepancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionRecord {
    pub path_hash: String,
    pub relative_path: String,
    /// Classification the file had when it was accepted.
    pub status_type: Classification,
    pub ignored_at: DateTime<Utc>,
}

impl SuppressionRecord {
    #[must_use]
    pub fn new(relative_path: &str, status_type: Classification, ignored_at: DateTime<Utc>) -> Self {
        Self {
            path_hash: path_hash(relative_path),
            relative_path: relative_path.to_string(),
            status_type,
            ignored_at,
        }
    }
}

/// Result of [`SuppressionCache::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedSuppressions {
    pub records: BTreeMap<String, SuppressionRecord>,
    /// Stored values that could not be decoded and were skipped.
    pub unreadable: usize,
}

/// Typed view over the suppression namespace of a [`KeyValueStore`].
#[derive(Clone)]
pub struct SuppressionCache {
    store: Arc<dyn KeyValueStore>,
}

impl SuppressionCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Store `record` under `path_hash`. Returns false if already suppressed.
    pub fn add(&self, path_hash: &str, record: &SuppressionRecord) -> Result<bool> {
        let value = serde_json::to_value(record)?;
        self.store.add(SUPPRESSION_NAMESPACE, path_hash, value)
    }

    pub fn delete(&self, path_hash: &str) -> Result<bool> {
        self.store.delete(SUPPRESSION_NAMESPACE, path_hash)
    }

    /// All decodable records keyed by path hash.
    pub fn get_all(&self) -> Result<BTreeMap<String, SuppressionRecord>> {
        Ok(self.load()?.records)
    }

    /// Decode every record, skipping the ones that no longer parse.
    ///
    /// Each skipped record is reported on stderr and counted; only a failure
    /// of the store itself is an error.
    pub fn load(&self) -> Result<LoadedSuppressions> {
        let mut loaded = LoadedSuppressions::default();
        for (key, value) in self.store.get_all(SUPPRESSION_NAMESPACE)? {
            match serde_json::from_value::<SuppressionRecord>(value) {
                Ok(record) => {
                    loaded.records.insert(key, record);
                }
                Err(error) => {
                    let error = IgdError::Store {
                        context: "suppression decode",
                        details: format!("skipping record {key}: {error}"),
                    };
                    eprintln!("{error}");
                    loaded.unreadable += 1;
                }
            }
        }
        Ok(loaded)
    }

    pub fn is_suppressed(&self, relative_path: &str) -> Result<bool> {
        Ok(self
            .store
            .get(SUPPRESSION_NAMESPACE, &path_hash(relative_path))?
            .is_some())
    }

    /// Remove the records for `relative_paths`; returns the paths that were
    /// actually suppressed.
    pub fn forget(&self, relative_paths: &[String]) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for path in relative_paths {
            if self.delete(&path_hash(path))? {
                removed.push(path.clone());
            }
        }
        Ok(removed)
    }

    pub fn reset(&self) -> Result<usize> {
        self.store.clear(SUPPRESSION_NAMESPACE)
    }
}
