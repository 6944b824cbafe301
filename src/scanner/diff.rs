//! Set-diff of local fingerprints against a reference snapshot.
//!
//! Every path in `(local ∪ reference) − excluded − suppressed` lands in exactly
//! one of four classifications:
//!
//! | classification | local file | reference entry | checksum |
//! |----------------|------------|-----------------|----------|
//! | stable         | yes        | yes             | equal    |
//! | modified       | yes        | yes             | differs  |
//! | removed        | no         | yes             | n/a      |
//! | added          | yes        | no              | n/a      |

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::paths::{PathResolver, check_relative_path, is_writable};
use crate::reference::ReferenceSnapshot;
use crate::scanner::exclusion::ExclusionPolicy;
use crate::scanner::fingerprint::{FileRecord, FingerprintComputer};
use crate::store::suppression::{SuppressionRecord, path_hash};

// ──────────────────── classification ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Stable,
    Modified,
    Removed,
    Added,
}

impl Classification {
    pub const ALL: [Self; 4] = [Self::Stable, Self::Modified, Self::Removed, Self::Added];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Modified => "modified",
            Self::Removed => "removed",
            Self::Added => "added",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "modified" => Ok(Self::Modified),
            "removed" => Ok(Self::Removed),
            "added" => Ok(Self::Added),
            other => Err(format!(
                "unknown classification {other:?} (expected stable|modified|removed|added)"
            )),
        }
    }
}

// ──────────────────── entries ────────────────────

/// One classified path. `path` is always the reference-relative path, even
/// when the file was found through the content-directory remap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "classification", rename_all = "lowercase")]
pub enum DiffEntry {
    Stable {
        path: String,
        checksum: String,
        size_bytes: u64,
    },
    Modified {
        path: String,
        expected_checksum: String,
        /// `None` when the located file could not be read.
        actual_checksum: Option<String>,
        size_bytes: u64,
        modified_at: Option<DateTime<Utc>>,
        fixable: bool,
    },
    Removed {
        path: String,
        expected_checksum: String,
        fixable: bool,
    },
    Added {
        path: String,
        checksum: String,
        size_bytes: u64,
        modified_at: Option<DateTime<Utc>>,
        fixable: bool,
    },
}

impl DiffEntry {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Stable { path, .. }
            | Self::Modified { path, .. }
            | Self::Removed { path, .. }
            | Self::Added { path, .. } => path,
        }
    }

    #[must_use]
    pub const fn classification(&self) -> Classification {
        match self {
            Self::Stable { .. } => Classification::Stable,
            Self::Modified { .. } => Classification::Modified,
            Self::Removed { .. } => Classification::Removed,
            Self::Added { .. } => Classification::Added,
        }
    }

    /// Whether remediation could write here. Stable entries need none.
    #[must_use]
    pub const fn fixable(&self) -> bool {
        match self {
            Self::Stable { .. } => false,
            Self::Modified { fixable, .. }
            | Self::Removed { fixable, .. }
            | Self::Added { fixable, .. } => *fixable,
        }
    }

    #[must_use]
    pub const fn modified_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Modified { modified_at, .. } | Self::Added { modified_at, .. } => *modified_at,
            Self::Stable { .. } | Self::Removed { .. } => None,
        }
    }

    #[must_use]
    pub const fn size_bytes(&self) -> Option<u64> {
        match self {
            Self::Stable { size_bytes, .. }
            | Self::Modified { size_bytes, .. }
            | Self::Added { size_bytes, .. } => Some(*size_bytes),
            Self::Removed { .. } => None,
        }
    }
}

/// Counters gathered while diffing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    /// Local records and reference entries dropped by the exclusion policy.
    pub excluded: usize,
    pub suppressed: usize,
    /// Reference entries found only through the content-directory remap.
    pub remapped: usize,
    /// Reference entries that were found outside the walked roots.
    pub located_on_disk: usize,
    /// Reference entries whose path could leave the install root.
    pub unsafe_paths: usize,
}

/// Four path-ordered, pairwise disjoint partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub stable: Vec<DiffEntry>,
    pub modified: Vec<DiffEntry>,
    pub removed: Vec<DiffEntry>,
    pub added: Vec<DiffEntry>,
    pub stats: DiffStats,
}

impl DiffResult {
    #[must_use]
    pub fn len(&self) -> usize {
        self.stable.len() + self.modified.len() + self.removed.len() + self.added.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn partition(&self, classification: Classification) -> &[DiffEntry] {
        match classification {
            Classification::Stable => &self.stable,
            Classification::Modified => &self.modified,
            Classification::Removed => &self.removed,
            Classification::Added => &self.added,
        }
    }

    /// Every entry, partition by partition.
    pub fn entries(&self) -> impl Iterator<Item = &DiffEntry> {
        self.stable
            .iter()
            .chain(&self.modified)
            .chain(&self.removed)
            .chain(&self.added)
    }

    /// Non-stable entries: the ones an operator may need to act on.
    pub fn affected(&self) -> impl Iterator<Item = &DiffEntry> {
        self.modified
            .iter()
            .chain(&self.removed)
            .chain(&self.added)
    }

    #[must_use]
    pub fn find(&self, path: &str) -> Option<&DiffEntry> {
        self.entries().find(|entry| entry.path() == path)
    }

    fn push(&mut self, entry: DiffEntry) {
        match entry.classification() {
            Classification::Stable => self.stable.push(entry),
            Classification::Modified => self.modified.push(entry),
            Classification::Removed => self.removed.push(entry),
            Classification::Added => self.added.push(entry),
        }
    }

    fn sort(&mut self) {
        for partition in [
            &mut self.stable,
            &mut self.modified,
            &mut self.removed,
            &mut self.added,
        ] {
            partition.sort_by(|a, b| a.path().cmp(b.path()));
        }
    }
}

// ──────────────────── engine ────────────────────

/// Classifies local fingerprints against a reference snapshot.
///
/// Owns the path resolver and a fingerprint computer so that reference files
/// outside the walked roots can be located and fingerprinted on the spot.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    resolver: PathResolver,
    computer: FingerprintComputer,
}

impl DiffEngine {
    #[must_use]
    pub const fn new(resolver: PathResolver, computer: FingerprintComputer) -> Self {
        Self { resolver, computer }
    }

    #[must_use]
    pub const fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Deterministic for identical inputs and filesystem state.
    #[must_use]
    pub fn diff(
        &self,
        local_records: Vec<FileRecord>,
        reference: &ReferenceSnapshot,
        policy: &ExclusionPolicy,
        suppressions: &BTreeMap<String, SuppressionRecord>,
    ) -> DiffResult {
        let mut result = DiffResult::default();

        // 1. Index local records.
        let mut local: BTreeMap<String, FileRecord> = BTreeMap::new();
        for record in local_records {
            if policy.should_exclude(&record.relative_path, false) {
                result.stats.excluded += 1;
                continue;
            }
            local.insert(record.relative_path.clone(), record);
        }

        // 2. Walk the reference.
        for (path, expected) in &reference.checksums {
            if check_relative_path(path).is_err() {
                result.stats.unsafe_paths += 1;
                continue;
            }
            if policy.should_exclude(path, false) {
                result.stats.excluded += 1;
                continue;
            }

            let entry = if let Some(record) = local.remove(path) {
                let absolute = self.resolver.primary(path);
                compare(path, expected, Ok(record), &absolute)
            } else if let Some(located) = self.resolver.locate(path) {
                result.stats.located_on_disk += 1;
                if located.remapped {
                    result.stats.remapped += 1;
                }
                let fingerprint = self.computer.fingerprint_at(path, &located.absolute);
                compare(path, expected, fingerprint.map_err(|_| ()), &located.absolute)
            } else {
                let target = self.resolver.write_target(path);
                DiffEntry::Removed {
                    path: path.clone(),
                    expected_checksum: expected.clone(),
                    fixable: target.parent().is_some_and(is_writable),
                }
            };
            result.push(entry);
        }

        // 3. Local-only files.
        for (path, record) in local {
            let absolute = self.resolver.primary(&path);
            result.push(DiffEntry::Added {
                fixable: is_writable(&absolute),
                modified_at: Some(to_utc(record.modified_at)),
                checksum: record.checksum,
                size_bytes: record.size_bytes,
                path,
            });
        }

        // 4. Suppression overlay.
        if !suppressions.is_empty() {
            let before = result.len();
            for partition in [
                &mut result.stable,
                &mut result.modified,
                &mut result.removed,
                &mut result.added,
            ] {
                partition.retain(|entry| !suppressions.contains_key(&path_hash(entry.path())));
            }
            result.stats.suppressed = before - result.len();
        }

        result.sort();
        result
    }
}

fn compare(
    path: &str,
    expected: &str,
    fingerprint: std::result::Result<FileRecord, ()>,
    absolute: &Path,
) -> DiffEntry {
    match fingerprint {
        Ok(record) if record.checksum.eq_ignore_ascii_case(expected) => DiffEntry::Stable {
            path: path.to_string(),
            checksum: record.checksum,
            size_bytes: record.size_bytes,
        },
        Ok(record) => DiffEntry::Modified {
            path: path.to_string(),
            expected_checksum: expected.to_string(),
            actual_checksum: Some(record.checksum),
            size_bytes: record.size_bytes,
            modified_at: Some(to_utc(record.modified_at)),
            fixable: is_writable(absolute),
        },
        Err(()) => {
            let meta = absolute.metadata().ok();
            DiffEntry::Modified {
                path: path.to_string(),
                expected_checksum: expected.to_string(),
                actual_checksum: None,
                size_bytes: meta.as_ref().map_or(0, std::fs::Metadata::len),
                modified_at: meta.and_then(|m| m.modified().ok()).map(to_utc),
                fixable: is_writable(absolute),
            }
        }
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}
