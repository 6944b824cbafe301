//! Remediation executor: restore, delete, or accept operator-selected paths.
//!
//! Each target is handled independently; a failure is recorded and the batch
//! moves on. Nothing is retried. A batch that touched at least one path yields
//! exactly one audit message:
//!
//! - one path: `"<Title>: <path>"`
//! - several:  `"<Title>: (multiple entries): <p1>,<p2>,…"`

#![allow(missing_docs)]

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::clock::Clock;
use crate::core::errors::{IgdError, Result};
use crate::core::paths::{PathResolver, check_relative_path};
use crate::logger::jsonl::{EventType, Severity};
use crate::reference::ReferenceSnapshotProvider;
use crate::scanner::diff::Classification;
use crate::store::suppression::{SuppressionCache, SuppressionRecord};

// ──────────────────── actions ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemediationAction {
    /// Put the reference copy back in place.
    Restore,
    /// Unlink a file the reference does not know.
    Delete,
    /// Suppress the discrepancy in future scans.
    Accept,
}

impl RemediationAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Restore => "restore",
            Self::Delete => "delete",
            Self::Accept => "accept",
        }
    }

    /// Title used in the batch audit message.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Restore => "Core file restored",
            Self::Delete => "Non-core file deleted",
            Self::Accept => "Core file marked as fixed",
        }
    }

    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::Restore => Severity::Info,
            Self::Delete => Severity::Notice,
            Self::Accept => Severity::Warning,
        }
    }

    #[must_use]
    pub const fn event_type(self) -> EventType {
        match self {
            Self::Restore => EventType::FileRestored,
            Self::Delete => EventType::FileDeleted,
            Self::Accept => EventType::FileAccepted,
        }
    }

    /// Whether the action makes sense for a path in `classification`.
    #[must_use]
    pub const fn applies_to(self, classification: Classification) -> bool {
        match self {
            Self::Restore => matches!(
                classification,
                Classification::Modified | Classification::Removed
            ),
            Self::Delete => matches!(classification, Classification::Added),
            Self::Accept => !matches!(classification, Classification::Stable),
        }
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemediationAction {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "restore" => Ok(Self::Restore),
            "delete" => Ok(Self::Delete),
            "accept" => Ok(Self::Accept),
            other => Err(format!(
                "unknown action {other:?} (expected restore|delete|accept)"
            )),
        }
    }
}

// ──────────────────── selections ────────────────────

/// An operator-selected path together with the classification it was shown with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationTarget {
    pub classification: Classification,
    pub relative_path: String,
}

impl RemediationTarget {
    pub fn new(classification: Classification, relative_path: impl Into<String>) -> Self {
        Self {
            classification,
            relative_path: relative_path.into(),
        }
    }

    /// Parse `status@relative/path`, splitting on the first `@`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |details: String| IgdError::InvalidSelection {
            raw: raw.to_string(),
            details,
        };
        let (status, path) = raw
            .split_once('@')
            .ok_or_else(|| invalid("expected status@relative/path".to_string()))?;
        let classification = status.parse::<Classification>().map_err(invalid)?;
        let path = path.trim().replace('\\', "/");
        if path.is_empty() {
            return Err(invalid("missing path after '@'".to_string()));
        }
        Ok(Self::new(classification, path))
    }
}

/// Parse every selection; an empty list is a user error.
pub fn parse_selections<S: AsRef<str>>(raw: &[S]) -> Result<Vec<RemediationTarget>> {
    if raw.is_empty() {
        return Err(IgdError::InvalidSelection {
            raw: String::new(),
            details: "No files were selected.".to_string(),
        });
    }
    raw.iter()
        .map(|selection| RemediationTarget::parse(selection.as_ref()))
        .collect()
}

// ──────────────────── report ────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationFailure {
    pub path: String,
    pub error: String,
    pub error_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationReport {
    pub action: RemediationAction,
    pub attempted: usize,
    pub succeeded: usize,
    /// Absolute on-disk paths that were touched, in target order.
    pub affected_paths: Vec<String>,
    pub failures: Vec<RemediationFailure>,
    /// Present when at least one path was affected.
    pub audit_message: Option<String>,
}

impl RemediationReport {
    fn new(action: RemediationAction) -> Self {
        Self {
            action,
            attempted: 0,
            succeeded: 0,
            affected_paths: Vec::new(),
            failures: Vec::new(),
            audit_message: None,
        }
    }

    /// `"N out of M files were successfully processed."`
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} out of {} files were successfully processed.",
            self.succeeded, self.attempted
        )
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Some but not all targets failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() && self.succeeded > 0
    }
}

/// `"<Title>: <path>"` or `"<Title>: (multiple entries): <p1>,<p2>"`.
#[must_use]
pub fn audit_message(title: &str, paths: &[String]) -> Option<String> {
    match paths {
        [] => None,
        [single] => Some(format!("{title}: {single}")),
        many => Some(format!("{title}: (multiple entries): {}", many.join(","))),
    }
}

// ──────────────────── executor ────────────────────

/// Applies remediation actions against the installation and the suppression cache.
pub struct RemediationExecutor {
    resolver: PathResolver,
    provider: Arc<dyn ReferenceSnapshotProvider>,
    suppressions: SuppressionCache,
    clock: Arc<dyn Clock>,
}

impl RemediationExecutor {
    pub fn new(
        resolver: PathResolver,
        provider: Arc<dyn ReferenceSnapshotProvider>,
        suppressions: SuppressionCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            provider,
            suppressions,
            clock,
        }
    }

    /// Apply `action` to every target. `version` selects the reference copy
    /// for restores.
    pub fn apply(
        &self,
        action: RemediationAction,
        version: &str,
        targets: &[RemediationTarget],
    ) -> RemediationReport {
        let mut report = RemediationReport::new(action);

        for target in targets {
            report.attempted += 1;
            match self.apply_one(action, version, target) {
                Ok(absolute) => {
                    report.succeeded += 1;
                    report
                        .affected_paths
                        .push(absolute.to_string_lossy().into_owned());
                }
                Err(error) => report.failures.push(RemediationFailure {
                    path: target.relative_path.clone(),
                    error: error.to_string(),
                    error_code: error.code().to_string(),
                }),
            }
        }

        report.audit_message = audit_message(action.title(), &report.affected_paths);
        report
    }

    fn apply_one(
        &self,
        action: RemediationAction,
        version: &str,
        target: &RemediationTarget,
    ) -> Result<PathBuf> {
        let relative = target.relative_path.as_str();
        check_relative_path(relative).map_err(|reason| IgdError::UnsafePath {
            path: relative.to_string(),
            reason,
        })?;
        if !action.applies_to(target.classification) {
            return Err(IgdError::Remediation {
                path: relative.to_string(),
                details: format!("cannot {action} a {} file", target.classification),
            });
        }

        match action {
            RemediationAction::Restore => self.restore(relative, version),
            RemediationAction::Delete => self.delete(relative),
            RemediationAction::Accept => self.accept(target),
        }
    }

    fn restore(&self, relative: &str, version: &str) -> Result<PathBuf> {
        let bytes = self.provider.original_file(relative, version)?;
        let target = self
            .resolver
            .locate(relative)
            .map_or_else(|| self.resolver.write_target(relative), |found| found.absolute);

        if let Some(parent) = target.parent() {
            create_parents(parent)?;
        }
        fs::write(&target, &bytes).map_err(|error| IgdError::Remediation {
            path: relative.to_string(),
            details: format!("write {}: {error}", target.display()),
        })?;
        Ok(target)
    }

    fn delete(&self, relative: &str) -> Result<PathBuf> {
        let target = self
            .resolver
            .locate(relative)
            .map_or_else(|| self.resolver.primary(relative), |found| found.absolute);

        let metadata = fs::symlink_metadata(&target).map_err(|error| IgdError::Remediation {
            path: relative.to_string(),
            details: format!("stat {}: {error}", target.display()),
        })?;
        if metadata.is_dir() {
            return Err(IgdError::Remediation {
                path: relative.to_string(),
                details: "refusing to delete a directory".to_string(),
            });
        }

        fs::remove_file(&target).map_err(|error| IgdError::Remediation {
            path: relative.to_string(),
            details: format!("unlink {}: {error}", target.display()),
        })?;
        if fs::symlink_metadata(&target).is_ok() {
            return Err(IgdError::Remediation {
                path: relative.to_string(),
                details: "file still exists after deletion".to_string(),
            });
        }
        Ok(target)
    }

    fn accept(&self, target: &RemediationTarget) -> Result<PathBuf> {
        let record = SuppressionRecord::new(
            &target.relative_path,
            target.classification,
            self.clock.now(),
        );
        // Already suppressed is still a success.
        self.suppressions.add(&record.path_hash, &record)?;
        Ok(self
            .resolver
            .locate(&target.relative_path)
            .map_or_else(
                || self.resolver.write_target(&target.relative_path),
                |found| found.absolute,
            ))
    }
}

#[cfg(unix)]
fn create_parents(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(dir)
        .map_err(|source| IgdError::io(dir, source))
}

#[cfg(not(unix))]
fn create_parents(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| IgdError::io(dir, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::reference::{ReferenceSnapshot, StaticSnapshotProvider};
    use crate::scanner::fingerprint::ChecksumAlgorithm;
    use crate::store::memory::MemoryStore;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    struct Fixture {
        dir: tempfile::TempDir,
        suppressions: SuppressionCache,
        executor: RemediationExecutor,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = ReferenceSnapshot::new("6.4.2", ChecksumAlgorithm::Md5, BTreeMap::new());
        let provider = StaticSnapshotProvider::new(snapshot)
            .with_original("wp-login.php", b"pristine login".to_vec())
            .with_original("wp-admin/includes/file.php", b"pristine file".to_vec());
        let suppressions = SuppressionCache::new(Arc::new(MemoryStore::new()));
        let clock = Arc::new(FixedClock::new(
            Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
        ));
        let executor = RemediationExecutor::new(
            PathResolver::new(dir.path(), "wp-content", None),
            Arc::new(provider),
            suppressions.clone(),
            clock,
        );
        Fixture {
            dir,
            suppressions,
            executor,
        }
    }

    #[test]
    fn parses_status_at_path() {
        let target = RemediationTarget::parse("modified@wp-admin/a@b.php").unwrap();
        assert_eq!(target.classification, Classification::Modified);
        assert_eq!(target.relative_path, "wp-admin/a@b.php");
        assert!(RemediationTarget::parse("wp-login.php").is_err());
        assert!(RemediationTarget::parse("bogus@wp-login.php").is_err());
        assert!(RemediationTarget::parse("added@").is_err());
    }

    #[test]
    fn empty_selection_is_rejected() {
        let err = parse_selections::<&str>(&[]).unwrap_err();
        assert!(err.to_string().contains("No files were selected."));
    }

    #[test]
    fn audit_message_formats() {
        assert_eq!(audit_message("T", &[]), None);
        assert_eq!(
            audit_message("T", &["/a".to_string()]).as_deref(),
            Some("T: /a")
        );
        assert_eq!(
            audit_message("T", &["/a".to_string(), "/b".to_string()]).as_deref(),
            Some("T: (multiple entries): /a,/b")
        );
    }

    #[test]
    fn restore_overwrites_and_creates_parents() {
        let fx = fixture();
        fs::write(fx.dir.path().join("wp-login.php"), b"tampered").unwrap();

        let report = fx.executor.apply(
            RemediationAction::Restore,
            "6.4.2",
            &[
                RemediationTarget::new(Classification::Modified, "wp-login.php"),
                RemediationTarget::new(Classification::Removed, "wp-admin/includes/file.php"),
            ],
        );

        assert_eq!(report.succeeded, 2);
        assert_eq!(
            fs::read(fx.dir.path().join("wp-login.php")).unwrap(),
            b"pristine login"
        );
        assert_eq!(
            fs::read(fx.dir.path().join("wp-admin/includes/file.php")).unwrap(),
            b"pristine file"
        );
        assert!(
            report
                .audit_message
                .as_deref()
                .unwrap()
                .starts_with("Core file restored: (multiple entries): ")
        );
        assert_eq!(report.summary(), "2 out of 2 files were successfully processed.");
    }

    #[test]
    fn restore_failure_does_not_abort_batch() {
        let fx = fixture();
        let report = fx.executor.apply(
            RemediationAction::Restore,
            "6.4.2",
            &[
                RemediationTarget::new(Classification::Modified, "unknown.php"),
                RemediationTarget::new(Classification::Removed, "wp-login.php"),
            ],
        );
        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert!(report.is_partial());
        assert_eq!(report.failures[0].path, "unknown.php");
        assert_eq!(report.affected_paths.len(), 1);
        let expected = fx.dir.path().join("wp-login.php");
        assert_eq!(
            report.audit_message.as_deref(),
            Some(format!("Core file restored: {}", expected.display()).as_str())
        );
    }

    #[test]
    fn delete_unlinks_added_file_only() {
        let fx = fixture();
        fs::create_dir_all(fx.dir.path().join("wp-admin")).unwrap();
        fs::write(fx.dir.path().join("wp-admin/shell.php"), b"<?php").unwrap();

        let report = fx.executor.apply(
            RemediationAction::Delete,
            "6.4.2",
            &[
                RemediationTarget::new(Classification::Added, "wp-admin/shell.php"),
                RemediationTarget::new(Classification::Modified, "wp-login.php"),
                RemediationTarget::new(Classification::Added, "wp-admin"),
            ],
        );

        assert!(!fx.dir.path().join("wp-admin/shell.php").exists());
        assert!(fx.dir.path().join("wp-admin").is_dir());
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failures.len(), 2);
        assert!(report.audit_message.unwrap().starts_with("Non-core file deleted: "));
    }

    #[test]
    fn accept_adds_suppression_and_is_idempotent() {
        let fx = fixture();
        let target = RemediationTarget::new(Classification::Modified, "wp-login.php");

        let first = fx
            .executor
            .apply(RemediationAction::Accept, "6.4.2", &[target.clone()]);
        let second = fx
            .executor
            .apply(RemediationAction::Accept, "6.4.2", &[target]);

        assert_eq!(first.succeeded, 1);
        assert_eq!(second.succeeded, 1);
        let all = fx.suppressions.get_all().unwrap();
        assert_eq!(all.len(), 1);
        let record = all.values().next().unwrap();
        assert_eq!(record.status_type, Classification::Modified);
        assert_eq!(record.ignored_at.timestamp(), 1_700_000_000);
        assert!(
            first
                .audit_message
                .unwrap()
                .starts_with("Core file marked as fixed: ")
        );
    }

    #[test]
    fn unsafe_paths_rejected_per_file() {
        let fx = fixture();
        let report = fx.executor.apply(
            RemediationAction::Delete,
            "6.4.2",
            &[
                RemediationTarget::new(Classification::Added, "../outside.php"),
                RemediationTarget::new(Classification::Added, "/etc/passwd"),
            ],
        );
        assert_eq!(report.succeeded, 0);
        assert!(report.failures.iter().all(|f| f.error_code == "IGD-2202"));
        assert!(report.audit_message.is_none());
    }

    #[test]
    fn action_metadata() {
        assert_eq!(RemediationAction::Delete.severity(), Severity::Notice);
        assert_eq!(
            "ACCEPT".parse::<RemediationAction>().unwrap(),
            RemediationAction::Accept
        );
        assert!(!RemediationAction::Accept.applies_to(Classification::Stable));
        assert!(RemediationAction::Restore.applies_to(Classification::Removed));
    }
}
