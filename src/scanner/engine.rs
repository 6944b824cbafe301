//! Scan orchestration: the [`Scanner`] value ties configuration, stores,
//! reference provider, audit sink and clock together.
//!
//! Pipeline for one scan:
//! detect version → fetch reference → walk → fingerprint → diff → report.
//!
//! Gating, in order: disabled (unless forced), single-flight guard, minimum
//! interval since the persisted `runtime` (unless forced). The runtime is
//! recorded before any work starts, so a failing scan still debounces.
//!
//! The single-flight guard is an in-process mutex plus a non-blocking
//! `flock()` on `<state_dir>/scan.lock`, so two `igd` processes sharing a
//! state directory never scan at the same time.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;

use crate::core::clock::Clock;
use crate::core::config::{Config, DEFAULT_LOCALE};
use crate::core::errors::{IgdError, Result};
use crate::core::paths::PathResolver;
use crate::logger::audit::{AuditEvent, AuditSink, ChangeNotification, NotificationItem};
use crate::logger::jsonl::{EventType, Severity};
use crate::reference::ReferenceSnapshotProvider;
use crate::reference::version::{InstalledRelease, detect_release};
use crate::scanner::diff::{DiffEngine, DiffEntry, DiffResult};
use crate::scanner::exclusion::ExclusionPolicy;
use crate::scanner::fingerprint::FingerprintComputer;
use crate::scanner::remediation::{
    RemediationAction, RemediationExecutor, RemediationReport, RemediationTarget, audit_message,
};
use crate::scanner::walker::{PathWalker, WalkerConfig};
use crate::store::suppression::{SuppressionCache, SuppressionRecord};
use crate::store::{KeyValueStore, SCANNER_NAMESPACE};

/// Key of the last-scan timestamp (unix seconds) in the scanner namespace.
pub const RUNTIME_KEY: &str = "runtime";

/// Advisory lock file inside the state directory.
pub const SCAN_LOCK_FILE: &str = "scan.lock";

#[cfg(unix)]
type ScanLock = nix::fcntl::Flock<std::fs::File>;
#[cfg(not(unix))]
type ScanLock = ();

// ──────────────────── outcomes ────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    TooSoon {
        last_run: DateTime<Utc>,
        next_allowed: DateTime<Utc>,
    },
    InProgress,
}

impl SkipReason {
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Disabled => "scanner is disabled".to_string(),
            Self::TooSoon { next_allowed, .. } => {
                format!("last scan is too recent; next scan allowed at {next_allowed}")
            }
            Self::InProgress => "another scan is in progress".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "result", rename_all = "snake_case")]
pub enum ScanOutcome {
    Completed(Box<ScanReport>),
    Skipped(SkipReason),
}

/// A root, file, or path that could not be processed during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanIssue {
    pub path: String,
    pub error: String,
    pub error_code: String,
}

impl ScanIssue {
    fn new(path: &str, error: &IgdError) -> Self {
        Self {
            path: path.to_string(),
            error: error.to_string(),
            error_code: error.code().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanCounts {
    pub reference_entries: usize,
    pub walked: usize,
    pub fingerprinted: usize,
    pub stable: usize,
    pub modified: usize,
    pub removed: usize,
    pub added: usize,
    pub excluded: usize,
    pub suppressed: usize,
    /// Stored suppression records skipped because they no longer decode.
    pub unreadable_suppressions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub version: String,
    pub locale: String,
    pub provider: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub counts: ScanCounts,
    pub diff: DiffResult,
    pub root_failures: Vec<ScanIssue>,
    pub file_failures: Vec<ScanIssue>,
}

impl ScanReport {
    /// Non-stable entries, partition by partition.
    #[must_use]
    pub fn affected(&self) -> Vec<&DiffEntry> {
        self.diff.affected().collect()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diff.affected().next().is_none()
    }
}

// ──────────────────── scanner ────────────────────

pub struct Scanner {
    config: Config,
    provider: Arc<dyn ReferenceSnapshotProvider>,
    store: Arc<dyn KeyValueStore>,
    suppressions: SuppressionCache,
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<()>,
}

impl Scanner {
    pub fn new(
        config: Config,
        provider: Arc<dyn ReferenceSnapshotProvider>,
        store: Arc<dyn KeyValueStore>,
        sink: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let suppressions = SuppressionCache::new(Arc::clone(&store));
        Self {
            config,
            provider,
            store,
            suppressions,
            sink,
            clock,
            in_flight: Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> &dyn ReferenceSnapshotProvider {
        self.provider.as_ref()
    }

    /// Exclusion policy for the configured locale.
    pub fn policy(&self) -> Result<ExclusionPolicy> {
        ExclusionPolicy::from_config(&self.config)
    }

    /// Installed release, from the override or the version file.
    pub fn release(&self) -> Result<InstalledRelease> {
        detect_release(&self.config.install)
    }

    /// Configured locale, unless left at the default and the installed
    /// package declares its own.
    #[must_use]
    pub fn effective_locale(&self, release: &InstalledRelease) -> String {
        match release.local_package.as_deref() {
            Some(package) if self.config.install.locale == DEFAULT_LOCALE => package.to_string(),
            _ => self.config.install.locale.clone(),
        }
    }

    /// When the last scan started, if one ever did.
    pub fn last_run(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .get(SCANNER_NAMESPACE, RUNTIME_KEY)?
            .and_then(|value| value.as_i64())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()))
    }

    // ──────────────────── locking ────────────────────

    /// Take the cross-process scan lock; `None` when another process holds it.
    #[cfg(unix)]
    fn try_lock_scan(&self) -> Result<Option<ScanLock>> {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let state_dir = &self.config.paths.state_dir;
        std::fs::create_dir_all(state_dir).map_err(|e| IgdError::io(state_dir, e))?;
        let lock_path = state_dir.join(SCAN_LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(&lock_path)
            .map_err(|e| IgdError::io(&lock_path, e))?;

        #[allow(deprecated)]
        let locked = nix::fcntl::Flock::lock(file, nix::fcntl::FlockArg::LockExclusiveNonblock);
        match locked {
            Ok(lock) => Ok(Some(lock)),
            Err((_file, nix::errno::Errno::EWOULDBLOCK)) => Ok(None),
            Err((_file, e)) => Err(IgdError::Runtime {
                details: format!("failed to lock {}: {e}", lock_path.display()),
            }),
        }
    }

    #[cfg(not(unix))]
    fn try_lock_scan(&self) -> Result<Option<ScanLock>> {
        Ok(Some(()))
    }

    /// Run one scan, subject to gating unless `force` is set.
    ///
    /// Only an undeterminable version or an unavailable reference fails the
    /// scan; per-root and per-file problems land in the report.
    pub fn scan(&self, force: bool) -> Result<ScanOutcome> {
        if !force && !self.config.scanner.enabled {
            return Ok(self.skip(SkipReason::Disabled));
        }

        let Some(_guard) = self.in_flight.try_lock() else {
            return Ok(self.skip(SkipReason::InProgress));
        };
        let Some(_lock) = self.try_lock_scan()? else {
            return Ok(self.skip(SkipReason::InProgress));
        };

        let now = self.clock.now();
        if !force && let Some(last_run) = self.last_run()? {
            let interval = i64::try_from(self.config.scanner.minimum_interval_secs)
                .unwrap_or(i64::MAX);
            let next_allowed = Duration::try_seconds(interval)
                .and_then(|wait| last_run.checked_add_signed(wait))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            if now < next_allowed {
                return Ok(self.skip(SkipReason::TooSoon {
                    last_run,
                    next_allowed,
                }));
            }
        }
        self.store
            .set(SCANNER_NAMESPACE, RUNTIME_KEY, json!(now.timestamp()))?;

        match self.run(now) {
            Ok(report) => {
                self.report_completed(&report);
                Ok(ScanOutcome::Completed(Box::new(report)))
            }
            Err(error) => {
                self.sink.record(
                    &AuditEvent::new(
                        EventType::ScanFailed,
                        Severity::Error,
                        format!("Integrity scan failed: {error}"),
                    )
                    .with_error_code(error.code()),
                );
                Err(error)
            }
        }
    }

    fn run(&self, started_at: DateTime<Utc>) -> Result<ScanReport> {
        let start = Instant::now();
        let install = &self.config.install;
        let scanner = &self.config.scanner;

        let release = self.release()?;
        let locale = self.effective_locale(&release);
        let snapshot = self.provider.fetch_snapshot(&release.version, &locale)?;
        if snapshot.algorithm != scanner.checksum {
            return Err(IgdError::ReferenceUnavailable {
                version: release.version,
                details: format!(
                    "reference checksums are {} but scanner.checksum is {}",
                    snapshot.algorithm, scanner.checksum
                ),
            });
        }

        let policy = Arc::new(
            ExclusionPolicy::new(
                &locale,
                &install.content_folder_name,
                &self.config.exclusions.custom_paths,
            )?
            .with_code_files_only(scanner.code_files_only),
        );
        let walker = PathWalker::new(
            install.root.clone(),
            Arc::clone(&policy),
            WalkerConfig::from_scanner(scanner),
        );
        let walked = walker.walk();

        let computer = FingerprintComputer::new(install.root.clone(), scanner.checksum)
            .with_parallelism(scanner.parallelism);
        let batch = computer.fingerprint(&walked.paths);
        let fingerprinted = batch.records.len();

        let suppressions = self.suppressions.load()?;
        let engine = DiffEngine::new(PathResolver::from_config(install), computer);
        let diff = engine.diff(batch.records, &snapshot, &policy, &suppressions.records);

        let counts = ScanCounts {
            reference_entries: snapshot.len(),
            walked: walked.paths.len(),
            fingerprinted,
            stable: diff.stable.len(),
            modified: diff.modified.len(),
            removed: diff.removed.len(),
            added: diff.added.len(),
            excluded: diff.stats.excluded + walked.excluded,
            suppressed: diff.stats.suppressed,
            unreadable_suppressions: suppressions.unreadable,
        };

        Ok(ScanReport {
            version: release.version,
            locale,
            provider: self.provider.describe(),
            started_at,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            counts,
            diff,
            root_failures: walked
                .failures
                .iter()
                .map(|failure| ScanIssue::new(&failure.root, &failure.error))
                .collect(),
            file_failures: batch
                .failures
                .iter()
                .map(|failure| ScanIssue::new(&failure.relative_path, &failure.error))
                .collect(),
        })
    }

    fn skip(&self, reason: SkipReason) -> ScanOutcome {
        self.sink.record(&AuditEvent::new(
            EventType::ScanSkipped,
            Severity::Debug,
            format!("Integrity scan skipped: {}", reason.describe()),
        ));
        ScanOutcome::Skipped(reason)
    }

    fn report_completed(&self, report: &ScanReport) {
        let counts = &report.counts;
        let affected = counts.modified + counts.removed + counts.added;
        self.sink.record(
            &AuditEvent::new(
                EventType::ScanCompleted,
                Severity::Info,
                format!(
                    "Integrity scan completed for version {}: {affected} of {} files need attention",
                    report.version,
                    affected + counts.stable
                ),
            )
            .with_details(json!({
                "counts": counts,
                "root_failures": report.root_failures.len(),
                "file_failures": report.file_failures.len(),
                "duration_ms": report.duration_ms,
            })),
        );

        if self.config.notifications.notify_on_changes && affected > 0 {
            self.sink.notify(&ChangeNotification {
                version: report.version.clone(),
                items: report.diff.affected().map(NotificationItem::from).collect(),
            });
        }
    }

    // ──────────────────── remediation ────────────────────

    /// Apply `action` to `targets` and audit the batch.
    ///
    /// Fails as a whole only when the installed version cannot be determined
    /// for a restore; everything else is reported per target.
    pub fn remediate(
        &self,
        action: RemediationAction,
        targets: &[RemediationTarget],
    ) -> Result<RemediationReport> {
        let version = match action {
            RemediationAction::Restore => self.release()?.version,
            RemediationAction::Delete | RemediationAction::Accept => self
                .release()
                .map_or_else(|_| String::new(), |release| release.version),
        };
        let executor = RemediationExecutor::new(
            PathResolver::from_config(&self.config.install),
            Arc::clone(&self.provider),
            self.suppressions.clone(),
            Arc::clone(&self.clock),
        );
        let report = executor.apply(action, &version, targets);

        if let Some(message) = &report.audit_message {
            let mut event = AuditEvent::new(action.event_type(), action.severity(), message)
                .with_paths(report.affected_paths.clone());
            if !report.failures.is_empty() {
                event = event.with_details(json!({ "failures": report.failures }));
            }
            self.sink.record(&event);
        }
        Ok(report)
    }

    // ──────────────────── suppressions ────────────────────

    /// Every suppression record, ordered by relative path.
    pub fn suppressions(&self) -> Result<Vec<SuppressionRecord>> {
        let mut records: Vec<SuppressionRecord> =
            self.suppressions.get_all()?.into_values().collect();
        records.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(records)
    }

    /// Stop suppressing `relative_paths`; returns the ones that were suppressed.
    pub fn forget(&self, relative_paths: &[String]) -> Result<Vec<String>> {
        let removed = self.suppressions.forget(relative_paths)?;
        if let Some(message) = audit_message("Core files that will not be ignored anymore", &removed)
        {
            self.sink.record(
                &AuditEvent::new(EventType::SuppressionRemoved, Severity::Debug, message)
                    .with_paths(removed.clone()),
            );
        }
        Ok(removed)
    }

    pub fn reset_suppressions(&self) -> Result<usize> {
        let removed = self.suppressions.reset()?;
        self.sink.record(&AuditEvent::new(
            EventType::SuppressionReset,
            Severity::Notice,
            format!("Ignored core files list was reset ({removed} entries)"),
        ));
        Ok(removed)
    }
}
