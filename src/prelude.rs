//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use integrity_guard::prelude::*;
//! ```

// Core
pub use crate::core::clock::{Clock, FixedClock, SystemClock};
pub use crate::core::config::Config;
pub use crate::core::errors::{IgdError, Result};
pub use crate::core::paths::PathResolver;

// Reference
pub use crate::reference::directory::DirectorySnapshotProvider;
pub use crate::reference::http::HttpSnapshotProvider;
pub use crate::reference::{ReferenceSnapshot, ReferenceSnapshotProvider, StaticSnapshotProvider};

// Scanner
pub use crate::scanner::diff::{Classification, DiffEngine, DiffEntry, DiffResult};
pub use crate::scanner::engine::{ScanOutcome, ScanReport, Scanner, SkipReason};
pub use crate::scanner::exclusion::ExclusionPolicy;
pub use crate::scanner::fingerprint::{ChecksumAlgorithm, FileRecord, FingerprintComputer};
pub use crate::scanner::remediation::{
    RemediationAction, RemediationExecutor, RemediationReport, RemediationTarget,
};
pub use crate::scanner::walker::{PathWalker, WalkerConfig};

// Store
pub use crate::store::suppression::{SuppressionCache, SuppressionRecord};
pub use crate::store::{KeyValueStore, open_store};

// Logger
pub use crate::logger::audit::{AuditSink, JsonlAuditSink, MemoryAuditSink};
