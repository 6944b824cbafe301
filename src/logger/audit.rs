//! Audit and notification sinks.
//!
//! The scanner reports through an [`AuditSink`] and never learns where events
//! end up. Sink failures are swallowed by the sink itself.

#![allow(missing_docs)]

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::clock::Clock;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::scanner::diff::{Classification, DiffEntry};

// ──────────────────── events ────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event: EventType,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl AuditEvent {
    pub fn new(event: EventType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            event,
            severity,
            message: message.into(),
            paths: Vec::new(),
            error_code: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_paths(mut self, paths: Vec<String>) -> Self {
        self.paths = paths;
        self
    }

    #[must_use]
    pub fn with_error_code(mut self, code: &str) -> Self {
        self.error_code = Some(code.to_string());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// One affected path inside a change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationItem {
    pub path: String,
    pub classification: Classification,
    pub fixable: bool,
}

impl From<&DiffEntry> for NotificationItem {
    fn from(entry: &DiffEntry) -> Self {
        Self {
            path: entry.path().to_string(),
            classification: entry.classification(),
            fixable: entry.fixable(),
        }
    }
}

/// Sent after a scan that found at least one non-stable path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub version: String,
    pub items: Vec<NotificationItem>,
}

impl ChangeNotification {
    /// One-line summary, e.g. `3 core file changes detected (2 modified, 1 added)`.
    #[must_use]
    pub fn summary(&self) -> String {
        let breakdown = [
            Classification::Modified,
            Classification::Removed,
            Classification::Added,
        ]
        .into_iter()
        .filter_map(|class| {
            let count = self
                .items
                .iter()
                .filter(|item| item.classification == class)
                .count();
            (count > 0).then(|| format!("{count} {class}"))
        })
        .collect::<Vec<_>>()
        .join(", ");
        let noun = if self.items.len() == 1 {
            "change"
        } else {
            "changes"
        };
        format!(
            "{} core file {noun} detected ({breakdown})",
            self.items.len()
        )
    }
}

// ──────────────────── sinks ────────────────────

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);

    fn notify(&self, notification: &ChangeNotification);
}

/// Appends every event and notification to a JSONL audit log.
pub struct JsonlAuditSink {
    writer: Mutex<JsonlWriter>,
    clock: Arc<dyn Clock>,
}

impl JsonlAuditSink {
    pub fn open(path: &Path, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(JsonlConfig::for_path(path.to_path_buf()), clock)
    }

    pub fn with_config(config: JsonlConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            writer: Mutex::new(JsonlWriter::open(config)),
            clock,
        }
    }

    /// Degradation state of the underlying writer.
    pub fn state(&self) -> &'static str {
        self.writer.lock().state()
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, event: &AuditEvent) {
        let mut entry = LogEntry::new(
            self.clock.now(),
            event.event,
            event.severity,
            event.message.clone(),
        );
        entry.paths.clone_from(&event.paths);
        entry.error_code.clone_from(&event.error_code);
        entry.details.clone_from(&event.details);
        self.writer.lock().write_entry(&entry);
    }

    fn notify(&self, notification: &ChangeNotification) {
        let mut entry = LogEntry::new(
            self.clock.now(),
            EventType::ChangeNotification,
            Severity::Warning,
            notification.summary(),
        );
        entry.paths = notification
            .items
            .iter()
            .map(|item| item.path.clone())
            .collect();
        entry.details = serde_json::to_value(notification).ok();
        self.writer.lock().write_entry(&entry);
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    notifications: Mutex<Vec<ChangeNotification>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn events_of(&self, event: EventType) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|recorded| recorded.event == event)
            .cloned()
            .collect()
    }

    pub fn notifications(&self) -> Vec<ChangeNotification> {
        self.notifications.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().push(event.clone());
    }

    fn notify(&self, notification: &ChangeNotification) {
        self.notifications.lock().push(notification.clone());
    }
}
