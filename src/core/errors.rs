//! IGD-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, IgdError>;

/// Top-level error type for the integrity guard.
#[derive(Debug, Error)]
pub enum IgdError {
    #[error("[IGD-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[IGD-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[IGD-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[IGD-1004] invalid exclusion pattern {pattern:?}: {details}")]
    InvalidPattern { pattern: String, details: String },

    #[error("[IGD-2001] scan root unreadable {path}: {details}")]
    RootUnreadable { path: PathBuf, details: String },

    #[error("[IGD-2002] file read failure at {path}: {details}")]
    FileRead { path: PathBuf, details: String },

    #[error("[IGD-2101] reference checksums unavailable for version {version}: {details}")]
    ReferenceUnavailable { version: String, details: String },

    #[error("[IGD-2102] original file {path} unavailable for version {version}: {details}")]
    OriginalFileUnavailable {
        path: String,
        version: String,
        details: String,
    },

    #[error("[IGD-2201] remediation failed for {path}: {details}")]
    Remediation { path: String, details: String },

    #[error("[IGD-2202] unsafe target path {path:?}: {reason}")]
    UnsafePath { path: String, reason: &'static str },

    #[error("[IGD-2203] invalid selection {raw:?}: {details}")]
    InvalidSelection { raw: String, details: String },

    #[error("[IGD-2301] key-value store failure in {context}: {details}")]
    Store {
        context: &'static str,
        details: String,
    },

    #[error("[IGD-2302] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[IGD-2303] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[IGD-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[IGD-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl IgdError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "IGD-1001",
            Self::MissingConfig { .. } => "IGD-1002",
            Self::ConfigParse { .. } => "IGD-1003",
            Self::InvalidPattern { .. } => "IGD-1004",
            Self::RootUnreadable { .. } => "IGD-2001",
            Self::FileRead { .. } => "IGD-2002",
            Self::ReferenceUnavailable { .. } => "IGD-2101",
            Self::OriginalFileUnavailable { .. } => "IGD-2102",
            Self::Remediation { .. } => "IGD-2201",
            Self::UnsafePath { .. } => "IGD-2202",
            Self::InvalidSelection { .. } => "IGD-2203",
            Self::Store { .. } => "IGD-2301",
            Self::Serialization { .. } => "IGD-2302",
            Self::Sql { .. } => "IGD-2303",
            Self::Io { .. } => "IGD-3001",
            Self::Runtime { .. } => "IGD-3900",
        }
    }

    /// Whether a later attempt (by the caller's scheduler) might succeed.
    ///
    /// The engine itself never retries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::ReferenceUnavailable { .. }
                | Self::OriginalFileUnavailable { .. }
                | Self::Store { .. }
                | Self::Sql { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for IgdError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for IgdError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for IgdError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
