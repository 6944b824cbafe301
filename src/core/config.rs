//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{IgdError, Result};
use crate::scanner::fingerprint::ChecksumAlgorithm;

/// Upper bound for the reference request timeout.
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Locale for which no locale-variant files are excluded.
pub const DEFAULT_LOCALE: &str = "en_US";

/// Full configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub install: InstallConfig,
    pub scanner: ScannerConfig,
    pub exclusions: ExclusionConfig,
    pub reference: ReferenceConfig,
    pub notifications: NotificationConfig,
    pub paths: PathsConfig,
}

/// The monitored installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InstallConfig {
    /// Installation root; every relative path is resolved against it.
    pub root: PathBuf,
    /// Actual content directory when it differs from `<root>/<content_folder_name>`.
    pub content_dir: Option<PathBuf>,
    /// Standard name of the content folder used by the reference snapshot.
    pub content_folder_name: String,
    /// Explicit version; overrides detection from `version_file`.
    pub version: Option<String>,
    /// File (relative to root) declaring the installed version.
    pub version_file: String,
    pub locale: String,
}

/// Scan behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScannerConfig {
    pub enabled: bool,
    pub roots: Vec<ScanRootConfig>,
    pub follow_symlinks: bool,
    /// Only pick up code-like files (`.php`, `.htm*`, `.js`, `.htaccess`, `php.ini`) while walking.
    pub code_files_only: bool,
    pub parallelism: usize,
    pub checksum: ChecksumAlgorithm,
    /// Minimum seconds between two unforced scans.
    pub minimum_interval_secs: u64,
}

/// One walk root, relative to the install root (`""` is the root itself).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanRootConfig {
    pub path: String,
    #[serde(default)]
    pub recursive: bool,
}

/// Administrator-managed exclusions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Directory or file paths skipped by substring match.
    pub custom_paths: Vec<String>,
}

/// Reference checksum service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReferenceConfig {
    pub checksums_url: String,
    /// URL template with `{version}` and `{path}` placeholders.
    pub original_file_url: String,
    pub request_timeout_secs: u64,
    pub verify_tls: bool,
    pub user_agent: String,
}

/// Change notification behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct NotificationConfig {
    pub notify_on_changes: bool,
}

/// Which key-value store backend to use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Sqlite,
}

/// Filesystem paths used by igd itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub state_dir: PathBuf,
    pub audit_log: PathBuf,
    pub store_backend: StoreBackend,
    pub sqlite_db: PathBuf,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/www/html"),
            content_dir: None,
            content_folder_name: "wp-content".to_string(),
            version: None,
            version_file: "wp-includes/version.php".to_string(),
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            roots: vec![
                ScanRootConfig {
                    path: String::new(),
                    recursive: false,
                },
                ScanRootConfig {
                    path: "wp-admin".to_string(),
                    recursive: true,
                },
                ScanRootConfig {
                    path: "wp-includes".to_string(),
                    recursive: true,
                },
            ],
            follow_symlinks: false,
            code_files_only: true,
            parallelism: 1,
            checksum: ChecksumAlgorithm::Md5,
            minimum_interval_secs: 10_800,
        }
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            checksums_url: "https://api.wordpress.org/core/checksums/1.0/".to_string(),
            original_file_url: "https://core.svn.wordpress.org/tags/{version}/{path}".to_string(),
            request_timeout_secs: 5,
            verify_tls: true,
            user_agent: format!("integrity_guard/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        let state_dir = PathBuf::from(format!("{home}/.local/share/igd"));
        Self {
            config_file: PathBuf::from(format!("{home}/.config/igd/config.toml")),
            audit_log: state_dir.join("audit.jsonl"),
            sqlite_db: state_dir.join("store.sqlite3"),
            state_dir,
            store_backend: StoreBackend::File,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| IgdError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(IgdError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over canonical JSON so the value is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Whether the configured locale differs from the default release locale.
    #[must_use]
    pub fn is_localized(&self) -> bool {
        self.install.locale != DEFAULT_LOCALE
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // install
        if let Some(raw) = lookup("IGD_INSTALL_ROOT") {
            self.install.root = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("IGD_INSTALL_CONTENT_DIR") {
            self.install.content_dir = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("IGD_INSTALL_VERSION") {
            self.install.version = Some(raw);
        }
        if let Some(raw) = lookup("IGD_INSTALL_LOCALE") {
            self.install.locale = raw;
        }

        // scanner
        if let Some(raw) = lookup("IGD_SCANNER_ENABLED") {
            self.scanner.enabled = parse_env_bool("IGD_SCANNER_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("IGD_SCANNER_FOLLOW_SYMLINKS") {
            self.scanner.follow_symlinks = parse_env_bool("IGD_SCANNER_FOLLOW_SYMLINKS", &raw)?;
        }
        if let Some(raw) = lookup("IGD_SCANNER_PARALLELISM") {
            self.scanner.parallelism = parse_env_usize("IGD_SCANNER_PARALLELISM", &raw)?;
        }
        if let Some(raw) = lookup("IGD_SCANNER_CHECKSUM") {
            self.scanner.checksum =
                raw.parse::<ChecksumAlgorithm>()
                    .map_err(|details| IgdError::ConfigParse {
                        context: "env",
                        details: format!("IGD_SCANNER_CHECKSUM={raw:?}: {details}"),
                    })?;
        }
        if let Some(raw) = lookup("IGD_SCANNER_MINIMUM_INTERVAL_SECS") {
            self.scanner.minimum_interval_secs =
                parse_env_u64("IGD_SCANNER_MINIMUM_INTERVAL_SECS", &raw)?;
        }

        // reference
        if let Some(raw) = lookup("IGD_REFERENCE_CHECKSUMS_URL") {
            self.reference.checksums_url = raw;
        }
        if let Some(raw) = lookup("IGD_REFERENCE_ORIGINAL_FILE_URL") {
            self.reference.original_file_url = raw;
        }
        if let Some(raw) = lookup("IGD_REFERENCE_REQUEST_TIMEOUT_SECS") {
            self.reference.request_timeout_secs =
                parse_env_u64("IGD_REFERENCE_REQUEST_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("IGD_REFERENCE_VERIFY_TLS") {
            self.reference.verify_tls = parse_env_bool("IGD_REFERENCE_VERIFY_TLS", &raw)?;
        }

        // notifications
        if let Some(raw) = lookup("IGD_NOTIFY_ON_CHANGES") {
            self.notifications.notify_on_changes = parse_env_bool("IGD_NOTIFY_ON_CHANGES", &raw)?;
        }

        // paths
        if let Some(raw) = lookup("IGD_STATE_DIR") {
            self.paths.state_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("IGD_AUDIT_LOG") {
            self.paths.audit_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn normalize_paths(&mut self) {
        for root in &mut self.scanner.roots {
            root.path = root.path.trim_matches('/').replace('\\', "/");
        }
        for custom in &mut self.exclusions.custom_paths {
            *custom = custom.trim().replace('\\', "/");
        }
        self.exclusions.custom_paths.retain(|p| !p.is_empty());
        self.install.content_folder_name = self
            .install
            .content_folder_name
            .trim_matches('/')
            .to_string();

        let root = self.install.root.to_string_lossy();
        if root.len() > 1
            && let Some(stripped) = root.strip_suffix('/')
        {
            self.install.root = PathBuf::from(stripped);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.install.root.as_os_str().is_empty() {
            return Err(IgdError::InvalidConfig {
                details: "install.root must not be empty".to_string(),
            });
        }

        if self.install.locale.trim().is_empty() {
            return Err(IgdError::InvalidConfig {
                details: "install.locale must not be empty".to_string(),
            });
        }

        if self.install.content_folder_name.is_empty()
            || self.install.content_folder_name.contains('/')
        {
            return Err(IgdError::InvalidConfig {
                details: format!(
                    "install.content_folder_name must be a single path component, got {:?}",
                    self.install.content_folder_name
                ),
            });
        }

        if let Some(content_dir) = &self.install.content_dir
            && content_dir.file_name().is_none()
        {
            return Err(IgdError::InvalidConfig {
                details: format!(
                    "install.content_dir must name a directory, got {}",
                    content_dir.display()
                ),
            });
        }

        if self.scanner.roots.is_empty() {
            return Err(IgdError::InvalidConfig {
                details: "scanner.roots must contain at least one root".to_string(),
            });
        }

        for root in &self.scanner.roots {
            if root.path.split('/').any(|part| part == "..") {
                return Err(IgdError::InvalidConfig {
                    details: format!("scanner.roots entry {:?} escapes install.root", root.path),
                });
            }
        }

        if self.scanner.parallelism == 0 {
            return Err(IgdError::InvalidConfig {
                details: "scanner.parallelism must be >= 1".to_string(),
            });
        }

        if self.reference.request_timeout_secs == 0
            || self.reference.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS
        {
            return Err(IgdError::InvalidConfig {
                details: format!(
                    "reference.request_timeout_secs must be in [1, {MAX_REQUEST_TIMEOUT_SECS}], got {}",
                    self.reference.request_timeout_secs
                ),
            });
        }

        if !self.reference.original_file_url.contains("{path}") {
            return Err(IgdError::InvalidConfig {
                details: "reference.original_file_url must contain a {path} placeholder"
                    .to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|error| IgdError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_usize(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|error| IgdError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(IgdError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: expected boolean"),
        }),
    }
}
