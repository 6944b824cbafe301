//! Installed release detection from the version declaration file.

#![allow(missing_docs)]

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::config::InstallConfig;
use crate::core::errors::{IgdError, Result};

static VERSION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"\$wp_version\s*=\s*['"]([^'"]+)['"]\s*;"#).ok()
});

static LOCAL_PACKAGE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"\$wp_local_package\s*=\s*['"]([^'"]+)['"]\s*;"#).ok()
});

/// What the version file declares about the installed release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRelease {
    pub version: String,
    /// Locale of a translated release package, when declared.
    pub local_package: Option<String>,
}

/// Parse the version declaration source.
#[must_use]
pub fn parse_release(source: &str) -> Option<InstalledRelease> {
    let version = capture(&VERSION_RE, source)?;
    Some(InstalledRelease {
        version,
        local_package: capture(&LOCAL_PACKAGE_RE, source),
    })
}

fn capture(re: &Option<Regex>, source: &str) -> Option<String> {
    let re = re.as_ref()?;
    let value = re.captures(source)?.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Resolve the installed release: explicit override first, then the version
/// file below the install root.
///
/// An undeterminable version is `ReferenceUnavailable` since no snapshot can
/// be requested without it.
pub fn detect_release(install: &InstallConfig) -> Result<InstalledRelease> {
    let version_path = install.root.join(&install.version_file);
    let declared = read_declaration(&version_path);

    if let Some(version) = install.version.as_deref().map(str::trim)
        && !version.is_empty()
    {
        return Ok(InstalledRelease {
            version: version.to_string(),
            local_package: declared.and_then(|release| release.local_package),
        });
    }

    declared.ok_or_else(|| IgdError::ReferenceUnavailable {
        version: "unknown".to_string(),
        details: format!(
            "unknown site version: no version declaration in {}",
            version_path.display()
        ),
    })
}

fn read_declaration(path: &Path) -> Option<InstalledRelease> {
    let source = fs::read_to_string(path).ok()?;
    parse_release(&source)
}
