//! Path resolution between reference-relative paths and the installation on disk.

#![allow(missing_docs)]

use std::path::{Component, Path, PathBuf};

use crate::core::config::InstallConfig;

/// Where a reference-relative path was found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedPath {
    pub absolute: PathBuf,
    /// True when the file was found only through the content-directory remap.
    pub remapped: bool,
}

/// Maps forward-slash relative paths onto the installation root.
///
/// Reference snapshots always name the content folder by its standard name
/// (`wp-content/...`). When the installation keeps its content directory
/// elsewhere, paths whose first component is that folder name are remapped
/// onto `content_dir`. Nothing else is rewritten.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    content_folder_name: String,
    content_dir: Option<PathBuf>,
}

impl PathResolver {
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        content_folder_name: impl Into<String>,
        content_dir: Option<PathBuf>,
    ) -> Self {
        let root = root.into();
        let content_folder_name = content_folder_name.into();
        // A content_dir equal to the standard location needs no remap.
        let content_dir =
            content_dir.filter(|dir| normalize_syntactic(dir) != root.join(&content_folder_name));
        Self {
            root,
            content_folder_name,
            content_dir,
        }
    }

    #[must_use]
    pub fn from_config(install: &InstallConfig) -> Self {
        Self::new(
            install.root.clone(),
            install.content_folder_name.clone(),
            install.content_dir.clone(),
        )
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<relative>`.
    #[must_use]
    pub fn primary(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// The remapped location, if `relative` lives under the content folder and a
    /// custom content directory is configured.
    #[must_use]
    pub fn remapped(&self, relative: &str) -> Option<PathBuf> {
        let content_dir = self.content_dir.as_ref()?;
        let (first, rest) = relative.split_once('/')?;
        if first != self.content_folder_name || rest.is_empty() {
            return None;
        }
        Some(content_dir.join(rest))
    }

    /// Find an existing regular file for `relative`, trying the primary location
    /// first and the content remap once. Paths that could leave the root are
    /// never located.
    #[must_use]
    pub fn locate(&self, relative: &str) -> Option<LocatedPath> {
        if check_relative_path(relative).is_err() {
            return None;
        }
        let primary = self.primary(relative);
        if primary.is_file() {
            return Some(LocatedPath {
                absolute: primary,
                remapped: false,
            });
        }
        self.remapped(relative)
            .filter(|candidate| candidate.is_file())
            .map(|absolute| LocatedPath {
                absolute,
                remapped: true,
            })
    }

    /// Path a missing file should be written to or checked against.
    ///
    /// Uses the remapped location when it applies and the custom content
    /// directory exists; otherwise the primary location.
    #[must_use]
    pub fn write_target(&self, relative: &str) -> PathBuf {
        if let Some(remapped) = self.remapped(relative)
            && self.content_dir.as_ref().is_some_and(|dir| dir.is_dir())
        {
            return remapped;
        }
        self.primary(relative)
    }

    /// Forward-slash path of `absolute` relative to the root, if it is below it.
    #[must_use]
    pub fn relative_of(&self, absolute: &Path) -> Option<String> {
        to_slash_relative(&self.root, absolute)
    }
}

/// Forward-slash path of `path` relative to `base`, or `None` when `path`
/// is not below `base` (or equal to it).
#[must_use]
pub fn to_slash_relative(base: &Path, path: &Path) -> Option<String> {
    let stripped = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = stripped
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Reject relative paths that could touch anything outside the install root.
pub fn check_relative_path(relative: &str) -> Result<(), &'static str> {
    if relative.is_empty() {
        return Err("path is empty");
    }
    if relative.contains('\0') {
        return Err("path contains a NUL byte");
    }
    if relative.starts_with('/') || relative.starts_with('\\') || Path::new(relative).is_absolute()
    {
        return Err("absolute paths are not allowed");
    }
    if relative
        .split(['/', '\\'])
        .any(|segment| segment == "..")
    {
        return Err("parent directory traversal is not allowed");
    }
    Ok(())
}

/// Whether the current process may write to `path` (file or directory).
///
/// Missing paths are not writable.
#[must_use]
pub fn is_writable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        nix::unistd::access(path, nix::unistd::AccessFlags::W_OK).is_ok()
    }
    #[cfg(not(unix))]
    {
        path.metadata()
            .map(|meta| !meta.permissions().readonly())
            .unwrap_or(false)
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
#[must_use]
pub fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}
