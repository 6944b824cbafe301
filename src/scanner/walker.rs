//! Deterministic directory walker over the configured scan roots.
//!
//! The walker is the "eyes" of the scanner: it enumerates candidate files
//! below each root, pruning excluded directories before descending, and
//! returns forward-slash paths relative to the install root in sorted order.

#![allow(missing_docs)]

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::config::ScannerConfig;
use crate::core::errors::IgdError;
use crate::scanner::exclusion::ExclusionPolicy;

/// Hard stop for runaway trees (deep symlink chains, generated directories).
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// One walk root, relative to the install root. `""` is the root itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkRoot {
    pub relative: String,
    pub recursive: bool,
}

impl WalkRoot {
    #[must_use]
    pub fn new(relative: impl Into<String>, recursive: bool) -> Self {
        Self {
            relative: relative.into(),
            recursive,
        }
    }
}

/// Walker configuration derived from `ScannerConfig`.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub roots: Vec<WalkRoot>,
    pub follow_symlinks: bool,
    pub max_depth: usize,
}

impl WalkerConfig {
    #[must_use]
    pub fn from_scanner(config: &ScannerConfig) -> Self {
        Self {
            roots: config
                .roots
                .iter()
                .map(|root| WalkRoot::new(root.path.clone(), root.recursive))
                .collect(),
            follow_symlinks: config.follow_symlinks,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A root that contributed nothing to the walk.
#[derive(Debug)]
pub struct RootFailure {
    pub root: String,
    pub error: IgdError,
}

/// Result of walking every root.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Sorted, de-duplicated forward-slash relative paths.
    pub paths: Vec<String>,
    pub failures: Vec<RootFailure>,
    /// Files and directories rejected by the exclusion policy.
    pub excluded: usize,
    /// Entries inside a root that could not be read (skipped silently).
    pub unreadable: usize,
}

/// Iterative, single-threaded walker. Output does not depend on `read_dir`
/// ordering.
pub struct PathWalker {
    install_root: PathBuf,
    policy: Arc<ExclusionPolicy>,
    config: WalkerConfig,
}

impl PathWalker {
    pub fn new(
        install_root: impl Into<PathBuf>,
        policy: Arc<ExclusionPolicy>,
        config: WalkerConfig,
    ) -> Self {
        Self {
            install_root: install_root.into(),
            policy,
            config,
        }
    }

    #[must_use]
    pub fn roots(&self) -> &[WalkRoot] {
        &self.config.roots
    }

    /// Walk every configured root. Failing roots are reported and never abort
    /// their siblings.
    #[must_use]
    pub fn walk(&self) -> WalkOutcome {
        self.walk_roots(&self.config.roots)
    }

    /// Walk an explicit root list.
    #[must_use]
    pub fn walk_roots(&self, roots: &[WalkRoot]) -> WalkOutcome {
        let mut collected = BTreeSet::new();
        let mut outcome = WalkOutcome::default();
        let mut visited: HashSet<PathBuf> = HashSet::new();

        for root in roots {
            let relative = root.relative.trim_matches('/').to_string();
            let absolute = if relative.is_empty() {
                self.install_root.clone()
            } else {
                self.install_root.join(&relative)
            };

            if !relative.is_empty() && self.policy.should_exclude(&relative, true) {
                outcome.excluded += 1;
                continue;
            }

            match fs::metadata(&absolute) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    outcome.failures.push(RootFailure {
                        root: relative,
                        error: IgdError::RootUnreadable {
                            path: absolute,
                            details: "not a directory".to_string(),
                        },
                    });
                    continue;
                }
                Err(err) => {
                    outcome.failures.push(RootFailure {
                        root: relative,
                        error: IgdError::RootUnreadable {
                            path: absolute,
                            details: err.to_string(),
                        },
                    });
                    continue;
                }
            }

            if let Err(err) = self.walk_one(
                &absolute,
                &relative,
                root.recursive,
                &mut collected,
                &mut outcome,
                &mut visited,
            ) {
                outcome.failures.push(RootFailure {
                    root: relative,
                    error: IgdError::RootUnreadable {
                        path: absolute,
                        details: err.to_string(),
                    },
                });
            }
        }

        outcome.paths = collected.into_iter().collect();
        outcome
    }

    fn walk_one(
        &self,
        absolute: &Path,
        relative: &str,
        recursive: bool,
        collected: &mut BTreeSet<String>,
        outcome: &mut WalkOutcome,
        visited: &mut HashSet<PathBuf>,
    ) -> std::io::Result<()> {
        // The root itself must be listable; deeper failures are skipped.
        let root_entries = fs::read_dir(absolute)?;
        if self.config.follow_symlinks
            && let Ok(canonical) = fs::canonicalize(absolute)
        {
            visited.insert(canonical);
        }

        let mut stack: Vec<(PathBuf, String, usize)> = Vec::new();
        let mut pending = Some(root_entries);
        let mut current = (absolute.to_path_buf(), relative.to_string(), 0usize);

        loop {
            let entries = match pending.take() {
                Some(entries) => entries,
                None => match fs::read_dir(&current.0) {
                    Ok(entries) => entries,
                    // Permission denied, vanished mid-walk, etc: skip the subtree.
                    Err(_) => {
                        outcome.unreadable += 1;
                        match stack.pop() {
                            Some(next) => {
                                current = next;
                                continue;
                            }
                            None => break,
                        }
                    }
                },
            };

            let mut listed = Vec::new();
            for entry_result in entries {
                match entry_result {
                    Ok(entry) => listed.push(entry),
                    Err(_) => outcome.unreadable += 1,
                }
            }
            // Name order: the first alias of an already visited directory wins.
            listed.sort_by_key(fs::DirEntry::file_name);

            let (dir_rel, depth) = (&current.1, current.2);
            for entry in listed {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child_rel = if dir_rel.is_empty() {
                    name.clone()
                } else {
                    format!("{dir_rel}/{name}")
                };
                let child_abs = entry.path();

                let Ok(ft) = entry.file_type() else {
                    outcome.unreadable += 1;
                    continue;
                };

                let (is_dir, is_file) = if ft.is_symlink() {
                    if !self.config.follow_symlinks {
                        continue;
                    }
                    match fs::metadata(&child_abs) {
                        Ok(meta) => (meta.is_dir(), meta.is_file()),
                        // Dangling link.
                        Err(_) => continue,
                    }
                } else {
                    (ft.is_dir(), ft.is_file())
                };

                if is_dir {
                    if !recursive || depth + 1 > self.config.max_depth {
                        continue;
                    }
                    if self.policy.should_exclude(&child_rel, true) {
                        outcome.excluded += 1;
                        continue;
                    }
                    if self.config.follow_symlinks {
                        let Ok(canonical) = fs::canonicalize(&child_abs) else {
                            outcome.unreadable += 1;
                            continue;
                        };
                        if !visited.insert(canonical) {
                            continue;
                        }
                    }
                    stack.push((child_abs, child_rel, depth + 1));
                } else if is_file {
                    if !self.policy.is_walk_candidate(&name) {
                        continue;
                    }
                    if self.policy.should_exclude(&child_rel, false) {
                        outcome.excluded += 1;
                        continue;
                    }
                    collected.insert(child_rel);
                }
            }

            match stack.pop() {
                Some(next) => current = next,
                None => break,
            }
        }

        Ok(())
    }
}
