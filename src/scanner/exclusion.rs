//! Exclusion policy: decides which paths take part in an integrity scan.
//!
//! Three layers, checked in order:
//! - **Directory rules** prune volatile content subtrees (uploads, caches,
//!   backups). A file below a pruned directory is excluded as well.
//! - **File rules** drop install-time, generated and host-specific files that
//!   legitimately differ from the release.
//! - **Administrator paths** exclude anything containing the configured
//!   fragment (after slash normalisation).
//!
//! All regexes are compiled once in [`ExclusionPolicy::new`].

#![allow(missing_docs)]

use regex::{Regex, RegexSet};
use serde::Serialize;

use crate::core::config::{Config, DEFAULT_LOCALE};
use crate::core::errors::{IgdError, Result};

/// Built-in file rules, matched against the forward-slash relative path.
const BUILTIN_FILE_RULES: &[&str] = &[
    r"_[a-z]*backup\.",
    r"\.bak$",
    r"-db-dump-[^/]*\.gz$",
    r"\.ico$",
    r"^php\.ini$",
    r"^\.(htaccess|htpasswd|ftpquota)$",
    r"^wp-includes/\.htaccess$",
    r"^wp-admin/setup-config\.php$",
    r"^wp-(config|pass|rss|feed|register|atom|commentsrss2|rss2|rdf)\.php$",
    r"^{content}/(themes|plugins)/.+",
    r"^sitemap\.xml($|\.gz$)",
    r"^readme(\.[a-z0-9]{32})?\.html$",
    r"^(503|404)\.php$",
    r"^500\.(shtml|php)$",
    r"^40[0-9]\.shtml$",
    r"^[^/]*\.(pdf|css|txt|jpg|gif|png|jpeg)$",
    r"^google[0-9a-z]{16}\.html$",
    r"^pinterest-[0-9a-z]{5}\.html$",
    r"(^|/)error_log$",
];

/// Files that carry locale-specific values in translated releases.
const LOCALIZED_FILE_RULES: &[&str] = &[r"^wp-includes/version\.php$", r"^wp-config-sample\.php$"];

const PRUNED_DIRECTORY_RULE: &str = r"(^|/){content}/(uploads|cache|backup|w3tc)(/|$)";

/// Name fragments that make a file a walk candidate.
const CODE_FILE_MARKERS: &[&str] = &[".php", ".htm", ".js"];
const CODE_FILE_NAMES: &[&str] = &[".htaccess", "php.ini"];

/// What a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    File,
    Directory,
}

impl RuleKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

/// One exclusion rule as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExclusionRule {
    pub pattern: String,
    pub kind: RuleKind,
    /// True for administrator-supplied substring paths.
    pub custom: bool,
}

/// Why a path was excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    PrunedDirectory(String),
    FileRule(String),
    CustomPath(String),
}

impl ExclusionReason {
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::PrunedDirectory(pattern) => format!("below pruned directory ({pattern})"),
            Self::FileRule(pattern) => format!("built-in file rule ({pattern})"),
            Self::CustomPath(fragment) => format!("administrator exclusion ({fragment})"),
        }
    }
}

/// Compiled exclusion rules.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    file_patterns: Vec<String>,
    file_rules: RegexSet,
    directory_pattern: String,
    directory_rule: Regex,
    custom_paths: Vec<String>,
    code_files_only: bool,
}

impl ExclusionPolicy {
    /// Compile the built-in rules for `locale`, anchoring content rules on
    /// `content_folder_name`, plus administrator `custom_paths`.
    pub fn new(locale: &str, content_folder_name: &str, custom_paths: &[String]) -> Result<Self> {
        let content = regex::escape(content_folder_name);

        let mut file_patterns: Vec<String> = BUILTIN_FILE_RULES
            .iter()
            .map(|rule| rule.replace("{content}", &content))
            .collect();
        if locale != DEFAULT_LOCALE {
            file_patterns.extend(LOCALIZED_FILE_RULES.iter().map(|rule| (*rule).to_string()));
        }

        let file_rules = RegexSet::new(&file_patterns).map_err(|err| IgdError::InvalidPattern {
            pattern: file_patterns.join(" | "),
            details: err.to_string(),
        })?;

        let directory_pattern = PRUNED_DIRECTORY_RULE.replace("{content}", &content);
        let directory_rule =
            Regex::new(&directory_pattern).map_err(|err| IgdError::InvalidPattern {
                pattern: directory_pattern.clone(),
                details: err.to_string(),
            })?;

        let custom_paths = custom_paths
            .iter()
            .map(|raw| normalize(raw).to_string())
            .filter(|fragment| !fragment.is_empty())
            .collect();

        Ok(Self {
            file_patterns,
            file_rules,
            directory_pattern,
            directory_rule,
            custom_paths,
            code_files_only: true,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            &config.install.locale,
            &config.install.content_folder_name,
            &config.exclusions.custom_paths,
        )?
        .with_code_files_only(config.scanner.code_files_only))
    }

    /// Restrict (or stop restricting) walked files to code-like names.
    #[must_use]
    pub const fn with_code_files_only(mut self, enabled: bool) -> Self {
        self.code_files_only = enabled;
        self
    }

    /// Whether `path` (forward-slash, relative to the install root) is excluded.
    #[must_use]
    pub fn should_exclude(&self, path: &str, is_directory: bool) -> bool {
        self.explain(path, is_directory).is_some()
    }

    /// The first rule that excludes `path`, if any.
    #[must_use]
    pub fn explain(&self, path: &str, is_directory: bool) -> Option<ExclusionReason> {
        let path = normalize(path);
        if path.is_empty() {
            return None;
        }

        if self.directory_rule.is_match(path) {
            return Some(ExclusionReason::PrunedDirectory(
                self.directory_pattern.clone(),
            ));
        }

        if !is_directory
            && let Some(index) = self.file_rules.matches(path).iter().next()
        {
            return Some(ExclusionReason::FileRule(
                self.file_patterns[index].clone(),
            ));
        }

        self.custom_paths
            .iter()
            .find(|fragment| path.contains(fragment.as_str()))
            .map(|fragment| ExclusionReason::CustomPath(fragment.clone()))
    }

    /// Whether the walker should pick up a file with this name at all.
    ///
    /// Only affects discovery of local files; reference entries are always
    /// compared.
    #[must_use]
    pub fn is_walk_candidate(&self, file_name: &str) -> bool {
        if !self.code_files_only {
            return true;
        }
        CODE_FILE_NAMES.contains(&file_name)
            || CODE_FILE_MARKERS
                .iter()
                .any(|marker| file_name.contains(marker))
    }

    /// Every active rule, built-in first.
    #[must_use]
    pub fn rules(&self) -> Vec<ExclusionRule> {
        let mut rules = vec![ExclusionRule {
            pattern: self.directory_pattern.clone(),
            kind: RuleKind::Directory,
            custom: false,
        }];
        rules.extend(self.file_patterns.iter().map(|pattern| ExclusionRule {
            pattern: pattern.clone(),
            kind: RuleKind::File,
            custom: false,
        }));
        rules.extend(self.custom_paths.iter().map(|fragment| ExclusionRule {
            pattern: fragment.clone(),
            kind: RuleKind::Directory,
            custom: true,
        }));
        rules
    }

    #[must_use]
    pub fn custom_paths(&self) -> &[String] {
        &self.custom_paths
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    trimmed.trim_start_matches('/')
}
