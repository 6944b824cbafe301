//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{ColoredString, Colorize, control};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use integrity_guard::core::clock::{Clock, SystemClock};
use integrity_guard::core::config::Config;
use integrity_guard::core::errors::IgdError;
use integrity_guard::logger::audit::JsonlAuditSink;
use integrity_guard::reference::ReferenceSnapshotProvider;
use integrity_guard::reference::directory::DirectorySnapshotProvider;
use integrity_guard::reference::http::HttpSnapshotProvider;
use integrity_guard::scanner::diff::{Classification, DiffEntry};
use integrity_guard::scanner::engine::{ScanOutcome, ScanReport, Scanner};
use integrity_guard::scanner::exclusion::ExclusionPolicy;
use integrity_guard::scanner::remediation::{RemediationAction, RemediationReport, parse_selections};
use integrity_guard::store::open_store;

const CONFIRMATION_REQUIRED: &str =
    "You need to confirm that you understand the risk of this operation.";

/// Integrity Guard: detects and repairs unexpected changes to installed core files.
#[derive(Debug, Parser)]
#[command(
    name = "igd",
    author,
    version,
    about = "Integrity Guard - core file integrity scanner",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Read reference checksums and originals from a pristine release tree
    /// instead of the checksum service.
    #[arg(long, global = true, value_name = "DIR")]
    reference_dir: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Scan the installation against the release checksums.
    Scan(ScanArgs),
    /// Restore modified or removed core files from the release.
    Restore(RemediateArgs),
    /// Delete files the release does not contain.
    Delete(RemediateArgs),
    /// Accept changes so later scans no longer report them.
    Accept(RemediateArgs),
    /// Manage accepted (ignored) files.
    Ignored(IgnoredArgs),
    /// Show exclusion rules or check a path against them.
    Exclusions(ExclusionsArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ScanArgs {
    /// Ignore the disabled flag and the minimum interval.
    #[arg(long)]
    force: bool,
    /// Also list stable files.
    #[arg(long)]
    all: bool,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct RemediateArgs {
    /// Files to act on, as `status@relative/path` (e.g. `modified@wp-login.php`).
    #[arg(value_name = "SELECTION")]
    selections: Vec<String>,
    /// Confirm the operation.
    #[arg(long)]
    yes: bool,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct IgnoredArgs {
    #[command(subcommand)]
    command: Option<IgnoredCommand>,
}

#[derive(Debug, Clone, Subcommand, Serialize)]
enum IgnoredCommand {
    /// List accepted files.
    List,
    /// Stop ignoring the given relative paths.
    Remove(IgnoredRemoveArgs),
    /// Forget every accepted file.
    Reset(IgnoredResetArgs),
}

#[derive(Debug, Clone, Args, Serialize)]
struct IgnoredRemoveArgs {
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<String>,
}

#[derive(Debug, Clone, Args, Serialize)]
struct IgnoredResetArgs {
    /// Confirm the reset.
    #[arg(long)]
    yes: bool,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ExclusionsArgs {
    /// Relative path to check instead of listing the rules.
    #[arg(long, value_name = "PATH")]
    check: Option<String>,
    /// Treat the checked path as a directory.
    #[arg(long, requires = "check")]
    dir: bool,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand, Serialize)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct VersionArgs {
    /// Include additional build metadata fields.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Operation partially succeeded.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<IgdError> for CliError {
    fn from(error: IgdError) -> Self {
        match error {
            IgdError::InvalidConfig { .. }
            | IgdError::MissingConfig { .. }
            | IgdError::ConfigParse { .. }
            | IgdError::InvalidPattern { .. }
            | IgdError::InvalidSelection { .. }
            | IgdError::UnsafePath { .. } => Self::User(error.to_string()),
            IgdError::Serialization { .. } => Self::Internal(error.to_string()),
            _ => Self::Runtime(error.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Scan(args) => run_scan(cli, args),
        Command::Restore(args) => run_remediate(cli, RemediationAction::Restore, args),
        Command::Delete(args) => run_remediate(cli, RemediationAction::Delete, args),
        Command::Accept(args) => run_remediate(cli, RemediationAction::Accept, args),
        Command::Ignored(args) => run_ignored(cli, args),
        Command::Exclusions(args) => run_exclusions(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Version(args) => emit_version(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── wiring ────────────────────

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

fn build_provider(cli: &Cli, config: &Config) -> Arc<dyn ReferenceSnapshotProvider> {
    match &cli.reference_dir {
        Some(dir) => Arc::new(DirectorySnapshotProvider::new(
            dir.clone(),
            config.scanner.checksum,
        )),
        None => Arc::new(HttpSnapshotProvider::from_config(&config.reference)),
    }
}

fn build_scanner(cli: &Cli) -> Result<Scanner, CliError> {
    let config = load_config(cli)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let provider = build_provider(cli, &config);
    let store = open_store(&config)?;
    let sink = Arc::new(JsonlAuditSink::open(
        &config.paths.audit_log,
        Arc::clone(&clock),
    ));
    Ok(Scanner::new(config, provider, store, sink, clock))
}

// ──────────────────── scan ────────────────────

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<(), CliError> {
    let scanner = build_scanner(cli)?;
    let outcome = scanner.scan(args.force)?;

    match output_mode(cli) {
        OutputMode::Human => match &outcome {
            ScanOutcome::Skipped(reason) => {
                println!("Scan skipped: {}", reason.describe());
                if !args.force {
                    println!("  Use --force to scan anyway.");
                }
            }
            ScanOutcome::Completed(report) => print_scan_report(report, args.all),
        },
        OutputMode::Json => {
            let mut payload = json!({ "command": "scan" });
            payload["scan"] = serde_json::to_value(&outcome)?;
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn print_scan_report(report: &ScanReport, show_stable: bool) {
    let counts = &report.counts;
    println!(
        "Integrity Scan Results\n  Version: {} ({})\n  Reference: {} ({} files)\n  Walked: {} files in {:.1}s\n",
        report.version,
        report.locale,
        report.provider,
        counts.reference_entries,
        counts.walked,
        std::time::Duration::from_millis(report.duration_ms).as_secs_f64(),
    );
    println!(
        "  {} stable  {} modified  {} removed  {} added  ({} excluded, {} ignored)",
        counts.stable,
        counts.modified,
        counts.removed,
        counts.added,
        counts.excluded,
        counts.suppressed,
    );

    let entries: Vec<&DiffEntry> = if show_stable {
        report.diff.entries().collect()
    } else {
        report.affected()
    };

    if entries.is_empty() {
        println!("\n  {}", "All core files match the release.".green());
    } else {
        println!("\n  {:<10}  {:<5}  {}", "Status", "Fix", "Path");
        println!("  {}", "-".repeat(72));
        for entry in entries {
            let fixable = if entry.fixable() { "yes" } else { "no" };
            println!(
                "  {:<10}  {:<5}  {}",
                paint(entry.classification()),
                fixable,
                entry.path()
            );
        }
    }

    for issue in &report.root_failures {
        eprintln!("  {} root {}: {}", "warning:".yellow(), issue.path, issue.error);
    }
    if !report.file_failures.is_empty() {
        eprintln!(
            "  {} {} files could not be read",
            "warning:".yellow(),
            report.file_failures.len()
        );
    }
    if counts.unreadable_suppressions > 0 {
        eprintln!(
            "  {} {} ignored-file records could not be read and were skipped",
            "warning:".yellow(),
            counts.unreadable_suppressions
        );
    }
}

fn paint(classification: Classification) -> ColoredString {
    let label = classification.as_str();
    match classification {
        Classification::Stable => label.green(),
        Classification::Modified => label.yellow(),
        Classification::Removed => label.red(),
        Classification::Added => label.cyan(),
    }
}

// ──────────────────── remediation ────────────────────

fn run_remediate(
    cli: &Cli,
    action: RemediationAction,
    args: &RemediateArgs,
) -> Result<(), CliError> {
    let targets = parse_selections(&args.selections)?;
    if !args.yes {
        return Err(CliError::User(CONFIRMATION_REQUIRED.to_string()));
    }

    let scanner = build_scanner(cli)?;
    let report = scanner.remediate(action, &targets)?;
    emit_remediation_report(cli, &report)?;
    remediation_result(&report)
}

fn emit_remediation_report(cli: &Cli, report: &RemediationReport) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", report.summary());
            for path in &report.affected_paths {
                println!("  {} {path}", "ok".green());
            }
            for failure in &report.failures {
                println!(
                    "  {} {} [{}] {}",
                    "failed".red(),
                    failure.path,
                    failure.error_code,
                    failure.error
                );
            }
        }
        OutputMode::Json => {
            let mut payload = json!({
                "command": report.action.as_str(),
                "summary": report.summary(),
            });
            payload["report"] = serde_json::to_value(report)?;
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn remediation_result(report: &RemediationReport) -> Result<(), CliError> {
    if report.is_complete() {
        Ok(())
    } else if report.is_partial() {
        Err(CliError::Partial(report.summary()))
    } else {
        Err(CliError::Runtime(report.summary()))
    }
}

// ──────────────────── suppressions ────────────────────

fn run_ignored(cli: &Cli, args: &IgnoredArgs) -> Result<(), CliError> {
    let scanner = build_scanner(cli)?;
    match &args.command {
        None | Some(IgnoredCommand::List) => {
            let records = scanner.suppressions()?;
            match output_mode(cli) {
                OutputMode::Human => {
                    if records.is_empty() {
                        println!("No files are ignored.");
                    }
                    for record in &records {
                        println!(
                            "  {:<8}  {:<10}  {}  {}",
                            &record.path_hash[..record.path_hash.len().min(8)],
                            paint(record.status_type),
                            record.ignored_at.format("%Y-%m-%d %H:%M:%S"),
                            record.relative_path
                        );
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "ignored list",
                        "ignored": serde_json::to_value(&records)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(IgnoredCommand::Remove(remove)) => {
            let removed = scanner.forget(&remove.paths)?;
            match output_mode(cli) {
                OutputMode::Human => {
                    println!(
                        "{} out of {} files are no longer ignored.",
                        removed.len(),
                        remove.paths.len()
                    );
                    for path in &removed {
                        println!("  {path}");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "ignored remove",
                        "requested": remove.paths,
                        "removed": removed,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(IgnoredCommand::Reset(reset)) => {
            if !reset.yes {
                return Err(CliError::User(CONFIRMATION_REQUIRED.to_string()));
            }
            let removed = scanner.reset_suppressions()?;
            match output_mode(cli) {
                OutputMode::Human => println!("Ignored files list reset ({removed} entries)."),
                OutputMode::Json => write_json_line(&json!({
                    "command": "ignored reset",
                    "removed": removed,
                }))?,
            }
            Ok(())
        }
    }
}

// ──────────────────── exclusions ────────────────────

fn run_exclusions(cli: &Cli, args: &ExclusionsArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let policy = ExclusionPolicy::from_config(&config)?;

    if let Some(path) = &args.check {
        let normalized = path.trim().trim_start_matches("./").replace('\\', "/");
        let reason = policy.explain(&normalized, args.dir);
        match output_mode(cli) {
            OutputMode::Human => match &reason {
                Some(reason) => println!("{normalized}: excluded ({})", reason.describe()),
                None => println!("{normalized}: scanned"),
            },
            OutputMode::Json => write_json_line(&json!({
                "command": "exclusions check",
                "path": normalized,
                "directory": args.dir,
                "excluded": reason.is_some(),
                "reason": reason.as_ref().map(|r| r.describe()),
            }))?,
        }
        return Ok(());
    }

    let rules = policy.rules();
    match output_mode(cli) {
        OutputMode::Human => {
            println!("Exclusion rules ({} total)", rules.len());
            for rule in &rules {
                let origin = if rule.custom { "custom" } else { "built-in" };
                println!("  {:<9}  {:<8}  {}", rule.kind.as_str(), origin, rule.pattern);
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "exclusions",
                "rules": serde_json::to_value(&rules)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let value = serde_json::to_value(&config)?;
                    let payload = json!({
                        "command": "config show",
                        "config": value,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                            "code": e.code(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── version / output ────────────────────

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");
    let git_sha = option_env!("GIT_SHA").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("igd {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
                println!("git_sha: {git_sha}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "igd",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                    "git_sha": git_sha,
                }
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("IGD_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use integrity_guard::scanner::remediation::RemediationFailure;

    #[test]
    fn parses_global_flags_before_and_after_subcommand() {
        let before = Cli::try_parse_from([
            "igd",
            "--config",
            "/tmp/igd.toml",
            "--json",
            "--no-color",
            "--reference-dir",
            "/srv/releases",
            "scan",
        ]);
        assert!(before.is_ok());

        let after = Cli::try_parse_from(["igd", "scan", "--force", "--json", "--no-color"]);
        assert!(after.is_ok());
    }

    #[test]
    fn parses_all_subcommands() {
        let cases = [
            vec!["igd", "scan", "--all"],
            vec!["igd", "restore", "modified@wp-login.php", "--yes"],
            vec!["igd", "delete", "added@wp-admin/x.php", "added@y.php"],
            vec!["igd", "accept", "removed@readme.html", "--yes"],
            vec!["igd", "ignored"],
            vec!["igd", "ignored", "list"],
            vec!["igd", "ignored", "remove", "wp-login.php"],
            vec!["igd", "ignored", "reset", "--yes"],
            vec!["igd", "exclusions"],
            vec!["igd", "exclusions", "--check", "wp-content/uploads", "--dir"],
            vec!["igd", "config", "show"],
            vec!["igd", "config", "validate"],
            vec!["igd", "version", "--verbose"],
        ];

        for case in cases {
            let parsed = Cli::try_parse_from(case.clone());
            assert!(parsed.is_ok(), "failed to parse case: {case:?}");
        }
    }

    #[test]
    fn dir_flag_requires_check_and_remove_requires_paths() {
        assert!(Cli::try_parse_from(["igd", "exclusions", "--dir"]).is_err());
        assert!(Cli::try_parse_from(["igd", "ignored", "remove"]).is_err());
    }

    #[test]
    fn completions_support_bash_zsh_and_fish() {
        for shell in ["bash", "zsh", "fish"] {
            let parsed = Cli::try_parse_from(["igd", "completions", shell]);
            assert!(parsed.is_ok(), "failed shell parse for {shell}");
        }
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(
            resolve_output_mode(true, Some("human"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("json"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("human"), false),
            OutputMode::Human
        );
        assert_eq!(
            resolve_output_mode(false, Some("auto"), true),
            OutputMode::Human
        );
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
    }

    #[test]
    fn unconfirmed_remediation_is_user_error() {
        let cli = Cli::try_parse_from(["igd", "restore", "modified@wp-login.php"]).unwrap();
        let Command::Restore(args) = &cli.command else {
            panic!("expected restore");
        };
        let err = run_remediate(&cli, RemediationAction::Restore, args).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), CONFIRMATION_REQUIRED);
    }

    #[test]
    fn empty_selection_is_reported_before_confirmation() {
        let cli = Cli::try_parse_from(["igd", "delete", "--yes"]).unwrap();
        let Command::Delete(args) = &cli.command else {
            panic!("expected delete");
        };
        let err = run_remediate(&cli, RemediationAction::Delete, args).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("No files were selected."));
    }

    #[test]
    fn igd_errors_map_to_exit_codes() {
        let user: CliError = IgdError::InvalidConfig {
            details: "x".to_string(),
        }
        .into();
        assert_eq!(user.exit_code(), 1);

        let runtime: CliError = IgdError::ReferenceUnavailable {
            version: "6.4.2".to_string(),
            details: "timeout".to_string(),
        }
        .into();
        assert_eq!(runtime.exit_code(), 2);
    }

    #[test]
    fn partial_remediation_exits_with_partial_code() {
        let mut report = RemediationReport {
            action: RemediationAction::Delete,
            attempted: 2,
            succeeded: 1,
            affected_paths: vec!["/srv/a.php".to_string()],
            failures: vec![RemediationFailure {
                path: "b.php".to_string(),
                error: "gone".to_string(),
                error_code: "IGD-2201".to_string(),
            }],
            audit_message: None,
        };
        assert_eq!(remediation_result(&report).unwrap_err().exit_code(), 4);

        report.succeeded = 0;
        report.affected_paths.clear();
        assert_eq!(remediation_result(&report).unwrap_err().exit_code(), 2);
    }
}
