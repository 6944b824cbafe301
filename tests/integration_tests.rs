//! Integration tests: CLI smoke tests and full scan/remediate scenarios against
//! an on-disk installation and a pristine release tree.

mod common;

use std::fs;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;

use common::{SiteFixture, VERSION};
use integrity_guard::core::clock::FixedClock;
use integrity_guard::core::config::Config;
use integrity_guard::logger::audit::JsonlAuditSink;
use integrity_guard::logger::jsonl::{EventType, read_entries};
use integrity_guard::reference::directory::DirectorySnapshotProvider;
use integrity_guard::scanner::diff::Classification;
use integrity_guard::scanner::engine::{ScanOutcome, ScanReport, Scanner, SkipReason};
use integrity_guard::scanner::fingerprint::ChecksumAlgorithm;
use integrity_guard::scanner::remediation::{RemediationAction, RemediationTarget};
use integrity_guard::store::file::JsonFileStore;

// ──────────────────── helpers ────────────────────

struct Harness {
    site: SiteFixture,
    clock: Arc<FixedClock>,
    scanner: Scanner,
}

fn harness() -> Harness {
    let site = SiteFixture::new();
    let config_path = site.write_config("");
    let config = Config::load(Some(&config_path)).expect("load fixture config");

    let clock = Arc::new(FixedClock::new(
        Utc.timestamp_opt(1_700_000_000, 0).single().expect("timestamp"),
    ));
    let provider = Arc::new(DirectorySnapshotProvider::new(
        site.release.clone(),
        ChecksumAlgorithm::Md5,
    ));
    let store = Arc::new(JsonFileStore::new(site.state.clone()));
    let sink = Arc::new(JsonlAuditSink::open(&site.audit_log(), clock.clone()));
    let scanner = Scanner::new(config, provider, store, sink, clock.clone());
    Harness {
        site,
        clock,
        scanner,
    }
}

fn completed(outcome: ScanOutcome) -> ScanReport {
    match outcome {
        ScanOutcome::Completed(report) => *report,
        ScanOutcome::Skipped(reason) => panic!("scan skipped: {reason:?}"),
    }
}

fn paths(report: &ScanReport, classification: Classification) -> Vec<String> {
    report
        .diff
        .partition(classification)
        .iter()
        .map(|entry| entry.path().to_string())
        .collect()
}

fn parse_json(stdout: &str) -> Value {
    let line = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();
    serde_json::from_str(line).unwrap_or_else(|err| panic!("invalid JSON {line:?}: {err}"))
}

// ──────────────────── CLI smoke ────────────────────

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: igd [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_emits_json_metadata() {
    let result = common::run_cli_case("version_command_emits_json", &["version", "--json"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    let payload = parse_json(&result.stdout);
    assert_eq!(payload["binary"], "igd");
    assert_eq!(payload["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn missing_explicit_config_is_user_error() {
    let result = common::run_cli_case(
        "missing_explicit_config",
        &["--config", "/nonexistent/igd/config.toml", "scan"],
    );
    assert_eq!(
        result.status.code(),
        Some(1),
        "log: {}",
        result.log_path.display()
    );
    assert!(result.stderr.contains("IGD-1002"), "log: {}", result.log_path.display());
}

#[test]
fn cli_scan_reports_modified_file_as_json() {
    let site = SiteFixture::new();
    common::write_file(&site.install, "wp-login.php", b"<?php eval($_POST['x']);");
    let config = site.write_config("");
    let config_arg = config.display().to_string();
    let release_arg = site.release.display().to_string();

    let result = common::run_cli_case(
        "cli_scan_reports_modified",
        &[
            "--config",
            &config_arg,
            "--reference-dir",
            &release_arg,
            "scan",
            "--json",
        ],
    );
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );

    let payload = parse_json(&result.stdout);
    assert_eq!(payload["command"], "scan");
    assert_eq!(payload["scan"]["outcome"], "completed");
    let report = &payload["scan"]["result"];
    assert_eq!(report["version"], VERSION);
    assert_eq!(report["counts"]["modified"], 1);
    assert_eq!(report["diff"]["modified"][0]["path"], "wp-login.php");
    assert_eq!(report["diff"]["modified"][0]["classification"], "modified");

    let entries = read_entries(&site.audit_log()).expect("read audit log");
    assert!(
        entries
            .iter()
            .any(|entry| entry.event == EventType::ScanCompleted)
    );
    assert!(
        entries
            .iter()
            .any(|entry| entry.event == EventType::ChangeNotification)
    );
}

#[test]
fn cli_second_scan_is_debounced_unless_forced() {
    let site = SiteFixture::new();
    let config = site.write_config("");
    let config_arg = config.display().to_string();
    let release_arg = site.release.display().to_string();
    let base = ["--config", config_arg.as_str(), "--reference-dir", release_arg.as_str()];

    let first = common::run_cli_case("debounce_first", &[&base[..], &["scan"][..]].concat());
    assert!(first.status.success(), "log: {}", first.log_path.display());

    let second = common::run_cli_case("debounce_second", &[&base[..], &["scan"][..]].concat());
    assert!(second.status.success(), "log: {}", second.log_path.display());
    let payload = parse_json(&second.stdout);
    assert_eq!(payload["scan"]["outcome"], "skipped");
    assert_eq!(payload["scan"]["result"]["reason"], "too_soon");

    let forced = common::run_cli_case(
        "debounce_forced",
        &[&base[..], &["scan", "--force"][..]].concat(),
    );
    assert!(forced.status.success(), "log: {}", forced.log_path.display());
    assert_eq!(parse_json(&forced.stdout)["scan"]["outcome"], "completed");
}

#[test]
fn cli_restore_requires_confirmation() {
    let site = SiteFixture::new();
    common::write_file(&site.install, "wp-login.php", b"tampered");
    let config = site.write_config("");
    let config_arg = config.display().to_string();
    let release_arg = site.release.display().to_string();

    let result = common::run_cli_case(
        "cli_restore_requires_confirmation",
        &[
            "--config",
            &config_arg,
            "--reference-dir",
            &release_arg,
            "restore",
            "modified@wp-login.php",
        ],
    );
    assert_eq!(
        result.status.code(),
        Some(1),
        "log: {}",
        result.log_path.display()
    );
    assert!(result.stderr.contains("confirm"));
    assert_eq!(
        fs::read(site.install.join("wp-login.php")).expect("read"),
        b"tampered"
    );
}

#[test]
fn cli_restore_with_confirmation_repairs_file() {
    let site = SiteFixture::new();
    common::write_file(&site.install, "wp-login.php", b"tampered");
    let config = site.write_config("");
    let config_arg = config.display().to_string();
    let release_arg = site.release.display().to_string();

    let result = common::run_cli_case(
        "cli_restore_with_confirmation",
        &[
            "--config",
            &config_arg,
            "--reference-dir",
            &release_arg,
            "restore",
            "modified@wp-login.php",
            "--yes",
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = parse_json(&result.stdout);
    assert_eq!(payload["command"], "restore");
    assert_eq!(
        payload["summary"],
        "1 out of 1 files were successfully processed."
    );
    assert_eq!(
        fs::read(site.install.join("wp-login.php")).expect("read"),
        b"<?php // login form"
    );
}

#[test]
fn cli_traversal_selection_fails_without_touching_disk() {
    let site = SiteFixture::new();
    let outside = site.tmp.path().join("outside.php");
    fs::write(&outside, b"keep me").expect("write outside file");
    let config = site.write_config("");
    let config_arg = config.display().to_string();
    let release_arg = site.release.display().to_string();

    let result = common::run_cli_case(
        "cli_traversal_selection",
        &[
            "--config",
            &config_arg,
            "--reference-dir",
            &release_arg,
            "delete",
            "added@../outside.php",
            "--yes",
        ],
    );
    assert_eq!(
        result.status.code(),
        Some(2),
        "log: {}",
        result.log_path.display()
    );
    assert!(outside.exists());
    let payload = parse_json(&result.stdout);
    assert_eq!(payload["report"]["failures"][0]["error_code"], "IGD-2202");
}

#[test]
fn cli_exclusions_check_explains_rule() {
    let site = SiteFixture::new();
    let config = site.write_config("");
    let config_arg = config.display().to_string();

    let excluded = common::run_cli_case(
        "cli_exclusions_check_excluded",
        &["--config", &config_arg, "exclusions", "--check", "wp-config.php"],
    );
    assert!(excluded.status.success(), "log: {}", excluded.log_path.display());
    let payload = parse_json(&excluded.stdout);
    assert_eq!(payload["excluded"], true);
    assert!(
        payload["reason"]
            .as_str()
            .is_some_and(|reason| reason.contains("built-in"))
    );

    let scanned = common::run_cli_case(
        "cli_exclusions_check_scanned",
        &["--config", &config_arg, "exclusions", "--check", "wp-login.php"],
    );
    assert!(scanned.status.success(), "log: {}", scanned.log_path.display());
    assert_eq!(parse_json(&scanned.stdout)["excluded"], false);
}

#[test]
fn cli_accept_then_list_ignored() {
    let site = SiteFixture::new();
    common::write_file(&site.install, "wp-admin/shell.php", b"<?php system($_GET['c']);");
    let config = site.write_config("");
    let config_arg = config.display().to_string();

    let accepted = common::run_cli_case(
        "cli_accept",
        &["--config", &config_arg, "accept", "added@wp-admin/shell.php", "--yes"],
    );
    assert!(accepted.status.success(), "log: {}", accepted.log_path.display());

    let listed = common::run_cli_case(
        "cli_ignored_list",
        &["--config", &config_arg, "ignored", "list"],
    );
    assert!(listed.status.success(), "log: {}", listed.log_path.display());
    assert!(listed.stdout.contains("wp-admin/shell.php"));
}

// ──────────────────── library scenarios ────────────────────

#[test]
fn pristine_install_is_entirely_stable() {
    let h = harness();
    let report = completed(h.scanner.scan(false).expect("scan"));
    assert_eq!(report.version, VERSION);
    assert!(report.is_clean(), "affected: {:?}", report.affected());
    assert_eq!(report.counts.stable, common::RELEASE_FILES.len());
    assert!(paths(&report, Classification::Stable).contains(&"wp-content/index.php".to_string()));
}

#[test]
fn removed_core_file_is_fixable_and_restorable() {
    let h = harness();
    fs::remove_file(h.site.install.join("wp-admin/includes/file.php")).expect("remove");

    let report = completed(h.scanner.scan(true).expect("scan"));
    assert_eq!(
        paths(&report, Classification::Removed),
        vec!["wp-admin/includes/file.php".to_string()]
    );
    assert!(report.diff.removed[0].fixable());

    let outcome = h
        .scanner
        .remediate(
            RemediationAction::Restore,
            &[RemediationTarget::new(
                Classification::Removed,
                "wp-admin/includes/file.php",
            )],
        )
        .expect("restore");
    assert!(outcome.is_complete());

    let rescan = completed(h.scanner.scan(true).expect("rescan"));
    assert!(rescan.is_clean());
}

#[test]
fn added_file_is_reported_and_deleted() {
    let h = harness();
    common::write_file(&h.site.install, "wp-includes/js/miner.js", b"/* evil */");

    let report = completed(h.scanner.scan(true).expect("scan"));
    assert_eq!(
        paths(&report, Classification::Added),
        vec!["wp-includes/js/miner.js".to_string()]
    );

    let outcome = h
        .scanner
        .remediate(
            RemediationAction::Delete,
            &[RemediationTarget::new(
                Classification::Added,
                "wp-includes/js/miner.js",
            )],
        )
        .expect("delete");
    assert_eq!(outcome.succeeded, 1);
    assert!(!h.site.install.join("wp-includes/js/miner.js").exists());

    let rescan = completed(h.scanner.scan(true).expect("rescan"));
    assert!(rescan.is_clean());
}

#[test]
fn accepted_change_is_omitted_until_forgotten() {
    let h = harness();
    common::write_file(&h.site.install, "index.php", b"<?php // customised");

    let report = completed(h.scanner.scan(true).expect("scan"));
    assert_eq!(paths(&report, Classification::Modified), vec!["index.php".to_string()]);

    h.scanner
        .remediate(
            RemediationAction::Accept,
            &[RemediationTarget::new(Classification::Modified, "index.php")],
        )
        .expect("accept");

    let suppressed = completed(h.scanner.scan(true).expect("rescan"));
    assert!(suppressed.is_clean());
    assert_eq!(suppressed.counts.suppressed, 1);
    assert!(suppressed.diff.find("index.php").is_none());

    let forgotten = h
        .scanner
        .forget(&["index.php".to_string()])
        .expect("forget");
    assert_eq!(forgotten, vec!["index.php".to_string()]);
    let again = completed(h.scanner.scan(true).expect("scan after forget"));
    assert_eq!(paths(&again, Classification::Modified), vec!["index.php".to_string()]);
}

#[test]
fn relocated_content_directory_is_resolved() {
    let site = SiteFixture::new();
    let content_dir = site.tmp.path().join("content");
    fs::create_dir_all(&content_dir).expect("create content dir");
    fs::rename(
        site.install.join("wp-content/index.php"),
        content_dir.join("index.php"),
    )
    .expect("move content file");

    let config_path = site.write_config_with(
        &format!("content_dir = {:?}\n", content_dir.display().to_string()),
        "",
    );
    let config = Config::load(Some(&config_path)).expect("load config");
    assert_eq!(config.install.content_dir.as_deref(), Some(content_dir.as_path()));

    let clock = Arc::new(FixedClock::new(Utc::now()));
    let scanner = Scanner::new(
        config,
        Arc::new(DirectorySnapshotProvider::new(
            site.release.clone(),
            ChecksumAlgorithm::Md5,
        )),
        Arc::new(JsonFileStore::new(site.state.clone())),
        Arc::new(JsonlAuditSink::open(&site.audit_log(), clock.clone())),
        clock,
    );

    let report = completed(scanner.scan(true).expect("scan"));
    assert!(report.is_clean(), "affected: {:?}", report.affected());
    assert_eq!(report.diff.stats.remapped, 1);
}

#[test]
fn repeated_scans_are_deterministic() {
    let h = harness();
    common::write_file(&h.site.install, "wp-login.php", b"changed");
    common::write_file(&h.site.install, "wp-admin/extra.php", b"extra");

    let first = completed(h.scanner.scan(true).expect("first"));
    let second = completed(h.scanner.scan(true).expect("second"));
    assert_eq!(first.diff.modified, second.diff.modified);
    assert_eq!(first.diff.added, second.diff.added);
    assert_eq!(first.diff.removed, second.diff.removed);
    assert_eq!(first.diff.stable, second.diff.stable);
}

#[test]
fn minimum_interval_follows_injected_clock() {
    let h = harness();
    completed(h.scanner.scan(false).expect("first"));

    match h.scanner.scan(false).expect("second") {
        ScanOutcome::Skipped(SkipReason::TooSoon { .. }) => {}
        other => panic!("expected too-soon skip, got {other:?}"),
    }

    h.clock.advance(Duration::seconds(10_801));
    completed(h.scanner.scan(false).expect("after interval"));
}

#[test]
fn remediation_events_land_in_audit_log() {
    let h = harness();
    common::write_file(&h.site.install, "wp-settings.php", b"tampered");
    completed(h.scanner.scan(true).expect("scan"));

    h.scanner
        .remediate(
            RemediationAction::Restore,
            &[RemediationTarget::new(
                Classification::Modified,
                "wp-settings.php",
            )],
        )
        .expect("restore");

    let entries = read_entries(&h.site.audit_log()).expect("read audit log");
    let restored = entries
        .iter()
        .find(|entry| entry.event == EventType::FileRestored)
        .expect("file_restored entry");
    assert_eq!(
        restored.paths,
        vec![
            h.site
                .install
                .join("wp-settings.php")
                .to_string_lossy()
                .into_owned()
        ]
    );
    assert!(restored.message.starts_with("Core file restored"));
    assert!(restored.ts.ends_with('Z'));
}
