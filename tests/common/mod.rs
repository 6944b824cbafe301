#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::TempDir;

pub const VERSION: &str = "6.4.2";

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_igd") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "igd.exe" } else { "igd" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve igd binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("igd-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("IGD_OUTPUT_FORMAT", "json")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute igd command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

pub fn write_file(root: &Path, relative: &str, body: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, body).expect("write fixture file");
}

/// Pristine release files shared by the install and the reference tree.
pub const RELEASE_FILES: &[(&str, &[u8])] = &[
    ("index.php", b"<?php require 'wp-blog-header.php';"),
    ("wp-login.php", b"<?php // login form"),
    ("wp-settings.php", b"<?php // bootstrap"),
    ("wp-admin/index.php", b"<?php // dashboard"),
    ("wp-admin/includes/file.php", b"<?php // file api"),
    ("wp-includes/version.php", b"<?php\n$wp_version = '6.4.2';\n"),
    ("wp-includes/js/jquery.js", b"/* jquery */"),
    ("wp-content/index.php", b"<?php // Silence is golden."),
];

/// An installation plus a pristine release mirror laid out as `<release>/<version>/`.
pub struct SiteFixture {
    pub tmp: TempDir,
    pub install: PathBuf,
    pub release: PathBuf,
    pub state: PathBuf,
}

impl SiteFixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create tempdir");
        let install = tmp.path().join("site");
        let release = tmp.path().join("release");
        let state = tmp.path().join("state");
        for (relative, body) in RELEASE_FILES {
            write_file(&install, relative, body);
            write_file(&release.join(VERSION), relative, body);
        }
        Self {
            tmp,
            install,
            release,
            state,
        }
    }

    pub fn audit_log(&self) -> PathBuf {
        self.state.join("audit.jsonl")
    }

    /// Write a config file pointing at this fixture and return its path.
    pub fn write_config(&self, extra: &str) -> PathBuf {
        self.write_config_with("", extra)
    }

    /// Like [`write_config`](Self::write_config), with extra keys inside `[install]`.
    pub fn write_config_with(&self, install_extra: &str, extra: &str) -> PathBuf {
        let path = self.tmp.path().join("igd.toml");
        let body = format!(
            "[install]\nroot = {root:?}\n{install_extra}\n[notifications]\nnotify_on_changes = true\n\n[paths]\nstate_dir = {state:?}\naudit_log = {audit:?}\n\n{extra}\n",
            root = self.install.display().to_string(),
            state = self.state.display().to_string(),
            audit = self.audit_log().display().to_string(),
        );
        fs::write(&path, body).expect("write config");
        path
    }
}
