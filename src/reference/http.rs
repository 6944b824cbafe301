//! Checksum service client built on the system `curl` binary.

#![allow(missing_docs)]

use std::process::Command;
use std::time::Duration;

use crate::core::config::ReferenceConfig;
use crate::core::errors::{IgdError, Result};
use crate::reference::{ReferenceSnapshot, ReferenceSnapshotProvider};

/// Fetches checksums and original files over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpSnapshotProvider {
    checksums_url: String,
    original_file_url: String,
    timeout: Duration,
    verify_tls: bool,
    user_agent: String,
}

impl HttpSnapshotProvider {
    #[must_use]
    pub fn from_config(config: &ReferenceConfig) -> Self {
        Self {
            checksums_url: config.checksums_url.clone(),
            original_file_url: config.original_file_url.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            verify_tls: config.verify_tls,
            user_agent: config.user_agent.clone(),
        }
    }

    /// `<checksums_url>?version=<v>&locale=<l>`
    #[must_use]
    pub fn checksums_request_url(&self, version: &str, locale: &str) -> String {
        let separator = if self.checksums_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!(
            "{}{separator}version={}&locale={}",
            self.checksums_url,
            encode_component(version),
            encode_component(locale)
        )
    }

    #[must_use]
    pub fn original_file_request_url(&self, relative_path: &str, version: &str) -> String {
        let path = relative_path
            .split('/')
            .map(encode_component)
            .collect::<Vec<_>>()
            .join("/");
        self.original_file_url
            .replace("{version}", &encode_component(version))
            .replace("{path}", &path)
    }

    fn curl_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "-fsSL".to_string(),
            "--max-time".to_string(),
            self.timeout.as_secs().max(1).to_string(),
            "-A".to_string(),
            self.user_agent.clone(),
        ];
        if !self.verify_tls {
            args.push("-k".to_string());
        }
        args.push(url.to_string());
        args
    }

    fn get(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let output = Command::new("curl")
            .args(self.curl_args(url))
            .output()
            .map_err(|e| format!("curl not found or failed: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "request failed (status {}): {}",
                output.status,
                stderr.trim()
            ));
        }

        Ok(output.stdout)
    }
}

impl ReferenceSnapshotProvider for HttpSnapshotProvider {
    fn fetch_snapshot(&self, version: &str, locale: &str) -> Result<ReferenceSnapshot> {
        let url = self.checksums_request_url(version, locale);
        let body = self
            .get(&url)
            .map_err(|details| IgdError::ReferenceUnavailable {
                version: version.to_string(),
                details,
            })?;
        ReferenceSnapshot::from_api_json(version, &String::from_utf8_lossy(&body))
    }

    fn original_file(&self, relative_path: &str, version: &str) -> Result<Vec<u8>> {
        let url = self.original_file_request_url(relative_path, version);
        let body = self
            .get(&url)
            .map_err(|details| IgdError::OriginalFileUnavailable {
                path: relative_path.to_string(),
                version: version.to_string(),
                details,
            })?;
        if body.is_empty() {
            return Err(IgdError::OriginalFileUnavailable {
                path: relative_path.to_string(),
                version: version.to_string(),
                details: "empty response".to_string(),
            });
        }
        Ok(body)
    }

    fn describe(&self) -> String {
        self.checksums_url.clone()
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_component(raw: &str) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(byte));
            }
            other => {
                let _ = write!(out, "%{other:02X}");
            }
        }
    }
    out
}
