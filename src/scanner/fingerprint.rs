//! Content fingerprints: streamed checksum plus size and timestamps per file.

#![allow(missing_docs)]

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::SystemTime;

use crossbeam_channel as channel;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::errors::{IgdError, Result};

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Checksum algorithm used for both local files and the reference snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl ChecksumAlgorithm {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }

    /// Lowercase hex digest of everything `reader` yields.
    pub fn digest_reader<R: Read>(self, reader: R) -> io::Result<String> {
        match self {
            Self::Md5 => stream_digest::<Md5, R>(reader),
            Self::Sha256 => stream_digest::<Sha256, R>(reader),
        }
    }

    #[must_use]
    pub fn digest_bytes(self, bytes: &[u8]) -> String {
        match self {
            Self::Md5 => hex_encode(&Md5::digest(bytes)),
            Self::Sha256 => hex_encode(&Sha256::digest(bytes)),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(format!("unknown checksum algorithm {other:?} (expected md5|sha256)")),
        }
    }
}

fn stream_digest<D: Digest, R: Read>(reader: R) -> io::Result<String> {
    let mut reader = BufReader::with_capacity(READ_CHUNK_BYTES, reader);
    let mut hasher = D::new();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buf[..read]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        })
}

/// Fingerprint of one local file. Ephemeral, recomputed every scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub relative_path: String,
    pub checksum: String,
    pub size_bytes: u64,
    /// Birth time, where the filesystem records one.
    pub created_at: Option<SystemTime>,
    pub modified_at: SystemTime,
}

/// A file that could not be fingerprinted.
#[derive(Debug)]
pub struct FingerprintFailure {
    pub relative_path: String,
    pub error: IgdError,
}

/// Records sorted by path plus the files that failed.
#[derive(Debug, Default)]
pub struct FingerprintBatch {
    pub records: Vec<FileRecord>,
    pub failures: Vec<FingerprintFailure>,
}

/// Computes [`FileRecord`]s for paths relative to an install root.
#[derive(Debug, Clone)]
pub struct FingerprintComputer {
    root: PathBuf,
    algorithm: ChecksumAlgorithm,
    parallelism: usize,
}

impl FingerprintComputer {
    pub fn new(root: impl Into<PathBuf>, algorithm: ChecksumAlgorithm) -> Self {
        Self {
            root: root.into(),
            algorithm,
            parallelism: 1,
        }
    }

    #[must_use]
    pub fn with_parallelism(mut self, workers: usize) -> Self {
        self.parallelism = workers.max(1);
        self
    }

    #[must_use]
    pub const fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Fingerprint every path. Unreadable files land in `failures`; order of
    /// `records` is always by path regardless of worker count.
    #[must_use]
    pub fn fingerprint(&self, paths: &[String]) -> FingerprintBatch {
        let results = if self.parallelism <= 1 || paths.len() < 2 {
            paths
                .iter()
                .map(|rel| (rel.clone(), self.fingerprint_relative(rel)))
                .collect()
        } else {
            self.fingerprint_parallel(paths)
        };

        let mut batch = FingerprintBatch::default();
        for (relative_path, result) in results {
            match result {
                Ok(record) => batch.records.push(record),
                Err(error) => batch.failures.push(FingerprintFailure {
                    relative_path,
                    error,
                }),
            }
        }
        batch
            .records
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        batch
            .failures
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        batch
    }

    /// Fingerprint `relative` found at `<root>/<relative>`.
    pub fn fingerprint_relative(&self, relative: &str) -> Result<FileRecord> {
        self.fingerprint_at(relative, &self.root.join(relative))
    }

    /// Fingerprint a file found at an explicit location (e.g. through the
    /// content-directory remap) while recording it under `relative`.
    pub fn fingerprint_at(&self, relative: &str, absolute: &Path) -> Result<FileRecord> {
        let read_failure = |err: io::Error| IgdError::FileRead {
            path: absolute.to_path_buf(),
            details: err.to_string(),
        };

        let meta = fs::metadata(absolute).map_err(read_failure)?;
        if !meta.is_file() {
            return Err(IgdError::FileRead {
                path: absolute.to_path_buf(),
                details: "not a regular file".to_string(),
            });
        }
        let file = File::open(absolute).map_err(read_failure)?;
        let checksum = self.algorithm.digest_reader(file).map_err(read_failure)?;

        Ok(FileRecord {
            relative_path: relative.to_string(),
            checksum,
            size_bytes: meta.len(),
            created_at: meta.created().ok(),
            modified_at: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        })
    }

    fn fingerprint_parallel(&self, paths: &[String]) -> Vec<(String, Result<FileRecord>)> {
        let workers = self.parallelism.min(paths.len());
        let (work_tx, work_rx) = channel::bounded::<&String>(workers * 4);
        let (result_tx, result_rx) = channel::unbounded::<(String, Result<FileRecord>)>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for rel in work_rx {
                        let outcome = self.fingerprint_relative(rel);
                        if result_tx.send((rel.clone(), outcome)).is_err() {
                            return;
                        }
                    }
                });
            }
            drop(work_rx);
            drop(result_tx);

            for rel in paths {
                if work_tx.send(rel).is_err() {
                    break;
                }
            }
            drop(work_tx);

            result_rx.iter().collect()
        })
    }
}
