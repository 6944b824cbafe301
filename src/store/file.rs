//! JSON-file backend: one `<namespace>.json` object per namespace.
//!
//! Every mutation rewrites the namespace file through a temp file and an
//! atomic rename, so readers never see a half-written document.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;

use crate::core::errors::{IgdError, Result};
use crate::store::KeyValueStore;

#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the document for `namespace`.
    pub fn namespace_path(&self, namespace: &str) -> Result<PathBuf> {
        let valid = !namespace.is_empty()
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(IgdError::Store {
                context: "namespace",
                details: format!("invalid namespace {namespace:?}"),
            });
        }
        Ok(self.dir.join(format!("{namespace}.json")))
    }

    fn load(&self, namespace: &str) -> Result<BTreeMap<String, Value>> {
        let path = self.namespace_path(namespace)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => return Err(IgdError::Io { path, source }),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|error| IgdError::Store {
            context: "load",
            details: format!("failed to parse {}: {error}", path.display()),
        })
    }

    fn persist(&self, namespace: &str, entries: &BTreeMap<String, Value>) -> Result<()> {
        let path = self.namespace_path(namespace)?;
        fs::create_dir_all(&self.dir).map_err(|source| IgdError::io(&self.dir, source))?;

        let tmp_path = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(entries)?;
        fs::write(&tmp_path, data).map_err(|source| IgdError::io(&tmp_path, source))?;
        fs::rename(&tmp_path, &path).map_err(|source| IgdError::io(&path, source))?;
        Ok(())
    }

    fn mutate<T>(
        &self,
        namespace: &str,
        apply: impl FnOnce(&mut BTreeMap<String, Value>) -> (T, bool),
    ) -> Result<T> {
        let _guard = self.write_lock.lock();
        let mut entries = self.load(namespace)?;
        let (out, changed) = apply(&mut entries);
        if changed {
            self.persist(namespace, &entries)?;
        }
        Ok(out)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>> {
        Ok(self.load(namespace)?.remove(key))
    }

    fn get_all(&self, namespace: &str) -> Result<BTreeMap<String, Value>> {
        self.load(namespace)
    }

    fn add(&self, namespace: &str, key: &str, value: Value) -> Result<bool> {
        self.mutate(namespace, |entries| {
            if entries.contains_key(key) {
                (false, false)
            } else {
                entries.insert(key.to_string(), value);
                (true, true)
            }
        })
    }

    fn set(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        self.mutate(namespace, |entries| {
            entries.insert(key.to_string(), value);
            ((), true)
        })
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        self.mutate(namespace, |entries| {
            let removed = entries.remove(key).is_some();
            (removed, removed)
        })
    }

    fn clear(&self, namespace: &str) -> Result<usize> {
        self.mutate(namespace, |entries| {
            let count = entries.len();
            entries.clear();
            (count, count > 0)
        })
    }
}
