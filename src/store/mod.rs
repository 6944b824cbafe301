//! Namespaced key-value persistence for scanner state and suppressions.

#![allow(missing_docs)]

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod suppression;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::core::config::{Config, StoreBackend};
use crate::core::errors::Result;

/// Namespace holding scanner bookkeeping (`runtime`).
pub const SCANNER_NAMESPACE: &str = "scanner";
/// Namespace holding suppression records.
pub const SUPPRESSION_NAMESPACE: &str = "integrity";

/// Opaque-string keyed store of JSON values, partitioned by namespace.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>>;

    fn get_all(&self, namespace: &str) -> Result<BTreeMap<String, Value>>;

    /// Insert `value` unless `key` already exists. Returns whether it was inserted.
    fn add(&self, namespace: &str, key: &str, value: Value) -> Result<bool>;

    /// Insert or overwrite.
    fn set(&self, namespace: &str, key: &str, value: Value) -> Result<()>;

    /// Returns whether the key existed.
    fn delete(&self, namespace: &str, key: &str) -> Result<bool>;

    /// Remove every key in `namespace`, returning how many were removed.
    fn clear(&self, namespace: &str) -> Result<usize>;
}

/// Open the backend selected by `paths.store_backend`.
pub fn open_store(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    match config.paths.store_backend {
        StoreBackend::File => Ok(Arc::new(file::JsonFileStore::new(
            config.paths.state_dir.clone(),
        ))),
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite => Ok(Arc::new(sqlite::SqliteStore::open(
            &config.paths.sqlite_db,
        )?)),
        #[cfg(not(feature = "sqlite"))]
        StoreBackend::Sqlite => Err(crate::core::errors::IgdError::InvalidConfig {
            details: "paths.store_backend = \"sqlite\" requires the `sqlite` feature".to_string(),
        }),
    }
}
