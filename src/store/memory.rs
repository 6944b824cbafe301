//! In-process store for tests and embedding.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde_json::Value;

use crate::core::errors::Result;
use crate::store::KeyValueStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .namespaces
            .lock()
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn get_all(&self, namespace: &str) -> Result<BTreeMap<String, Value>> {
        Ok(self
            .namespaces
            .lock()
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    fn add(&self, namespace: &str, key: &str, value: Value) -> Result<bool> {
        let mut namespaces = self.namespaces.lock();
        let entries = namespaces.entry(namespace.to_string()).or_default();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value);
        Ok(true)
    }

    fn set(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        self.namespaces
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self
            .namespaces
            .lock()
            .get_mut(namespace)
            .is_some_and(|entries| entries.remove(key).is_some()))
    }

    fn clear(&self, namespace: &str) -> Result<usize> {
        Ok(self
            .namespaces
            .lock()
            .remove(namespace)
            .map_or(0, |entries| entries.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn behaves_like_a_namespaced_map() {
        let store = MemoryStore::new();
        assert!(store.add("a", "k", json!(1)).unwrap());
        assert!(!store.add("a", "k", json!(2)).unwrap());
        store.set("b", "k", json!(3)).unwrap();
        assert_eq!(store.get("a", "k").unwrap(), Some(json!(1)));
        assert_eq!(store.get_all("b").unwrap().len(), 1);
        assert!(store.delete("a", "k").unwrap());
        assert!(!store.delete("missing", "k").unwrap());
        assert_eq!(store.clear("b").unwrap(), 1);
        assert!(store.get_all("b").unwrap().is_empty());
    }
}
