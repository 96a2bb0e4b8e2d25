use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Run-wide map of relationship keys to the identifier first generated for
/// them.
///
/// Keys have the form `{version}:{target_resource}:{field}`. Once a key has a
/// value every read returns that value until `clear` or an explicit `set`.
#[derive(Debug, Default)]
pub struct RelationshipCache {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl RelationshipCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(version: &str, resource: &str, field: &str) -> String {
        format!("{}:{}:{}", version, resource, field)
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.read().get(key).cloned()
    }

    /// Return the cached identifier, or store and return the one `make`
    /// produces.
    ///
    /// The existence check is repeated under the write lock, so concurrent
    /// first writers agree on a single winner.
    pub fn get_or_insert_with(&self, key: &str, make: impl FnOnce() -> serde_json::Value) -> serde_json::Value {
        if let Some(existing) = self.entries.read().get(key) {
            return existing.clone();
        }

        let mut entries = self.entries.write();
        entries
            .entry(key.to_string())
            .or_insert_with(|| {
                let value = make();
                debug!("Relationship {} bound to {}", key, value);
                value
            })
            .clone()
    }

    /// Explicitly bind a key, replacing any previous identifier
    pub fn set(&self, key: &str, value: serde_json::Value) {
        debug!("Relationship {} overridden with {}", key, value);
        self.entries.write().insert(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.write().remove(key)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of every binding, sorted by key
    pub fn snapshot(&self) -> Vec<(String, serde_json::Value)> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
