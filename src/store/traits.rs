use crate::error::ConfigurationError;
use crate::store::document::{parse_document, DocumentFormat};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

/// Where a configuration document comes from.
///
/// `fetch` returns the raw parsed document; structural validation happens in
/// the store so every source gets the same checks.
pub trait ProfileSource: Send + Sync {
    fn fetch(&self) -> Result<serde_json::Value, ConfigurationError>;

    /// Human readable origin used in errors and logs
    fn origin(&self) -> String;

    /// Whether fetching again can observe a different document
    fn supports_reload(&self) -> bool {
        true
    }
}

/// Reads a JSON or YAML file on every fetch
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    format: DocumentFormat,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = DocumentFormat::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileSource for FileSource {
    fn fetch(&self) -> Result<serde_json::Value, ConfigurationError> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| ConfigurationError::io_error(&self.path, e))?;
        parse_document(&text, self.format, &self.origin())
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory document that can be swapped out between reloads
#[derive(Debug)]
pub struct MemorySource {
    name: String,
    document: RwLock<serde_json::Value>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, document: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            document: RwLock::new(document),
        }
    }

    /// Replace the document; takes effect on the store's next reload
    pub fn set_document(&self, document: serde_json::Value) {
        *self.document.write() = document;
    }

    pub fn document(&self) -> serde_json::Value {
        self.document.read().clone()
    }
}

impl ProfileSource for MemorySource {
    fn fetch(&self) -> Result<serde_json::Value, ConfigurationError> {
        Ok(self.document.read().clone())
    }

    fn origin(&self) -> String {
        format!("memory:{}", self.name)
    }
}

/// A document fixed at construction; reloading it is pointless
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    document: serde_json::Value,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, document: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            document,
        }
    }
}

impl ProfileSource for StaticSource {
    fn fetch(&self) -> Result<serde_json::Value, ConfigurationError> {
        Ok(self.document.clone())
    }

    fn origin(&self) -> String {
        format!("static:{}", self.name)
    }

    fn supports_reload(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_source_swaps_document() {
        let source = MemorySource::new("unit", json!({"versions": {}}));
        assert_eq!(source.fetch().unwrap(), json!({"versions": {}}));
        assert!(source.supports_reload());

        source.set_document(json!({"versions": {"v1": {}}}));
        assert_eq!(source.fetch().unwrap(), json!({"versions": {"v1": {}}}));
        assert_eq!(source.origin(), "memory:unit");
    }

    #[test]
    fn test_static_source_does_not_reload() {
        let source = StaticSource::new("fixed", json!({}));
        assert!(!source.supports_reload());
    }

    #[test]
    fn test_file_source_missing_file_is_io_error() {
        let source = FileSource::new("/definitely/not/here/versions.yaml");
        assert!(matches!(source.fetch(), Err(ConfigurationError::Io { .. })));
    }
}
