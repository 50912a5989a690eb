//! In-Memory Configuration Source
//!
//! Code-defined entries, mostly for tests and embedding.

use super::provider::ConfigSource;
use super::{ConfigEntry, ConfigKey, ConfigScope};
use crate::Error;

#[derive(Clone, Debug)]
pub struct MemoryConfigSource {
    name: String,
    scope: ConfigScope,
    values: Vec<(String, String)>,
}

impl MemoryConfigSource {
    /// Create an empty source in the `local` layer
    pub fn new() -> Self {
        Self::scoped(ConfigScope::Local)
    }

    pub fn scoped(scope: ConfigScope) -> Self {
        Self {
            name: format!("memory ({})", scope),
            scope,
            values: Vec::new(),
        }
    }

    /// Add a `section[.subsection].name` value (builder pattern)
    pub fn value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.push((key.into(), value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for MemoryConfigSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConfigSource for MemoryConfigSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn entries(&self) -> crate::Result<Vec<ConfigEntry>> {
        self.values
            .iter()
            .map(|(key, value)| {
                let parsed = ConfigKey::parse(key).ok_or_else(|| Error::ConfigSource {
                    source_name: self.name.clone(),
                    message: format!("invalid key '{}'", key),
                })?;
                Ok(ConfigEntry::new(self.scope, parsed, value.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemoryConfigSource::scoped(ConfigScope::Global)
            .value("githooks.plugin", "CheckAcls")
            .value("githooks.admin", "root");
        assert_eq!(source.len(), 2);

        let entries = source.entries().await.unwrap();
        assert_eq!(entries[0].scope, ConfigScope::Global);
        assert_eq!(entries[1].key.name, "admin");
    }

    #[tokio::test]
    async fn test_invalid_key() {
        let source = MemoryConfigSource::new().value("nodot", "x");
        assert!(source.entries().await.is_err());
    }
}
