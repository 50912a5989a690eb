//! Environment Variable Configuration Source
//!
//! Git's own override protocol: `GIT_CONFIG_COUNT=<n>` followed by
//! `GIT_CONFIG_KEY_<i>` / `GIT_CONFIG_VALUE_<i>` pairs. Only needed when the
//! files are read directly; `git config --list` already includes them.

use super::provider::ConfigSource;
use super::{ConfigEntry, ConfigKey, ConfigScope};
use crate::Error;
use crate::environment::EnvSnapshot;

#[derive(Clone, Debug)]
pub struct EnvConfigSource {
    env: EnvSnapshot,
}

impl EnvConfigSource {
    pub fn new(env: EnvSnapshot) -> Self {
        Self { env }
    }

    fn error(&self, message: String) -> Error {
        Error::ConfigSource {
            source_name: self.name().to_string(),
            message,
        }
    }
}

#[async_trait::async_trait]
impl ConfigSource for EnvConfigSource {
    fn name(&self) -> &str {
        "environment"
    }

    async fn entries(&self) -> crate::Result<Vec<ConfigEntry>> {
        let Some(count) = self.env.get("GIT_CONFIG_COUNT") else {
            return Ok(Vec::new());
        };
        let count: usize = count
            .trim()
            .parse()
            .map_err(|_| self.error(format!("bogus GIT_CONFIG_COUNT '{}'", count)))?;

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let key_var = format!("GIT_CONFIG_KEY_{}", i);
            let value_var = format!("GIT_CONFIG_VALUE_{}", i);

            let key = self
                .env
                .get(&key_var)
                .ok_or_else(|| self.error(format!("missing {}", key_var)))?;
            let value = self
                .env
                .get(&value_var)
                .ok_or_else(|| self.error(format!("missing {}", value_var)))?;
            let parsed = ConfigKey::parse(key)
                .ok_or_else(|| self.error(format!("invalid key '{}' in {}", key, key_var)))?;

            entries.push(ConfigEntry::new(ConfigScope::Command, parsed, value));
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_env_overrides() {
        let env: EnvSnapshot = [
            ("GIT_CONFIG_COUNT", "2"),
            ("GIT_CONFIG_KEY_0", "githooks.externals"),
            ("GIT_CONFIG_VALUE_0", "false"),
            ("GIT_CONFIG_KEY_1", "githooks.plugin"),
            ("GIT_CONFIG_VALUE_1", "CheckAcls"),
        ]
        .into_iter()
        .collect();

        let entries = EnvConfigSource::new(env).entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.scope == ConfigScope::Command));
        assert_eq!(entries[1].value, "CheckAcls");
    }

    #[tokio::test]
    async fn test_no_count_means_no_entries() {
        let entries = EnvConfigSource::new(EnvSnapshot::empty())
            .entries()
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_missing_pair_is_source_error() {
        let env: EnvSnapshot = [("GIT_CONFIG_COUNT", "1"), ("GIT_CONFIG_KEY_0", "a.b")]
            .into_iter()
            .collect();
        let err = EnvConfigSource::new(env).entries().await.unwrap_err();
        assert!(err.to_string().contains("GIT_CONFIG_VALUE_0"));
    }
}
