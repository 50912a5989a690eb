//! Composite configuration loading
//!
//! Reads every source once and merges them into a [`ResolvedConfig`].
//! Precedence comes from each entry's [`ConfigScope`], not from the order
//! sources were added.

use std::path::{Path, PathBuf};

use super::env::EnvConfigSource;
use super::file::FileConfigSource;
use super::git::GitCommandSource;
use super::memory::MemoryConfigSource;
use super::provider::ConfigSource;
use super::{ConfigScope, ResolvedConfig};
use crate::environment::EnvSnapshot;

pub struct ConfigLoader {
    sources: Vec<Box<dyn ConfigSource>>,
    env: Option<EnvSnapshot>,
    base_dir: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            env: None,
            base_dir: None,
        }
    }

    /// Environment used for `eval:` values and for locating the standard
    /// files. Defaults to the process environment.
    pub fn with_env(mut self, env: EnvSnapshot) -> Self {
        self.env = Some(env);
        self
    }

    /// Directory relative `file:` values resolve against.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Add the `git config --list` source
    pub fn git(mut self) -> Self {
        self.sources.push(Box::new(GitCommandSource::new()));
        self
    }

    /// Add a single file as one layer
    pub fn file(mut self, scope: ConfigScope, path: impl AsRef<Path>) -> Self {
        self.sources.push(Box::new(FileConfigSource::new(
            scope,
            path.as_ref().to_path_buf(),
        )));
        self
    }

    /// Add git's `GIT_CONFIG_COUNT` environment overrides
    pub fn env(mut self) -> Self {
        let env = self.env_snapshot();
        self.sources.push(Box::new(EnvConfigSource::new(env)));
        self
    }

    /// Add the system, global and repository files git itself would read,
    /// without running git.
    pub fn standard_files(mut self, git_dir: impl AsRef<Path>) -> Self {
        let env = self.env_snapshot();

        if env.get("GIT_CONFIG_NOSYSTEM").is_none_or(|v| v != "1" && v != "true") {
            let system = env
                .get("GIT_CONFIG_SYSTEM")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/etc/gitconfig"));
            self = self.file(ConfigScope::System, system);
        }

        match env.get("GIT_CONFIG_GLOBAL") {
            Some(global) => self = self.file(ConfigScope::Global, global),
            None => {
                let xdg = env
                    .get("XDG_CONFIG_HOME")
                    .map(PathBuf::from)
                    .or_else(|| home_dir().map(|h| h.join(".config")));
                if let Some(xdg) = xdg {
                    self = self.file(ConfigScope::Global, xdg.join("git").join("config"));
                }
                if let Some(home) = home_dir() {
                    self = self.file(ConfigScope::Global, home.join(".gitconfig"));
                }
            }
        }

        self.file(ConfigScope::Local, git_dir.as_ref().join("config"))
    }

    /// Add an in-memory source
    pub fn memory(mut self, source: MemoryConfigSource) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Add a custom source
    pub fn source(mut self, source: Box<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    fn env_snapshot(&self) -> EnvSnapshot {
        self.env.clone().unwrap_or_else(EnvSnapshot::from_process)
    }

    /// Read every source and merge.
    ///
    /// Fails on the first unreadable source; no partial configuration is
    /// returned.
    pub async fn load(self) -> crate::Result<ResolvedConfig> {
        let env = self.env_snapshot();
        let base_dir = self.base_dir.unwrap_or_else(|| PathBuf::from("."));

        let mut entries = Vec::new();
        for source in &self.sources {
            let loaded = source.entries().await?;
            tracing::debug!(source = source.name(), entries = loaded.len(), "Loaded config source");
            entries.extend(loaded);
        }

        Ok(ResolvedConfig::from_entries(entries, env, base_dir))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("source_names", &self.source_names())
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_layer_precedence_ignores_source_order() {
        let local = MemoryConfigSource::scoped(ConfigScope::Local)
            .value("githooks.userenv", "GL_USER")
            .value("githooks.plugin", "CheckLog");
        let system = MemoryConfigSource::scoped(ConfigScope::System)
            .value("githooks.userenv", "USER")
            .value("githooks.plugin", "CheckAcls");

        let config = ConfigLoader::new()
            .with_env(EnvSnapshot::empty())
            .memory(local)
            .memory(system)
            .load()
            .await
            .unwrap();

        assert_eq!(config.get("githooks", None, "userenv"), Some("GL_USER"));
        assert_eq!(
            config.get_all("githooks", None, "plugin"),
            ["CheckAcls", "CheckLog"]
        );
    }

    #[tokio::test]
    async fn test_standard_files() {
        let dir = tempdir().unwrap();
        let git_dir = dir.path().join("repo.git");
        std::fs::create_dir_all(&git_dir).unwrap();
        std::fs::write(dir.path().join("system"), "[githooks]\nplugin = CheckAcls\n").unwrap();
        std::fs::write(dir.path().join("global"), "[githooks]\nadmin = root\n").unwrap();
        std::fs::write(
            git_dir.join("config"),
            "[githooks]\nplugin = CheckLog\nadmin = alice\n",
        )
        .unwrap();

        let env: EnvSnapshot = [
            ("GIT_CONFIG_SYSTEM", dir.path().join("system").display().to_string()),
            ("GIT_CONFIG_GLOBAL", dir.path().join("global").display().to_string()),
            ("GIT_CONFIG_COUNT", "1".to_string()),
            ("GIT_CONFIG_KEY_0", "githooks.admin".to_string()),
            ("GIT_CONFIG_VALUE_0", "override".to_string()),
        ]
        .into_iter()
        .collect();

        let config = ConfigLoader::new()
            .with_env(env)
            .standard_files(&git_dir)
            .env()
            .load()
            .await
            .unwrap();

        assert_eq!(
            config.get_all("githooks", None, "plugin"),
            ["CheckAcls", "CheckLog"]
        );
        assert_eq!(
            config.get_all("githooks", None, "admin"),
            ["root", "alice", "override"]
        );
        assert_eq!(config.get("githooks", None, "admin"), Some("override"));
    }

    #[tokio::test]
    async fn test_nosystem() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("system"), "[githooks]\nplugin = CheckAcls\n").unwrap();

        let env: EnvSnapshot = [
            ("GIT_CONFIG_SYSTEM", dir.path().join("system").display().to_string()),
            ("GIT_CONFIG_GLOBAL", dir.path().join("none").display().to_string()),
            ("GIT_CONFIG_NOSYSTEM", "1".to_string()),
        ]
        .into_iter()
        .collect();

        let config = ConfigLoader::new()
            .with_env(env)
            .standard_files(dir.path())
            .load()
            .await
            .unwrap();
        assert!(config.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_source_fails_load() {
        let dir = tempdir().unwrap();
        let result = ConfigLoader::new()
            .with_env(EnvSnapshot::empty())
            .file(ConfigScope::Local, dir.path())
            .load()
            .await;
        assert!(matches!(result, Err(crate::Error::ConfigSource { .. })));
    }
}
