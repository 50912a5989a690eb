//! Configuration listed by the `git` binary.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use super::provider::ConfigSource;
use super::{ConfigEntry, ConfigKey, ConfigScope};
use crate::Error;

/// Runs `git config --null --list --show-scope` once.
///
/// Git already merges system, global, local, worktree and `-c`/environment
/// overrides; the scope column keeps the layering explicit.
#[derive(Clone, Debug)]
pub struct GitCommandSource {
    program: PathBuf,
    cwd: Option<PathBuf>,
}

impl GitCommandSource {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
            cwd: None,
        }
    }

    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::ConfigSource {
            source_name: self.name().to_string(),
            message: message.into(),
        }
    }
}

impl Default for GitCommandSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConfigSource for GitCommandSource {
    fn name(&self) -> &str {
        "git config"
    }

    async fn entries(&self) -> crate::Result<Vec<ConfigEntry>> {
        let mut command = Command::new(&self.program);
        command
            .args(["config", "--null", "--list", "--show-scope"])
            .stdin(Stdio::null());
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let output = command
            .output()
            .await
            .map_err(|e| self.error(format!("failed to run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            return Err(self.error(format!(
                "exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_listing(&output.stdout).map_err(|e| self.error(e))
    }
}

/// Parse `scope NUL key LF value NUL` records.
///
/// A key without a line feed has no value, which git treats as `true`.
pub fn parse_listing(bytes: &[u8]) -> Result<Vec<ConfigEntry>, String> {
    let text = String::from_utf8_lossy(bytes);
    let mut fields = text.split('\0').filter(|f| !f.is_empty());
    let mut entries = Vec::new();

    while let Some(scope) = fields.next() {
        let record = fields
            .next()
            .ok_or_else(|| format!("truncated record after scope '{}'", scope))?;
        let (key, value) = record.split_once('\n').unwrap_or((record, "true"));
        let key = ConfigKey::parse(key).ok_or_else(|| format!("invalid key '{}'", key))?;
        let scope = ConfigScope::parse(scope).unwrap_or_else(|| {
            tracing::debug!(scope, key = %key, "Unknown config scope, treating as command");
            ConfigScope::Command
        });
        entries.push(ConfigEntry::new(scope, key, value));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing() {
        let raw = b"system\0core.bare\nfalse\0global\0githooks.plugin\nCheckAcls\0local\0githooks.checkacls.acl\nadmin CRUD ^refs/\0command\0githooks.externals\0";
        let entries = parse_listing(raw).unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].scope, ConfigScope::System);
        assert_eq!(entries[1].key.to_string(), "githooks.plugin");
        assert_eq!(entries[1].value, "CheckAcls");
        assert_eq!(entries[2].key.subsection.as_deref(), Some("checkacls"));
        assert_eq!(entries[2].value, "admin CRUD ^refs/");
        assert_eq!(entries[3].scope, ConfigScope::Command);
        assert_eq!(entries[3].value, "true");
    }

    #[test]
    fn test_parse_listing_multiline_value() {
        let raw = b"local\0githooks.groups\nadmins = alice\nusers = @admins bob\0";
        let entries = parse_listing(raw).unwrap();
        assert_eq!(entries[0].value, "admins = alice\nusers = @admins bob");
    }

    #[test]
    fn test_parse_listing_truncated() {
        assert!(parse_listing(b"local\0").is_err());
        assert!(parse_listing(b"local\0nodot\nvalue\0").is_err());
    }

    #[tokio::test]
    async fn test_missing_git_binary_is_source_error() {
        let source = GitCommandSource::new().program("/nonexistent/git-binary");
        let err = source.entries().await.unwrap_err();
        assert!(matches!(err, Error::ConfigSource { .. }));
    }
}
