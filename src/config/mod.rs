//! Layered git configuration.
//!
//! Hooks are configured through ordinary git configuration. Sources are read
//! once at start-up and merged into an immutable [`ResolvedConfig`]:
//!
//! ```rust,no_run
//! use githooks::config::{ConfigLoader, ConfigScope};
//!
//! # async fn example() -> githooks::Result<()> {
//! let config = ConfigLoader::new()
//!     .git()
//!     .load()
//!     .await?;
//!
//! for plugin in config.get_all("githooks", None, "plugin") {
//!     println!("enabled: {plugin}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod composite;
pub mod env;
pub mod file;
pub mod git;
pub mod memory;
pub mod provider;
pub mod resolved;
pub mod value;

pub use composite::ConfigLoader;
pub use env::EnvConfigSource;
pub use file::FileConfigSource;
pub use git::GitCommandSource;
pub use memory::MemoryConfigSource;
pub use provider::ConfigSource;
pub use resolved::{ConfigValue, ResolvedConfig};

use std::fmt;

/// Configuration layer, lowest precedence first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigScope {
    System,
    Global,
    Local,
    Worktree,
    /// `git -c` and `GIT_CONFIG_*` environment overrides.
    Command,
}

impl ConfigScope {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "global" => Some(Self::Global),
            "local" => Some(Self::Local),
            "worktree" => Some(Self::Worktree),
            "command" => Some(Self::Command),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Global => write!(f, "global"),
            Self::Local => write!(f, "local"),
            Self::Worktree => write!(f, "worktree"),
            Self::Command => write!(f, "command"),
        }
    }
}

/// A `section[.subsection].name` key.
///
/// Section and name are case-insensitive and stored lowercase; the
/// subsection keeps its case, as git does.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    pub section: String,
    pub subsection: Option<String>,
    pub name: String,
}

impl ConfigKey {
    pub fn new(section: &str, subsection: Option<&str>, name: &str) -> Self {
        Self {
            section: section.to_ascii_lowercase(),
            subsection: subsection.map(String::from),
            name: name.to_ascii_lowercase(),
        }
    }

    /// Split a dotted key. The subsection is everything between the first
    /// and the last dot, so it may itself contain dots.
    pub fn parse(key: &str) -> Option<Self> {
        let first = key.find('.')?;
        let last = key.rfind('.')?;
        let section = &key[..first];
        let name = &key[last + 1..];
        if section.is_empty() || name.is_empty() {
            return None;
        }
        let subsection = (first != last).then(|| &key[first + 1..last]);
        Some(Self::new(section, subsection, name))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subsection {
            Some(sub) => write!(f, "{}.{}.{}", self.section, sub, self.name),
            None => write!(f, "{}.{}", self.section, self.name),
        }
    }
}

/// One `key = value` occurrence read from a source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigEntry {
    pub scope: ConfigScope,
    pub key: ConfigKey,
    pub value: String,
}

impl ConfigEntry {
    pub fn new(scope: ConfigScope, key: ConfigKey, value: impl Into<String>) -> Self {
        Self {
            scope,
            key,
            value: value.into(),
        }
    }
}

/// Git's boolean spelling. A bare key is stored as `true`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" | "" => Some(false),
        _ => None,
    }
}

/// Git's integer spelling with optional `k`, `m` or `g` suffix.
pub fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();
    let (digits, factor) = match value.chars().last()?.to_ascii_lowercase() {
        'k' => (&value[..value.len() - 1], 1024),
        'm' => (&value[..value.len() - 1], 1024 * 1024),
        'g' => (&value[..value.len() - 1], 1024 * 1024 * 1024),
        _ => (value, 1),
    };
    digits.parse::<i64>().ok()?.checked_mul(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parse() {
        let key = ConfigKey::parse("githooks.plugin").unwrap();
        assert_eq!(key.section, "githooks");
        assert_eq!(key.subsection, None);
        assert_eq!(key.name, "plugin");

        let key = ConfigKey::parse("GitHooks.CheckAcls.ACL").unwrap();
        assert_eq!(key.section, "githooks");
        assert_eq!(key.subsection.as_deref(), Some("CheckAcls"));
        assert_eq!(key.name, "acl");

        let key = ConfigKey::parse("url.https://example.com/.insteadof").unwrap();
        assert_eq!(key.subsection.as_deref(), Some("https://example.com/"));
        assert_eq!(key.to_string(), "url.https://example.com/.insteadof");

        assert!(ConfigKey::parse("nodot").is_none());
        assert!(ConfigKey::parse(".name").is_none());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool(""), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("2k"), Some(2048));
        assert_eq!(parse_int("1M"), Some(1024 * 1024));
        assert_eq!(parse_int("x"), None);
    }

    #[test]
    fn test_scope_order() {
        assert!(ConfigScope::System < ConfigScope::Global);
        assert!(ConfigScope::Global < ConfigScope::Local);
        assert!(ConfigScope::Local < ConfigScope::Command);
        assert_eq!(ConfigScope::parse("worktree"), Some(ConfigScope::Worktree));
    }
}
