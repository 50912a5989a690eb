//! The merged, read-only configuration view.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{ConfigEntry, ConfigKey, parse_bool, parse_int, value};
use crate::environment::EnvSnapshot;

/// Value of a key as seen through [`ResolvedConfig::lookup`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigValue<'a> {
    Single(&'a str),
    List(&'a [String]),
}

impl<'a> ConfigValue<'a> {
    /// The effective scalar: the last value written.
    pub fn last(&self) -> &'a str {
        match self {
            Self::Single(v) => v,
            Self::List(values) => values.last().map(String::as_str).unwrap_or_default(),
        }
    }
}

/// Configuration merged from every layer.
///
/// Each key keeps every value in load order, so list-valued keys accumulate
/// across layers while scalar reads see the last write. Keys are listed in
/// first-definition order.
#[derive(Clone, Debug, Default)]
pub struct ResolvedConfig {
    entries: Vec<(ConfigKey, Vec<String>)>,
    index: HashMap<ConfigKey, usize>,
    env: EnvSnapshot,
    base_dir: PathBuf,
}

impl ResolvedConfig {
    /// Merge entries; layers are ordered by scope, and the sort is stable so
    /// definition order within a layer is kept.
    pub fn from_entries(
        entries: impl IntoIterator<Item = ConfigEntry>,
        env: EnvSnapshot,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        let mut entries: Vec<ConfigEntry> = entries.into_iter().collect();
        entries.sort_by_key(|e| e.scope);

        let mut config = Self {
            entries: Vec::new(),
            index: HashMap::new(),
            env,
            base_dir: base_dir.into(),
        };
        for entry in entries {
            config.push(entry.key, entry.value);
        }
        config
    }

    fn push(&mut self, key: ConfigKey, value: String) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1.push(value),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, vec![value]));
            }
        }
    }

    fn values(&self, section: &str, subsection: Option<&str>, name: &str) -> Option<&[String]> {
        let key = ConfigKey::new(section, subsection, name);
        self.index.get(&key).map(|&i| self.entries[i].1.as_slice())
    }

    /// Last value of the key.
    pub fn get(&self, section: &str, subsection: Option<&str>, name: &str) -> Option<&str> {
        self.values(section, subsection, name)
            .and_then(|v| v.last())
            .map(String::as_str)
    }

    /// Every value of the key in load order; empty when absent.
    pub fn get_all(&self, section: &str, subsection: Option<&str>, name: &str) -> &[String] {
        self.values(section, subsection, name).unwrap_or_default()
    }

    pub fn lookup(
        &self,
        section: &str,
        subsection: Option<&str>,
        name: &str,
    ) -> Option<ConfigValue<'_>> {
        self.values(section, subsection, name).map(|values| match values {
            [single] => ConfigValue::Single(single),
            many => ConfigValue::List(many),
        })
    }

    pub fn contains(&self, section: &str, subsection: Option<&str>, name: &str) -> bool {
        self.values(section, subsection, name).is_some()
    }

    /// Boolean in git spelling. Unparseable values are ignored with a warning.
    pub fn get_bool(&self, section: &str, subsection: Option<&str>, name: &str) -> Option<bool> {
        let raw = self.get(section, subsection, name)?;
        let parsed = parse_bool(raw);
        if parsed.is_none() {
            tracing::warn!(
                key = %ConfigKey::new(section, subsection, name),
                value = raw,
                "Ignoring invalid boolean"
            );
        }
        parsed
    }

    pub fn get_int(&self, section: &str, subsection: Option<&str>, name: &str) -> Option<i64> {
        let raw = self.get(section, subsection, name)?;
        let parsed = parse_int(raw);
        if parsed.is_none() {
            tracing::warn!(
                key = %ConfigKey::new(section, subsection, name),
                value = raw,
                "Ignoring invalid integer"
            );
        }
        parsed
    }

    /// Apply the `eval:` / `file:` transforms to a raw value.
    pub fn evaluate(&self, raw: &str) -> crate::Result<String> {
        value::transform(raw, &self.env, &self.base_dir)
    }

    /// Last value of the key with transforms applied.
    pub fn get_evaluated(
        &self,
        section: &str,
        subsection: Option<&str>,
        name: &str,
    ) -> crate::Result<Option<String>> {
        self.get(section, subsection, name)
            .map(|raw| self.evaluate(raw))
            .transpose()
    }

    /// Every value of the key with transforms applied; the first failure wins.
    pub fn get_all_evaluated(
        &self,
        section: &str,
        subsection: Option<&str>,
        name: &str,
    ) -> crate::Result<Vec<String>> {
        self.get_all(section, subsection, name)
            .iter()
            .map(|raw| self.evaluate(raw))
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ConfigKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}
