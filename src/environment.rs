//! Process environment captured once per invocation.
//!
//! Hooks read the environment for identity, per-plugin disable flags and
//! ref-spec placeholders. Everything goes through an [`EnvSnapshot`] taken at
//! start-up so evaluation never depends on later mutation of the process
//! environment and tests can supply their own variables.

use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment. Non-UTF-8 entries are skipped.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// A plugin is switched off for this invocation when its variable is `0`.
    pub fn disables(&self, plugin: &str) -> bool {
        self.get(plugin).is_some_and(|v| v.trim() == "0")
    }

    /// Replace every `{NAME}` with the value of `NAME`.
    ///
    /// Returns `None` as soon as one referenced variable is undefined. Braces
    /// that do not enclose a plain identifier are kept verbatim, so regex
    /// quantifiers like `{2,3}` survive. `escape` is applied to substituted
    /// values only.
    pub fn interpolate(&self, template: &str, escape: impl Fn(&str) -> String) -> Option<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_identifier(&after[..close]) => {
                    let value = self.get(&after[..close])?;
                    out.push_str(&escape(value));
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Some(out)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disables_only_on_zero() {
        let env: EnvSnapshot = [("CheckAcls", "0"), ("CheckLog", "1")].into_iter().collect();
        assert!(env.disables("CheckAcls"));
        assert!(!env.disables("CheckLog"));
        assert!(!env.disables("CheckJira"));
    }

    #[test]
    fn test_interpolate() {
        let env = EnvSnapshot::empty().with_var("VAR", "master");
        assert_eq!(
            env.interpolate("refs/heads/{VAR}", str::to_string),
            Some("refs/heads/master".into())
        );
        assert_eq!(env.interpolate("refs/heads/{NOPE}", str::to_string), None);
        assert_eq!(
            env.interpolate("^refs/tags/v\\d{2}", str::to_string),
            Some("^refs/tags/v\\d{2}".into())
        );
    }

    #[test]
    fn test_interpolate_escapes_values() {
        let env = EnvSnapshot::empty().with_var("USER", "a.b");
        assert_eq!(
            env.interpolate("^refs/heads/{USER}/", |v| regex::escape(v)),
            Some("^refs/heads/a\\.b/".into())
        );
    }
}
