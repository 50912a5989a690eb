//! File-based configuration source
//!
//! Reads one git-config-format file as a single layer.

use std::path::{Path, PathBuf};

use super::provider::ConfigSource;
use super::{ConfigEntry, ConfigKey, ConfigScope};
use crate::Error;

#[derive(Clone, Debug)]
pub struct FileConfigSource {
    scope: ConfigScope,
    path: PathBuf,
    name: String,
}

impl FileConfigSource {
    pub fn new(scope: ConfigScope, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("{} ({})", scope, path.display()),
            scope,
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scope(&self) -> ConfigScope {
        self.scope
    }
}

#[async_trait::async_trait]
impl ConfigSource for FileConfigSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn entries(&self) -> crate::Result<Vec<ConfigEntry>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::ConfigSource {
                    source_name: self.name.clone(),
                    message: e.to_string(),
                });
            }
        };

        parse_config(&text, self.scope).map_err(|(line, reason)| Error::ConfigSource {
            source_name: self.name.clone(),
            message: format!("line {}: {}", line, reason),
        })
    }
}

type ParseError = (usize, String);

/// Parse git-config syntax. Errors carry the 1-based line number.
pub fn parse_config(text: &str, scope: ConfigScope) -> Result<Vec<ConfigEntry>, ParseError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut entries = Vec::new();
    let mut section: Option<(String, Option<String>)> = None;
    let mut i = 0;

    while i < lines.len() {
        let lineno = i + 1;
        let mut line = lines[i].trim_start();
        i += 1;

        if line.starts_with('[') {
            let (header, rest) = parse_header(line).map_err(|e| (lineno, e))?;
            section = Some(header);
            line = rest.trim_start();
        }

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        let Some((sect, sub)) = &section else {
            return Err((lineno, "key outside of any section".into()));
        };

        let name_len = line
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(line.len());
        let name = &line[..name_len];
        if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err((lineno, format!("invalid key name in '{}'", line)));
        }

        let rest = line[name_len..].trim_start();
        let value = if rest.is_empty() || rest.starts_with('#') || rest.starts_with(';') {
            "true".to_string()
        } else if let Some(raw) = rest.strip_prefix('=') {
            parse_value(raw, &lines, &mut i).map_err(|e| (lineno, e))?
        } else {
            return Err((lineno, format!("expected '=' after '{}'", name)));
        };

        entries.push(ConfigEntry::new(
            scope,
            ConfigKey::new(sect, sub.as_deref(), name),
            value,
        ));
    }

    Ok(entries)
}

/// `[section]`, `[section "subsection"]` or legacy `[section.subsection]`.
fn parse_header(line: &str) -> Result<((String, Option<String>), &str), String> {
    let body = &line[1..];

    if let Some(space) = body.find(|c: char| c.is_whitespace())
        && body[..space].find(']').is_none()
    {
        let section = &body[..space];
        let quoted = body[space..].trim_start();
        let Some(quoted) = quoted.strip_prefix('"') else {
            return Err(format!("expected quoted subsection in '{}'", line));
        };

        let mut sub = String::new();
        let mut chars = quoted.char_indices();
        while let Some((idx, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        sub.push(escaped);
                    }
                }
                '"' => {
                    let rest = quoted[idx + 1..].trim_start();
                    let Some(rest) = rest.strip_prefix(']') else {
                        return Err(format!("unterminated section header '{}'", line));
                    };
                    check_section_name(section)?;
                    return Ok(((section.to_ascii_lowercase(), Some(sub)), rest));
                }
                c => sub.push(c),
            }
        }
        return Err(format!("unterminated subsection in '{}'", line));
    }

    let Some(close) = body.find(']') else {
        return Err(format!("unterminated section header '{}'", line));
    };
    let name = &body[..close];
    let rest = &body[close + 1..];
    match name.split_once('.') {
        Some((section, sub)) => {
            check_section_name(section)?;
            Ok((
                (section.to_ascii_lowercase(), Some(sub.to_ascii_lowercase())),
                rest,
            ))
        }
        None => {
            check_section_name(name)?;
            Ok(((name.to_ascii_lowercase(), None), rest))
        }
    }
}

fn check_section_name(name: &str) -> Result<(), String> {
    if !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        Ok(())
    } else {
        Err(format!("invalid section name '{}'", name))
    }
}

/// Parse a value, following backslash-newline continuations into later lines.
fn parse_value(first: &str, lines: &[&str], next_line: &mut usize) -> Result<String, String> {
    let mut out = String::new();
    let mut pending_ws = String::new();
    let mut in_quote = false;
    let mut current = first;

    loop {
        let mut chars = current.chars();
        let mut continued = false;

        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    let escaped = match chars.next() {
                        None => {
                            continued = true;
                            break;
                        }
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('b') => '\u{8}',
                        Some(c @ ('"' | '\\')) => c,
                        Some(other) => return Err(format!("invalid escape '\\{}'", other)),
                    };
                    out.push_str(&pending_ws);
                    pending_ws.clear();
                    out.push(escaped);
                }
                '"' => {
                    out.push_str(&pending_ws);
                    pending_ws.clear();
                    in_quote = !in_quote;
                }
                '#' | ';' if !in_quote => break,
                c if c.is_whitespace() && !in_quote => {
                    if !out.is_empty() {
                        pending_ws.push(c);
                    }
                }
                c => {
                    out.push_str(&pending_ws);
                    pending_ws.clear();
                    out.push(c);
                }
            }
        }

        if !continued {
            break;
        }
        let Some(line) = lines.get(*next_line) else {
            break;
        };
        *next_line += 1;
        current = line;
    }

    if in_quote {
        return Err("unterminated quoted value".into());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(text: &str) -> Vec<(String, String)> {
        parse_config(text, ConfigScope::Local)
            .unwrap()
            .into_iter()
            .map(|e| (e.key.to_string(), e.value))
            .collect()
    }

    #[test]
    fn test_sections_and_values() {
        let entries = parse(
            r#"
# comment
[githooks]
    plugin = CheckAcls
    plugin = CheckLog   ; trailing comment
    externals
[githooks "checkacls"]
    acl = "admin CRUD ^refs/"
    acl = @devs U refs/heads/{USER}
[GitHooks.Gerrit]
    comment-ok = "looks good"
"#,
        );

        assert_eq!(
            entries,
            vec![
                ("githooks.plugin".into(), "CheckAcls".into()),
                ("githooks.plugin".into(), "CheckLog".into()),
                ("githooks.externals".into(), "true".into()),
                ("githooks.checkacls.acl".into(), "admin CRUD ^refs/".into()),
                (
                    "githooks.checkacls.acl".into(),
                    "@devs U refs/heads/{USER}".into()
                ),
                ("githooks.gerrit.comment-ok".into(), "looks good".into()),
            ]
        );
    }

    #[test]
    fn test_subsection_keeps_case() {
        let entries = parse_config("[branch \"Feature\"]\nremote = origin\n", ConfigScope::Local)
            .unwrap();
        assert_eq!(entries[0].key.subsection.as_deref(), Some("Feature"));
    }

    #[test]
    fn test_escapes_and_continuation() {
        let entries = parse(
            "[githooks]\n\tgroups = \"admins = alice\\nusers = @admins bob\"\n\thelp-on-error = first \\\n  second\n",
        );
        assert_eq!(entries[0].1, "admins = alice\nusers = @admins bob");
        assert_eq!(entries[1].1, "first   second");
    }

    #[test]
    fn test_empty_value() {
        let entries = parse("[githooks]\n  abort-commit =\n");
        assert_eq!(entries[0].1, "");
    }

    #[test]
    fn test_syntax_errors_carry_line() {
        assert_eq!(
            parse_config("key = value\n", ConfigScope::Local)
                .unwrap_err()
                .0,
            1
        );
        assert_eq!(
            parse_config("[ok]\n\n[broken\n", ConfigScope::Local)
                .unwrap_err()
                .0,
            3
        );
        assert!(parse_config("[s]\nk = \"open\n", ConfigScope::Local).is_err());
        assert!(parse_config("[s]\nk v\n", ConfigScope::Local).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let source = FileConfigSource::new(ConfigScope::Global, dir.path().join("nope"));
        assert!(source.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_source_error() {
        let dir = tempdir().unwrap();
        // A directory cannot be read as a file.
        let source = FileConfigSource::new(ConfigScope::Local, dir.path());
        let err = source.entries().await.unwrap_err();
        assert!(matches!(err, Error::ConfigSource { .. }));
    }

    #[tokio::test]
    async fn test_file_source_scope() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, "[githooks]\nadmin = root\n").unwrap();

        let source = FileConfigSource::new(ConfigScope::Local, &path);
        let entries = source.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].scope, ConfigScope::Local);
        assert!(source.name().contains("local"));
    }
}
