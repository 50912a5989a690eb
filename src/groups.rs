//! Group definitions.
//!
//! ```text
//! # comment
//! admins = alice bob
//! devs   = carol @admins
//! ```
//!
//! A group may only reference groups defined on earlier lines, so the table
//! is flattened in a single pass and cannot contain cycles.

use std::collections::{BTreeMap, BTreeSet};

use crate::Error;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupTable {
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse definitions into flattened member sets.
    pub fn parse(text: &str) -> crate::Result<Self> {
        let mut table = Self::new();

        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let err = |reason: String| Error::GroupDefinition {
                line: i + 1,
                reason,
            };

            let Some((name, tokens)) = line.split_once('=') else {
                return Err(err(format!("expected 'name = members' in '{}'", line)));
            };
            let name = name.trim();
            let name = name.strip_prefix('@').unwrap_or(name);
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(err(format!("invalid group name '{}'", name)));
            }
            if table.groups.contains_key(name) {
                return Err(err(format!("group '{}' is defined twice", name)));
            }

            let mut members = BTreeSet::new();
            for token in tokens.split_whitespace() {
                match token.strip_prefix('@') {
                    Some(nested) => {
                        let Some(nested_members) = table.groups.get(nested) else {
                            return Err(err(format!(
                                "group '{}' references undefined group '@{}'",
                                name, nested
                            )));
                        };
                        members.extend(nested_members.iter().cloned());
                    }
                    None => {
                        members.insert(token.to_string());
                    }
                }
            }

            table.groups.insert(name.to_string(), members);
        }

        Ok(table)
    }

    /// Membership in a flattened group. A leading `@` on the group name is
    /// accepted. Unknown groups have no members.
    pub fn is_member(&self, identity: &str, group: &str) -> bool {
        let group = group.strip_prefix('@').unwrap_or(group);
        self.groups
            .get(group)
            .is_some_and(|members| members.contains(identity))
    }

    pub fn members(&self, group: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(group.strip_prefix('@').unwrap_or(group))
    }

    pub fn contains_group(&self, group: &str) -> bool {
        self.members(group).is_some()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_membership() {
        let table = GroupTable::parse("admins1 = admin\nadmins = @admins1\n").unwrap();
        assert!(table.is_member("admin", "admins"));
        assert!(table.is_member("admin", "@admins1"));
        assert!(!table.is_member("other", "admins"));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let table = GroupTable::parse(
            "# staff\n\n  admins = alice bob  \n\n# devs include admins\ndevs = carol @admins\n",
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        let devs: Vec<&str> = table
            .members("devs")
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(devs, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_empty_group() {
        let table = GroupTable::parse("nobody =\n").unwrap();
        assert!(table.contains_group("nobody"));
        assert!(!table.is_member("alice", "nobody"));
    }

    #[test]
    fn test_forward_reference_is_error() {
        let err = GroupTable::parse("devs = @admins\nadmins = alice\n").unwrap_err();
        match err {
            Error::GroupDefinition { line, reason } => {
                assert_eq!(line, 1);
                assert!(reason.contains("@admins"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_is_error() {
        let err = GroupTable::parse("a = x\n\nb = y\na = z\n").unwrap_err();
        assert!(matches!(err, Error::GroupDefinition { line: 4, .. }));
    }

    #[test]
    fn test_malformed_lines() {
        assert!(GroupTable::parse("just words\n").is_err());
        assert!(GroupTable::parse(" = alice\n").is_err());
        assert!(GroupTable::parse("two words = alice\n").is_err());
    }

    #[test]
    fn test_unknown_group_has_no_members() {
        let table = GroupTable::parse("admins = alice\n").unwrap();
        assert!(!table.is_member("alice", "ghosts"));
        assert!(table.members("ghosts").is_none());
    }
}
