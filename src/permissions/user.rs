//! User specifications: `name`, `@group` or `^regex`.

use regex::{Regex, RegexBuilder};

use crate::Error;
use crate::groups::GroupTable;

#[derive(Clone, Debug)]
pub enum UserSpec {
    /// Exact, case-sensitive identity.
    Name(String),
    /// Membership in a group of the [`GroupTable`].
    Group(String),
    /// Case-insensitive regex; the leading caret anchors it at the start of
    /// the identity but not at the end.
    Pattern(Regex),
}

impl UserSpec {
    pub fn parse(spec: &str) -> crate::Result<Self> {
        let spec = spec.trim();
        let invalid = |reason: &str| Error::InvalidSpec {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        if spec.is_empty() {
            return Err(invalid("empty user spec"));
        }

        if let Some(group) = spec.strip_prefix('@') {
            if group.is_empty() {
                return Err(invalid("empty group name"));
            }
            return Ok(Self::Group(group.to_string()));
        }

        if spec.starts_with('^') {
            let regex = RegexBuilder::new(spec)
                .case_insensitive(true)
                .build()
                .map_err(|e| invalid(&e.to_string()))?;
            return Ok(Self::Pattern(regex));
        }

        Ok(Self::Name(spec.to_string()))
    }

    pub fn matches(&self, identity: &str, groups: &GroupTable) -> bool {
        match self {
            Self::Name(name) => name == identity,
            Self::Group(group) => {
                if !groups.contains_group(group) {
                    tracing::debug!(group = %group, "User spec references unknown group");
                }
                groups.is_member(identity, group)
            }
            Self::Pattern(regex) => regex.is_match(identity),
        }
    }
}

/// Whether `identity` satisfies `spec`.
pub fn matches(identity: &str, spec: &str, groups: &GroupTable) -> crate::Result<bool> {
    Ok(UserSpec::parse(spec)?.matches(identity, groups))
}
