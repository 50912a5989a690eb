//! Ref access control lists.
//!
//! A rule reads `WHO WHAT REFS`:
//!
//! - `WHO` is a user spec (`name`, `@group`, `^regex`),
//! - `WHAT` is a set of the letters `C` (create), `R` (rewrite), `U` (update)
//!   and `D` (delete); `-` may stand in for an absent letter,
//! - `REFS` is a literal ref name, a `^regex`, or `!regex` for every ref the
//!   regex does not match. `{NAME}` is replaced by the environment variable
//!   `NAME` before matching.
//!
//! Rules are scanned in declaration order without stopping. The last rule
//! that matches the user and the ref and shares at least one operation with
//! the request decides: it allows when it grants every requested operation.
//! Nothing matching means deny.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use regex::Regex;

use super::user::UserSpec;
use crate::Error;
use crate::environment::EnvSnapshot;
use crate::groups::GroupTable;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Permissions(u8);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const CREATE: Self = Self(1);
    pub const REWRITE: Self = Self(1 << 1);
    pub const UPDATE: Self = Self(1 << 2);
    pub const DELETE: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);

    /// Parse a `CRUD`-style letter set.
    pub fn parse(s: &str) -> Option<Self> {
        s.chars().try_fold(Self::NONE, |acc, c| {
            let op = match c.to_ascii_uppercase() {
                'C' => Self::CREATE,
                'R' => Self::REWRITE,
                'U' => Self::UPDATE,
                'D' => Self::DELETE,
                '-' => Self::NONE,
                _ => return None,
            };
            Some(acc | op)
        })
    }

    /// Operations requested by a ref update.
    ///
    /// A non-fast-forward update is both an update and a rewrite, so a rule
    /// must grant `UR` to allow it.
    pub fn for_ref_update(created: bool, deleted: bool, fast_forward: bool) -> Self {
        match (created, deleted) {
            (true, _) => Self::CREATE,
            (_, true) => Self::DELETE,
            _ if fast_forward => Self::UPDATE,
            _ => Self::UPDATE | Self::REWRITE,
        }
    }

    /// Every operation of `other` is also in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (op, letter) in [
            (Self::CREATE, 'C'),
            (Self::REWRITE, 'R'),
            (Self::UPDATE, 'U'),
            (Self::DELETE, 'D'),
        ] {
            if self.contains(op) {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefSpec {
    Literal(String),
    Pattern(String),
}

#[derive(Clone, Debug)]
pub struct AclRule {
    pub user: String,
    pub permissions: Permissions,
    pub refspec: RefSpec,
    /// Set by a leading `!`: the rule applies where the pattern does not match.
    pub negated: bool,
}

impl AclRule {
    pub fn parse(text: &str) -> crate::Result<Self> {
        let syntax = |reason: &str| Error::AclSyntax {
            rule: text.to_string(),
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = text.split_whitespace().collect();
        let [user, what, refs] = fields[..] else {
            return Err(syntax("expected three fields: WHO WHAT REFS"));
        };

        let permissions =
            Permissions::parse(what).ok_or_else(|| syntax("WHAT may only contain C, R, U, D and -"))?;
        if permissions.is_empty() {
            return Err(syntax("WHAT grants no operation"));
        }

        let (refspec, negated) = match refs.strip_prefix('!') {
            Some("") => return Err(syntax("empty pattern after '!'")),
            Some(pattern) => (RefSpec::Pattern(pattern.to_string()), true),
            None if refs.starts_with('^') => (RefSpec::Pattern(refs.to_string()), false),
            None => (RefSpec::Literal(refs.to_string()), false),
        };

        Ok(Self {
            user: user.to_string(),
            permissions,
            refspec,
            negated,
        })
    }

    pub fn parse_all<S: AsRef<str>>(texts: &[S]) -> crate::Result<Vec<Self>> {
        texts.iter().map(|t| Self::parse(t.as_ref())).collect()
    }

    /// Whether the rule covers `refname`.
    ///
    /// An undefined `{NAME}` placeholder makes the rule inapplicable, negated
    /// or not.
    pub fn matches_ref(&self, refname: &str, env: &EnvSnapshot) -> crate::Result<bool> {
        match &self.refspec {
            RefSpec::Literal(literal) => {
                let Some(literal) = env.interpolate(literal, str::to_string) else {
                    return Ok(false);
                };
                Ok((literal == refname) != self.negated)
            }
            RefSpec::Pattern(pattern) => {
                let Some(pattern) = env.interpolate(pattern, |v| regex::escape(v)) else {
                    return Ok(false);
                };
                let regex = Regex::new(&pattern).map_err(|e| Error::AclSyntax {
                    rule: self.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(regex.is_match(refname) != self.negated)
            }
        }
    }
}

impl FromStr for AclRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AclRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bang = if self.negated { "!" } else { "" };
        let refs = match &self.refspec {
            RefSpec::Literal(s) | RefSpec::Pattern(s) => s,
        };
        write!(f, "{} {} {}{}", self.user, self.permissions, bang, refs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AclDecision {
    /// Allowed by the rule at this index.
    Allow { rule: usize },
    Deny { reason: String },
}

impl AclDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }
}

/// Decide whether `identity` may perform `requested` on `refname`.
pub fn evaluate(
    rules: &[AclRule],
    identity: &str,
    refname: &str,
    requested: Permissions,
    groups: &GroupTable,
    env: &EnvSnapshot,
) -> crate::Result<AclDecision> {
    let mut decisive: Option<(usize, &AclRule)> = None;

    for (i, rule) in rules.iter().enumerate() {
        if !UserSpec::parse(&rule.user)?.matches(identity, groups) {
            continue;
        }
        if !rule.matches_ref(refname, env)? {
            continue;
        }
        if rule.permissions.intersects(requested) {
            decisive = Some((i, rule));
        }
    }

    let decision = match decisive {
        Some((i, rule)) if rule.permissions.contains(requested) => AclDecision::Allow { rule: i },
        Some((_, rule)) => AclDecision::Deny {
            reason: format!(
                "ACL '{}' does not grant {} on {} to {}",
                rule, requested, refname, identity
            ),
        },
        None => AclDecision::Deny {
            reason: format!(
                "no ACL grants {} on {} to {}",
                requested, refname, identity
            ),
        },
    };

    tracing::debug!(
        identity,
        refname,
        requested = %requested,
        allowed = decision.is_allowed(),
        "ACL evaluated"
    );
    Ok(decision)
}
