//! Parsed hook invocation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{HookPhase, PhaseClass};
use crate::Error;

/// One ref moving from `old` to `new`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefUpdate {
    pub old: String,
    pub new: String,
    pub refname: String,
}

impl RefUpdate {
    pub fn new(old: impl Into<String>, new: impl Into<String>, refname: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            refname: refname.into(),
        }
    }

    pub fn is_create(&self) -> bool {
        is_null_sha(&self.old)
    }

    pub fn is_delete(&self) -> bool {
        is_null_sha(&self.new)
    }
}

/// All-zero object names stand for "no object".
pub fn is_null_sha(sha: &str) -> bool {
    !sha.is_empty() && sha.bytes().all(|b| b == b'0')
}

/// Gerrit hooks receive `--key value` pairs instead of positional arguments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GerritArgs {
    values: BTreeMap<String, String>,
}

impl GerritArgs {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut values = BTreeMap::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let Some(key) = arg.strip_prefix("--") else {
                return Err(format!("unexpected argument '{}'", arg));
            };
            let Some(value) = iter.next() else {
                return Err(format!("missing value for '--{}'", key));
            };
            values.insert(key.to_string(), value.clone());
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct HookInput {
    pub phase: HookPhase,
    pub args: Vec<String>,
    pub stdin: String,
    pub ref_updates: Vec<RefUpdate>,
    pub gerrit: GerritArgs,
    pub timestamp: DateTime<Utc>,
}

impl HookInput {
    pub fn parse(phase: HookPhase, args: Vec<String>, stdin: String) -> crate::Result<Self> {
        let invalid = |reason: String| Error::InvalidInput {
            phase: phase.name().to_string(),
            reason,
        };

        let mut gerrit = GerritArgs::default();
        let ref_updates = match phase {
            HookPhase::Update => match args.as_slice() {
                [refname, old, new, ..] => vec![RefUpdate::new(old, new, refname)],
                _ => return Err(invalid("expected <ref> <old> <new>".to_string())),
            },
            HookPhase::PreReceive | HookPhase::PostReceive | HookPhase::ReferenceTransaction => {
                parse_receive_lines(&stdin).map_err(invalid)?
            }
            HookPhase::PrePush => parse_push_lines(&stdin).map_err(invalid)?,
            p if p.is_gerrit() => {
                gerrit = GerritArgs::parse(&args).map_err(invalid)?;
                match (
                    gerrit.get("oldrev"),
                    gerrit.get("newrev"),
                    gerrit.get("refname"),
                ) {
                    (Some(old), Some(new), Some(refname)) => {
                        vec![RefUpdate::new(old, new, refname)]
                    }
                    _ if phase == HookPhase::RefUpdate => {
                        return Err(invalid(
                            "expected --oldrev, --newrev and --refname".to_string(),
                        ));
                    }
                    _ => Vec::new(),
                }
            }
            _ => Vec::new(),
        };

        Ok(Self {
            phase,
            args,
            stdin,
            ref_updates,
            gerrit,
            timestamp: Utc::now(),
        })
    }

    /// The phase's class, refined by invocation arguments: a
    /// `reference-transaction` in the `committed` or `aborted` state can no
    /// longer stop anything.
    pub fn class(&self) -> PhaseClass {
        match (self.phase, self.args.first().map(String::as_str)) {
            (HookPhase::ReferenceTransaction, Some("committed" | "aborted")) => {
                PhaseClass::Notification
            }
            _ => self.phase.class(),
        }
    }
}

/// `<old> <new> <ref>` per line.
fn parse_receive_lines(stdin: &str) -> Result<Vec<RefUpdate>, String> {
    stdin
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match line.split_whitespace().collect::<Vec<_>>()[..] {
            [old, new, refname] => Ok(RefUpdate::new(old, new, refname)),
            _ => Err(format!("malformed ref line '{}'", line)),
        })
        .collect()
}

/// `<local-ref> <local-sha> <remote-ref> <remote-sha>` per line; the update
/// is expressed from the remote's point of view.
fn parse_push_lines(stdin: &str) -> Result<Vec<RefUpdate>, String> {
    stdin
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match line.split_whitespace().collect::<Vec<_>>()[..] {
            [_local_ref, local_sha, remote_ref, remote_sha] => {
                Ok(RefUpdate::new(remote_sha, local_sha, remote_ref))
            }
            _ => Err(format!("malformed push line '{}'", line)),
        })
        .collect()
}
