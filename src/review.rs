//! Reporting verdicts to a code review system.
//!
//! Gerrit runs its notification hooks after the fact, so failures there
//! cannot reject anything. Instead [`GerritReviewPostHook`] posts a review
//! with approving or rejecting votes through a [`ReviewPoster`].

use std::collections::BTreeMap;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::Error;
use crate::config::ResolvedConfig;
use crate::context::HookContext;
use crate::hooks::input::GerritArgs;
use crate::hooks::{DispatchResult, PostHook};

pub const DEFAULT_VOTES_TO_APPROVE: &str = "Verified+1";
pub const DEFAULT_VOTES_TO_REJECT: &str = "Verified-1";
pub const DEFAULT_COMMENT_OK: &str = "OK";

/// The patch set a review is about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewTarget {
    pub change: String,
    pub patchset: String,
}

impl ReviewTarget {
    pub fn new(change: impl Into<String>, patchset: impl Into<String>) -> Self {
        Self {
            change: change.into(),
            patchset: patchset.into(),
        }
    }

    pub fn from_gerrit(args: &GerritArgs) -> Option<Self> {
        Some(Self::new(args.get("change")?, args.get("patchset")?))
    }
}

impl std::fmt::Display for ReviewTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.change, self.patchset)
    }
}

/// Body of a Gerrit `ReviewInput`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReviewVerdict {
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, i32>,
}

impl ReviewVerdict {
    pub fn new(message: impl Into<String>, labels: BTreeMap<String, i32>) -> Self {
        Self {
            message: message.into(),
            labels,
        }
    }
}

#[async_trait]
pub trait ReviewPoster: Send + Sync {
    async fn post_review(&self, target: &ReviewTarget, verdict: &ReviewVerdict)
    -> crate::Result<()>;
}

/// Pipes the verdict as JSON into a command, with `change,patchset`
/// appended to its arguments.
///
/// ```text
/// [githooks "gerrit"]
///     review-command = ssh -p 29418 hooks@gerrit gerrit review --json
/// ```
#[derive(Clone, Debug)]
pub struct CommandReviewPoster {
    program: String,
    args: Vec<String>,
}

impl CommandReviewPoster {
    pub fn new(command: &str) -> Option<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }

    /// From `githooks.gerrit.review-command`, when set.
    pub fn from_config(config: &ResolvedConfig) -> crate::Result<Option<Self>> {
        Ok(config
            .get_evaluated("githooks", Some("gerrit"), "review-command")?
            .as_deref()
            .and_then(Self::new))
    }
}

#[async_trait]
impl ReviewPoster for CommandReviewPoster {
    async fn post_review(
        &self,
        target: &ReviewTarget,
        verdict: &ReviewVerdict,
    ) -> crate::Result<()> {
        let payload = serde_json::to_vec(verdict)?;
        tracing::debug!(program = %self.program, target = %target, "Posting review");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(target.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Review(format!("cannot run '{}': {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| Error::Review(format!("cannot send review: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Review(e.to_string()))?;
        if !output.status.success() {
            return Err(Error::Review(format!(
                "'{}' exited with {:?}: {}",
                self.program,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Parses votes such as `Verified+1 Code-Review-2`, separated by commas or
/// whitespace.
pub fn parse_votes(text: &str) -> crate::Result<BTreeMap<String, i32>> {
    let mut labels = BTreeMap::new();
    for vote in text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|v| !v.is_empty())
    {
        let invalid = || Error::ConfigEval {
            expression: text.to_string(),
            reason: format!("invalid vote '{}'", vote),
        };
        let split = vote.rfind(['+', '-']).ok_or_else(invalid)?;
        let (label, score) = vote.split_at(split);
        if label.is_empty() {
            return Err(invalid());
        }
        let score: i32 = score.parse().map_err(|_| invalid())?;
        labels.insert(label.to_string(), score);
    }
    Ok(labels)
}

/// Posts the dispatch outcome of a Gerrit phase as a review.
#[derive(Clone, Copy, Debug, Default)]
pub struct GerritReviewPostHook;

impl GerritReviewPostHook {
    pub fn verdict(result: &DispatchResult, config: &ResolvedConfig) -> crate::Result<ReviewVerdict> {
        let vote = |name: &str, default: &str| -> crate::Result<BTreeMap<String, i32>> {
            let text = config.get_evaluated("githooks", Some("gerrit"), name)?;
            parse_votes(text.as_deref().unwrap_or(default))
        };

        if result.succeeded() {
            let message = config
                .get_evaluated("githooks", Some("gerrit"), "comment-ok")?
                .unwrap_or_else(|| DEFAULT_COMMENT_OK.to_string());
            Ok(ReviewVerdict::new(
                message,
                vote("votes-to-approve", DEFAULT_VOTES_TO_APPROVE)?,
            ))
        } else {
            Ok(ReviewVerdict::new(
                result.messages().join("\n\n"),
                vote("votes-to-reject", DEFAULT_VOTES_TO_REJECT)?,
            ))
        }
    }
}

#[async_trait]
impl PostHook for GerritReviewPostHook {
    fn name(&self) -> &str {
        "gerrit-review"
    }

    async fn run(&self, result: &DispatchResult, ctx: &HookContext) -> crate::Result<()> {
        let Some(gerrit) = ctx.gerrit() else {
            return Ok(());
        };
        let Some(reviewer) = &gerrit.reviewer else {
            tracing::debug!("No review poster configured");
            return Ok(());
        };
        let Some(target) = ReviewTarget::from_gerrit(&gerrit.args) else {
            tracing::debug!(phase = %ctx.phase(), "No change to review");
            return Ok(());
        };

        let verdict = Self::verdict(result, ctx.config())?;
        reviewer.post_review(&target, &verdict).await
    }
}
