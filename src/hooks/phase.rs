//! Hook phases known to git and Gerrit.

use std::path::Path;

/// How a failing handler affects the hook's exit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseClass {
    /// A failure makes the hook exit non-zero and git aborts the operation.
    Blocking,
    /// The operation already happened; failures are only reported.
    Notification,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookPhase {
    ApplypatchMsg,
    PreApplypatch,
    PostApplypatch,
    PreCommit,
    PreMergeCommit,
    PrepareCommitMsg,
    CommitMsg,
    PostCommit,
    PreRebase,
    PostCheckout,
    PostMerge,
    PrePush,
    PreReceive,
    Update,
    PostReceive,
    PostUpdate,
    ReferenceTransaction,
    PushToCheckout,
    PreAutoGc,
    PostRewrite,

    // Gerrit
    RefUpdate,
    CommitReceived,
    Submit,
    PatchsetCreated,
    DraftPublished,
}

const ALL: &[HookPhase] = &[
    HookPhase::ApplypatchMsg,
    HookPhase::PreApplypatch,
    HookPhase::PostApplypatch,
    HookPhase::PreCommit,
    HookPhase::PreMergeCommit,
    HookPhase::PrepareCommitMsg,
    HookPhase::CommitMsg,
    HookPhase::PostCommit,
    HookPhase::PreRebase,
    HookPhase::PostCheckout,
    HookPhase::PostMerge,
    HookPhase::PrePush,
    HookPhase::PreReceive,
    HookPhase::Update,
    HookPhase::PostReceive,
    HookPhase::PostUpdate,
    HookPhase::ReferenceTransaction,
    HookPhase::PushToCheckout,
    HookPhase::PreAutoGc,
    HookPhase::PostRewrite,
    HookPhase::RefUpdate,
    HookPhase::CommitReceived,
    HookPhase::Submit,
    HookPhase::PatchsetCreated,
    HookPhase::DraftPublished,
];

impl HookPhase {
    pub fn all() -> &'static [HookPhase] {
        ALL
    }

    /// The hook's file name under `.git/hooks`.
    pub fn name(&self) -> &'static str {
        match self {
            HookPhase::ApplypatchMsg => "applypatch-msg",
            HookPhase::PreApplypatch => "pre-applypatch",
            HookPhase::PostApplypatch => "post-applypatch",
            HookPhase::PreCommit => "pre-commit",
            HookPhase::PreMergeCommit => "pre-merge-commit",
            HookPhase::PrepareCommitMsg => "prepare-commit-msg",
            HookPhase::CommitMsg => "commit-msg",
            HookPhase::PostCommit => "post-commit",
            HookPhase::PreRebase => "pre-rebase",
            HookPhase::PostCheckout => "post-checkout",
            HookPhase::PostMerge => "post-merge",
            HookPhase::PrePush => "pre-push",
            HookPhase::PreReceive => "pre-receive",
            HookPhase::Update => "update",
            HookPhase::PostReceive => "post-receive",
            HookPhase::PostUpdate => "post-update",
            HookPhase::ReferenceTransaction => "reference-transaction",
            HookPhase::PushToCheckout => "push-to-checkout",
            HookPhase::PreAutoGc => "pre-auto-gc",
            HookPhase::PostRewrite => "post-rewrite",
            HookPhase::RefUpdate => "ref-update",
            HookPhase::CommitReceived => "commit-received",
            HookPhase::Submit => "submit",
            HookPhase::PatchsetCreated => "patchset-created",
            HookPhase::DraftPublished => "draft-published",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL.iter().copied().find(|phase| phase.name() == name)
    }

    /// Phase named by the final path component of the program invocation,
    /// e.g. `/srv/repo.git/hooks/pre-receive`.
    pub fn from_invocation(invocation: impl AsRef<Path>) -> Option<Self> {
        invocation
            .as_ref()
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(Self::from_name)
    }

    pub fn class(&self) -> PhaseClass {
        match self {
            HookPhase::PostApplypatch
            | HookPhase::PostCommit
            | HookPhase::PostCheckout
            | HookPhase::PostMerge
            | HookPhase::PostReceive
            | HookPhase::PostUpdate
            | HookPhase::PostRewrite
            | HookPhase::PatchsetCreated
            | HookPhase::DraftPublished => PhaseClass::Notification,
            _ => PhaseClass::Blocking,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.class() == PhaseClass::Blocking
    }

    /// Phases whose protocol delivers data on standard input.
    pub fn reads_stdin(&self) -> bool {
        matches!(
            self,
            HookPhase::PrePush
                | HookPhase::PreReceive
                | HookPhase::PostReceive
                | HookPhase::ReferenceTransaction
                | HookPhase::PostRewrite
        )
    }

    pub fn is_gerrit(&self) -> bool {
        matches!(
            self,
            HookPhase::RefUpdate
                | HookPhase::CommitReceived
                | HookPhase::Submit
                | HookPhase::PatchsetCreated
                | HookPhase::DraftPublished
        )
    }

    /// Phases that validate a commit message; subject to `githooks.abort-commit`.
    pub fn is_commit_message(&self) -> bool {
        matches!(
            self,
            HookPhase::ApplypatchMsg | HookPhase::PrepareCommitMsg | HookPhase::CommitMsg
        )
    }
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for HookPhase {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| crate::Error::UnknownHook(s.to_string()))
    }
}
