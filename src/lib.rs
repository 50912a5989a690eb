//! # githooks
//!
//! One executable for every Git and Gerrit hook.
//!
//! Git runs each hook as a separate program. Symlink them all to the
//! `githooks` binary and this crate routes each invocation: it reads the git
//! configuration, loads the enabled plugins, runs every handler registered for
//! the hook, chains external hook scripts and decides the exit status.
//!
//! ## Embedding
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use githooks::config::ConfigLoader;
//! use githooks::hooks::{Dispatcher, FnHandler, HookOutput, HookPhase};
//! use githooks::repository::GitCommandRepository;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), githooks::Error> {
//!     let repository = GitCommandRepository::discover().await?;
//!     let config = ConfigLoader::new().git().load().await?;
//!
//!     let mut dispatcher = Dispatcher::new(config, Arc::new(repository));
//!     dispatcher.register(
//!         HookPhase::CommitMsg,
//!         FnHandler::new("non-empty-message", |input, _ctx| {
//!             let path = input.args.first().cloned().unwrap_or_default();
//!             let message = std::fs::read_to_string(path)?;
//!             if message.trim().is_empty() {
//!                 return Ok(HookOutput::fail("empty commit message"));
//!             }
//!             Ok(HookOutput::pass())
//!         }),
//!     )?;
//!
//!     let args: Vec<String> = std::env::args().skip(1).collect();
//!     let report = dispatcher
//!         .dispatch("commit-msg", &args, tokio::io::stdin())
//!         .await?;
//!     std::process::exit(report.exit_code.into());
//! }
//! ```

#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod context;
pub mod environment;
pub mod groups;
pub mod hooks;
pub mod permissions;
pub mod plugins;
pub mod repository;
pub mod review;

pub use config::{ConfigLoader, ConfigScope, ConfigValue, ResolvedConfig};
pub use context::{GerritContext, HookContext};
pub use environment::EnvSnapshot;
pub use groups::GroupTable;
pub use hooks::{
    DispatchReport, DispatchResult, Dispatcher, ExternalFailure, FnHandler, FnPostHook, Handler,
    HandlerRecord, HookInput, HookOutput, HookPhase, HookRegistry, PhaseClass, PostHook,
    RefUpdate, RegistryState,
};
pub use permissions::{AclDecision, AclRule, Permissions, RefSpec, UserSpec};
pub use plugins::{CheckAcls, Plugin, PluginCatalog, PluginError};
pub use repository::{GitCommandRepository, Repository};
pub use review::{CommandReviewPoster, ReviewPoster, ReviewTarget, ReviewVerdict};

/// Error type for githooks operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A configuration source could not be read.
    #[error("Cannot read configuration from {source_name}: {message}")]
    ConfigSource {
        source_name: String,
        message: String,
    },

    /// An `eval:` or `file:` value could not be evaluated.
    #[error("Cannot evaluate '{expression}': {reason}")]
    ConfigEval { expression: String, reason: String },

    /// Group definitions are malformed.
    #[error("Group definition error at line {line}: {reason}")]
    GroupDefinition { line: usize, reason: String },

    /// A user spec is empty or its pattern does not compile.
    #[error("Invalid user spec '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    /// An ACL rule is malformed.
    #[error("Invalid ACL '{rule}': {reason}")]
    AclSyntax { rule: String, reason: String },

    /// The program was invoked under a name that is no known hook.
    #[error("Unknown hook '{0}'")]
    UnknownHook(String),

    /// Hook arguments or standard input do not follow the hook's convention.
    #[error("Invalid input for {phase}: {reason}")]
    InvalidInput { phase: String, reason: String },

    /// A plugin cannot be added to the catalog or loaded.
    #[error(transparent)]
    Plugin(#[from] plugins::PluginError),

    /// Registration attempted after the registry left the accepting state.
    #[error("Cannot register {what} while the registry is {state}")]
    LateRegistration { what: String, state: RegistryState },

    /// A handler failed; recorded per handler, never fatal to its siblings.
    #[error("[{origin}] {message}")]
    HandlerFailure { origin: String, message: String },

    /// An external hook script exited non-zero.
    #[error("{0}")]
    ExternalHookFailure(ExternalFailure),

    /// Repository query failed.
    #[error("Repository query failed: {0}")]
    Repository(String),

    /// Posting a review verdict failed.
    #[error("Review posting failed: {0}")]
    Review(String),

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration, group or ACL definitions are unusable
    Configuration,
    /// The invocation itself is wrong (unknown hook, bad arguments)
    Invocation,
    /// A policy check rejected the operation
    Policy,
    /// Registry misuse by embedding code
    Usage,
    /// IO, child processes, serialization
    Internal,
}

impl Error {
    pub fn handler(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::HandlerFailure {
            origin: origin.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ConfigSource { .. }
            | Error::ConfigEval { .. }
            | Error::GroupDefinition { .. }
            | Error::InvalidSpec { .. }
            | Error::AclSyntax { .. }
            | Error::Plugin(_) => ErrorCategory::Configuration,

            Error::UnknownHook(_) | Error::InvalidInput { .. } => ErrorCategory::Invocation,

            Error::HandlerFailure { .. } | Error::ExternalHookFailure(_) => ErrorCategory::Policy,

            Error::LateRegistration { .. } => ErrorCategory::Usage,

            Error::Repository(_) | Error::Review(_) | Error::Io(_) | Error::Json(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Errors that stop the whole invocation instead of failing one handler.
    ///
    /// `ConfigEval` is deliberately absent: a bad value only fails the
    /// consumer that asked for it.
    pub fn aborts_invocation(&self) -> bool {
        matches!(
            self,
            Error::ConfigSource { .. } | Error::GroupDefinition { .. } | Error::Plugin(_)
        )
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }
}

/// Result type for githooks operations.
pub type Result<T> = std::result::Result<T, Error>;
