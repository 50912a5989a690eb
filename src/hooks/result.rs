//! Aggregated handler outcomes.

use super::{ExternalFailure, HookPhase, PhaseClass};
use crate::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerRecord {
    pub handler: String,
    pub plugin: Option<String>,
    pub success: bool,
    pub errors: Vec<String>,
}

impl HandlerRecord {
    pub fn new(handler: impl Into<String>, plugin: Option<String>, errors: Vec<String>) -> Self {
        Self {
            handler: handler.into(),
            plugin,
            success: errors.is_empty(),
            errors,
        }
    }

    /// Plugin name when the handler belongs to one, else the handler name.
    pub fn origin(&self) -> &str {
        self.plugin.as_deref().unwrap_or(&self.handler)
    }
}

/// Handler records in execution order, plus the external hook chain's
/// outcome once it has run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchResult {
    records: Vec<HandlerRecord>,
    external: Option<ExternalFailure>,
}

impl DispatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: HandlerRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[HandlerRecord] {
        &self.records
    }

    pub fn set_external_failure(&mut self, failure: ExternalFailure) {
        self.external = Some(failure);
    }

    pub fn external_failure(&self) -> Option<&ExternalFailure> {
        self.external.as_ref()
    }

    /// No handler failed and no external hook rejected the invocation.
    pub fn succeeded(&self) -> bool {
        self.external.is_none() && self.records.iter().all(|r| r.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &HandlerRecord> {
        self.records.iter().filter(|r| !r.success)
    }

    pub fn successes(&self) -> impl Iterator<Item = &HandlerRecord> {
        self.records.iter().filter(|r| r.success)
    }

    /// Every handler error as a [`Error::HandlerFailure`], followed by the
    /// external hook failure if any.
    pub fn errors(&self) -> Vec<Error> {
        let mut errors: Vec<Error> = self
            .failures()
            .flat_map(|record| {
                record
                    .errors
                    .iter()
                    .map(|message| Error::handler(record.origin(), message.clone()))
            })
            .collect();
        if let Some(failure) = &self.external {
            errors.push(Error::ExternalHookFailure(failure.clone()));
        }
        errors
    }

    /// Every error rendered as `[origin] message`.
    pub fn messages(&self) -> Vec<String> {
        self.errors().iter().map(ToString::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Everything the caller needs after a dispatch.
#[derive(Debug)]
pub struct DispatchReport {
    pub phase: HookPhase,
    /// Class the exit code was decided with.
    pub class: PhaseClass,
    pub result: DispatchResult,
    pub external_failure: Option<ExternalFailure>,
    pub exit_code: u8,
    /// Failures were downgraded to warnings by `githooks.abort-commit`.
    pub warn_only: bool,
    pub messages: Vec<String>,
    pub help: Option<String>,
}

impl DispatchReport {
    pub fn failed(&self) -> bool {
        !self.result.succeeded()
    }

    /// Messages for the user, followed by the configured help text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            if self.warn_only {
                out.push_str("warning: ");
            }
            out.push_str(message);
            if !message.ends_with('\n') {
                out.push('\n');
            }
        }
        if let Some(help) = &self.help
            && !self.messages.is_empty()
        {
            out.push('\n');
            out.push_str(help);
            if !help.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}
