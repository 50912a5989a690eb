//! Handler registry for a single invocation.

use std::sync::Arc;

use super::{FnHandler, Handler, HookInput, HookOutput, HookPhase, PostHook, PostHookNotifier};
use crate::Error;
use crate::context::HookContext;

/// Lifecycle of a registry; only moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RegistryState {
    Registering,
    Dispatching,
    PostHooks,
    Done,
}

impl std::fmt::Display for RegistryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RegistryState::Registering => "registering",
            RegistryState::Dispatching => "dispatching",
            RegistryState::PostHooks => "running post-hooks",
            RegistryState::Done => "done",
        };
        f.write_str(s)
    }
}

pub struct HookRegistry {
    handlers: Vec<(HookPhase, Arc<dyn Handler>)>,
    notifier: PostHookNotifier,
    state: RegistryState,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            notifier: PostHookNotifier::new(),
            state: RegistryState::Registering,
        }
    }

    pub fn state(&self) -> RegistryState {
        self.state
    }

    pub fn register(&mut self, phase: HookPhase, handler: Arc<dyn Handler>) -> crate::Result<()> {
        if self.state != RegistryState::Registering {
            return Err(Error::LateRegistration {
                what: format!("handler '{}'", handler.name()),
                state: self.state,
            });
        }
        tracing::debug!(phase = %phase, handler = handler.name(), plugin = ?handler.plugin(), "Registered handler");
        self.handlers.push((phase, handler));
        Ok(())
    }

    pub fn register_handler<H: Handler + 'static>(
        &mut self,
        phase: HookPhase,
        handler: H,
    ) -> crate::Result<()> {
        self.register(phase, Arc::new(handler))
    }

    pub fn register_fn<F>(
        &mut self,
        phase: HookPhase,
        name: impl Into<String>,
        handler: F,
    ) -> crate::Result<()>
    where
        F: Fn(&HookInput, &HookContext) -> crate::Result<HookOutput> + Send + Sync + 'static,
    {
        self.register_handler(phase, FnHandler::new(name, handler))
    }

    /// Accepted until post-hooks start running.
    pub fn register_post_hook(&mut self, hook: Arc<dyn PostHook>) -> crate::Result<()> {
        if self.state >= RegistryState::PostHooks {
            return Err(Error::LateRegistration {
                what: format!("post-hook '{}'", hook.name()),
                state: self.state,
            });
        }
        self.notifier.register(hook);
        Ok(())
    }

    /// Handlers for `phase` in registration order.
    pub fn handlers_for(&self, phase: HookPhase) -> Vec<Arc<dyn Handler>> {
        self.handlers
            .iter()
            .filter(|(p, _)| *p == phase)
            .map(|(_, h)| Arc::clone(h))
            .collect()
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|(_, h)| h.name()).collect()
    }

    pub fn has_handlers(&self, phase: HookPhase) -> bool {
        self.handlers.iter().any(|(p, _)| *p == phase)
    }

    pub fn begin_dispatch(&mut self) {
        self.advance(RegistryState::Dispatching);
    }

    /// Freezes post-hook registration and hands over the notifier.
    pub fn begin_post_hooks(&mut self) -> PostHookNotifier {
        self.advance(RegistryState::PostHooks);
        std::mem::take(&mut self.notifier)
    }

    pub fn finish(&mut self) {
        self.advance(RegistryState::Done);
    }

    fn advance(&mut self, next: RegistryState) {
        if next > self.state {
            tracing::trace!(from = %self.state, to = %next, "Registry state change");
            self.state = next;
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("handlers", &self.handler_names())
            .field("post_hooks", &self.notifier.len())
            .field("state", &self.state)
            .finish()
    }
}
