//! Post-dispatch notifications.

use std::sync::Arc;

use super::{DispatchResult, PostHook};
use crate::context::HookContext;

#[derive(Default)]
pub struct PostHookNotifier {
    hooks: Vec<Arc<dyn PostHook>>,
}

impl PostHookNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn PostHook>) {
        self.hooks.push(hook);
    }

    pub fn extend(&mut self, hooks: impl IntoIterator<Item = Arc<dyn PostHook>>) {
        self.hooks.extend(hooks);
    }

    /// Runs every post-hook in registration order. A failure is logged and
    /// does not stop the remaining hooks. Returns the number of failures.
    pub async fn run_all(&self, result: &DispatchResult, ctx: &HookContext) -> usize {
        let mut failures = 0;
        for hook in &self.hooks {
            match hook.run(result, ctx).await {
                Ok(()) => tracing::debug!(post_hook = hook.name(), "Post-hook completed"),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(post_hook = hook.name(), error = %e, "Post-hook failed");
                }
            }
        }
        failures
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
