//! Handler and post-hook traits.

use async_trait::async_trait;

use super::{DispatchResult, HookInput};
use crate::context::HookContext;

/// Outcome of a single handler: zero errors means success.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HookOutput {
    pub errors: Vec<String>,
}

impl HookOutput {
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.errors.push(message.into());
        self
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A check run for one hook phase.
///
/// Returning `Err` fails only this handler; the dispatcher records the
/// error and carries on with the next one. The exceptions are errors for
/// which [`crate::Error::aborts_invocation`] holds.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use githooks::hooks::{Handler, HookInput, HookOutput};
/// use githooks::HookContext;
///
/// struct NoTags;
///
/// #[async_trait]
/// impl Handler for NoTags {
///     fn name(&self) -> &str {
///         "no-tags"
///     }
///
///     async fn execute(&self, input: &HookInput, _ctx: &HookContext)
///         -> Result<HookOutput, githooks::Error>
///     {
///         let mut output = HookOutput::pass();
///         for update in &input.ref_updates {
///             if update.refname.starts_with("refs/tags/") {
///                 output.push_error(format!("{}: tags are read-only", update.refname));
///             }
///         }
///         Ok(output)
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    /// Plugin that registered this handler, used for disabling and for the
    /// origin prefix of error messages.
    fn plugin(&self) -> Option<&str> {
        None
    }

    async fn execute(&self, input: &HookInput, ctx: &HookContext) -> crate::Result<HookOutput>;
}

type HandlerFn =
    dyn Fn(&HookInput, &HookContext) -> crate::Result<HookOutput> + Send + Sync + 'static;

/// Closure-backed [`Handler`].
pub struct FnHandler {
    name: String,
    plugin: Option<String>,
    handler: Box<HandlerFn>,
}

impl FnHandler {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&HookInput, &HookContext) -> crate::Result<HookOutput> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            plugin: None,
            handler: Box::new(handler),
        }
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }
}

#[async_trait]
impl Handler for FnHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn plugin(&self) -> Option<&str> {
        self.plugin.as_deref()
    }

    async fn execute(&self, input: &HookInput, ctx: &HookContext) -> crate::Result<HookOutput> {
        (self.handler)(input, ctx)
    }
}

/// Runs once after dispatch with the aggregated result. Cannot change the
/// exit status.
#[async_trait]
pub trait PostHook: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, result: &DispatchResult, ctx: &HookContext) -> crate::Result<()>;
}

type PostHookFn = dyn Fn(&DispatchResult, &HookContext) -> crate::Result<()> + Send + Sync + 'static;

pub struct FnPostHook {
    name: String,
    hook: Box<PostHookFn>,
}

impl FnPostHook {
    pub fn new<F>(name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&DispatchResult, &HookContext) -> crate::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            hook: Box::new(hook),
        }
    }
}

#[async_trait]
impl PostHook for FnPostHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, result: &DispatchResult, ctx: &HookContext) -> crate::Result<()> {
        (self.hook)(result, ctx)
    }
}
