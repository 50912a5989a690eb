//! Hook registration and dispatch.
//!
//! A [`Dispatcher`] owns the [`HookRegistry`] for one invocation. Plugins and
//! embedding code register [`Handler`]s per [`HookPhase`]; dispatching runs
//! them in registration order, each isolated from the others, then chains the
//! external hook scripts and finally notifies the [`PostHook`]s.

mod dispatcher;
pub mod external;
pub mod input;
mod phase;
mod post;
mod registry;
mod result;
mod traits;

pub use dispatcher::Dispatcher;
pub use external::{ExternalFailure, ExternalHooks};
pub use input::{GerritArgs, HookInput, RefUpdate};
pub use phase::{HookPhase, PhaseClass};
pub use post::PostHookNotifier;
pub use registry::{HookRegistry, RegistryState};
pub use result::{DispatchReport, DispatchResult, HandlerRecord};
pub use traits::{FnHandler, FnPostHook, Handler, HookOutput, PostHook};
