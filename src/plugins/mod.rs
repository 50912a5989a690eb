//! Plugins bundle handlers that are enabled through configuration.
//!
//! ```text
//! [githooks]
//!     plugin = CheckAcls
//!     disable = CheckJira
//! ```
//!
//! A plugin named `Foo` is also disabled when the environment variable `Foo`
//! is set to `0`, which lets a single push bypass it.

mod catalog;
mod check_acls;
mod error;

pub use catalog::{NAMESPACE_SEP, PluginCatalog, short_name};
pub use check_acls::{CheckAcls, CheckAclsHandler};
pub use error::PluginError;

use crate::config::ResolvedConfig;
use crate::hooks::HookRegistry;

pub trait Plugin: Send + Sync {
    /// Short name used in `githooks.plugin`, `githooks.disable` and as the
    /// disabling environment variable.
    fn name(&self) -> &str;

    fn register(&self, registry: &mut HookRegistry, config: &ResolvedConfig) -> crate::Result<()>;
}
