//! Access control for ref updates.

pub mod acl;
pub mod user;

pub use acl::{AclDecision, AclRule, Permissions, RefSpec, evaluate};
pub use user::UserSpec;
