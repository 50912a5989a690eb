//! Ref-level access control.
//!
//! ```text
//! [githooks]
//!     plugin = CheckAcls
//!     groups = "admins = alice bob"
//! [githooks "checkacls"]
//!     acl = "@admins CRUD ^refs/"
//!     acl = "^.     CU   ^refs/heads/{USER}/"
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use super::Plugin;
use crate::config::ResolvedConfig;
use crate::context::HookContext;
use crate::hooks::{Handler, HookInput, HookOutput, HookPhase, HookRegistry, RefUpdate};
use crate::permissions::{AclDecision, AclRule, Permissions, evaluate};

pub const PHASES: &[HookPhase] = &[
    HookPhase::Update,
    HookPhase::PreReceive,
    HookPhase::RefUpdate,
    HookPhase::PrePush,
];

#[derive(Clone, Copy, Debug, Default)]
pub struct CheckAcls;

impl Plugin for CheckAcls {
    fn name(&self) -> &str {
        "CheckAcls"
    }

    fn register(&self, registry: &mut HookRegistry, _config: &ResolvedConfig) -> crate::Result<()> {
        let handler: Arc<dyn Handler> = Arc::new(CheckAclsHandler);
        for phase in PHASES {
            registry.register(*phase, Arc::clone(&handler))?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CheckAclsHandler;

impl CheckAclsHandler {
    /// Every `githooks.checkacls.acl` value; a value read from a file may
    /// hold several rules, one per line.
    fn rules(ctx: &HookContext) -> crate::Result<Vec<AclRule>> {
        let values = ctx
            .config()
            .get_all_evaluated("githooks", Some("checkacls"), "acl")?;
        let lines: Vec<&str> = values
            .iter()
            .flat_map(|value| value.lines())
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();
        AclRule::parse_all(&lines)
    }

    async fn requested(ctx: &HookContext, update: &RefUpdate) -> Permissions {
        let created = update.is_create();
        let deleted = update.is_delete();
        let fast_forward = if created || deleted {
            true
        } else {
            match ctx
                .repository()
                .is_ancestor(&update.old, &update.new)
                .await
            {
                Ok(ff) => ff,
                Err(e) => {
                    tracing::warn!(refname = %update.refname, error = %e, "Cannot tell fast-forward, assuming rewrite");
                    false
                }
            }
        };
        Permissions::for_ref_update(created, deleted, fast_forward)
    }
}

#[async_trait]
impl Handler for CheckAclsHandler {
    fn name(&self) -> &str {
        "check-acls"
    }

    fn plugin(&self) -> Option<&str> {
        Some("CheckAcls")
    }

    async fn execute(&self, input: &HookInput, ctx: &HookContext) -> crate::Result<HookOutput> {
        if input.ref_updates.is_empty() {
            return Ok(HookOutput::pass());
        }

        let Some(user) = ctx.authenticated_user()? else {
            return Ok(HookOutput::fail(
                "cannot determine the authenticated user; set githooks.userenv",
            ));
        };

        if ctx.is_admin(&user)? {
            tracing::debug!(user = %user, "Administrator bypasses ACLs");
            return Ok(HookOutput::pass());
        }

        let rules = Self::rules(ctx)?;
        let groups = ctx.groups()?;
        let mut output = HookOutput::pass();

        for update in &input.ref_updates {
            let requested = Self::requested(ctx, update).await;
            match evaluate(
                &rules,
                &user,
                &update.refname,
                requested,
                groups,
                ctx.env(),
            )? {
                AclDecision::Allow { rule } => {
                    tracing::debug!(refname = %update.refname, rule, "Ref update allowed");
                }
                AclDecision::Deny { reason } => output.push_error(reason),
            }
        }

        Ok(output)
    }
}
