//! What a handler can see and do during dispatch.

use std::sync::{Arc, Mutex, OnceLock};

use crate::config::ResolvedConfig;
use crate::environment::EnvSnapshot;
use crate::groups::GroupTable;
use crate::hooks::input::GerritArgs;
use crate::hooks::{HookPhase, PostHook};
use crate::permissions::UserSpec;
use crate::repository::Repository;
use crate::review::ReviewPoster;

/// Environment variables consulted, in order, when `githooks.userenv` is unset.
pub const USER_FALLBACK_VARS: &[&str] = &[
    "GERRIT_USER_USERNAME",
    "GL_USER",
    "REMOTE_USER",
    "USER",
    "USERNAME",
];

/// Extra capabilities available in Gerrit phases.
pub struct GerritContext {
    pub args: GerritArgs,
    pub reviewer: Option<Arc<dyn ReviewPoster>>,
}

impl std::fmt::Debug for GerritContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GerritContext")
            .field("args", &self.args)
            .field("reviewer", &self.reviewer.is_some())
            .finish()
    }
}

pub struct HookContext {
    config: Arc<ResolvedConfig>,
    phase: HookPhase,
    repository: Arc<dyn Repository>,
    gerrit: Option<GerritContext>,
    groups: OnceLock<GroupTable>,
    errors: Mutex<Vec<String>>,
    deferred: Mutex<Vec<Arc<dyn PostHook>>>,
}

impl HookContext {
    pub fn new(
        config: Arc<ResolvedConfig>,
        phase: HookPhase,
        repository: Arc<dyn Repository>,
    ) -> Self {
        Self {
            config,
            phase,
            repository,
            gerrit: None,
            groups: OnceLock::new(),
            errors: Mutex::new(Vec::new()),
            deferred: Mutex::new(Vec::new()),
        }
    }

    /// Ignored outside Gerrit phases.
    pub fn with_gerrit(mut self, gerrit: GerritContext) -> Self {
        if self.phase.is_gerrit() {
            self.gerrit = Some(gerrit);
        }
        self
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    pub fn env(&self) -> &EnvSnapshot {
        self.config.env()
    }

    pub fn repository(&self) -> &dyn Repository {
        self.repository.as_ref()
    }

    pub fn gerrit(&self) -> Option<&GerritContext> {
        self.gerrit.as_ref()
    }

    /// Identity of the user performing the operation.
    ///
    /// `githooks.userenv` names an environment variable, or is an `eval:`
    /// expression. Without it, Gerrit's `--uploader-username` and then the
    /// usual web/ssh front-end variables are tried.
    pub fn authenticated_user(&self) -> crate::Result<Option<String>> {
        if let Some(userenv) = self.config.get("githooks", None, "userenv") {
            let user = if userenv.starts_with("eval:") || userenv.starts_with("file:") {
                Some(self.config.evaluate(userenv)?.trim().to_string())
            } else {
                self.env().get(userenv).map(str::to_string)
            };
            return Ok(user.filter(|u| !u.is_empty()));
        }

        if let Some(user) = self
            .gerrit
            .as_ref()
            .and_then(|g| g.args.get("uploader-username"))
        {
            return Ok(Some(user.to_string()));
        }

        Ok(USER_FALLBACK_VARS
            .iter()
            .filter_map(|var| self.env().get(var))
            .find(|value| !value.is_empty())
            .map(str::to_string))
    }

    /// Whether `identity` matches any `githooks.admin` spec.
    pub fn is_admin(&self, identity: &str) -> crate::Result<bool> {
        let specs = self.config.get_all_evaluated("githooks", None, "admin")?;
        if specs.iter().all(|s| s.trim().is_empty()) {
            return Ok(false);
        }
        let groups = self.groups()?;
        for spec in specs.iter().filter(|s| !s.trim().is_empty()) {
            if UserSpec::parse(spec)?.matches(identity, groups) {
                tracing::debug!(user = identity, spec = %spec, "User is an administrator");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Groups from every `githooks.groups` value, parsed on first use.
    pub fn groups(&self) -> crate::Result<&GroupTable> {
        if let Some(table) = self.groups.get() {
            return Ok(table);
        }
        let text = self
            .config
            .get_all_evaluated("githooks", None, "groups")?
            .join("\n");
        let table = GroupTable::parse(&text)?;
        Ok(self.groups.get_or_init(|| table))
    }

    /// Records an error against the handler currently running.
    pub fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(phase = %self.phase, error = %message, "Handler recorded error");
        lock(&self.errors).push(message);
    }

    pub fn errors(&self) -> Vec<String> {
        lock(&self.errors).clone()
    }

    pub fn take_errors(&self) -> Vec<String> {
        std::mem::take(&mut *lock(&self.errors))
    }

    /// Schedules a post-hook for after dispatch.
    pub fn defer(&self, hook: Arc<dyn PostHook>) {
        lock(&self.deferred).push(hook);
    }

    pub fn take_deferred(&self) -> Vec<Arc<dyn PostHook>> {
        std::mem::take(&mut *lock(&self.deferred))
    }
}

impl std::fmt::Debug for HookContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookContext")
            .field("phase", &self.phase)
            .field("git_dir", &self.repository.git_dir())
            .field("gerrit", &self.gerrit)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigEntry, ConfigKey, ConfigScope};
    use crate::repository::GitCommandRepository;

    fn context(phase: HookPhase, config: &[(&str, &str)], env: &[(&str, &str)]) -> HookContext {
        let env: EnvSnapshot = env.iter().map(|(k, v)| (*k, *v)).collect();
        let entries: Vec<ConfigEntry> = config
            .iter()
            .map(|(k, v)| ConfigEntry::new(ConfigScope::Local, ConfigKey::parse(k).unwrap(), *v))
            .collect();
        let config = ResolvedConfig::from_entries(entries, env, ".");
        HookContext::new(
            Arc::new(config),
            phase,
            Arc::new(GitCommandRepository::new(".git")),
        )
    }

    #[test]
    fn test_user_from_userenv() {
        let ctx = context(
            HookPhase::Update,
            &[("githooks.userenv", "GL_ID")],
            &[("GL_ID", "alice"), ("USER", "root")],
        );
        assert_eq!(ctx.authenticated_user().unwrap().as_deref(), Some("alice"));
    }

    #[test]
    fn test_user_from_eval() {
        let ctx = context(
            HookPhase::Update,
            &[("githooks.userenv", "eval:lower(env(AUTH_USER))")],
            &[("AUTH_USER", "Bob")],
        );
        assert_eq!(ctx.authenticated_user().unwrap().as_deref(), Some("bob"));

        let ctx = context(
            HookPhase::Update,
            &[("githooks.userenv", "eval:env(AUTH_USER)")],
            &[],
        );
        assert!(matches!(
            ctx.authenticated_user(),
            Err(crate::Error::ConfigEval { .. })
        ));
    }

    #[test]
    fn test_user_fallbacks() {
        let ctx = context(
            HookPhase::Update,
            &[],
            &[("REMOTE_USER", "carol"), ("USER", "git")],
        );
        assert_eq!(ctx.authenticated_user().unwrap().as_deref(), Some("carol"));

        let ctx = context(HookPhase::Update, &[], &[]);
        assert_eq!(ctx.authenticated_user().unwrap(), None);
    }

    #[test]
    fn test_gerrit_uploader() {
        let args: Vec<String> = ["--uploader-username", "dave"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let gerrit = || GerritContext {
            args: GerritArgs::parse(&args).unwrap(),
            reviewer: None,
        };

        let ctx = context(HookPhase::RefUpdate, &[], &[("USER", "gerrit")]).with_gerrit(gerrit());
        assert_eq!(ctx.authenticated_user().unwrap().as_deref(), Some("dave"));

        let ctx = context(HookPhase::Update, &[], &[("USER", "git")]).with_gerrit(gerrit());
        assert!(ctx.gerrit().is_none());
    }

    #[test]
    fn test_admin() {
        let ctx = context(
            HookPhase::Update,
            &[
                ("githooks.groups", "admins = alice"),
                ("githooks.admin", "@admins"),
                ("githooks.admin", "^root"),
            ],
            &[],
        );
        assert!(ctx.is_admin("alice").unwrap());
        assert!(ctx.is_admin("rootless").unwrap());
        assert!(!ctx.is_admin("bob").unwrap());

        let ctx = context(HookPhase::Update, &[("githooks.admin", "")], &[]);
        assert!(!ctx.is_admin("alice").unwrap());

        let ctx = context(HookPhase::Update, &[("githooks.groups", "admins = alice")], &[]);
        assert!(!ctx.config().contains("githooks", None, "admin"));
        assert!(!ctx.is_admin("alice").unwrap());
        assert!(!ctx.is_admin("root").unwrap());
    }

    #[test]
    fn test_groups_from_multiple_values() {
        let ctx = context(
            HookPhase::Update,
            &[
                ("githooks.groups", "core = alice"),
                ("githooks.groups", "devs = @core bob"),
            ],
            &[],
        );
        let groups = ctx.groups().unwrap();
        assert!(groups.is_member("alice", "devs"));
        assert!(std::ptr::eq(groups, ctx.groups().unwrap()));
    }

    #[test]
    fn test_group_errors_propagate() {
        let ctx = context(HookPhase::Update, &[("githooks.groups", "devs = @nope")], &[]);
        let err = ctx.groups().unwrap_err();
        assert!(err.aborts_invocation());
    }

    #[test]
    fn test_error_collection() {
        let ctx = context(HookPhase::PreCommit, &[], &[]);
        ctx.record_error("one");
        ctx.record_error(String::from("two"));
        assert_eq!(ctx.errors(), vec!["one", "two"]);
        assert_eq!(ctx.take_errors().len(), 2);
        assert!(ctx.errors().is_empty());
    }
}
