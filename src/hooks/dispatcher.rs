//! Routes one hook invocation through plugins, handlers, external scripts
//! and post-hooks.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::external::ExternalHooks;
use super::{
    DispatchReport, DispatchResult, Handler, HandlerRecord, HookInput, HookPhase, HookRegistry,
    PhaseClass, PostHook,
};
use crate::Error;
use crate::config::ResolvedConfig;
use crate::context::{GerritContext, HookContext};
use crate::plugins::{PluginCatalog, short_name};
use crate::repository::Repository;
use crate::review::{GerritReviewPostHook, ReviewPoster};

pub struct Dispatcher {
    config: Arc<ResolvedConfig>,
    registry: HookRegistry,
    catalog: PluginCatalog,
    repository: Arc<dyn Repository>,
    reviewer: Option<Arc<dyn ReviewPoster>>,
    git_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(config: ResolvedConfig, repository: Arc<dyn Repository>) -> Self {
        let git_dir = repository.git_dir().to_path_buf();
        Self {
            config: Arc::new(config),
            registry: HookRegistry::new(),
            catalog: PluginCatalog::builtin(),
            repository,
            reviewer: None,
            git_dir,
        }
    }

    pub fn with_catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_reviewer(mut self, reviewer: Arc<dyn ReviewPoster>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    /// Base of the `hooks.d` external hook directory. Defaults to the
    /// repository's git dir.
    pub fn with_git_dir(mut self, git_dir: impl Into<PathBuf>) -> Self {
        self.git_dir = git_dir.into();
        self
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut HookRegistry {
        &mut self.registry
    }

    pub fn register(
        &mut self,
        phase: HookPhase,
        handler: impl Handler + 'static,
    ) -> crate::Result<()> {
        self.registry.register(phase, Arc::new(handler))
    }

    pub fn register_post_hook(&mut self, hook: impl PostHook + 'static) -> crate::Result<()> {
        self.registry.register_post_hook(Arc::new(hook))
    }

    /// Runs the hook named by `invocation`.
    ///
    /// `Err` is reserved for invocation-level failures (unknown hook, bad
    /// input, configuration errors); policy failures are reported through
    /// [`DispatchReport::exit_code`].
    pub async fn dispatch<R>(
        mut self,
        invocation: &str,
        args: &[String],
        mut stdin: R,
    ) -> crate::Result<DispatchReport>
    where
        R: AsyncRead + Unpin,
    {
        let phase = HookPhase::from_invocation(invocation)
            .ok_or_else(|| Error::UnknownHook(invocation.to_string()))?;
        tracing::debug!(phase = %phase, args = ?args, "Dispatching hook");

        let mut text = String::new();
        if phase.reads_stdin() {
            stdin.read_to_string(&mut text).await?;
        }
        let input = HookInput::parse(phase, args.to_vec(), text)?;

        let loaded = self.catalog.load(&mut self.registry, &self.config)?;
        let disabled = self.catalog.disabled_names(&self.config);
        tracing::debug!(plugins = ?loaded, "Plugins loaded");

        if phase.is_gerrit() && self.reviewer.is_some() {
            self.registry
                .register_post_hook(Arc::new(GerritReviewPostHook))?;
        }

        self.registry.begin_dispatch();

        let mut ctx = HookContext::new(
            Arc::clone(&self.config),
            phase,
            Arc::clone(&self.repository),
        );
        if phase.is_gerrit() {
            ctx = ctx.with_gerrit(GerritContext {
                args: input.gerrit.clone(),
                reviewer: self.reviewer.clone(),
            });
        }

        let mut result = DispatchResult::new();
        for handler in self.registry.handlers_for(phase) {
            if let Some(plugin) = handler.plugin().map(short_name)
                && (disabled.contains(plugin) || ctx.env().disables(plugin))
            {
                tracing::debug!(handler = handler.name(), plugin, "Skipping disabled plugin");
                continue;
            }
            result.push(run_handler(handler.as_ref(), &input, &ctx).await?);
        }

        if self.config.get_bool("githooks", None, "externals") != Some(false)
            && let Err(failure) = ExternalHooks::from_config(&self.git_dir, &self.config)
                .run(&input)
                .await
        {
            result.set_external_failure(failure);
        }

        let messages = result.messages();
        let failed = !result.succeeded();

        let warn_only = failed
            && phase.is_commit_message()
            && self.config.get_bool("githooks", None, "abort-commit") == Some(false);

        let class = input.class();
        let exit_code = match class {
            PhaseClass::Blocking if failed && !warn_only => 1,
            _ => 0,
        };

        if failed {
            match class {
                PhaseClass::Blocking => tracing::info!(
                    phase = %phase,
                    failures = messages.len(),
                    warn_only,
                    "Hook failed"
                ),
                PhaseClass::Notification => {
                    for message in &messages {
                        tracing::warn!(phase = %phase, message = %message, "Notification hook reported failure");
                    }
                }
            }
        }

        let mut notifier = self.registry.begin_post_hooks();
        notifier.extend(ctx.take_deferred());
        notifier.run_all(&result, &ctx).await;
        self.registry.finish();

        let help = if failed {
            self.config
                .get_evaluated("githooks", None, "help-on-error")
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Ignoring githooks.help-on-error");
                    None
                })
        } else {
            None
        };

        let external_failure = result.external_failure().cloned();
        Ok(DispatchReport {
            phase,
            class,
            result,
            external_failure,
            exit_code,
            warn_only,
            messages,
            help,
        })
    }
}

/// One handler inside its own failure boundary.
async fn run_handler(
    handler: &dyn Handler,
    input: &HookInput,
    ctx: &HookContext,
) -> crate::Result<HandlerRecord> {
    let outcome = handler.execute(input, ctx).await;
    let mut errors = ctx.take_errors();

    match outcome {
        Ok(output) => errors.extend(output.errors),
        Err(e) if e.aborts_invocation() => return Err(e),
        Err(e) => {
            tracing::debug!(handler = handler.name(), error = %e, "Handler returned error");
            errors.push(e.to_string());
        }
    }

    let record = HandlerRecord::new(
        handler.name(),
        handler.plugin().map(str::to_string),
        errors,
    );
    tracing::debug!(
        handler = handler.name(),
        success = record.success,
        errors = record.errors.len(),
        "Handler finished"
    );
    Ok(record)
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("catalog", &self.catalog)
            .field("git_dir", &self.git_dir)
            .field("reviewer", &self.reviewer.is_some())
            .finish_non_exhaustive()
    }
}
