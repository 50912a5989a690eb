//! `githooks` binary: symlink any hook name to it.
//!
//! ```text
//! ln -s /usr/local/bin/githooks .git/hooks/pre-receive
//! ```
//!
//! It may also be run directly as `githooks <hook-name> [args...]`.

use std::process::ExitCode;
use std::sync::Arc;

use githooks::config::ConfigLoader;
use githooks::hooks::{Dispatcher, HookPhase, PhaseClass};
use githooks::repository::{GitCommandRepository, Repository};
use githooks::review::{CommandReviewPoster, ReviewPoster};
use githooks::{EnvSnapshot, Error};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "GITHOOKS_LOG";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut argv = std::env::args();
    let mut invocation = argv.next().unwrap_or_default();
    let mut args: Vec<String> = argv.collect();

    // `githooks pre-commit ...`
    if HookPhase::from_invocation(&invocation).is_none()
        && let Some(first) = args.first()
        && HookPhase::from_name(first).is_some()
    {
        invocation = args.remove(0);
    }

    match run(&invocation, args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::debug!(error = ?e, category = ?e.category(), "Invocation failed");
            eprintln!("githooks: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(invocation: &str, args: Vec<String>) -> githooks::Result<u8> {
    if HookPhase::from_invocation(invocation).is_none() {
        return Err(Error::UnknownHook(invocation.to_string()));
    }

    let repository = GitCommandRepository::discover().await?;
    let config = ConfigLoader::new()
        .with_env(EnvSnapshot::from_process())
        .git()
        .load()
        .await?;
    tracing::debug!(git_dir = %repository.git_dir().display(), keys = config.len(), "Configuration loaded");

    let reviewer = CommandReviewPoster::from_config(&config)?;
    let mut dispatcher = Dispatcher::new(config, Arc::new(repository));
    if let Some(reviewer) = reviewer {
        dispatcher = dispatcher.with_reviewer(Arc::new(reviewer) as Arc<dyn ReviewPoster>);
    }

    let report = dispatcher
        .dispatch(invocation, &args, tokio::io::stdin())
        .await?;

    if report.class == PhaseClass::Blocking && !report.messages.is_empty() {
        eprint!("{}", report.render());
    }
    Ok(report.exit_code)
}
