//! External hook scripts chained after the in-process handlers.
//!
//! For each configured directory, executables found in its phase-named
//! subdirectory run in lexicographic order with the hook's own arguments and
//! standard input. The first non-zero exit stops the chain.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{HookInput, HookPhase};
use crate::config::ResolvedConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalFailure {
    pub hook: PathBuf,
    /// `None` when the script was killed by a signal or could not be spawned.
    pub code: Option<i32>,
    pub output: String,
}

impl std::fmt::Display for ExternalFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(
                f,
                "External hook '{}' exited with code {}",
                self.hook.display(),
                code
            )?,
            None => write!(f, "External hook '{}' did not complete", self.hook.display())?,
        }
        let output = self.output.trim_end();
        if !output.is_empty() {
            write!(f, ":\n{}", output)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExternalFailure {}

#[derive(Clone, Debug, Default)]
pub struct ExternalHooks {
    dirs: Vec<PathBuf>,
}

impl ExternalHooks {
    pub fn new(dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// `$GIT_DIR/hooks.d` followed by every `githooks.hooks` directory.
    pub fn from_config(git_dir: &Path, config: &ResolvedConfig) -> Self {
        let mut dirs = vec![git_dir.join("hooks.d")];
        dirs.extend(
            config
                .get_all("githooks", None, "hooks")
                .iter()
                .map(PathBuf::from),
        );
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Executable files for `phase`, directory by directory, each directory
    /// sorted by file name.
    pub fn discover(&self, phase: HookPhase) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for dir in &self.dirs {
            let phase_dir = dir.join(phase.name());
            if !phase_dir.is_dir() {
                continue;
            }
            let Some(base) = phase_dir.to_str() else {
                tracing::warn!(dir = %phase_dir.display(), "Skipping non UTF-8 hook directory");
                continue;
            };
            let pattern = format!("{}/*", glob::Pattern::escape(base));
            let entries = match glob::glob(&pattern) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(dir = %phase_dir.display(), error = %e, "Invalid hook directory");
                    continue;
                }
            };

            let mut scripts: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .filter(|path| path.is_file() && is_executable(path))
                .collect();
            scripts.sort();
            found.extend(scripts);
        }
        found
    }

    /// Runs the chain; `Ok` carries the number of scripts executed.
    pub async fn run(&self, input: &HookInput) -> Result<usize, ExternalFailure> {
        let scripts = self.discover(input.phase);
        for script in &scripts {
            run_script(script, input).await?;
        }
        Ok(scripts.len())
    }
}

fn is_executable(path: &Path) -> bool {
    rustix::fs::access(path, rustix::fs::Access::EXEC_OK).is_ok()
}

async fn run_script(script: &Path, input: &HookInput) -> Result<(), ExternalFailure> {
    tracing::debug!(hook = %script.display(), phase = %input.phase, "Running external hook");

    let mut child = Command::new(script)
        .args(&input.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ExternalFailure {
            hook: script.to_path_buf(),
            code: None,
            output: format!("cannot spawn: {}", e),
        })?;

    let stdin = child.stdin.take();
    let data = input.stdin.as_bytes();
    let feed = async move {
        if let Some(mut stdin) = stdin
            && let Err(e) = stdin.write_all(data).await
        {
            // scripts are free to ignore their input
            tracing::trace!(error = %e, "External hook closed stdin early");
        }
    };
    let (_, output) = tokio::join!(feed, child.wait_with_output());
    let output = output.map_err(|e| ExternalFailure {
        hook: script.to_path_buf(),
        code: None,
        output: e.to_string(),
    })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(ExternalFailure {
            hook: script.to_path_buf(),
            code: output.status.code(),
            output: text,
        });
    }

    if !text.is_empty() {
        let mut stderr = tokio::io::stderr();
        if let Err(e) = stderr.write_all(text.as_bytes()).await {
            tracing::debug!(error = %e, "Cannot forward external hook output");
        }
    }
    Ok(())
}
