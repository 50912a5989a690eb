//! Repository queries used by handlers.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::Error;
use crate::hooks::input::is_null_sha;

/// Object name of git's empty tree, the base for diffs of created refs.
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefEntry {
    pub name: String,
    pub target: String,
}

#[async_trait]
pub trait Repository: Send + Sync {
    fn git_dir(&self) -> &Path;

    /// Whether `ancestor` is reachable from `descendant`.
    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> crate::Result<bool>;

    async fn list_refs(&self, pattern: Option<&str>) -> crate::Result<Vec<RefEntry>>;

    /// Paths changed between two commits. A null `old` diffs against the
    /// empty tree.
    async fn changed_files(&self, old: &str, new: &str) -> crate::Result<Vec<String>>;

    async fn read_object(&self, spec: &str) -> crate::Result<Vec<u8>>;
}

/// [`Repository`] backed by the `git` command line.
#[derive(Clone, Debug)]
pub struct GitCommandRepository {
    git_dir: PathBuf,
    program: PathBuf,
}

impl GitCommandRepository {
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_dir: git_dir.into(),
            program: PathBuf::from("git"),
        }
    }

    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Uses `$GIT_DIR` when git exported it, otherwise asks git.
    pub async fn discover() -> crate::Result<Self> {
        if let Some(dir) = std::env::var_os("GIT_DIR") {
            return Ok(Self::new(dir));
        }
        let output = Command::new("git")
            .args(["rev-parse", "--absolute-git-dir"])
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(Error::Repository(format!(
                "not inside a git repository: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let dir = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self::new(dir))
    }

    async fn git(&self, args: &[&str]) -> crate::Result<std::process::Output> {
        tracing::trace!(?args, "Running git");
        Command::new(&self.program)
            .env("GIT_DIR", &self.git_dir)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Repository(format!("cannot run git {}: {}", args.join(" "), e)))
    }

    async fn git_ok(&self, args: &[&str]) -> crate::Result<Vec<u8>> {
        let output = self.git(args).await?;
        if !output.status.success() {
            return Err(Error::Repository(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Repository for GitCommandRepository {
    fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> crate::Result<bool> {
        let output = self
            .git(&["merge-base", "--is-ancestor", ancestor, descendant])
            .await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(Error::Repository(format!(
                "cannot compare {} and {}: {}",
                ancestor,
                descendant,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    async fn list_refs(&self, pattern: Option<&str>) -> crate::Result<Vec<RefEntry>> {
        let mut args = vec!["for-each-ref", "--format=%(objectname) %(refname)"];
        args.extend(pattern);
        let stdout = self.git_ok(&args).await?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .filter_map(|line| line.split_once(' '))
            .map(|(target, name)| RefEntry {
                name: name.to_string(),
                target: target.to_string(),
            })
            .collect())
    }

    async fn changed_files(&self, old: &str, new: &str) -> crate::Result<Vec<String>> {
        let old = if is_null_sha(old) { EMPTY_TREE } else { old };
        let stdout = self
            .git_ok(&["diff", "--name-only", "-z", "--no-renames", old, new])
            .await?;
        Ok(stdout
            .split(|b| *b == 0)
            .filter(|path| !path.is_empty())
            .map(|path| String::from_utf8_lossy(path).into_owned())
            .collect())
    }

    async fn read_object(&self, spec: &str) -> crate::Result<Vec<u8>> {
        self.git_ok(&["cat-file", "-p", spec]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn git(dir: &Path, args: &[&str]) -> Option<String> {
        let output = Command::new("git")
            .current_dir(dir)
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(["-c", "commit.gpgsign=false", "-c", "init.defaultBranch=main"])
            .args(args)
            .output()
            .await
            .ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Two-commit repository, or `None` when git is unavailable.
    async fn scratch_repo() -> Option<(tempfile::TempDir, String, String)> {
        let dir = tempfile::tempdir().ok()?;
        git(dir.path(), &["init", "-q"]).await?;
        std::fs::write(dir.path().join("a.txt"), "a\n").ok()?;
        git(dir.path(), &["add", "a.txt"]).await?;
        git(dir.path(), &["commit", "-q", "-m", "first"]).await?;
        let first = git(dir.path(), &["rev-parse", "HEAD"]).await?;
        std::fs::write(dir.path().join("b.txt"), "b\n").ok()?;
        git(dir.path(), &["add", "b.txt"]).await?;
        git(dir.path(), &["commit", "-q", "-m", "second"]).await?;
        let second = git(dir.path(), &["rev-parse", "HEAD"]).await?;
        Some((dir, first, second))
    }

    #[tokio::test]
    async fn test_queries_against_scratch_repo() {
        let Some((dir, first, second)) = scratch_repo().await else {
            eprintln!("git not available, skipping");
            return;
        };
        let repo = GitCommandRepository::new(dir.path().join(".git"));

        assert!(repo.is_ancestor(&first, &second).await.unwrap());
        assert!(!repo.is_ancestor(&second, &first).await.unwrap());

        let changed = repo.changed_files(&first, &second).await.unwrap();
        assert_eq!(changed, vec!["b.txt"]);

        let null = "0".repeat(40);
        let mut created = repo.changed_files(&null, &second).await.unwrap();
        created.sort();
        assert_eq!(created, vec!["a.txt", "b.txt"]);

        let refs = repo.list_refs(Some("refs/heads")).await.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target, second);

        let blob = repo
            .read_object(&format!("{}:a.txt", second))
            .await
            .unwrap();
        assert_eq!(blob, b"a\n");
    }

    #[tokio::test]
    async fn test_missing_object_is_repository_error() {
        let Some((dir, _, _)) = scratch_repo().await else {
            return;
        };
        let repo = GitCommandRepository::new(dir.path().join(".git"));
        let err = repo.read_object("HEAD:missing.txt").await.unwrap_err();
        assert!(matches!(err, Error::Repository(_)));
    }
}
