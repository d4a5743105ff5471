//! Git command wrappers using [`tokio::process::Command`].
//!
//! Every operation shells out to the system `git` binary. `LC_CTYPE=C` is
//! set on each invocation so that error-message matching (notably the
//! empty-bundle refusal) is deterministic regardless of the host locale.
//!
//! The [`Git`] trait exists so the bundle engine and registry can be
//! exercised against a scripted double in tests; [`GitExec`] is the real
//! implementation.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Stderr fragment emitted by `git bundle create` when the requested bundle
/// would contain no objects. Matching on it is a deliberate tight coupling
/// to Git's message text.
const EMPTY_BUNDLE_STDERR: &str = "Refusing to create empty bundle";

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Typed surface over the `git` subprocess.
#[async_trait::async_trait]
pub trait Git: Send + Sync {
    /// Clone `url` as a bare mirror into `dest`, configure the refspec
    /// `+refs/heads/*:refs/heads/*`, and run an initial fetch.
    async fn clone_bare(&self, url: &str, dest: &Path) -> Result<()>;

    /// Fetch `origin` inside an existing bare repo.
    async fn fetch(&self, repo_dir: &Path) -> Result<()>;

    /// Run `git bundle create <filename> --branches`.
    ///
    /// Returns `false` (without error) when Git refuses to create an empty
    /// bundle.
    async fn create_bundle(&self, repo_dir: &Path, filename: &Path) -> Result<bool>;

    /// Run `git bundle create <filename> --stdin --branches`, feeding
    /// `prereqs` (lines of the form `^<oid>`) on stdin. Same empty-bundle
    /// policy as [`Git::create_bundle`].
    async fn create_incremental_bundle(
        &self,
        repo_dir: &Path,
        filename: &Path,
        prereqs: &[String],
    ) -> Result<bool>;

    /// Force-create each `(ref, oid)` pair with `git branch -f`, then bundle
    /// exactly those refs via `git bundle create <filename> --stdin`.
    async fn create_bundle_from_refs(
        &self,
        repo_dir: &Path,
        filename: &Path,
        refs: &HashMap<String, String>,
    ) -> Result<()>;

    /// Read the configured origin URL. Doubles as the "is this a valid bare
    /// mirror?" probe: failure means the directory is not one of ours.
    async fn get_remote_url(&self, repo_dir: &Path) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

/// [`Git`] implementation backed by the system `git` binary.
#[derive(Debug, Default, Clone)]
pub struct GitExec;

impl GitExec {
    pub fn new() -> Self {
        Self
    }

    async fn run_git(&self, stdin_lines: Option<&[String]>, args: &[&str]) -> Result<GitOutput> {
        let mut cmd = tokio::process::Command::new("git");
        cmd.args(args);
        cmd.env("LC_CTYPE", "C");
        cmd.stdin(if stdin_lines.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!(?args, "spawning git");

        let mut child = cmd.spawn().map_err(|e| Error::Spawn {
            program: "git".into(),
            source: e,
        })?;

        if let Some(lines) = stdin_lines {
            let mut buffer = String::new();
            for line in lines {
                buffer.push_str(line);
                buffer.push('\n');
            }
            let mut stdin = child.stdin.take().ok_or_else(|| Error::Spawn {
                program: "git".into(),
                source: std::io::Error::other("failed to open stdin"),
            })?;
            stdin
                .write_all(buffer.as_bytes())
                .await
                .map_err(|e| Error::Spawn {
                    program: "git".into(),
                    source: e,
                })?;
            // Dropped here to signal EOF.
        }

        let output = child.wait_with_output().await.map_err(|e| Error::Spawn {
            program: "git".into(),
            source: e,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(Error::Subprocess {
                program: "git".into(),
                status: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(GitOutput { stdout })
    }
}

struct GitOutput {
    stdout: String,
}

/// Whether a failed `bundle create` was only refusing to write an empty
/// bundle.
fn is_empty_bundle_refusal(err: &Error) -> bool {
    matches!(err, Error::Subprocess { stderr, .. } if stderr.contains(EMPTY_BUNDLE_STDERR))
}

#[async_trait::async_trait]
impl Git for GitExec {
    #[instrument(skip(self), fields(%url, dest = %dest.display()))]
    async fn clone_bare(&self, url: &str, dest: &Path) -> Result<()> {
        let dest_str = path_str(dest)?;
        self.run_git(None, &["clone", "--bare", url, dest_str])
            .await?;
        self.run_git(
            None,
            &[
                "-C",
                dest_str,
                "config",
                "remote.origin.fetch",
                "+refs/heads/*:refs/heads/*",
            ],
        )
        .await?;
        self.run_git(None, &["-C", dest_str, "fetch", "origin"])
            .await?;

        debug!("bare clone complete");
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %repo_dir.display()))]
    async fn fetch(&self, repo_dir: &Path) -> Result<()> {
        self.run_git(None, &["-C", path_str(repo_dir)?, "fetch", "origin"])
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %repo_dir.display(), out = %filename.display()))]
    async fn create_bundle(&self, repo_dir: &Path, filename: &Path) -> Result<bool> {
        let result = self
            .run_git(
                None,
                &[
                    "-C",
                    path_str(repo_dir)?,
                    "bundle",
                    "create",
                    path_str(filename)?,
                    "--branches",
                ],
            )
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_empty_bundle_refusal(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(
        skip(self, prereqs),
        fields(repo = %repo_dir.display(), out = %filename.display(), prereq_count = prereqs.len())
    )]
    async fn create_incremental_bundle(
        &self,
        repo_dir: &Path,
        filename: &Path,
        prereqs: &[String],
    ) -> Result<bool> {
        let result = self
            .run_git(
                Some(prereqs),
                &[
                    "-C",
                    path_str(repo_dir)?,
                    "bundle",
                    "create",
                    path_str(filename)?,
                    "--stdin",
                    "--branches",
                ],
            )
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_empty_bundle_refusal(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(
        skip(self, refs),
        fields(repo = %repo_dir.display(), out = %filename.display(), ref_count = refs.len())
    )]
    async fn create_bundle_from_refs(
        &self,
        repo_dir: &Path,
        filename: &Path,
        refs: &HashMap<String, String>,
    ) -> Result<()> {
        let repo = path_str(repo_dir)?;

        let mut ref_names: Vec<String> = Vec::with_capacity(refs.len());
        for (name, oid) in refs {
            self.run_git(None, &["-C", repo, "branch", "-f", name, oid])
                .await?;
            ref_names.push(name.clone());
        }

        self.run_git(
            Some(&ref_names),
            &[
                "-C",
                repo,
                "bundle",
                "create",
                path_str(filename)?,
                "--stdin",
            ],
        )
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(repo = %repo_dir.display()))]
    async fn get_remote_url(&self, repo_dir: &Path) -> Result<String> {
        let output = self
            .run_git(
                None,
                &["-C", path_str(repo_dir)?, "remote", "get-url", "origin"],
            )
            .await?;
        Ok(output.stdout.trim().to_string())
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        Error::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "non-UTF-8 path"),
        )
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
