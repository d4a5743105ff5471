//! The periodic update pipeline.
//!
//! A single-route update fetches the mirror, produces at most one new
//! incremental bundle, collapses the list if it grew past the threshold,
//! and republishes. `update-all` fans out by re-invoking the current
//! executable once per registered route, sequentially; the child process is
//! the unit of isolation, so a broken route cannot poison the in-process
//! state of the others.

use std::process::Stdio;

use tracing::{info, instrument};

use crate::bundles::BundleProvider;
use crate::error::{Error, Result};
use crate::git::Git;
use crate::routes::RepositoryProvider;

/// What a single-route update accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The mirror had nothing new; the published list is unchanged.
    UpToDate,
    /// A new incremental bundle (and possibly a collapsed base) was
    /// published.
    Updated,
}

/// Run the update pipeline for one route.
#[instrument(skip(repos, bundles, git))]
pub async fn update_route(
    repos: &RepositoryProvider,
    bundles: &BundleProvider,
    git: &dyn Git,
    route: &str,
) -> Result<UpdateStatus> {
    let repo = repos.create_repository(route)?;
    let mut list = bundles.get_bundle_list(&repo)?;

    git.fetch(&repo.repo_dir).await?;

    let Some(bundle) = bundles.create_incremental_bundle(&repo, &list).await? else {
        return Ok(UpdateStatus::UpToDate);
    };

    list.add(bundle);
    bundles.collapse_list(&repo, &mut list).await?;
    bundles.write_bundle_list(&list, &repo)?;

    info!(%route, "published updated bundle list");
    Ok(UpdateStatus::Updated)
}

/// The exit status of a failed `update` child during `update-all`.
#[derive(Debug, Clone, Copy)]
pub struct ChildFailure {
    pub route_exit_code: i32,
}

/// Run `update <route> <extra_args...>` as a child process for every
/// registered route, one at a time, inheriting stdout/stderr.
///
/// Returns the first failing child's exit code, which aborts the batch.
#[instrument(skip(repos, extra_args))]
pub async fn update_all(
    repos: &RepositoryProvider,
    extra_args: &[String],
) -> Result<Option<ChildFailure>> {
    let exe = std::env::current_exe().map_err(|e| Error::Spawn {
        program: "git-bundle-server".into(),
        source: e,
    })?;

    for route in repos.get_repositories()?.keys() {
        info!(%route, "updating route");

        let status = tokio::process::Command::new(&exe)
            .arg("update")
            .arg(route)
            .args(extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Error::Spawn {
                program: exe.display().to_string(),
                source: e,
            })?;

        if !status.success() {
            return Ok(Some(ChildFailure {
                route_exit_code: status.code().unwrap_or(1),
            }));
        }
    }

    Ok(None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;

    use crate::bundles::{Bundle, BundleList};
    use crate::error::Error;
    use crate::fs;
    use crate::paths::Paths;

    /// Git double for pipeline tests: fetch succeeds, incremental bundle
    /// creation is scripted.
    struct PipelineGit {
        has_new_objects: bool,
    }

    #[async_trait::async_trait]
    impl Git for PipelineGit {
        async fn clone_bare(&self, _url: &str, _dest: &Path) -> crate::error::Result<()> {
            unreachable!()
        }

        async fn fetch(&self, _repo_dir: &Path) -> crate::error::Result<()> {
            Ok(())
        }

        async fn create_bundle(
            &self,
            _repo_dir: &Path,
            _filename: &Path,
        ) -> crate::error::Result<bool> {
            unreachable!()
        }

        async fn create_incremental_bundle(
            &self,
            _repo_dir: &Path,
            filename: &Path,
            _prereqs: &[String],
        ) -> crate::error::Result<bool> {
            if !self.has_new_objects {
                return Ok(false);
            }
            fs::write_file(filename, b"# v2 git bundle\n")?;
            Ok(true)
        }

        async fn create_bundle_from_refs(
            &self,
            _repo_dir: &Path,
            _filename: &Path,
            _refs: &HashMap<String, String>,
        ) -> crate::error::Result<()> {
            unreachable!()
        }

        async fn get_remote_url(&self, _repo_dir: &Path) -> crate::error::Result<String> {
            Ok("https://localhost/example-remote".to_string())
        }
    }

    fn pipeline_under(
        root: &Path,
        git: PipelineGit,
    ) -> (RepositoryProvider, BundleProvider, Arc<dyn Git>) {
        let git: Arc<dyn Git> = Arc::new(git);
        (
            RepositoryProvider::new(Paths::new(root), git.clone()),
            BundleProvider::new(git.clone()),
            git,
        )
    }

    fn seed_published_list(repos: &RepositoryProvider, bundles: &BundleProvider) {
        let repo = repos.create_repository("org/repo").unwrap();
        std::fs::create_dir_all(&repo.repo_dir).unwrap();

        let seed = Bundle::incremental(&repo, 1);
        std::fs::write(
            &seed.filename,
            format!("# v2 git bundle\n{} refs/heads/main\n\n", "ab".repeat(20)),
        )
        .unwrap();
        bundles
            .write_bundle_list(&BundleList::singleton(seed), &repo)
            .unwrap();
    }

    #[tokio::test]
    async fn up_to_date_leaves_published_list_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let (repos, bundles, git) = pipeline_under(
            dir.path(),
            PipelineGit {
                has_new_objects: false,
            },
        );
        seed_published_list(&repos, &bundles);

        let json_path = dir.path().join("git/org/repo/bundle-list.json");
        let before = std::fs::read(&json_path).unwrap();

        let status = update_route(&repos, &bundles, git.as_ref(), "org/repo")
            .await
            .unwrap();

        assert_eq!(status, UpdateStatus::UpToDate);
        assert_eq!(std::fs::read(&json_path).unwrap(), before);
    }

    #[tokio::test]
    async fn new_objects_publish_one_more_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let (repos, bundles, git) = pipeline_under(
            dir.path(),
            PipelineGit {
                has_new_objects: true,
            },
        );
        seed_published_list(&repos, &bundles);

        let status = update_route(&repos, &bundles, git.as_ref(), "org/repo")
            .await
            .unwrap();
        assert_eq!(status, UpdateStatus::Updated);

        let repo = repos.get_repositories().unwrap()["org/repo"].clone();
        let list = bundles.get_bundle_list(&repo).unwrap();
        assert_eq!(list.bundles.len(), 2);
        assert!(list.max_creation_token().unwrap() > 1);
    }

    #[tokio::test]
    async fn missing_bundle_list_fails_the_route() {
        let dir = tempfile::tempdir().unwrap();
        let (repos, bundles, git) = pipeline_under(
            dir.path(),
            PipelineGit {
                has_new_objects: true,
            },
        );
        // Registered, but never initialized: no bundle-list.json.
        repos.create_repository("org/repo").unwrap();

        let err = update_route(&repos, &bundles, git.as_ref(), "org/repo")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
