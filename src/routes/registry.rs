//! The route registry: which repositories this server manages.
//!
//! Registration state is a single text file, `<bundleRoot>/routes`, one
//! route per line. This module owns that file exclusively; everything else
//! reads repositories through [`RepositoryProvider`].

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::fs;
use crate::git::Git;
use crate::paths::Paths;
use crate::routes::{parse_route, Repository};

pub struct RepositoryProvider {
    paths: Paths,
    git: Arc<dyn Git>,
}

impl RepositoryProvider {
    pub fn new(paths: Paths, git: Arc<dyn Git>) -> Self {
        Self { paths, git }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    fn repository(&self, route: &str) -> Repository {
        Repository {
            route: route.to_string(),
            repo_dir: self.paths.repo_dir(route),
            web_dir: self.paths.web_dir(route),
        }
    }

    // -----------------------------------------------------------------------
    // Routes file
    // -----------------------------------------------------------------------

    /// All registered repositories, keyed by route. Blank lines in the
    /// routes file are ignored; a missing file means no registrations.
    pub fn get_repositories(&self) -> Result<BTreeMap<String, Repository>> {
        let mut repos = BTreeMap::new();

        for line in fs::read_file_lines(&self.paths.routes_file())? {
            let route = line.trim();
            if route.is_empty() {
                continue;
            }
            repos.insert(route.to_string(), self.repository(route));
        }

        Ok(repos)
    }

    /// Atomically rewrite the routes file to contain exactly `repos`.
    pub fn write_all_routes(&self, repos: &BTreeMap<String, Repository>) -> Result<()> {
        let lock = fs::write_lock_file(&self.paths.routes_file(), |w| {
            for route in repos.keys() {
                writeln!(w, "{route}")?;
            }
            Ok(())
        })?;
        lock.commit()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Register `route`, creating its web directory. Idempotent: an
    /// already-registered route is returned as-is. The repo dir is *not*
    /// populated here; that is `init`'s job.
    #[instrument(skip(self))]
    pub fn create_repository(&self, route: &str) -> Result<Repository> {
        let parsed = parse_route(route, true)?;
        let route = parsed.route();

        let mut repos = self.get_repositories()?;
        if let Some(existing) = repos.get(&route) {
            return Ok(existing.clone());
        }

        let repo = self.repository(&route);
        std::fs::create_dir_all(&repo.web_dir).map_err(|e| Error::io(&repo.web_dir, e))?;

        repos.insert(route.clone(), repo.clone());
        self.write_all_routes(&repos)?;

        debug!(%route, "registered route");
        Ok(repo)
    }

    /// Unregister `route`. Whether the on-disk directories are also removed
    /// is the caller's decision (`stop` keeps them, `delete` does not).
    #[instrument(skip(self))]
    pub fn remove_route(&self, route: &str) -> Result<()> {
        let mut repos = self.get_repositories()?;

        if repos.remove(route).is_none() {
            return Err(Error::NotFound(format!("route '{route}'")));
        }

        self.write_all_routes(&repos)
    }

    // -----------------------------------------------------------------------
    // On-disk scan
    // -----------------------------------------------------------------------

    /// Enumerate the repositories that exist in storage, independent of the
    /// routes file: every directory exactly two levels below the repo root
    /// that answers the remote-url probe.
    #[instrument(skip(self))]
    pub async fn read_repository_storage(&self) -> Result<BTreeMap<String, Repository>> {
        let repo_root = self.paths.repo_root();
        let mut repos = BTreeMap::new();

        for entry in fs::read_dir_recursive(&repo_root, 2, true)? {
            if !entry.is_dir {
                continue;
            }

            let Ok(relative) = entry.path.strip_prefix(&repo_root) else {
                continue;
            };
            let Some(route) = relative.to_str().map(str::to_string) else {
                continue;
            };

            match self.git.get_remote_url(&entry.path).await {
                Ok(_) => {
                    repos.insert(route.clone(), self.repository(&route));
                }
                Err(e) => {
                    debug!(%route, error = %e, "skipping directory without a valid mirror");
                }
            }
        }

        Ok(repos)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    /// Git double whose remote-url probe answers from a fixed map.
    #[derive(Default)]
    struct ProbeGit {
        valid_repos: HashMap<String, bool>,
    }

    #[async_trait::async_trait]
    impl Git for ProbeGit {
        async fn clone_bare(&self, _url: &str, _dest: &Path) -> Result<()> {
            unreachable!()
        }

        async fn fetch(&self, _repo_dir: &Path) -> Result<()> {
            unreachable!()
        }

        async fn create_bundle(&self, _repo_dir: &Path, _filename: &Path) -> Result<bool> {
            unreachable!()
        }

        async fn create_incremental_bundle(
            &self,
            _repo_dir: &Path,
            _filename: &Path,
            _prereqs: &[String],
        ) -> Result<bool> {
            unreachable!()
        }

        async fn create_bundle_from_refs(
            &self,
            _repo_dir: &Path,
            _filename: &Path,
            _refs: &HashMap<String, String>,
        ) -> Result<()> {
            unreachable!()
        }

        async fn get_remote_url(&self, repo_dir: &Path) -> Result<String> {
            let name = repo_dir.to_string_lossy();
            let is_valid = self
                .valid_repos
                .iter()
                .any(|(route, valid)| *valid && name.ends_with(route.as_str()));
            if is_valid {
                Ok("https://localhost/example-remote".to_string())
            } else {
                Err(Error::Subprocess {
                    program: "git".into(),
                    status: 128,
                    stderr: "fatal: not a git repository".into(),
                })
            }
        }
    }

    fn provider_in(root: &Path, git: ProbeGit) -> RepositoryProvider {
        RepositoryProvider::new(Paths::new(root), Arc::new(git))
    }

    #[test]
    fn create_registers_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider_in(dir.path(), ProbeGit::default());

        let repo = provider.create_repository("org/repo").unwrap();
        assert_eq!(repo.route, "org/repo");
        assert!(repo.web_dir.is_dir());
        assert!(!repo.repo_dir.exists());

        let again = provider.create_repository("org/repo").unwrap();
        assert_eq!(again, repo);

        let contents = std::fs::read_to_string(dir.path().join("routes")).unwrap();
        assert_eq!(contents, "org/repo\n");
    }

    #[test]
    fn create_rejects_invalid_routes() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider_in(dir.path(), ProbeGit::default());

        assert!(matches!(
            provider.create_repository("a/../b").unwrap_err(),
            Error::InvalidRoute(_)
        ));
        assert!(matches!(
            provider.create_repository("a/b/c").unwrap_err(),
            Error::InvalidRoute(_)
        ));
    }

    #[test]
    fn remove_unknown_route_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider_in(dir.path(), ProbeGit::default());

        assert!(matches!(
            provider.remove_route("no/where").unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn remove_rewrites_routes_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider_in(dir.path(), ProbeGit::default());

        provider.create_repository("a/one").unwrap();
        provider.create_repository("b/two").unwrap();
        provider.remove_route("a/one").unwrap();

        let repos = provider.get_repositories().unwrap();
        assert_eq!(repos.len(), 1);
        assert!(repos.contains_key("b/two"));
    }

    #[test]
    fn blank_lines_in_routes_file_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("routes"), "a/one\n\nb/two\n\n").unwrap();
        let provider = provider_in(dir.path(), ProbeGit::default());

        let repos = provider.get_repositories().unwrap();
        let routes: Vec<&String> = repos.keys().collect();
        assert_eq!(routes, vec!["a/one", "b/two"]);
    }

    #[test]
    fn repositories_resolve_storage_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("routes"), "org/repo\n").unwrap();
        let provider = provider_in(dir.path(), ProbeGit::default());

        let repos = provider.get_repositories().unwrap();
        let repo = &repos["org/repo"];
        assert_eq!(repo.repo_dir, dir.path().join("git/org/repo"));
        assert_eq!(repo.web_dir, dir.path().join("www/org/repo"));
    }

    #[tokio::test]
    async fn storage_scan_keeps_only_valid_mirrors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("git/is/a-repo")).unwrap();
        std::fs::create_dir_all(dir.path().join("git/not/a-repo")).unwrap();
        std::fs::write(dir.path().join("git/stray-file"), b"").unwrap();

        let provider = provider_in(
            dir.path(),
            ProbeGit {
                valid_repos: HashMap::from([
                    ("is/a-repo".to_string(), true),
                    ("not/a-repo".to_string(), false),
                ]),
            },
        );

        let found = provider.read_repository_storage().await.unwrap();
        let routes: Vec<&String> = found.keys().collect();
        assert_eq!(routes, vec!["is/a-repo"]);
    }
}
