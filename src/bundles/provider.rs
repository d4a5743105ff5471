//! Bundle creation and bundle-list maintenance.
//!
//! [`BundleProvider`] owns every mutation of a repository's bundle state:
//! the initial bundle at `init`, incremental bundles during `update`, the
//! collapse of old bundles into a synthesized base, and the atomic
//! publication of the bundle list's three on-disk artifacts.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use crate::bundles::header::parse_bundle_header;
use crate::bundles::{
    Bundle, BundleList, BUNDLE_LIST_FILENAME, BUNDLE_LIST_JSON_FILENAME,
    REPO_BUNDLE_LIST_FILENAME,
};
use crate::error::{Error, Result};
use crate::fs;
use crate::git::Git;
use crate::routes::Repository;

/// A list longer than this is collapsed down to exactly this many bundles.
const MAX_BUNDLES: usize = 5;

pub struct BundleProvider {
    git: Arc<dyn Git>,
}

impl BundleProvider {
    pub fn new(git: Arc<dyn Git>) -> Self {
        Self { git }
    }

    // -----------------------------------------------------------------------
    // Creation-token assignment
    // -----------------------------------------------------------------------

    /// The first bundle of a fresh repository, stamped with the current
    /// Unix time.
    pub fn create_initial_bundle(&self, repo: &Repository) -> Bundle {
        Bundle::incremental(repo, Utc::now().timestamp())
    }

    /// A new bundle whose creation token is strictly greater than every
    /// token already in `list`.
    fn create_distinct_bundle(&self, repo: &Repository, list: &BundleList) -> Bundle {
        let mut timestamp = Utc::now().timestamp();

        if let Some(max_token) = list.max_creation_token() {
            if timestamp <= max_token {
                timestamp = max_token + 1;
            }
        }

        Bundle::incremental(repo, timestamp)
    }

    // -----------------------------------------------------------------------
    // Publication
    // -----------------------------------------------------------------------

    /// Publish `list` atomically as its three artifacts:
    ///
    /// 1. `<webDir>/bundle-list` -- URIs relative to `/<route>/` (requests
    ///    with a trailing slash);
    /// 2. `<webDir>/repo-bundle-list` -- URIs relative to `/<owner>/`
    ///    (requests without a trailing slash);
    /// 3. `<repoDir>/bundle-list.json` -- the canonical form.
    ///
    /// All three are staged as lock files before anything is committed, and
    /// the JSON commits first so the text lists never advertise a bundle the
    /// canonical state does not know about.
    #[instrument(skip(self, list), fields(route = %repo.route, bundles = list.bundles.len()))]
    pub fn write_bundle_list(&self, list: &BundleList, repo: &Repository) -> Result<()> {
        // "/owner/repo/" for the trailing-slash projection, "/owner/" for
        // the repo-level one.
        let dir_base = format!("/{}/", repo.route);
        let owner = repo.route.split('/').next().unwrap_or_default();
        let owner_base = format!("/{owner}/");

        let list_path = repo.web_dir.join(BUNDLE_LIST_FILENAME);
        let repo_list_path = repo.web_dir.join(REPO_BUNDLE_LIST_FILENAME);
        let json_path = repo.repo_dir.join(BUNDLE_LIST_JSON_FILENAME);

        let list_lock = fs::write_lock_file(&list_path, |w| write_list_ini(w, list, &dir_base))?;

        let repo_list_lock =
            match fs::write_lock_file(&repo_list_path, |w| write_list_ini(w, list, &owner_base)) {
                Ok(lock) => lock,
                Err(e) => {
                    list_lock.rollback();
                    return Err(e);
                }
            };

        let json = match serde_json::to_vec(list) {
            Ok(json) => json,
            Err(e) => {
                list_lock.rollback();
                repo_list_lock.rollback();
                return Err(Error::Json {
                    context: "failed to serialize bundle list".to_string(),
                    source: e,
                });
            }
        };

        let json_lock = match fs::write_lock_file(&json_path, |w| w.write_all(&json)) {
            Ok(lock) => lock,
            Err(e) => {
                list_lock.rollback();
                repo_list_lock.rollback();
                return Err(e);
            }
        };

        if let Err(e) = json_lock.commit() {
            list_lock.rollback();
            repo_list_lock.rollback();
            return Err(e);
        }
        if let Err(e) = list_lock.commit() {
            repo_list_lock.rollback();
            return Err(e);
        }
        repo_list_lock.commit()?;

        debug!("bundle list published");
        Ok(())
    }

    /// Load the canonical bundle list from `<repoDir>/bundle-list.json`.
    pub fn get_bundle_list(&self, repo: &Repository) -> Result<BundleList> {
        let json_path = repo.repo_dir.join(BUNDLE_LIST_JSON_FILENAME);

        let file = match File::open(&json_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "bundle list for route '{}'",
                    repo.route
                )))
            }
            Err(e) => return Err(Error::io(&json_path, e)),
        };

        serde_json::from_reader(file).map_err(|e| Error::Json {
            context: format!("failed to parse {}", json_path.display()),
            source: e,
        })
    }

    // -----------------------------------------------------------------------
    // Incremental bundles
    // -----------------------------------------------------------------------

    /// Every tip OID of every bundle already in the list, as `^<oid>`
    /// exclusion lines for `git bundle create --stdin`.
    fn all_prereqs(&self, list: &BundleList) -> Result<Vec<String>> {
        let mut prereqs = Vec::new();

        for bundle in list.bundles.values() {
            let header = parse_bundle_header(&bundle.filename)?;
            for oid in header.refs.values() {
                prereqs.push(format!("^{oid}"));
            }
        }

        Ok(prereqs)
    }

    /// Create the next incremental bundle for `repo`.
    ///
    /// Returns `None` (and leaves `list` untouched) when the mirror has
    /// nothing new to bundle.
    #[instrument(skip(self, list), fields(route = %repo.route))]
    pub async fn create_incremental_bundle(
        &self,
        repo: &Repository,
        list: &BundleList,
    ) -> Result<Option<Bundle>> {
        let bundle = self.create_distinct_bundle(repo, list);
        let prereqs = self.all_prereqs(list)?;

        let written = self
            .git
            .create_incremental_bundle(&repo.repo_dir, &bundle.filename, &prereqs)
            .await?;

        if !written {
            debug!("no new objects; skipping bundle");
            return Ok(None);
        }

        Ok(Some(bundle))
    }

    // -----------------------------------------------------------------------
    // Collapse
    // -----------------------------------------------------------------------

    /// Collapse the oldest bundles so that at most [`MAX_BUNDLES`] remain.
    ///
    /// The `len - MAX_BUNDLES + 1` oldest bundles are replaced by a single
    /// synthesized base whose creation token equals the newest token among
    /// them, so clients ordering by `creationToken` still see it before
    /// every surviving incremental bundle. Each tip OID is re-created under
    /// `refs/base/<oid>` so the base bundle can be generated without
    /// touching `refs/heads/`, which tracks the remote.
    ///
    /// Replaced bundle files stay on disk; the published list, not a
    /// directory scan, defines the live set.
    #[instrument(skip(self, list), fields(route = %repo.route, bundles = list.bundles.len()))]
    pub async fn collapse_list(&self, repo: &Repository, list: &mut BundleList) -> Result<()> {
        if list.bundles.len() <= MAX_BUNDLES {
            return Ok(());
        }

        let tokens: Vec<i64> = list.bundles.keys().copied().collect();
        let prefix = &tokens[..tokens.len() - MAX_BUNDLES + 1];

        // Parse every header before mutating anything so a malformed bundle
        // aborts with the list intact.
        let mut refs: HashMap<String, String> = HashMap::new();
        let mut max_timestamp = i64::MIN;
        for token in prefix {
            let bundle = &list.bundles[token];
            max_timestamp = max_timestamp.max(bundle.creation_token);

            let header = parse_bundle_header(&bundle.filename)?;
            for oid in header.refs.values() {
                refs.insert(format!("refs/base/{oid}"), oid.clone());
            }
        }

        let base = Bundle::collapsed_base(repo, max_timestamp);
        self.git
            .create_bundle_from_refs(&repo.repo_dir, &base.filename, &refs)
            .await?;

        for token in prefix {
            list.bundles.remove(token);
        }
        list.add(base);

        debug!(remaining = list.bundles.len(), "collapsed bundle list");
        Ok(())
    }
}

/// Emit the INI projection of a bundle list with URIs relative to
/// `uri_base`, in ascending creation-token order.
fn write_list_ini(
    out: &mut dyn Write,
    list: &BundleList,
    uri_base: &str,
) -> std::io::Result<()> {
    writeln!(out, "[bundle]")?;
    writeln!(out, "\tversion = {}", list.version)?;
    writeln!(out, "\tmode = {}", list.mode)?;
    writeln!(out, "\theuristic = {}", list.heuristic)?;

    for (token, bundle) in &list.bundles {
        let uri = bundle.uri.strip_prefix(uri_base).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("bundle URI '{}' is not under '{uri_base}'", bundle.uri),
            )
        })?;

        writeln!(out)?;
        writeln!(out, "[bundle \"{token}\"]")?;
        writeln!(out, "\turi = {uri}")?;
        writeln!(out, "\tcreationToken = {token}")?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
