//! Bundle subsystem: pre-computed Git bundles and their per-repository
//! bundle list.
//!
//! A repository's bundle list is kept in three forms. The JSON file under
//! the repo dir is canonical and feeds subsequent updates; the two INI
//! projections under the web dir are what `git clone --bundle-uri` clients
//! actually download, differing only in whether bundle URIs are relative to
//! a trailing-slash request path or not.

pub mod header;
pub mod provider;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::routes::Repository;

pub use header::BundleHeader;
pub use provider::BundleProvider;

pub const BUNDLE_LIST_JSON_FILENAME: &str = "bundle-list.json";
pub const BUNDLE_LIST_FILENAME: &str = "bundle-list";
pub const REPO_BUNDLE_LIST_FILENAME: &str = "repo-bundle-list";

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// A single bundle file published for a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Absolute path of the bundle from the web server root, e.g.
    /// `/org/repo/bundle-1700000000.bundle`.
    #[serde(rename = "URI")]
    pub uri: String,

    /// Absolute path of the bundle on disk.
    #[serde(rename = "Filename")]
    pub filename: PathBuf,

    /// Creation token driving Git's `creationToken` heuristic. By
    /// convention the Unix-second timestamp at creation; always strictly
    /// monotonic within a list.
    #[serde(rename = "CreationToken")]
    pub creation_token: i64,
}

impl Bundle {
    /// An initial or incremental bundle, `bundle-<token>.bundle`.
    pub fn incremental(repo: &Repository, creation_token: i64) -> Self {
        Self::named(repo, format!("bundle-{creation_token}.bundle"), creation_token)
    }

    /// A collapsed base bundle, `base-<token>.bundle`.
    pub fn collapsed_base(repo: &Repository, creation_token: i64) -> Self {
        Self::named(repo, format!("base-{creation_token}.bundle"), creation_token)
    }

    fn named(repo: &Repository, name: String, creation_token: i64) -> Self {
        Self {
            uri: format!("/{}/{}", repo.route, name),
            filename: repo.web_dir.join(&name),
            creation_token,
        }
    }
}

// ---------------------------------------------------------------------------
// BundleList
// ---------------------------------------------------------------------------

/// The ordered set of bundles published for one repository.
///
/// Keys duplicate each bundle's creation token; the `BTreeMap` keeps
/// iteration in ascending token order, which is also the emission order of
/// the INI projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleList {
    #[serde(rename = "Version")]
    pub version: u32,

    #[serde(rename = "Mode")]
    pub mode: String,

    #[serde(rename = "Heuristic")]
    pub heuristic: String,

    #[serde(rename = "Bundles")]
    pub bundles: BTreeMap<i64, Bundle>,
}

impl BundleList {
    /// A fresh list holding exactly `bundle`.
    pub fn singleton(bundle: Bundle) -> Self {
        let mut list = Self {
            version: 1,
            mode: "all".to_string(),
            heuristic: "creationToken".to_string(),
            bundles: BTreeMap::new(),
        };
        list.add(bundle);
        list
    }

    pub fn add(&mut self, bundle: Bundle) {
        self.bundles.insert(bundle.creation_token, bundle);
    }

    pub fn max_creation_token(&self) -> Option<i64> {
        self.bundles.keys().next_back().copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
