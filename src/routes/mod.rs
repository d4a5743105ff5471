//! Route grammar and repository identity.
//!
//! A route is `owner/repo`, optionally extended by a bundle filename when it
//! comes from a request URL. Elements are drawn from `[A-Za-z0-9._-]`, with
//! `.` and `..` rejected outright so a route can never escape the storage
//! roots. Repeated slashes are collapsed rather than rejected.

pub mod registry;

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

pub use registry::RepositoryProvider;

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// A registered repository and its two storage directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// `owner/repo`.
    pub route: String,
    /// Bare mirror: `<bundleRoot>/git/<route>`.
    pub repo_dir: PathBuf,
    /// Served content: `<bundleRoot>/www/<route>`.
    pub web_dir: PathBuf,
}

// ---------------------------------------------------------------------------
// Route parsing
// ---------------------------------------------------------------------------

/// A parsed route: `owner/repo`, plus the bundle filename when the input had
/// three elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRoute {
    pub owner: String,
    pub repo: String,
    pub filename: Option<String>,
}

impl ParsedRoute {
    /// The `owner/repo` pair, normalized.
    pub fn route(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

static ROUTE_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+$").unwrap());

/// Parse and validate a route string.
///
/// With `repo_only`, a third element (the filename position) is rejected, as
/// it is for every CLI subcommand; request URLs pass `false`.
pub fn parse_route(route: &str, repo_only: bool) -> Result<ParsedRoute> {
    let elements: Vec<&str> = route.split('/').filter(|e| !e.is_empty()).collect();

    for element in &elements {
        if !ROUTE_ELEMENT.is_match(element) {
            return Err(Error::InvalidRoute(format!(
                "invalid element '{element}'; route may only contain alphanumeric characters, '.', '_', and/or '-'"
            )));
        }
        if *element == "." || *element == ".." {
            return Err(Error::InvalidRoute(format!("invalid route element '{element}'")));
        }
    }

    match elements.as_slice() {
        [] => Err(Error::InvalidRoute("empty route".to_string())),
        [_] => Err(Error::InvalidRoute("route has owner, but no repo".to_string())),
        [owner, repo] => Ok(ParsedRoute {
            owner: (*owner).to_string(),
            repo: (*repo).to_string(),
            filename: None,
        }),
        [owner, repo, filename] if !repo_only => Ok(ParsedRoute {
            owner: (*owner).to_string(),
            repo: (*repo).to_string(),
            filename: Some((*filename).to_string()),
        }),
        _ => Err(Error::InvalidRoute("route is too deep".to_string())),
    }
}

// ---------------------------------------------------------------------------
// URL → route recognition
// ---------------------------------------------------------------------------

static URL_MATCHERS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        // SSH: <user>@<host>:<owner>/<repo>[.git]
        Regex::new(r"^[\w-]+@[\w.-]+:([\w.-]+/[\w.-]+)/*$").unwrap(),
        // HTTP(S): http[s]://<host>/<owner>/<repo>[.git]
        Regex::new(r"^(?i:https?)://[\w.-]+/([\w.-]+/[\w.-]+)/*$").unwrap(),
        // Filesystem: file://[<path>/]<owner>/<repo>[.git]
        Regex::new(r"^(?i:file)://[\w./ -]*/([\w.-]+/[\w.-]+)/*$").unwrap(),
    ]
});

/// Derive an `owner/repo` route from a clone URL, if the URL has one of the
/// recognized shapes. A trailing `.git` is stripped.
pub fn route_from_url(url: &str) -> Option<String> {
    for matcher in URL_MATCHERS.iter() {
        if let Some(captures) = matcher.captures(url) {
            let route = captures.get(1)?.as_str();
            return Some(route.trim_end_matches(".git").to_string());
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
