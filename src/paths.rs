//! On-disk layout of the bundle server's state directory.
//!
//! Everything lives under `<home>/git-bundle-server`:
//!
//! ```text
//! <home>/git-bundle-server/
//!   routes                  # one registered route per line
//!   cron-schedule           # scratch file for the crontab installer
//!   git/<owner>/<repo>/     # bare mirror (repo dir)
//!   www/<owner>/<repo>/     # served content (web dir)
//! ```

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const ROUTES_FILENAME: &str = "routes";
pub const CRON_SCHEDULE_FILENAME: &str = "cron-schedule";

/// Resolver for the bundle server's state directories, rooted at a single
/// base directory so tests can point it anywhere.
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Root the layout at `<home>/git-bundle-server`.
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            Error::MalformedConfig("could not determine the current user's home directory".into())
        })?;
        Ok(Self::new(home.join("git-bundle-server")))
    }

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn routes_file(&self) -> PathBuf {
        self.root.join(ROUTES_FILENAME)
    }

    pub fn cron_schedule_file(&self) -> PathBuf {
        self.root.join(CRON_SCHEDULE_FILENAME)
    }

    /// Parent of every bare mirror.
    pub fn repo_root(&self) -> PathBuf {
        self.root.join("git")
    }

    /// Parent of every served web directory.
    pub fn web_root(&self) -> PathBuf {
        self.root.join("www")
    }

    pub fn repo_dir(&self, route: &str) -> PathBuf {
        self.repo_root().join(route)
    }

    pub fn web_dir(&self, route: &str) -> PathBuf {
        self.web_root().join(route)
    }
}
