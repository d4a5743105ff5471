//! Subcommand implementations for the `git-bundle-server` CLI.
//!
//! Each subcommand is a thin orchestration over the library components; the
//! shared [`Deps`] bundle wires those components together once per process.

pub mod delete;
pub mod init;
pub mod list;
pub mod repair;
pub mod start;
pub mod stop;
pub mod update;
pub mod update_all;
pub mod web_server;

use std::sync::Arc;

use crate::bundles::BundleProvider;
use crate::cron::CronScheduler;
use crate::error::Result;
use crate::git::{Git, GitExec};
use crate::paths::Paths;
use crate::routes::RepositoryProvider;

/// The collaborators every subcommand draws from.
pub struct Deps {
    pub git: Arc<dyn Git>,
    pub repos: RepositoryProvider,
    pub bundles: BundleProvider,
    pub cron: CronScheduler,
}

impl Deps {
    pub fn new() -> Result<Self> {
        Self::with_paths(Paths::from_home()?)
    }

    pub fn with_paths(paths: Paths) -> Result<Self> {
        let git: Arc<dyn Git> = Arc::new(GitExec::new());
        Ok(Self {
            repos: RepositoryProvider::new(paths.clone(), git.clone()),
            bundles: BundleProvider::new(git.clone()),
            cron: CronScheduler::new(paths),
            git,
        })
    }

    /// Install the daily update job, downgrading failure to a warning: a
    /// missing crontab must not fail the command that wanted it.
    pub async fn ensure_cron_schedule(&self) {
        if let Err(e) = self.cron.ensure_update_job().await {
            tracing::warn!(error = %e, "could not install the cron schedule");
            eprintln!("warning: could not install the cron schedule: {e}");
        }
    }
}
