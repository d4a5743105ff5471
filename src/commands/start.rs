//! `git-bundle-server start <route>`

use crate::commands::Deps;
use crate::error::{Error, Result};

pub async fn run(deps: &Deps, route: &str) -> Result<()> {
    // Registering is all "start" does; bundle content must already exist.
    let repo = deps.repos.create_repository(route)?;

    if !repo.repo_dir.is_dir() {
        return Err(Error::NotFound(format!(
            "route '{route}' appears to have been deleted; use 'init' instead"
        )));
    }

    deps.ensure_cron_schedule().await;
    Ok(())
}
