//! `git-bundle-server delete <route>`

use crate::commands::Deps;
use crate::error::{Error, Result};

pub async fn run(deps: &Deps, route: &str) -> Result<()> {
    // Re-registering first resolves the storage paths even when the route
    // was previously stopped.
    let repo = deps.repos.create_repository(route)?;

    deps.repos.remove_route(&repo.route)?;

    remove_dir(&repo.web_dir)?;
    remove_dir(&repo.repo_dir)?;

    Ok(())
}

fn remove_dir(dir: &std::path::Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(dir, e)),
    }
}
