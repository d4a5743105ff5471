//! `git-bundle-server update <route>`

use crate::commands::Deps;
use crate::error::Result;
use crate::update::{update_route, UpdateStatus};

pub async fn run(deps: &Deps, route: &str) -> Result<()> {
    println!("Checking for updates to {route}");

    match update_route(&deps.repos, &deps.bundles, deps.git.as_ref(), route).await? {
        UpdateStatus::UpToDate => {
            println!("{route} is up-to-date, no new bundles generated");
        }
        UpdateStatus::Updated => {
            println!("Update complete");
        }
    }

    Ok(())
}
