//! `git-bundle-server list [--name-only]`

use crate::commands::Deps;
use crate::error::Result;

pub async fn run(deps: &Deps, name_only: bool) -> Result<()> {
    for repo in deps.repos.get_repositories()?.values() {
        if name_only {
            println!("{}", repo.route);
        } else {
            let remote = deps.git.get_remote_url(&repo.repo_dir).await?;
            // Space-plus-tab keeps columns at least two spaces apart.
            println!("{} \t{}", repo.route, remote);
        }
    }

    Ok(())
}
