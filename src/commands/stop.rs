//! `git-bundle-server stop <route>`

use crate::commands::Deps;
use crate::error::Result;

/// Unregister the route. Its mirror and web content stay on disk, so a
/// later `start` can resume without re-cloning.
pub async fn run(deps: &Deps, route: &str) -> Result<()> {
    deps.repos.remove_route(route)
}
