//! `git-bundle-server update-all`

use crate::commands::Deps;
use crate::error::Result;
use crate::update::update_all;

/// Update every registered route via child processes. A failing child
/// aborts the batch; its exit code becomes ours.
pub async fn run(deps: &Deps) -> Result<()> {
    if let Some(failure) = update_all(&deps.repos, &[]).await? {
        eprintln!("update-all aborted: child exited with status {}", failure.route_exit_code);
        std::process::exit(failure.route_exit_code);
    }

    Ok(())
}
