//! `git-bundle-server repair routes [--start-all] [--dry-run]`
//!
//! Reconciles the route registry against storage: routes registered but
//! missing (or invalid) on disk are dropped; repositories found on disk but
//! unregistered can be re-enabled with `--start-all`.

use std::collections::BTreeMap;

use crate::commands::Deps;
use crate::error::Result;

pub async fn run(deps: &Deps, start_all: bool, dry_run: bool) -> Result<()> {
    let mut repos = match deps.repos.get_repositories() {
        Ok(repos) => repos,
        Err(e) => {
            println!("warning: cannot load routes file ({e}); rebuilding from scratch...");
            BTreeMap::new()
        }
    };

    let stored = deps.repos.read_repository_storage().await?;

    let not_registered: Vec<String> = stored
        .keys()
        .filter(|route| !repos.contains_key(*route))
        .cloned()
        .collect();
    let missing_on_disk: Vec<String> = repos
        .keys()
        .filter(|route| !stored.contains_key(*route))
        .cloned()
        .collect();

    println!();

    if start_all && !not_registered.is_empty() {
        println!("Unregistered routes to add");
        println!("--------------------------");
        for route in &not_registered {
            println!("* {route}");
            repos.insert(route.clone(), stored[route].clone());
        }
        println!();
    }

    if !missing_on_disk.is_empty() {
        println!("Missing or invalid routes to remove");
        println!("-----------------------------------");
        for route in &missing_on_disk {
            println!("* {route}");
            repos.remove(route);
        }
        println!();
    }

    if (!start_all || not_registered.is_empty()) && missing_on_disk.is_empty() {
        println!("No repairs needed.");
        return Ok(());
    }

    if dry_run {
        println!("Skipping updates (dry run)");
    } else {
        println!("Applying route repairs...");
        deps.repos.write_all_routes(&repos)?;
        deps.ensure_cron_schedule().await;
        println!("Done");
    }

    Ok(())
}
