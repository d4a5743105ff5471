//! `git-bundle-server init <url> [<route>]`

use crate::bundles::BundleList;
use crate::commands::Deps;
use crate::error::{Error, Result};
use crate::routes::{parse_route, route_from_url};

pub async fn run(deps: &Deps, url: &str, route: Option<&str>) -> Result<()> {
    let route = match route {
        Some(route) if !route.is_empty() => route.to_string(),
        _ => route_from_url(url).ok_or_else(|| {
            Error::InvalidRoute(format!(
                "cannot parse route from url '{url}'; please specify an explicit route"
            ))
        })?,
    };
    let route = parse_route(&route, true)?.route();

    // Refuse to clobber a route that is registered *or* still present in
    // storage (a stopped route keeps its mirror on disk).
    if deps.repos.get_repositories()?.contains_key(&route)
        || deps
            .repos
            .read_repository_storage()
            .await?
            .contains_key(&route)
    {
        return Err(Error::AlreadyExists(route));
    }

    let repo = deps.repos.create_repository(&route)?;

    println!("Cloning repository from {url}");
    deps.git.clone_bare(url, &repo.repo_dir).await?;

    let bundle = deps.bundles.create_initial_bundle(&repo);
    println!(
        "Constructing initial bundle file at {}",
        bundle.filename.display()
    );

    let written = deps.git.create_bundle(&repo.repo_dir, &bundle.filename).await?;
    if !written {
        return Err(Error::EmptyRepository(route));
    }

    let list = BundleList::singleton(bundle);
    deps.bundles.write_bundle_list(&list, &repo)?;

    deps.ensure_cron_schedule().await;
    Ok(())
}
