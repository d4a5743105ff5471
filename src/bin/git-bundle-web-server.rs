//! The `git-bundle-web-server` binary: serves bundle lists and bundle files
//! for every registered route.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use git_bundle_server::auth::MiddlewareRegistry;
use git_bundle_server::git::GitExec;
use git_bundle_server::paths::Paths;
use git_bundle_server::routes::RepositoryProvider;
use git_bundle_server::web::{self, AppState, WebServerArgs};
use git_bundle_server::{trace, Result};

#[derive(Parser)]
#[command(
    name = "git-bundle-web-server",
    about = "Web server hosting Git bundle server content",
    version
)]
struct Cli {
    #[command(flatten)]
    web: WebServerArgs,
}

async fn run(args: WebServerArgs) -> Result<()> {
    // A broken auth config refuses to start; silently serving unprotected
    // content would be worse than not serving at all.
    let auth = match &args.auth_config {
        Some(path) => Some(MiddlewareRegistry::builtin().load(path)?),
        None => None,
    };

    let repos = RepositoryProvider::new(Paths::from_home()?, Arc::new(GitExec::new()));
    let app = web::router(Arc::new(AppState { repos, auth }));

    let tls = match (&args.cert, &args.key) {
        (Some(cert), Some(key)) => Some(web::tls::server_config(
            cert,
            key,
            args.tls_version,
            args.client_ca.as_deref(),
        )?),
        _ => None,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    web::run(app, addr, tls).await
}

#[tokio::main]
async fn main() {
    let _trace_guard = trace::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.web).await {
        eprintln!("Failed with error: {e}");
        std::process::exit(1);
    }

    println!("Shutdown complete");
}
