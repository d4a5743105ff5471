//! The `git-bundle-server` management CLI.

use clap::{Parser, Subcommand};

use git_bundle_server::commands::{self, Deps};
use git_bundle_server::error::Error;
use git_bundle_server::trace;
use git_bundle_server::web::WebServerArgs;

#[derive(Parser)]
#[command(
    name = "git-bundle-server",
    about = "Manage mirrored Git repositories and the bundles they serve",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a repository by cloning a bare repo from <url>, whose
    /// bundles should be hosted at <route>
    Init {
        /// The URL of a repository to clone
        url: String,
        /// The route to host the specified repo (derived from the URL when
        /// omitted)
        route: Option<String>,
    },

    /// Start computing bundles and serving content for the repository at
    /// the specified <route>
    Start {
        /// The route for which bundles should be generated
        route: String,
    },

    /// Stop computing bundles and serving content for the repository at the
    /// specified <route>
    Stop {
        /// The route for which bundles should stop being generated
        route: String,
    },

    /// Fetch the latest content for <route>, create a new set of bundles,
    /// and update its bundle list
    Update {
        /// The route to update
        route: String,
    },

    /// Run 'update <route>' for every registered route
    UpdateAll,

    /// Remove the configuration for the given <route> and delete its
    /// repository data
    Delete {
        /// The route to delete
        route: String,
    },

    /// List the routes registered to the bundle server
    List {
        /// Print only the names of configured routes
        #[arg(long)]
        name_only: bool,
    },

    /// Scan and correct inconsistencies in the bundle server's internal
    /// registries and storage
    Repair {
        #[command(subcommand)]
        target: RepairTarget,
    },

    /// Manage the web server hosting bundle content
    WebServer {
        #[command(subcommand)]
        action: WebServerAction,
    },

    /// Print the version of this program
    Version,
}

#[derive(Subcommand)]
enum RepairTarget {
    /// Correct the contents of the internal route registry
    Routes {
        /// Turn on bundle computation for all repositories found in storage
        #[arg(long)]
        start_all: bool,
        /// Report the repairs needed, but do not perform them
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum WebServerAction {
    /// Install and start the web server daemon
    Start {
        /// Force reconfiguration of the web server daemon
        #[arg(short, long)]
        force: bool,

        #[command(flatten)]
        web: WebServerArgs,
    },
    /// Stop the web server daemon
    Stop {
        /// Remove the web server daemon configuration from the system after
        /// stopping
        #[arg(long)]
        remove: bool,
    },
}

async fn run(cli: Cli) -> git_bundle_server::Result<()> {
    match cli.command {
        Command::Init { url, route } => {
            commands::init::run(&Deps::new()?, &url, route.as_deref()).await
        }
        Command::Start { route } => commands::start::run(&Deps::new()?, &route).await,
        Command::Stop { route } => commands::stop::run(&Deps::new()?, &route).await,
        Command::Update { route } => commands::update::run(&Deps::new()?, &route).await,
        Command::UpdateAll => commands::update_all::run(&Deps::new()?).await,
        Command::Delete { route } => commands::delete::run(&Deps::new()?, &route).await,
        Command::List { name_only } => commands::list::run(&Deps::new()?, name_only).await,
        Command::Repair {
            target: RepairTarget::Routes { start_all, dry_run },
        } => commands::repair::run(&Deps::new()?, start_all, dry_run).await,
        Command::WebServer { action } => match action {
            WebServerAction::Start { force, web } => commands::web_server::start(&web, force).await,
            WebServerAction::Stop { remove } => commands::web_server::stop(remove).await,
        },
        Command::Version => {
            println!("git-bundle-server {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn exit_code(error: &Error) -> i32 {
    match error {
        // Route-grammar misuse is a usage error, same as a bad flag.
        Error::InvalidRoute(_) => 2,
        _ => 1,
    }
}

#[tokio::main]
async fn main() {
    let _trace_guard = trace::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Failed with error: {e}");
        std::process::exit(exit_code(&e));
    }
}
