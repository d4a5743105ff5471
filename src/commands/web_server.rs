//! `git-bundle-server web-server start|stop`
//!
//! Manages `git-bundle-web-server` as a user-scoped OS service. The web
//! server binary is looked up on `PATH` first, then next to the current
//! executable.

use std::path::PathBuf;

use crate::daemon::{self, DaemonConfig};
use crate::error::{Error, Result};
use crate::fs;
use crate::web::WebServerArgs;

const WEB_SERVER_PROGRAM: &str = "git-bundle-web-server";
const SERVICE_LABEL: &str = "git-bundle-web-server";

fn find_web_server_exe() -> Result<PathBuf> {
    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(WEB_SERVER_PROGRAM);
            if fs::file_exists(&candidate)? {
                return std::path::absolute(&candidate).map_err(|e| Error::io(&candidate, e));
            }
        }
    }

    let exe = std::env::current_exe().map_err(|e| Error::Spawn {
        program: WEB_SERVER_PROGRAM.into(),
        source: e,
    })?;
    if let Some(dir) = exe.parent() {
        let candidate = dir.join(WEB_SERVER_PROGRAM);
        if fs::file_exists(&candidate)? {
            return Ok(candidate);
        }
    }

    Err(Error::NotFound(format!("path to '{WEB_SERVER_PROGRAM}'")))
}

pub async fn start(args: &WebServerArgs, force: bool) -> Result<()> {
    let provider = daemon::provider()?;

    let config = DaemonConfig {
        label: SERVICE_LABEL.to_string(),
        description: "Web server hosting Git bundle server content".to_string(),
        program: find_web_server_exe()?,
        arguments: args.to_flag_args()?,
    };

    provider.create(&config, force).await?;
    provider.start(SERVICE_LABEL).await
}

pub async fn stop(remove: bool) -> Result<()> {
    let provider = daemon::provider()?;

    provider.stop(SERVICE_LABEL).await?;
    if remove {
        provider.remove(SERVICE_LABEL).await?;
    }

    Ok(())
}
