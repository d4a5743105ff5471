//! OS service installation for the web server.
//!
//! The bundle server itself runs from cron; only `git-bundle-web-server` is
//! long-lived, and `web-server start`/`stop` manage it as a user-scoped OS
//! service: a systemd user unit on Linux, a launchd agent on macOS. These
//! are side-effecting collaborators with a deliberately narrow contract --
//! they are not on the data path.

mod launchd;
mod systemd;

use std::path::PathBuf;

use crate::error::{Error, Result};

pub use launchd::Launchd;
pub use systemd::Systemd;

/// Description of the service to install.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Service identifier (unit name / launchd label).
    pub label: String,
    pub description: String,
    /// Absolute path of the program to run.
    pub program: PathBuf,
    pub arguments: Vec<String>,
}

#[async_trait::async_trait]
pub trait DaemonProvider: Send + Sync {
    /// Write the service definition. An existing definition is left alone
    /// unless `force` is set.
    async fn create(&self, config: &DaemonConfig, force: bool) -> Result<()>;

    async fn start(&self, label: &str) -> Result<()>;

    async fn stop(&self, label: &str) -> Result<()>;

    /// Delete the service definition.
    async fn remove(&self, label: &str) -> Result<()>;
}

/// The daemon provider for the current OS.
pub fn provider() -> Result<Box<dyn DaemonProvider>> {
    if cfg!(target_os = "linux") {
        Ok(Box::new(Systemd::new()))
    } else if cfg!(target_os = "macos") {
        Ok(Box::new(Launchd::new()))
    } else {
        Err(Error::MalformedConfig(format!(
            "cannot configure a daemon handler for OS '{}'",
            std::env::consts::OS
        )))
    }
}

/// Run a service-manager command, tolerating the exit codes listed in
/// `ignored_codes` (used for "already stopped"-style results).
pub(crate) async fn run_checked(
    program: &str,
    args: &[&str],
    ignored_codes: &[i32],
) -> Result<()> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::Spawn {
            program: program.to_string(),
            source: e,
        })?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        if !ignored_codes.contains(&code) {
            return Err(Error::Subprocess {
                program: program.to_string(),
                status: code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
    }

    Ok(())
}
