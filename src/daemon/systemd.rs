//! systemd user-service provider (Linux).

use std::path::PathBuf;

use tracing::{debug, instrument};

use crate::daemon::{run_checked, DaemonConfig, DaemonProvider};
use crate::error::{Error, Result};
use crate::fs;

/// `systemctl --user stop` exit code when the unit is not installed.
const UNIT_NOT_INSTALLED: i32 = 5;

pub struct Systemd;

impl Systemd {
    pub fn new() -> Self {
        Self
    }

    fn unit_path(&self, label: &str) -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| {
            Error::MalformedConfig("could not determine the current user's home directory".into())
        })?;
        Ok(home
            .join(".config/systemd/user")
            .join(format!("{label}.service")))
    }

    async fn reload(&self) -> Result<()> {
        run_checked("systemctl", &["--user", "daemon-reload"], &[]).await
    }
}

impl Default for Systemd {
    fn default() -> Self {
        Self::new()
    }
}

fn sq_escape(value: &str) -> String {
    format!("'{}'", value.replace('\'', "\\'"))
}

fn render_unit(config: &DaemonConfig) -> String {
    let mut exec_start = sq_escape(&config.program.display().to_string());
    for arg in &config.arguments {
        exec_start.push(' ');
        exec_start.push_str(&sq_escape(arg));
    }

    format!(
        "[Unit]\nDescription={}\n\n[Service]\nType=simple\nExecStart={}\n",
        config.description, exec_start
    )
}

#[async_trait::async_trait]
impl DaemonProvider for Systemd {
    #[instrument(skip(self, config), fields(label = %config.label))]
    async fn create(&self, config: &DaemonConfig, force: bool) -> Result<()> {
        let unit_path = self.unit_path(&config.label)?;

        if !force && fs::file_exists(&unit_path)? {
            debug!("service unit already exists");
            return Ok(());
        }

        fs::write_file(&unit_path, render_unit(config).as_bytes())?;
        self.reload().await
    }

    async fn start(&self, label: &str) -> Result<()> {
        run_checked("systemctl", &["--user", "start", label], &[]).await
    }

    async fn stop(&self, label: &str) -> Result<()> {
        run_checked(
            "systemctl",
            &["--user", "stop", label],
            &[UNIT_NOT_INSTALLED],
        )
        .await
    }

    async fn remove(&self, label: &str) -> Result<()> {
        let unit_path = self.unit_path(label)?;
        fs::delete_file(&unit_path)?;
        self.reload().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_file_quotes_program_and_arguments() {
        let config = DaemonConfig {
            label: "git-bundle-web-server".into(),
            description: "Web server hosting Git bundle content".into(),
            program: PathBuf::from("/usr/local/bin/git-bundle-web-server"),
            arguments: vec!["--port".into(), "8080".into()],
        };

        let unit = render_unit(&config);
        assert!(unit.contains("Description=Web server hosting Git bundle content\n"));
        assert!(unit.contains(
            "ExecStart='/usr/local/bin/git-bundle-web-server' '--port' '8080'\n"
        ));
        assert!(unit.contains("Type=simple\n"));
    }

    #[test]
    fn single_quotes_in_arguments_are_escaped() {
        let config = DaemonConfig {
            label: "x".into(),
            description: "x".into(),
            program: PathBuf::from("/bin/x"),
            arguments: vec!["it's".into()],
        };

        assert!(render_unit(&config).contains(r"'it\'s'"));
    }
}
