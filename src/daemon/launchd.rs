//! launchd agent provider (macOS).

use std::path::PathBuf;

use tracing::{debug, instrument};

use crate::daemon::{run_checked, DaemonConfig, DaemonProvider};
use crate::error::{Error, Result};
use crate::fs;

/// `launchctl bootout` exit codes for a service that is not running /
/// not bootstrapped.
const NO_SUCH_PROCESS: i32 = 3;
const SERVICE_NOT_FOUND: i32 = 113;

pub struct Launchd;

impl Launchd {
    pub fn new() -> Self {
        Self
    }

    fn plist_path(&self, label: &str) -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| {
            Error::MalformedConfig("could not determine the current user's home directory".into())
        })?;
        Ok(home
            .join("Library/LaunchAgents")
            .join(format!("{label}.plist")))
    }

    async fn domain_target(&self) -> Result<String> {
        let output = tokio::process::Command::new("id")
            .arg("-u")
            .output()
            .await
            .map_err(|e| Error::Spawn {
                program: "id".into(),
                source: e,
            })?;
        let uid = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(format!("gui/{uid}"))
    }
}

impl Default for Launchd {
    fn default() -> Self {
        Self::new()
    }
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn render_plist(config: &DaemonConfig) -> String {
    let mut plist = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \
         \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
         <plist version=\"1.0\">\n<dict>\n",
    );

    let program = config.program.display().to_string();

    plist.push_str(&format!(
        "\t<key>Label</key>\n\t<string>{}</string>\n",
        xml_escape(&config.label)
    ));
    plist.push_str(&format!(
        "\t<key>Program</key>\n\t<string>{}</string>\n",
        xml_escape(&program)
    ));
    plist.push_str("\t<key>LimitLoadToSessionType</key>\n\t<string>Background</string>\n");

    // ProgramArguments maps straight onto execvp's argv, so the program
    // path must be repeated as argv[0].
    plist.push_str("\t<key>ProgramArguments</key>\n\t<array>\n");
    plist.push_str(&format!("\t\t<string>{}</string>\n", xml_escape(&program)));
    for arg in &config.arguments {
        plist.push_str(&format!("\t\t<string>{}</string>\n", xml_escape(arg)));
    }
    plist.push_str("\t</array>\n</dict>\n</plist>\n");

    plist
}

#[async_trait::async_trait]
impl DaemonProvider for Launchd {
    #[instrument(skip(self, config), fields(label = %config.label))]
    async fn create(&self, config: &DaemonConfig, force: bool) -> Result<()> {
        let plist_path = self.plist_path(&config.label)?;

        if !force && fs::file_exists(&plist_path)? {
            debug!("launchd agent already exists");
            return Ok(());
        }

        fs::write_file(&plist_path, render_plist(config).as_bytes())?;

        // Re-bootstrap so launchd picks up the (possibly changed) plist.
        let domain = self.domain_target().await?;
        run_checked(
            "launchctl",
            &["bootout", &format!("{domain}/{}", config.label)],
            &[NO_SUCH_PROCESS, SERVICE_NOT_FOUND],
        )
        .await?;
        run_checked(
            "launchctl",
            &["bootstrap", &domain, &plist_path.to_string_lossy()],
            &[],
        )
        .await
    }

    async fn start(&self, label: &str) -> Result<()> {
        let domain = self.domain_target().await?;
        run_checked(
            "launchctl",
            &["kickstart", &format!("{domain}/{label}")],
            &[],
        )
        .await
    }

    async fn stop(&self, label: &str) -> Result<()> {
        let domain = self.domain_target().await?;
        run_checked(
            "launchctl",
            &["bootout", &format!("{domain}/{label}")],
            &[NO_SUCH_PROCESS, SERVICE_NOT_FOUND],
        )
        .await
    }

    async fn remove(&self, label: &str) -> Result<()> {
        let plist_path = self.plist_path(label)?;
        fs::delete_file(&plist_path)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plist_repeats_program_as_argv0() {
        let config = DaemonConfig {
            label: "git-bundle-web-server".into(),
            description: "unused by launchd".into(),
            program: PathBuf::from("/usr/local/bin/git-bundle-web-server"),
            arguments: vec!["--port".into(), "8443".into()],
        };

        let plist = render_plist(&config);
        assert_eq!(
            plist
                .matches("<string>/usr/local/bin/git-bundle-web-server</string>")
                .count(),
            2
        );
        assert!(plist.contains("<key>Label</key>\n\t<string>git-bundle-web-server</string>"));
        assert!(plist.contains("<string>--port</string>"));
        assert!(plist.contains("<string>8443</string>"));
    }

    #[test]
    fn plist_escapes_xml_metacharacters() {
        let config = DaemonConfig {
            label: "a&b".into(),
            description: String::new(),
            program: PathBuf::from("/bin/x"),
            arguments: vec!["<arg>".into()],
        };

        let plist = render_plist(&config);
        assert!(plist.contains("<string>a&amp;b</string>"));
        assert!(plist.contains("<string>&lt;arg&gt;</string>"));
    }
}
