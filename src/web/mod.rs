//! The bundle web server: serving layer, TLS configuration, and the flag
//! set shared between `git-bundle-web-server` and
//! `git-bundle-server web-server start`.

pub mod server;
pub mod tls;

use std::path::PathBuf;

use crate::error::{Error, Result};

pub use server::{router, run, AppState};
pub use tls::TlsVersion;

/// Flags accepted by `git-bundle-web-server`, also embedded in
/// `git-bundle-server web-server start` for pass-through.
#[derive(Debug, Clone, clap::Args)]
pub struct WebServerArgs {
    /// The port on which the server should be hosted
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// The path to the X.509 SSL certificate file to use in securely
    /// hosting the server
    #[arg(long, requires = "key")]
    pub cert: Option<PathBuf>,

    /// The path to the certificate's private key
    #[arg(long, requires = "cert")]
    pub key: Option<PathBuf>,

    /// The minimum TLS version the server will accept
    #[arg(long, default_value_t = TlsVersion::V1_2)]
    pub tls_version: TlsVersion,

    /// The path to the client authentication certificate authority PEM
    #[arg(long)]
    pub client_ca: Option<PathBuf>,

    /// The path to a JSON file describing the authorization middleware
    #[arg(long)]
    pub auth_config: Option<PathBuf>,
}

impl WebServerArgs {
    /// Reconstruct the flag list for handing to the daemon installer.
    /// Certificate paths are made absolute so the service definition does
    /// not depend on the installing shell's working directory.
    pub fn to_flag_args(&self) -> Result<Vec<String>> {
        let mut args = vec!["--port".to_string(), self.port.to_string()];

        let mut push_path = |flag: &str, path: &PathBuf, args: &mut Vec<String>| -> Result<()> {
            let absolute = std::path::absolute(path).map_err(|e| Error::io(path, e))?;
            args.push(flag.to_string());
            args.push(absolute.display().to_string());
            Ok(())
        };

        if let Some(cert) = &self.cert {
            push_path("--cert", cert, &mut args)?;
        }
        if let Some(key) = &self.key {
            push_path("--key", key, &mut args)?;
        }

        args.push("--tls-version".to_string());
        args.push(self.tls_version.to_string());

        if let Some(client_ca) = &self.client_ca {
            push_path("--client-ca", client_ca, &mut args)?;
        }
        if let Some(auth_config) = &self.auth_config {
            push_path("--auth-config", auth_config, &mut args)?;
        }

        Ok(args)
    }
}
