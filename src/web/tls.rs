//! TLS and mutual-TLS configuration for the web server.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Minimum-version flag
// ---------------------------------------------------------------------------

/// Accepted values of `--tls-version`.
///
/// rustls does not implement TLS 1.1; `tlsv1.1` remains a valid flag value
/// for compatibility and selects the lowest supported version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsVersion {
    V1_1,
    #[default]
    V1_2,
    V1_3,
}

const TLS_VERSION_NAMES: [(TlsVersion, &str); 3] = [
    (TlsVersion::V1_1, "tlsv1.1"),
    (TlsVersion::V1_2, "tlsv1.2"),
    (TlsVersion::V1_3, "tlsv1.3"),
];

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TlsVersion::V1_1 => "tlsv1.1",
            TlsVersion::V1_2 => "tlsv1.2",
            TlsVersion::V1_3 => "tlsv1.3",
        })
    }
}

impl FromStr for TlsVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        for (version, name) in TLS_VERSION_NAMES {
            if name == lower {
                return Ok(version);
            }
        }

        let valid: Vec<String> = TLS_VERSION_NAMES
            .iter()
            .map(|(_, name)| format!("'{name}'"))
            .collect();
        Err(format!("valid TLS versions are: {}", valid.join(", ")))
    }
}

// ---------------------------------------------------------------------------
// Server configuration
// ---------------------------------------------------------------------------

/// Build the rustls server configuration: certificate + key, minimum
/// protocol version, and (when `client_ca` is given) required-and-verified
/// client certificates.
pub fn server_config(
    cert: &Path,
    key: &Path,
    min_version: TlsVersion,
    client_ca: Option<&Path>,
) -> Result<rustls::ServerConfig> {
    let certs = load_certs(cert)?;
    let key = load_private_key(key)?;

    let versions: &[&rustls::SupportedProtocolVersion] = match min_version {
        TlsVersion::V1_1 | TlsVersion::V1_2 => &[&rustls::version::TLS12, &rustls::version::TLS13],
        TlsVersion::V1_3 => &[&rustls::version::TLS13],
    };

    let builder = rustls::ServerConfig::builder_with_protocol_versions(versions);

    let builder = match client_ca {
        Some(ca_path) => {
            let mut roots = RootCertStore::empty();
            for ca_cert in load_certs(ca_path)? {
                roots.add(ca_cert).map_err(|e| {
                    Error::MalformedConfig(format!(
                        "invalid client CA certificate in {}: {e}",
                        ca_path.display()
                    ))
                })?;
            }

            let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
                .build()
                .map_err(|e| {
                    Error::MalformedConfig(format!("cannot build client verifier: {e}"))
                })?;

            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    builder
        .with_single_cert(certs, key)
        .map_err(|e| Error::MalformedConfig(format!("invalid certificate/key pair: {e}")))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let certs: std::io::Result<Vec<_>> = rustls_pemfile::certs(&mut data.as_slice()).collect();
    let certs = certs.map_err(|e| Error::io(path, e))?;

    if certs.is_empty() {
        return Err(Error::MalformedConfig(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    rustls_pemfile::private_key(&mut data.as_slice())
        .map_err(|e| Error::io(path, e))?
        .ok_or_else(|| {
            Error::MalformedConfig(format!("no private key found in {}", path.display()))
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_versions_parse() {
        assert_eq!("tlsv1.1".parse::<TlsVersion>().unwrap(), TlsVersion::V1_1);
        assert_eq!("tlsv1.2".parse::<TlsVersion>().unwrap(), TlsVersion::V1_2);
        assert_eq!("TLSv1.3".parse::<TlsVersion>().unwrap(), TlsVersion::V1_3);
    }

    #[test]
    fn unknown_version_lists_valid_values() {
        let err = "sslv3".parse::<TlsVersion>().unwrap_err();
        assert_eq!(
            err,
            "valid TLS versions are: 'tlsv1.1', 'tlsv1.2', 'tlsv1.3'"
        );
    }

    #[test]
    fn default_is_tls12() {
        assert_eq!(TlsVersion::default(), TlsVersion::V1_2);
        assert_eq!(TlsVersion::V1_2.to_string(), "tlsv1.2");
    }
}
