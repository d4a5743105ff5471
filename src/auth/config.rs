//! Auth configuration loading and the middleware constructor registry.
//!
//! The web server reads a JSON config selecting an authorization mode by
//! name:
//!
//! ```json
//! {
//!     "mode": "fixed",
//!     "parameters": { "username": "admin", "passwordHash": "<hex>" }
//! }
//! ```
//!
//! Modes resolve against a registry of constructors fixed at process start;
//! `fixed` is built in and embedders may register more. Parameters may also
//! be kept in a separate file named by `path`, in which case `sha256` must
//! hold the file's expected digest and the file is trust-verified before its
//! contents are used:
//!
//! ```json
//! {
//!     "mode": "fixed",
//!     "path": "/etc/bundle-server/credentials.json",
//!     "sha256": "<hex digest of that file>"
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::auth::{AuthMiddleware, FixedCredentialAuth};
use crate::error::{Error, Result};

/// Builds a middleware from the `parameters` JSON value.
pub type Constructor = fn(serde_json::Value) -> Result<Arc<dyn AuthMiddleware>>;

#[derive(Debug, Deserialize)]
struct AuthConfig {
    mode: String,

    /// Optional external parameters file, trust-verified via `sha256`.
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    sha256: Option<String>,

    /// Inline per-middleware parameters.
    #[serde(default)]
    parameters: Option<serde_json::Value>,
}

/// Named auth-middleware constructors, resolved at process start.
pub struct MiddlewareRegistry {
    constructors: HashMap<String, Constructor>,
}

impl MiddlewareRegistry {
    /// The registry with the built-in `fixed` mode.
    pub fn builtin() -> Self {
        let mut registry = Self {
            constructors: HashMap::new(),
        };
        registry.register("fixed", |parameters| {
            Ok(Arc::new(FixedCredentialAuth::from_parameters(parameters)?))
        });
        registry
    }

    /// Add (or replace) a mode. Mode names are case-insensitive.
    pub fn register(&mut self, mode: &str, constructor: Constructor) {
        self.constructors.insert(mode.to_lowercase(), constructor);
    }

    /// Load the middleware described by the JSON config at `config_path`.
    pub fn load(&self, config_path: &Path) -> Result<Arc<dyn AuthMiddleware>> {
        let raw = std::fs::read(config_path).map_err(|e| Error::io(config_path, e))?;
        let config: AuthConfig = serde_json::from_slice(&raw).map_err(|e| Error::Json {
            context: format!("failed to parse auth config {}", config_path.display()),
            source: e,
        })?;

        let constructor = self
            .constructors
            .get(&config.mode.to_lowercase())
            .ok_or_else(|| {
                let mut known: Vec<&str> =
                    self.constructors.keys().map(String::as_str).collect();
                known.sort_unstable();
                Error::MalformedConfig(format!(
                    "unrecognized auth mode '{}' (known modes: {})",
                    config.mode,
                    known.join(", ")
                ))
            })?;

        let parameters = match (&config.path, &config.parameters) {
            (Some(path), _) => read_verified_parameters(path, config.sha256.as_deref())?,
            (None, Some(parameters)) => parameters.clone(),
            (None, None) => serde_json::Value::Null,
        };

        info!(mode = %config.mode, "auth middleware configured");
        constructor(parameters)
    }
}

/// Read a parameters file after checking its SHA-256 against the configured
/// digest.
fn read_verified_parameters(path: &Path, expected_hex: Option<&str>) -> Result<serde_json::Value> {
    let expected_hex = expected_hex.ok_or_else(|| {
        Error::MalformedConfig(
            "auth config names a parameters file but no sha256 digest".to_string(),
        )
    })?;

    let expected = hex::decode(expected_hex)
        .map_err(|e| Error::MalformedConfig(format!("sha256 digest is invalid: {e}")))?;
    if expected.len() != 32 {
        return Err(Error::MalformedConfig(format!(
            "sha256 digest is incorrect length ({} vs. expected 32)",
            expected.len()
        )));
    }

    let contents = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let actual = Sha256::digest(&contents);

    if actual.as_slice() != expected.as_slice() {
        return Err(Error::MalformedConfig(format!(
            "checksum mismatch for parameters file {}",
            path.display()
        )));
    }

    serde_json::from_slice(&contents).map_err(|e| Error::Json {
        context: format!("failed to parse parameters file {}", path.display()),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixed_params_json() -> String {
        let password_hash = hex::encode(Sha256::digest(b"hunter2"));
        format!("{{\"username\": \"admin\", \"passwordHash\": \"{password_hash}\"}}")
    }

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("auth-config.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_fixed_mode_with_inline_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            &format!("{{\"mode\": \"fixed\", \"parameters\": {}}}", fixed_params_json()),
        );

        let registry = MiddlewareRegistry::builtin();
        assert!(registry.load(&config).is_ok());
    }

    #[test]
    fn mode_names_are_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            &format!("{{\"mode\": \"Fixed\", \"parameters\": {}}}", fixed_params_json()),
        );

        assert!(MiddlewareRegistry::builtin().load(&config).is_ok());
    }

    #[test]
    fn unknown_mode_is_rejected_with_known_modes() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "{\"mode\": \"oauth\"}");

        let err = MiddlewareRegistry::builtin().load(&config).err().unwrap();
        assert!(matches!(err, Error::MalformedConfig(msg) if msg.contains("fixed")));
    }

    #[test]
    fn verified_parameters_file_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let params_path = dir.path().join("credentials.json");
        std::fs::write(&params_path, fixed_params_json()).unwrap();
        let digest = hex::encode(Sha256::digest(fixed_params_json().as_bytes()));

        let config = write_config(
            dir.path(),
            &format!(
                "{{\"mode\": \"fixed\", \"path\": \"{}\", \"sha256\": \"{digest}\"}}",
                params_path.display()
            ),
        );

        assert!(MiddlewareRegistry::builtin().load(&config).is_ok());
    }

    #[test]
    fn tampered_parameters_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let params_path = dir.path().join("credentials.json");
        std::fs::write(&params_path, fixed_params_json()).unwrap();
        let digest = hex::encode(Sha256::digest(b"what was originally approved"));

        let config = write_config(
            dir.path(),
            &format!(
                "{{\"mode\": \"fixed\", \"path\": \"{}\", \"sha256\": \"{digest}\"}}",
                params_path.display()
            ),
        );

        let err = MiddlewareRegistry::builtin().load(&config).err().unwrap();
        assert!(matches!(err, Error::MalformedConfig(msg) if msg.contains("checksum mismatch")));
    }

    #[test]
    fn parameters_file_without_digest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let params_path = dir.path().join("credentials.json");
        std::fs::write(&params_path, fixed_params_json()).unwrap();

        let config = write_config(
            dir.path(),
            &format!(
                "{{\"mode\": \"fixed\", \"path\": \"{}\"}}",
                params_path.display()
            ),
        );

        let err = MiddlewareRegistry::builtin().load(&config).err().unwrap();
        assert!(matches!(err, Error::MalformedConfig(msg) if msg.contains("sha256")));
    }

    #[test]
    fn embedders_can_register_modes() {
        struct AllowAll;
        impl AuthMiddleware for AllowAll {
            fn authorize(
                &self,
                _request: &axum::http::request::Parts,
                _owner: &str,
                _repo: &str,
            ) -> crate::auth::AuthResult {
                crate::auth::AuthResult::allow()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "{\"mode\": \"allow-all\"}");

        let mut registry = MiddlewareRegistry::builtin();
        registry.register("allow-all", |_| Ok(Arc::new(AllowAll)));
        assert!(registry.load(&config).is_ok());
    }
}
