//! Built-in fixed-credential authorization.
//!
//! A single username/password pair guards the whole server. Only SHA-256
//! digests are held in memory and compared, in constant time, against
//! digests of the presented HTTP Basic credentials.

use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::request::Parts;
use axum::http::StatusCode;
use base64::Engine as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::auth::{AuthMiddleware, AuthResult, Header};
use crate::error::{Error, Result};

const BASIC_CHALLENGE: &str = "Basic realm=\"restricted\", charset=\"UTF-8\"";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixedCredentialParams {
    username: String,
    password_hash: String,
}

/// Server-wide static credential check.
pub struct FixedCredentialAuth {
    username_hash: [u8; 32],
    password_hash: [u8; 32],
}

impl FixedCredentialAuth {
    /// Build from the `parameters` object of the auth config:
    /// `{"username": ..., "passwordHash": <hex sha-256>}`.
    pub fn from_parameters(parameters: serde_json::Value) -> Result<Self> {
        let params: FixedCredentialParams =
            serde_json::from_value(parameters).map_err(|e| Error::Json {
                context: "fixed-credential auth parameters".to_string(),
                source: e,
            })?;

        // A colon would make the username unrepresentable in Basic auth.
        if params.username.contains(':') {
            return Err(Error::MalformedConfig(
                "username contains a colon (\":\")".to_string(),
            ));
        }

        let password_hash_bytes = hex::decode(&params.password_hash)
            .map_err(|e| Error::MalformedConfig(format!("passwordHash is invalid: {e}")))?;
        let password_hash: [u8; 32] = password_hash_bytes.try_into().map_err(|v: Vec<u8>| {
            Error::MalformedConfig(format!(
                "passwordHash is incorrect length ({} vs. expected 32)",
                v.len()
            ))
        })?;

        Ok(Self {
            username_hash: Sha256::digest(params.username.as_bytes()).into(),
            password_hash,
        })
    }
}

impl AuthMiddleware for FixedCredentialAuth {
    fn authorize(&self, request: &Parts, _owner: &str, _repo: &str) -> AuthResult {
        let Some((username, password)) = basic_credentials(request) else {
            return AuthResult::deny(
                StatusCode::UNAUTHORIZED,
                vec![Header::new(WWW_AUTHENTICATE, BASIC_CHALLENGE)],
            );
        };

        let username_hash: [u8; 32] = Sha256::digest(username.as_bytes()).into();
        let password_hash: [u8; 32] = Sha256::digest(password.as_bytes()).into();

        let username_match: bool = username_hash.ct_eq(&self.username_hash).into();
        let password_match: bool = password_hash.ct_eq(&self.password_hash).into();

        if username_match && password_match {
            AuthResult::allow()
        } else {
            // 404 rather than 403 so probing credentials reveals nothing
            // about which routes exist.
            AuthResult::deny(StatusCode::NOT_FOUND, Vec::new())
        }
    }
}

/// Extract `(username, password)` from an HTTP Basic `Authorization` header.
fn basic_credentials(request: &Parts) -> Option<(String, String)> {
    let value = request.headers.get(AUTHORIZATION)?.to_str().ok()?;

    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
