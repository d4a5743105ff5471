//! Authorization middleware for the bundle web server.
//!
//! Middleware inspects a request plus the `(owner, repo)` it targets and
//! returns an [`AuthResult`]: either the server proceeds to serve content
//! (optionally with extra response headers) or it answers immediately with a
//! 4XX status. Middleware never writes response bodies.

pub mod config;
pub mod fixed;

use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, StatusCode};

pub use config::MiddlewareRegistry;
pub use fixed::FixedCredentialAuth;

/// A response header contributed by middleware. Repeats are allowed (e.g.
/// multiple `WWW-Authenticate` challenges) and applied in order.
#[derive(Debug, Clone)]
pub struct Header {
    pub name: HeaderName,
    pub value: HeaderValue,
}

impl Header {
    pub fn new(name: HeaderName, value: &'static str) -> Self {
        Self {
            name,
            value: HeaderValue::from_static(value),
        }
    }
}

/// The outcome of an authorization check.
#[derive(Debug, Clone)]
pub enum AuthResult {
    /// Serve the requested content, after applying `headers`.
    Allow(Vec<Header>),
    /// Respond immediately with `status` (always 4XX) and `headers`, and an
    /// empty body.
    Deny {
        status: StatusCode,
        headers: Vec<Header>,
    },
}

impl AuthResult {
    pub fn allow() -> Self {
        AuthResult::Allow(Vec::new())
    }

    pub fn allow_with_headers(headers: Vec<Header>) -> Self {
        AuthResult::Allow(headers)
    }

    /// A denial with the given status code.
    ///
    /// Panics unless `status` is 4XX: anything else would turn an
    /// authorization layer into a generic response writer, which the server
    /// does not permit.
    pub fn deny(status: StatusCode, headers: Vec<Header>) -> Self {
        assert!(
            status.is_client_error(),
            "auth middleware response status must be 4XX, got {status}"
        );
        AuthResult::Deny { status, headers }
    }
}

/// Pluggable request authorization.
///
/// Implementations must be safe to share across concurrent requests; any
/// interior state needs its own synchronization.
pub trait AuthMiddleware: Send + Sync {
    /// Decide whether the request may read bundle content for
    /// `owner`/`repo`.
    fn authorize(&self, request: &Parts, owner: &str, repo: &str) -> AuthResult;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::WWW_AUTHENTICATE;

    #[test]
    fn deny_accepts_4xx() {
        let result = AuthResult::deny(
            StatusCode::UNAUTHORIZED,
            vec![Header::new(WWW_AUTHENTICATE, "Basic realm=\"x\"")],
        );
        match result {
            AuthResult::Deny { status, headers } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(headers.len(), 1);
            }
            AuthResult::Allow(_) => panic!("expected deny"),
        }
    }

    #[test]
    #[should_panic(expected = "must be 4XX")]
    fn deny_rejects_5xx() {
        let _ = AuthResult::deny(StatusCode::INTERNAL_SERVER_ERROR, Vec::new());
    }

    #[test]
    #[should_panic(expected = "must be 4XX")]
    fn deny_rejects_2xx() {
        let _ = AuthResult::deny(StatusCode::OK, Vec::new());
    }
}
