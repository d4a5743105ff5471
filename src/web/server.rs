//! The axum application serving bundle content.
//!
//! The URL grammar (`/owner/repo[/]` and `/owner/repo/<file>`) is parsed by
//! the route parser rather than a static route table, so the whole app is a
//! single fallback handler. Serving is strictly read-only: the handler holds
//! nothing but read handles into the web directories, and the registry is
//! re-read from disk per request.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, error, info};

use crate::auth::{AuthMiddleware, AuthResult};
use crate::bundles::{BUNDLE_LIST_FILENAME, REPO_BUNDLE_LIST_FILENAME};
use crate::error::{Error, Result};
use crate::routes::{parse_route, RepositoryProvider};

// ---------------------------------------------------------------------------
// Application state and router
// ---------------------------------------------------------------------------

pub struct AppState {
    pub repos: RepositoryProvider,
    pub auth: Option<Arc<dyn AuthMiddleware>>,
}

/// Build the axum [`Router`]; every path funnels through [`serve`].
pub fn router(state: Arc<AppState>) -> Router {
    Router::new().fallback(serve).with_state(state)
}

// ---------------------------------------------------------------------------
// Request handling
// ---------------------------------------------------------------------------

async fn serve(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let path = request.uri().path().to_string();

    // 1. Parse the request path as a route; anything else is a 404.
    let parsed = match parse_route(&path, false) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(%path, error = %e, "failed to parse route");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let (parts, _body) = request.into_parts();

    // 2. Authorization, when configured.
    let mut allow_headers = Vec::new();
    if let Some(auth) = &state.auth {
        match auth.authorize(&parts, &parsed.owner, &parsed.repo) {
            AuthResult::Allow(headers) => allow_headers = headers,
            AuthResult::Deny { status, headers } => {
                let mut response = status.into_response();
                for header in headers {
                    response.headers_mut().append(header.name, header.value);
                }
                return response;
            }
        }
    }

    // 3. The route must be registered.
    let repos = match state.repos.get_repositories() {
        Ok(repos) => repos,
        Err(e) => {
            error!(error = %e, "failed to load routes");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let route = parsed.route();
    let Some(repository) = repos.get(&route) else {
        debug!(%route, "route not registered");
        return StatusCode::NOT_FOUND.into_response();
    };

    // 4. Resolve the file. With no filename, the trailing slash picks which
    //    bundle-list projection matches the client's relative-URI base; the
    //    projections themselves are never addressable by name.
    let file_to_serve = match parsed.filename.as_deref() {
        None => {
            if path.ends_with('/') {
                repository.web_dir.join(BUNDLE_LIST_FILENAME)
            } else {
                repository.web_dir.join(REPO_BUNDLE_LIST_FILENAME)
            }
        }
        Some(BUNDLE_LIST_FILENAME) | Some(REPO_BUNDLE_LIST_FILENAME) => {
            return StatusCode::NOT_FOUND.into_response();
        }
        Some(filename) => repository.web_dir.join(filename),
    };

    // 5. Serve with range/ETag support; a missing file becomes a 404 here.
    let request = Request::from_parts(parts, Body::empty());
    let mut response = match ServeFile::new(&file_to_serve).oneshot(request).await {
        Ok(response) => response.map(Body::new).into_response(),
        Err(never) => match never {},
    };

    for header in allow_headers {
        response.headers_mut().append(header.name, header.value);
    }

    debug!(%route, file = %file_to_serve.display(), status = %response.status(), "served content");
    response
}

// ---------------------------------------------------------------------------
// Listener lifecycle
// ---------------------------------------------------------------------------

/// Bind `addr` (optionally with TLS) and serve until SIGINT/SIGTERM, then
/// drain in-flight requests and return.
pub async fn run(app: Router, addr: SocketAddr, tls: Option<rustls::ServerConfig>) -> Result<()> {
    let handle = axum_server::Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    let server = {
        let handle = handle.clone();
        let service = app.into_make_service();
        match tls {
            Some(config) => {
                let rustls_config =
                    axum_server::tls_rustls::RustlsConfig::from_config(Arc::new(config));
                tokio::spawn(async move {
                    axum_server::bind_rustls(addr, rustls_config)
                        .handle(handle)
                        .serve(service)
                        .await
                })
            }
            None => tokio::spawn(async move {
                axum_server::bind(addr).handle(handle).serve(service).await
            }),
        }
    };

    // `listening()` resolves once the socket is accepting (or not at all if
    // binding failed, in which case the join below surfaces the error).
    if let Some(bound) = handle.listening().await {
        println!("Server is running at address {bound}");
    }

    server
        .await
        .map_err(|e| Error::Spawn {
            program: "web server task".into(),
            source: std::io::Error::other(e),
        })?
        .map_err(|e| Error::io(addr.to_string(), e))?;

    Ok(())
}

async fn shutdown_on_signal(handle: axum_server::Handle) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }

    println!("Starting graceful server shutdown...");
    // No deadline: in-flight requests drain fully.
    handle.graceful_shutdown(None);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
