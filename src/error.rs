//! Error kinds shared across the bundle server.
//!
//! Library code returns [`Error`] so that callers can react to the kind
//! (retry, map to an HTTP status, pick an exit code) without string-matching.
//! The CLI binaries log once at the outermost boundary and translate to exit
//! codes; the web server translates to status codes and never forwards
//! internal error text to clients.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A route, file, or bundle list that should exist does not.
    #[error("{0} not found")]
    NotFound(String),

    /// `init` was run against a route that is already registered.
    #[error("route '{0}' already exists; to overwrite it, delete it with 'git-bundle-server delete' and re-run this command")]
    AlreadyExists(String),

    /// A route string that does not satisfy the route grammar.
    #[error("invalid route: {0}")]
    InvalidRoute(String),

    /// File-system failure, tagged with the path it happened on.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A subprocess (git, crontab, systemctl, ...) exited non-zero.
    #[error("'{program}' exited with status {status}: {stderr}")]
    Subprocess {
        program: String,
        status: i32,
        stderr: String,
    },

    /// Failed to spawn or communicate with a subprocess.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// `init` against an upstream with no branches to bundle.
    #[error("refused to write an empty bundle for '{0}'; is the repository empty?")]
    EmptyRepository(String),

    /// A bundle file whose header section cannot be parsed.
    #[error("malformed bundle header: {0}")]
    MalformedBundle(String),

    /// The auth (or other startup) configuration is unusable.
    #[error("invalid configuration: {0}")]
    MalformedConfig(String),

    /// JSON (de)serialization failure for persisted state.
    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
