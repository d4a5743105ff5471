//! Trace output configuration.
//!
//! The sink is selected by the `BUNDLE_SERVER_TRACE` environment variable:
//!
//! - `1` writes JSON events to stderr;
//! - a directory path writes to an auto-named file inside that directory;
//! - any other path writes (appends) to that file;
//! - unset or empty disables trace output entirely.
//!
//! Verbosity is controlled with the usual `RUST_LOG` filter syntax.

use std::fs::OpenOptions;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const TRACE_ENV: &str = "BUNDLE_SERVER_TRACE";

/// Install the global tracing subscriber according to [`TRACE_ENV`].
///
/// Returns the guard keeping the non-blocking writer alive; callers must
/// hold it for the life of the process. `None` means tracing is disabled.
pub fn init() -> Option<WorkerGuard> {
    let value = std::env::var(TRACE_ENV).ok()?;
    if value.is_empty() {
        return None;
    }

    let (writer, guard) = if value == "1" {
        tracing_appender::non_blocking(std::io::stderr())
    } else {
        let path = Path::new(&value);
        if path.is_dir() {
            let appender = tracing_appender::rolling::never(
                path,
                format!("git-bundle-server-{}.log", std::process::id()),
            );
            tracing_appender::non_blocking(appender)
        } else {
            let file = match OpenOptions::new().create(true).append(true).open(path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("warning: cannot open trace output '{value}': {e}");
                    return None;
                }
            };
            tracing_appender::non_blocking(file)
        }
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer),
        )
        .init();

    Some(guard)
}
