//! Portal Shell
//!
//! Composes the application root: a [`QueryProvider`](app_ui::QueryProvider)
//! exposing the shared query client, wrapped around a route table whose
//! protected pages sit under an [`AuthGuard`](app_ui::AuthGuard).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod logging;
pub mod shell;

pub use config::{LogConfig, QueryDefaults, ShellConfig};
pub use logging::init_tracing;
pub use shell::{Shell, ShellBuilder};

/// Shell errors
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for [`ShellConfig`]
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Auth store failed
    #[error("Auth error: {0}")]
    Auth(#[from] app_state::AuthError),

    /// Rendering kept redirecting
    #[error("Too many redirects ({redirects}) while rendering {path}")]
    RedirectLoop {
        /// Path of the last redirect target
        path: String,
        /// Redirects followed before giving up
        redirects: usize,
    },
}

/// Result type for shell operations
pub type Result<T> = std::result::Result<T, ShellError>;
