//! Application state management for Portal Shell
//!
//! This crate provides the shared query client, the authentication store and
//! the typed context scopes components use to reach them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod context;
pub mod query;

pub use auth::{AuthError, AuthSource, AuthState, AuthStore, AuthUser};
pub use context::ContextScope;
pub use query::{Query, QueryClient, QueryClientConfig, QueryConfig, QueryError, QueryKey, QueryState};
