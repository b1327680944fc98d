//! User interface layer for Portal Shell
//!
//! This crate provides a headless component model together with the two
//! pieces of glue every screen sits under: the query client provider and the
//! authentication route guard.
//!
//! # Modules
//!
//! - [`view`] - Node tree, components and the render context
//! - [`navigation`] - Locations, the navigator capability and in-memory history
//! - [`router`] - Nested route table and outlets
//! - [`provider`] - Query client context boundary
//! - [`guard`] - Authentication route guard
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use app_state::ContextScope;
//! use app_ui::{component, AuthGuard, MemoryHistory, Node, RenderContext, RouteDef, Routes, Component};
//!
//! let routes = Routes::new()
//!     .route(
//!         RouteDef::layout(Arc::new(AuthGuard::new(Arc::new(false))))
//!             .child(RouteDef::new("/dashboard", component(Node::text("dashboard")))),
//!     );
//!
//! let history = Arc::new(MemoryHistory::new("/dashboard"));
//! let node = routes.render(&RenderContext::new(history, ContextScope::root()));
//! assert_eq!(node.find_redirect().map(|r| r.to.as_str()), Some("/login"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod guard;
pub mod navigation;
pub mod provider;
pub mod router;
pub mod view;

// Re-export commonly used types
pub use guard::{AuthGuard, GuardDecision, DEFAULT_LOGIN_PATH};

pub use navigation::{
    Location, MemoryHistory, NavigateMode, Navigator, Redirect, RedirectState,
};

pub use provider::{use_query_client, QueryProvider};

pub use router::{RouteDef, RouteMatch, Routes};

pub use view::{component, Component, ComponentRef, Node, Outlet, RenderContext, RouteParams};
