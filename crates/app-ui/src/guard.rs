//! Authentication route guard
//!
//! Mounted above protected routes. Authenticated users see the nested route;
//! everyone else is sent to the login path with the attempted location in the
//! navigation state, replacing the current history entry so going back from
//! the login page doesn't bounce into the guard again.

use app_state::AuthSource;
use std::fmt;
use std::sync::Arc;

use crate::navigation::{Location, NavigateMode, Navigator, Redirect, RedirectState};
use crate::view::{Component, Node, RenderContext};

/// Where unauthenticated users are sent unless configured otherwise
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Outcome of checking a location
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// Render the nested route
    Allow,
    /// Navigate away instead
    Redirect(Redirect),
}

/// Route guard keyed on an authentication flag
#[derive(Clone)]
pub struct AuthGuard {
    auth: Arc<dyn AuthSource>,
    login_path: String,
}

impl AuthGuard {
    /// Guard using the default login path
    pub fn new(auth: Arc<dyn AuthSource>) -> Self {
        Self { auth, login_path: DEFAULT_LOGIN_PATH.to_string() }
    }

    /// Send unauthenticated users somewhere other than [`DEFAULT_LOGIN_PATH`]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// The configured login path
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Decide for `location` using the flag's current value
    pub fn decide(&self, location: &Location) -> GuardDecision {
        if self.auth.is_authenticated() {
            tracing::trace!(path = %location.pathname, "Guard allowed");
            return GuardDecision::Allow;
        }

        tracing::debug!(
            from = %location.pathname,
            to = %self.login_path,
            "Guard redirecting unauthenticated user"
        );
        GuardDecision::Redirect(Redirect {
            to: self.login_path.clone(),
            state: Some(RedirectState::new(location.clone()).to_value()),
            mode: NavigateMode::Replace,
        })
    }

    /// Check the navigator's current location and redirect right away if
    /// needed. Returns whether the nested content may render.
    pub fn guard_navigation(&self, navigator: &dyn Navigator) -> bool {
        match self.decide(&navigator.current_location()) {
            GuardDecision::Allow => true,
            GuardDecision::Redirect(redirect) => {
                redirect.apply(navigator);
                false
            }
        }
    }
}

impl Component for AuthGuard {
    fn render(&self, cx: &RenderContext) -> Node {
        match self.decide(cx.location()) {
            GuardDecision::Allow => cx.outlet(),
            GuardDecision::Redirect(redirect) => Node::Redirect(redirect),
        }
    }
}

impl fmt::Debug for AuthGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGuard")
            .field("login_path", &self.login_path)
            .field("is_authenticated", &self.auth.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::{MemoryHistory, MockNavigator};
    use crate::router::{RouteDef, Routes};
    use crate::view::component;
    use app_state::{AuthStore, AuthUser, ContextScope};
    use serde_json::json;

    fn protected_routes(guard: AuthGuard) -> Routes {
        Routes::new()
            .route(
                RouteDef::layout(Arc::new(guard))
                    .child(RouteDef::new("dashboard", component(Node::text("dashboard")))),
            )
            .route(RouteDef::new("login", component(Node::text("login"))))
    }

    fn render_at(routes: &Routes, history: &MemoryHistory) -> Node {
        let cx = RenderContext::new(Arc::new(history.clone()), ContextScope::root());
        routes.render(&cx)
    }

    #[test]
    fn test_authenticated_renders_outlet() {
        let routes = protected_routes(AuthGuard::new(Arc::new(true)));
        let history = MemoryHistory::new("/dashboard");

        let node = render_at(&routes, &history);

        assert_eq!(node.text_content(), "dashboard");
        assert!(node.find_redirect().is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_unauthenticated_redirects_with_origin() {
        let guard = AuthGuard::new(Arc::new(false));
        let location = Location::parse("/dashboard?tab=1");

        let decision = guard.decide(&location);

        let GuardDecision::Redirect(redirect) = decision else {
            panic!("expected a redirect");
        };
        assert_eq!(redirect.to, "/login");
        assert_eq!(redirect.mode, NavigateMode::Replace);
        let state = redirect.state.unwrap();
        assert_eq!(state["from"]["pathname"], json!("/dashboard"));
        assert_eq!(state["from"]["search"], json!("?tab=1"));
    }

    #[test]
    fn test_render_emits_redirect_node() {
        let routes = protected_routes(AuthGuard::new(Arc::new(false)));
        let history = MemoryHistory::new("/dashboard");

        let node = render_at(&routes, &history);

        let redirect = node.find_redirect().expect("redirect node");
        assert_eq!(redirect.to, "/login");
        assert_eq!(node.text_content(), "");
    }

    #[test]
    fn test_custom_login_path() {
        let guard = AuthGuard::new(Arc::new(false)).with_login_path("/signin");
        assert_eq!(guard.login_path(), "/signin");

        match guard.decide(&Location::parse("/x")) {
            GuardDecision::Redirect(redirect) => assert_eq!(redirect.to, "/signin"),
            GuardDecision::Allow => panic!("expected a redirect"),
        }
    }

    #[test]
    fn test_guard_navigation_replaces_history_entry() {
        let guard = AuthGuard::new(Arc::new(false));
        let history = MemoryHistory::new("/");
        history.push("/dashboard", None);

        assert!(!guard.guard_navigation(&history));

        assert_eq!(history.len(), 2);
        let login = history.location();
        assert_eq!(login.pathname, "/login");
        assert_eq!(login.return_to(), Some("/dashboard".to_string()));

        assert!(history.back());
        assert_eq!(history.location().pathname, "/");
    }

    #[test]
    fn test_guard_navigation_with_mock_navigator() {
        let mut navigator = MockNavigator::new();
        navigator
            .expect_current_location()
            .returning(|| Location::parse("/dashboard"));
        navigator
            .expect_redirect()
            .times(1)
            .returning(|path, state, mode| {
                assert_eq!(path, "/login");
                assert_eq!(mode, NavigateMode::Replace);
                let state = state.expect("state attached");
                assert_eq!(state["from"]["pathname"], json!("/dashboard"));
            });

        let guard = AuthGuard::new(Arc::new(false));
        assert!(!guard.guard_navigation(&navigator));
    }

    #[test]
    fn test_authenticated_never_touches_navigator() {
        let mut navigator = MockNavigator::new();
        navigator
            .expect_current_location()
            .returning(|| Location::parse("/dashboard"));
        navigator.expect_redirect().never();

        let guard = AuthGuard::new(Arc::new(true));
        assert!(guard.guard_navigation(&navigator));
    }

    #[tokio::test]
    async fn test_reads_store_fresh_on_each_render() {
        let store = AuthStore::new();
        let routes = protected_routes(AuthGuard::new(Arc::new(store.clone())));
        let history = MemoryHistory::new("/dashboard");

        assert!(render_at(&routes, &history).find_redirect().is_some());

        store.login(AuthUser::new("u1", "Alice")).await.unwrap();
        assert_eq!(render_at(&routes, &history).text_content(), "dashboard");

        store.logout().await.unwrap();
        assert!(render_at(&routes, &history).find_redirect().is_some());
    }
}
