//! Guarded route integration tests
//!
//! End-to-end checks of the auth guard mounted above protected routes.

use app_state::{AuthStore, AuthUser, ContextScope};
use app_ui::{
    component, AuthGuard, Component, MemoryHistory, NavigateMode, Navigator, Node, RenderContext,
    RouteDef, Routes,
};
use portal_shell::{Shell, ShellConfig};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn app_routes(auth: AuthStore) -> Routes {
    Routes::new()
        .route(RouteDef::new("/login", component(Node::text("login"))))
        .route(
            RouteDef::layout(Arc::new(AuthGuard::new(Arc::new(auth))))
                .child(RouteDef::new("/dashboard", component(Node::text("dashboard"))))
                .child(RouteDef::new(
                    "/projects/:id",
                    component(|cx: &RenderContext| {
                        Node::text(format!("project {}", cx.param("id").unwrap_or_default()))
                    }),
                )),
        )
}

fn render(routes: &Routes, history: &MemoryHistory) -> Node {
    routes.render(&RenderContext::new(Arc::new(history.clone()), ContextScope::root()))
}

/// Scenario A: signed out at /dashboard
#[test]
fn test_signed_out_redirects_to_login_with_origin() {
    let routes = app_routes(AuthStore::new());
    let history = MemoryHistory::new("/dashboard");

    let node = render(&routes, &history);
    let redirect = node.find_redirect().expect("guard should redirect");

    assert_eq!(redirect.to, "/login");
    assert_eq!(redirect.mode, NavigateMode::Replace);
    assert_eq!(redirect.state.as_ref().unwrap()["from"]["pathname"], json!("/dashboard"));

    redirect.apply(&history);
    let login = history.current_location();
    assert_eq!(login.pathname, "/login");
    assert_eq!(login.redirect_state().unwrap().from.pathname, "/dashboard");
    assert_eq!(render(&routes, &history).text_content(), "login");
}

/// Scenario B: signed in
#[tokio::test]
async fn test_signed_in_renders_outlet_without_navigation() {
    let auth = AuthStore::new();
    auth.login(AuthUser::new("u1", "Alice")).await.unwrap();
    let routes = app_routes(auth);
    let history = MemoryHistory::new("/projects/42");

    let node = render(&routes, &history);

    assert_eq!(node.text_content(), "project 42");
    assert!(node.find_redirect().is_none());
    assert_eq!(history.len(), 1);
    assert_eq!(history.location().pathname, "/projects/42");
}

#[test]
fn test_back_from_login_skips_guarded_route() {
    let routes = app_routes(AuthStore::new());
    let history = MemoryHistory::new("/");
    history.push("/dashboard", None);

    let node = render(&routes, &history);
    node.find_redirect().unwrap().apply(&history);

    let paths: Vec<String> = history.entries().into_iter().map(|l| l.pathname).collect();
    assert_eq!(paths, vec!["/", "/login"]);

    assert!(history.back());
    assert_eq!(history.location().pathname, "/");
    assert!(!history.entries().iter().any(|l| l.pathname == "/dashboard"));
}

#[tokio::test]
async fn test_shell_round_trip_through_login() {
    let shell = Shell::builder(ShellConfig::new().initial_path("/dashboard"))
        .login_page(component(Node::text("login")))
        .protected(RouteDef::new("/dashboard", component(Node::text("dashboard"))))
        .build()
        .await
        .unwrap();

    assert_eq!(shell.render().unwrap().text_content(), "login");

    shell.complete_login(AuthUser::new("u1", "Alice")).await.unwrap();
    assert_eq!(shell.render().unwrap().text_content(), "dashboard");

    shell.logout().await.unwrap();
    assert_eq!(shell.render().unwrap().text_content(), "login");
    assert_eq!(shell.location().return_to(), Some("/dashboard".to_string()));
}

#[tokio::test]
async fn test_persisted_login_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = ShellConfig::new()
        .initial_path("/dashboard")
        .auth_state_path(dir.path().join("auth.json"));

    {
        let shell = Shell::builder(config.clone())
            .login_page(component(Node::text("login")))
            .protected(RouteDef::new("/dashboard", component(Node::text("dashboard"))))
            .build()
            .await
            .unwrap();
        shell.complete_login(AuthUser::new("u1", "Alice")).await.unwrap();
    }

    let shell = Shell::builder(config)
        .login_page(component(Node::text("login")))
        .protected(RouteDef::new("/dashboard", component(Node::text("dashboard"))))
        .build()
        .await
        .unwrap();

    assert!(shell.auth().is_authenticated());
    assert_eq!(shell.render().unwrap().text_content(), "dashboard");
}
