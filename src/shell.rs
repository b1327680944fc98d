//! Application root
//!
//! [`Shell`] owns the collaborators the two glue components depend on (the
//! query client, the auth store and the history) and renders the component
//! tree, following any declarative redirect the tree produces.

use app_state::{AuthStore, AuthUser, ContextScope, QueryClient};
use app_ui::{
    AuthGuard, Component, ComponentRef, Location, MemoryHistory, Node, QueryProvider,
    RenderContext, RouteDef, Routes,
};
use std::sync::Arc;
use storage::PersistenceConfig;

use crate::config::ShellConfig;
use crate::{Result, ShellError};

/// Builder for [`Shell`]
pub struct ShellBuilder {
    config: ShellConfig,
    client: Option<QueryClient>,
    auth: Option<AuthStore>,
    login_page: Option<ComponentRef>,
    public: Vec<RouteDef>,
    protected: Vec<RouteDef>,
}

impl ShellBuilder {
    /// Use an already constructed query client instead of building one
    pub fn query_client(mut self, client: QueryClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Use an existing auth store instead of building one
    pub fn auth_store(mut self, auth: AuthStore) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Component rendered at the login path
    pub fn login_page(mut self, page: ComponentRef) -> Self {
        self.login_page = Some(page);
        self
    }

    /// A route anyone can reach
    pub fn public(mut self, route: RouteDef) -> Self {
        self.public.push(route);
        self
    }

    /// A route that requires authentication
    pub fn protected(mut self, route: RouteDef) -> Self {
        self.protected.push(route);
        self
    }

    /// Assemble the shell, restoring persisted auth state if configured
    pub async fn build(self) -> Result<Shell> {
        let config = self.config;

        let client = self
            .client
            .unwrap_or_else(|| QueryClient::new(config.query.client_config()));

        let auth = match (self.auth, &config.auth_state_path) {
            (Some(auth), _) => auth,
            (None, Some(path)) => AuthStore::with_persistence(PersistenceConfig::new(path)).await?,
            (None, None) => AuthStore::new(),
        };

        let mut routes = Routes::new();
        if let Some(page) = self.login_page {
            routes = routes.route(RouteDef::new(&config.login_path, page));
        }
        for route in self.public {
            routes = routes.route(route);
        }

        let guard = AuthGuard::new(Arc::new(auth.clone())).with_login_path(config.login_path.clone());
        let guarded = self
            .protected
            .into_iter()
            .fold(RouteDef::layout(Arc::new(guard)), RouteDef::child);
        routes = routes.route(guarded);

        let root = QueryProvider::new(client.clone()).child(Arc::new(routes));
        let history = MemoryHistory::new(&config.initial_path);

        tracing::debug!(
            initial_path = %config.initial_path,
            login_path = %config.login_path,
            "Shell assembled"
        );

        Ok(Shell { config, client, auth, history, root })
    }
}

/// The assembled application root
pub struct Shell {
    config: ShellConfig,
    client: QueryClient,
    auth: AuthStore,
    history: MemoryHistory,
    root: QueryProvider,
}

impl Shell {
    /// Start building a shell
    pub fn builder(config: ShellConfig) -> ShellBuilder {
        ShellBuilder {
            config,
            client: None,
            auth: None,
            login_page: None,
            public: Vec::new(),
            protected: Vec::new(),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// The shared query client
    pub fn query_client(&self) -> &QueryClient {
        &self.client
    }

    /// The auth store
    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    /// The history stack
    pub fn history(&self) -> &MemoryHistory {
        &self.history
    }

    /// Current location
    pub fn location(&self) -> Location {
        self.history.location()
    }

    /// Push a new path
    pub fn navigate(&self, path: &str) {
        self.history.push(path, None);
    }

    /// Render the tree once, without following redirects
    pub fn render_once(&self) -> Node {
        let cx = RenderContext::new(Arc::new(self.history.clone()), ContextScope::root());
        self.root.render(&cx)
    }

    /// Render, applying declarative redirects until the tree settles
    pub fn render(&self) -> Result<Node> {
        let mut redirects = 0;
        loop {
            let node = self.render_once();
            let Some(redirect) = node.find_redirect() else {
                return Ok(node);
            };

            if redirects >= self.config.max_redirects {
                tracing::warn!(path = %redirect.to, redirects, "Redirect loop detected");
                return Err(ShellError::RedirectLoop { path: redirect.to.clone(), redirects });
            }

            redirect.apply(&self.history);
            redirects += 1;
        }
    }

    /// Sign in and return to the page the guard redirected from, if any
    pub async fn complete_login(&self, user: AuthUser) -> Result<()> {
        self.auth.login(user).await?;
        if let Some(target) = self.history.location().return_to() {
            tracing::debug!(to = %target, "Returning to guarded page after login");
            self.history.replace(&target, None);
        }
        Ok(())
    }

    /// Sign out; the next render redirects away from protected pages
    pub async fn logout(&self) -> Result<()> {
        self.auth.logout().await?;
        Ok(())
    }
}
