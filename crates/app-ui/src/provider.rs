//! Query client provider
//!
//! Makes one shared [`QueryClient`] available to every component rendered
//! beneath it. The provider adds no visible output of its own.

use app_state::QueryClient;

use crate::view::{Component, ComponentRef, Node, RenderContext};

/// Context boundary exposing a [`QueryClient`] to its descendants
pub struct QueryProvider {
    client: QueryClient,
    children: Vec<ComponentRef>,
}

impl QueryProvider {
    /// Wrap nothing yet; add children with [`QueryProvider::child`]
    pub fn new(client: QueryClient) -> Self {
        Self { client, children: Vec::new() }
    }

    /// Add a child component
    pub fn child(mut self, child: ComponentRef) -> Self {
        self.children.push(child);
        self
    }

    /// Add several child components
    pub fn children(mut self, children: impl IntoIterator<Item = ComponentRef>) -> Self {
        self.children.extend(children);
        self
    }

    /// The provided client
    pub fn client(&self) -> &QueryClient {
        &self.client
    }
}

impl Component for QueryProvider {
    fn render(&self, cx: &RenderContext) -> Node {
        let scope = cx.scope().child().provide(self.client.clone());
        let inner = cx.with_scope(scope);
        Node::fragment(self.children.iter().map(|child| child.render(&inner)))
    }
}

/// The nearest provided query client
pub fn use_query_client(cx: &RenderContext) -> Option<QueryClient> {
    cx.use_context::<QueryClient>().map(|client| (*client).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::MemoryHistory;
    use crate::view::component;
    use app_state::{ContextScope, QueryClientConfig};
    use std::sync::Arc;

    fn context() -> RenderContext {
        RenderContext::new(Arc::new(MemoryHistory::new("/")), ContextScope::root())
    }

    fn client_probe() -> ComponentRef {
        component(|cx: &RenderContext| {
            let label = if use_query_client(cx).is_some() { "client" } else { "none" };
            Node::text(label)
        })
    }

    #[test]
    fn test_descendants_see_client() {
        let client = QueryClient::new(QueryClientConfig::default());
        let provider = QueryProvider::new(client.clone()).child(client_probe());

        assert_eq!(provider.render(&context()).text_content(), "client");
    }

    #[test]
    fn test_outside_provider_has_no_client() {
        assert_eq!(client_probe().render(&context()).text_content(), "none");
    }

    #[test]
    fn test_descendants_share_the_same_instance() {
        let client = QueryClient::new(QueryClientConfig::default());
        let expected = client.clone();
        let check = component(move |cx: &RenderContext| {
            let same = use_query_client(cx).map(|c| c.same_client(&expected)).unwrap_or(false);
            Node::text(same.to_string())
        });

        let provider = QueryProvider::new(client).child(check);
        assert_eq!(provider.render(&context()).text_content(), "true");
    }

    #[test]
    fn test_children_render_unchanged() {
        let children = vec![
            component(Node::element("h1", vec![Node::text("Title")])),
            component(Node::fragment(vec![Node::text("a"), Node::text("b")])),
        ];
        let cx = context();

        let direct = Node::fragment(children.iter().map(|c| c.render(&cx)));
        let wrapped = QueryProvider::new(QueryClient::new(QueryClientConfig::default()))
            .children(children)
            .render(&cx);

        assert_eq!(wrapped.visible(), direct.visible());
    }

    #[test]
    fn test_provider_does_not_leak_into_parent_scope() {
        let cx = context();
        let provider = QueryProvider::new(QueryClient::new(QueryClientConfig::default()))
            .child(client_probe());

        provider.render(&cx);
        assert!(use_query_client(&cx).is_none());
    }
}
