//! Component and render model
//!
//! Components render into a [`Node`] tree. Rendering is synchronous: each call
//! to [`Component::render`] reads the current location, context and state
//! fresh through the [`RenderContext`] it is given.

use app_state::ContextScope;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::navigation::{Location, Navigator, Redirect};

/// Parameters captured from the matched route path
pub type RouteParams = HashMap<String, String>;

// =============================================================================
// Nodes
// =============================================================================

/// Rendered output
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Nothing
    Empty,
    /// A text run
    Text(String),
    /// A tagged element
    Element {
        /// Tag name
        tag: String,
        /// Attributes
        attrs: BTreeMap<String, String>,
        /// Child nodes
        children: Vec<Node>,
    },
    /// Several nodes without a wrapper
    Fragment(Vec<Node>),
    /// A request to navigate instead of showing content
    Redirect(Redirect),
}

impl Node {
    /// A text node
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    /// An element with children and no attributes
    pub fn element(tag: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element { tag: tag.into(), attrs: BTreeMap::new(), children }
    }

    /// A fragment
    pub fn fragment(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Fragment(children.into_iter().collect())
    }

    /// Add an attribute; ignored on anything but elements
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Node::Element { attrs, .. } = &mut self {
            attrs.insert(name.into(), value.into());
        }
        self
    }

    /// The nodes a user would see at this level, with fragments flattened and
    /// empty nodes dropped, recursively
    pub fn visible(&self) -> Vec<Node> {
        match self {
            Node::Empty => Vec::new(),
            Node::Fragment(children) => children.iter().flat_map(Node::visible).collect(),
            Node::Element { tag, attrs, children } => vec![Node::Element {
                tag: tag.clone(),
                attrs: attrs.clone(),
                children: children.iter().flat_map(Node::visible).collect(),
            }],
            other => vec![other.clone()],
        }
    }

    /// Concatenated text of the whole tree
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element { children, .. } | Node::Fragment(children) => {
                children.iter().for_each(|child| child.collect_text(out))
            }
            Node::Empty | Node::Redirect(_) => {}
        }
    }

    /// First redirect in the tree, depth first
    pub fn find_redirect(&self) -> Option<&Redirect> {
        match self {
            Node::Redirect(redirect) => Some(redirect),
            Node::Element { children, .. } | Node::Fragment(children) => {
                children.iter().find_map(Node::find_redirect)
            }
            Node::Empty | Node::Text(_) => None,
        }
    }
}

// =============================================================================
// Components
// =============================================================================

/// Something that renders into a [`Node`]
pub trait Component: Send + Sync {
    /// Render against the given context
    fn render(&self, cx: &RenderContext) -> Node;
}

/// Shared handle to a component
pub type ComponentRef = Arc<dyn Component>;

impl<F> Component for F
where
    F: Fn(&RenderContext) -> Node + Send + Sync,
{
    fn render(&self, cx: &RenderContext) -> Node {
        self(cx)
    }
}

impl Component for Node {
    fn render(&self, _cx: &RenderContext) -> Node {
        self.clone()
    }
}

/// Wrap a closure or node as a [`ComponentRef`]
pub fn component(c: impl Component + 'static) -> ComponentRef {
    Arc::new(c)
}

/// Renders the matched child route
#[derive(Debug, Clone, Copy, Default)]
pub struct Outlet;

impl Component for Outlet {
    fn render(&self, cx: &RenderContext) -> Node {
        cx.outlet()
    }
}

pub(crate) type OutletFn = Arc<dyn Fn(&RenderContext) -> Node + Send + Sync>;

// =============================================================================
// Render Context
// =============================================================================

/// Everything a component can read while rendering
#[derive(Clone)]
pub struct RenderContext {
    scope: ContextScope,
    navigator: Arc<dyn Navigator>,
    location: Location,
    params: Arc<RouteParams>,
    outlet: Option<OutletFn>,
}

impl RenderContext {
    /// Start a render pass, snapshotting the navigator's current location
    pub fn new(navigator: Arc<dyn Navigator>, scope: ContextScope) -> Self {
        let location = navigator.current_location();
        Self {
            scope,
            navigator,
            location,
            params: Arc::new(RouteParams::new()),
            outlet: None,
        }
    }

    /// The location this pass renders
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The routing capability
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// The context scope components see
    pub fn scope(&self) -> &ContextScope {
        &self.scope
    }

    /// Nearest provided value of type `T`
    pub fn use_context<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.scope.get::<T>()
    }

    /// A matched route parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// All matched route parameters
    pub fn params(&self) -> &RouteParams {
        &self.params
    }

    /// Render the nested route, or [`Node::Empty`] when there is none
    pub fn outlet(&self) -> Node {
        match &self.outlet {
            Some(render) => render(self),
            None => Node::Empty,
        }
    }

    /// Whether a nested route is waiting to render
    pub fn has_outlet(&self) -> bool {
        self.outlet.is_some()
    }

    /// Same context with a different scope
    pub fn with_scope(&self, scope: ContextScope) -> Self {
        Self { scope, ..self.clone() }
    }

    pub(crate) fn with_route(&self, params: Arc<RouteParams>, outlet: Option<OutletFn>) -> Self {
        Self { params, outlet, ..self.clone() }
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("location", &self.location)
            .field("scope", &self.scope)
            .field("params", &self.params)
            .field("has_outlet", &self.outlet.is_some())
            .finish()
    }
}
