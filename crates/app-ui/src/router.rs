//! Nested route table
//!
//! Routes are declared as a tree. A parent renders its matched child through
//! [`RenderContext::outlet`], which is how layout routes such as the auth
//! guard wrap the pages beneath them.

use std::fmt;
use std::sync::Arc;

use crate::navigation::decode;
use crate::view::{Component, ComponentRef, Node, OutletFn, RenderContext, RouteParams};

/// Segment type in a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    /// Literal segment
    Literal(String),
    /// Parameter segment
    Param(String),
    /// Rest of the path
    Splat,
}

fn parse_pattern(pattern: &str) -> Vec<PatternSegment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s == "*" {
                PatternSegment::Splat
            } else if let Some(param) = s.strip_prefix(':') {
                PatternSegment::Param(param.to_string())
            } else {
                PatternSegment::Literal(s.to_string())
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteKind {
    /// Consumes path segments
    Path,
    /// Consumes nothing; matches only through a child
    Layout,
    /// Matches only when nothing is left to consume
    Index,
}

/// A route declaration
#[derive(Clone)]
pub struct RouteDef {
    kind: RouteKind,
    pattern: String,
    segments: Vec<PatternSegment>,
    component: ComponentRef,
    children: Vec<RouteDef>,
}

impl RouteDef {
    /// A route matching `pattern`, relative to its parent
    ///
    /// Patterns support literal segments, `:param` segments and a trailing `*`.
    pub fn new(pattern: &str, component: ComponentRef) -> Self {
        Self {
            kind: RouteKind::Path,
            pattern: pattern.to_string(),
            segments: parse_pattern(pattern),
            component,
            children: Vec::new(),
        }
    }

    /// A pathless route that wraps its children
    pub fn layout(component: ComponentRef) -> Self {
        Self {
            kind: RouteKind::Layout,
            pattern: String::new(),
            segments: Vec::new(),
            component,
            children: Vec::new(),
        }
    }

    /// A route rendered when its parent's path matches exactly
    pub fn index(component: ComponentRef) -> Self {
        Self {
            kind: RouteKind::Index,
            pattern: String::new(),
            segments: Vec::new(),
            component,
            children: Vec::new(),
        }
    }

    /// Add a nested route
    pub fn child(mut self, route: RouteDef) -> Self {
        self.children.push(route);
        self
    }

    /// The declared pattern (empty for layout and index routes)
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Consume this route's own segments, returning what is left
    fn consume<'p>(&self, path: &'p [&'p str], params: &mut RouteParams) -> Option<&'p [&'p str]> {
        let mut rest = path;
        for segment in &self.segments {
            match segment {
                PatternSegment::Splat => {
                    let joined: Vec<String> = rest.iter().map(|s| decode(s)).collect();
                    params.insert("*".to_string(), joined.join("/"));
                    return Some(&[]);
                }
                PatternSegment::Literal(literal) => {
                    let (first, tail) = rest.split_first()?;
                    if first != literal {
                        return None;
                    }
                    rest = tail;
                }
                PatternSegment::Param(name) => {
                    let (first, tail) = rest.split_first()?;
                    params.insert(name.clone(), decode(first));
                    rest = tail;
                }
            }
        }
        Some(rest)
    }

    fn resolve(&self, path: &[&str], params: &RouteParams) -> Option<Vec<RouteMatch>> {
        let mut params = params.clone();
        let rest = match self.kind {
            RouteKind::Index if !path.is_empty() => return None,
            RouteKind::Index | RouteKind::Layout => path,
            RouteKind::Path => self.consume(path, &mut params)?,
        };

        for child in &self.children {
            if let Some(mut matches) = child.resolve(rest, &params) {
                matches.insert(0, RouteMatch::new(self, params.clone()));
                return Some(matches);
            }
        }

        let matches_alone = match self.kind {
            RouteKind::Layout => false,
            RouteKind::Index | RouteKind::Path => rest.is_empty(),
        };
        matches_alone.then(|| vec![RouteMatch::new(self, params)])
    }
}

impl fmt::Debug for RouteDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDef")
            .field("kind", &self.kind)
            .field("pattern", &self.pattern)
            .field("children", &self.children)
            .finish()
    }
}

/// One level of a resolved route
#[derive(Clone)]
pub struct RouteMatch {
    pattern: String,
    component: ComponentRef,
    params: RouteParams,
}

impl RouteMatch {
    fn new(route: &RouteDef, params: RouteParams) -> Self {
        Self {
            pattern: route.pattern.clone(),
            component: Arc::clone(&route.component),
            params,
        }
    }

    /// Pattern of the matched route
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parameters captured up to and including this level
    pub fn params(&self) -> &RouteParams {
        &self.params
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("pattern", &self.pattern)
            .field("params", &self.params)
            .finish()
    }
}

/// The top-level route table
#[derive(Debug, Clone, Default)]
pub struct Routes {
    routes: Vec<RouteDef>,
}

impl Routes {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level route
    pub fn route(mut self, route: RouteDef) -> Self {
        self.routes.push(route);
        self
    }

    /// Match a pathname, outermost route first; the first declared match wins
    pub fn resolve(&self, pathname: &str) -> Option<Vec<RouteMatch>> {
        let segments: Vec<&str> = pathname.split('/').filter(|s| !s.is_empty()).collect();
        let root = RouteParams::new();
        self.routes.iter().find_map(|route| route.resolve(&segments, &root))
    }
}

fn render_level(matches: Arc<Vec<RouteMatch>>, level: usize, cx: &RenderContext) -> Node {
    let Some(current) = matches.get(level) else {
        return Node::Empty;
    };

    let outlet: Option<OutletFn> = (level + 1 < matches.len()).then(|| {
        let matches = Arc::clone(&matches);
        Arc::new(move |cx: &RenderContext| render_level(Arc::clone(&matches), level + 1, cx))
            as OutletFn
    });

    let cx = cx.with_route(Arc::new(current.params.clone()), outlet);
    current.component.render(&cx)
}

impl Component for Routes {
    fn render(&self, cx: &RenderContext) -> Node {
        match self.resolve(&cx.location().pathname) {
            Some(matches) => render_level(Arc::new(matches), 0, cx),
            None => {
                tracing::debug!(path = %cx.location().pathname, "No route matched");
                Node::Empty
            }
        }
    }
}
