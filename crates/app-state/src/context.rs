//! Typed context scopes
//!
//! A [`ContextScope`] makes values available to every component rendered
//! beneath it without threading them through each constructor. Scopes form a
//! chain: lookups walk from the innermost scope outwards, so the nearest
//! provider of a type wins.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Slot = Arc<dyn Any + Send + Sync>;

/// A node in the context chain
#[derive(Clone, Default)]
pub struct ContextScope {
    values: HashMap<TypeId, Slot>,
    parent: Option<Arc<ContextScope>>,
}

impl ContextScope {
    /// An empty scope with no parent
    pub fn root() -> Self {
        Self::default()
    }

    /// A new, empty scope whose lookups fall back to `self`
    pub fn child(&self) -> Self {
        Self {
            values: HashMap::new(),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Provide a value in this scope, shadowing any outer value of the same type
    pub fn provide<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    /// Provide an already shared value
    pub fn provide_arc<T: Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.values.insert(TypeId::of::<T>(), value);
        self
    }

    /// Look up the nearest value of type `T`
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(slot) = current.values.get(&TypeId::of::<T>()) {
                return Arc::clone(slot).downcast::<T>().ok();
            }
            scope = current.parent.as_deref();
        }
        None
    }

    /// Whether any enclosing scope provides `T`
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.get::<T>().is_some()
    }

    /// Number of scopes from here to the root, inclusive
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut parent = self.parent.as_deref();
        while let Some(scope) = parent {
            depth += 1;
            parent = scope.parent.as_deref();
        }
        depth
    }
}

impl fmt::Debug for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScope")
            .field("values", &self.values.len())
            .field("depth", &self.depth())
            .finish()
    }
}
