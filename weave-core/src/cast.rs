//! Cast registry
//!
//! A bean handle erases the concrete type of the object it owns. Reference
//! properties, however, are declared against an ancestor interface (usually a
//! `dyn Trait`). The registry keeps one [`CastEdge`] per declared
//! (concrete, ancestor) pair and performs the checked upcast of the shared
//! pointer, so the resulting `Arc<dyn Trait>` shares the reference count of the
//! source instance.

use crate::error::{ContainerError, ContainerResult};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Type-erased shared object as stored inside a bean handle
pub type SharedObject = Arc<dyn Any + Send + Sync>;

type CastFn = dyn Fn(SharedObject) -> Option<Box<dyn Any>> + Send + Sync;

static GLOBAL_CAST_REGISTRY: Lazy<CastRegistry> = Lazy::new(CastRegistry::new);

/// One declared upcast from a concrete type to one of its ancestors
pub struct CastEdge {
    concrete: TypeId,
    concrete_name: &'static str,
    ancestor: TypeId,
    ancestor_name: &'static str,
    cast: Box<CastFn>,
}

impl CastEdge {
    pub fn concrete_name(&self) -> &'static str {
        self.concrete_name
    }

    pub fn ancestor_name(&self) -> &'static str {
        self.ancestor_name
    }

    /// Whether this edge converts objects of the given concrete type
    pub fn would_cast(&self, concrete: TypeId) -> bool {
        self.concrete == concrete
    }

    /// Whether this edge produces handles of the given ancestor type
    pub fn is_same(&self, ancestor: TypeId) -> bool {
        self.ancestor == ancestor
    }

    /// Reinterpret the shared object as `Arc<I>`
    ///
    /// Returns `None` when `I` is not the ancestor of this edge or the object
    /// is not of the edge's concrete type.
    pub fn cast<I: ?Sized + 'static>(&self, object: &SharedObject) -> Option<Arc<I>> {
        if !self.is_same(TypeId::of::<I>()) {
            return None;
        }

        let erased = (self.cast)(Arc::clone(object))?;
        erased.downcast::<Arc<I>>().ok().map(|boxed| *boxed)
    }
}

impl std::fmt::Debug for CastEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CastEdge")
            .field("concrete", &self.concrete_name)
            .field("ancestor", &self.ancestor_name)
            .finish()
    }
}

/// Process-wide table of cast edges
///
/// Edges are appended while components register themselves and only read
/// afterwards.
pub struct CastRegistry {
    edges: RwLock<HashMap<(TypeId, TypeId), Arc<CastEdge>>>,
}

impl CastRegistry {
    pub fn new() -> Self {
        Self {
            edges: RwLock::new(HashMap::new()),
        }
    }

    /// The registry shared by the whole process
    pub fn global() -> &'static CastRegistry {
        &GLOBAL_CAST_REGISTRY
    }

    /// Declare that `C` may be used wherever `I` is expected
    ///
    /// `upcast` is normally the identity closure `|object| object`, relying on
    /// unsized coercion of `Arc<C>` into `Arc<dyn Trait>`.
    pub fn register<C, I>(&self, upcast: fn(Arc<C>) -> Arc<I>)
    where
        C: Any + Send + Sync,
        I: ?Sized + 'static,
    {
        let edge = CastEdge {
            concrete: TypeId::of::<C>(),
            concrete_name: std::any::type_name::<C>(),
            ancestor: TypeId::of::<I>(),
            ancestor_name: std::any::type_name::<I>(),
            cast: Box::new(move |object: SharedObject| {
                let concrete = object.downcast::<C>().ok()?;
                Some(Box::new(upcast(concrete)) as Box<dyn Any>)
            }),
        };

        tracing::trace!(
            "Registering cast edge {} -> {}",
            edge.concrete_name,
            edge.ancestor_name
        );

        self.edges
            .write()
            .insert((edge.concrete, edge.ancestor), Arc::new(edge));
    }

    /// Register the trivial edge from `C` to itself
    pub fn register_identity<C: Any + Send + Sync>(&self) {
        self.register::<C, C>(|object| object);
    }

    /// Find the edge converting objects of type `concrete` into `target`
    pub fn find(&self, target: TypeId, concrete: TypeId) -> Option<Arc<CastEdge>> {
        self.edges.read().get(&(concrete, target)).cloned()
    }

    pub fn can_cast(&self, target: TypeId, concrete: TypeId) -> bool {
        self.edges.read().contains_key(&(concrete, target))
    }

    /// Upcast a type-erased object whose concrete type is `concrete`
    pub fn cast<I: ?Sized + 'static>(
        &self,
        object: &SharedObject,
        concrete: TypeId,
        concrete_name: &'static str,
    ) -> ContainerResult<Arc<I>> {
        let unavailable = || ContainerError::CastUnavailable {
            from: concrete_name,
            to: std::any::type_name::<I>(),
        };

        let edge = self.find(TypeId::of::<I>(), concrete).ok_or_else(unavailable)?;
        edge.cast::<I>(object).ok_or_else(unavailable)
    }

    /// Move every edge of `staged` into this registry, returning how many
    pub fn absorb(&self, staged: CastRegistry) -> usize {
        let staged = staged.edges.into_inner();
        let total = staged.len();
        self.edges.write().extend(staged);
        total
    }

    /// Names of all ancestors reachable from `concrete`
    pub fn ancestors_of(&self, concrete: TypeId) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .edges
            .read()
            .values()
            .filter(|edge| edge.would_cast(concrete))
            .map(|edge| edge.ancestor_name)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.edges.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.read().is_empty()
    }
}

impl Default for CastRegistry {
    fn default() -> Self {
        Self::new()
    }
}
