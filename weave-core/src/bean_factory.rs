//! Bean Factory - creates instances by class name
//!
//! The configuration only names a class. The [`FactoryRegistry`] maps that
//! name to a [`BeanFactory`] which knows the concrete type and produces a
//! fresh [`BeanHandle`].

use crate::bean::{BeanHandle, BeanMeta};
use crate::component::Component;
use crate::error::{ContainerError, ContainerResult};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

static GLOBAL_FACTORY_REGISTRY: Lazy<FactoryRegistry> = Lazy::new(FactoryRegistry::new);

/// Produces fresh instances of one concrete type
pub trait BeanFactory: Send + Sync {
    /// Create a new instance wrapped in a handle
    fn create(&self) -> ContainerResult<BeanHandle>;

    /// Type ID of the produced instances
    fn type_id(&self) -> TypeId;

    /// Type name of the produced instances
    fn type_name(&self) -> &'static str;
}

/// Factory for types implementing [`Component`]
///
/// The setter table is described once when the factory is built and shared
/// by every handle it creates.
pub struct ComponentFactory<T> {
    meta: Arc<BeanMeta>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> ComponentFactory<T> {
    pub fn new() -> ContainerResult<Self> {
        Ok(Self {
            meta: Arc::new(BeanMeta::describe::<T>()?),
            _marker: PhantomData,
        })
    }
}

impl<T: Component> BeanFactory for ComponentFactory<T> {
    fn create(&self) -> ContainerResult<BeanHandle> {
        let instance = T::create()?;
        Ok(BeanHandle::with_meta(Arc::new(instance), Arc::clone(&self.meta)))
    }

    fn type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Process-wide class name to factory table
pub struct FactoryRegistry {
    factories: RwLock<BTreeMap<String, Arc<dyn BeanFactory>>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn global() -> &'static FactoryRegistry {
        &GLOBAL_FACTORY_REGISTRY
    }

    /// Register `factory` under `class`
    ///
    /// Registering the same type twice is a no-op. A different type under an
    /// already taken name is rejected.
    pub fn register(&self, class: &str, factory: Arc<dyn BeanFactory>) -> ContainerResult<()> {
        let mut factories = self.factories.write();

        if let Some(existing) = factories.get(class) {
            if existing.type_id() == factory.type_id() {
                tracing::trace!("Class '{}' is already registered", class);
                return Ok(());
            }

            tracing::warn!(
                "Class '{}' already registered for {}, rejecting {}",
                class,
                existing.type_name(),
                factory.type_name()
            );
            return Err(ContainerError::DuplicateFactory {
                class: class.to_string(),
                existing: existing.type_name(),
            });
        }

        tracing::debug!("Registering class '{}' as {}", class, factory.type_name());
        factories.insert(class.to_string(), factory);
        Ok(())
    }

    pub fn lookup(&self, class: &str) -> ContainerResult<Arc<dyn BeanFactory>> {
        self.factories
            .read()
            .get(class)
            .cloned()
            .ok_or_else(|| ContainerError::FactoryNotFound(class.to_string()))
    }

    /// Look up the factory for `class` and build a new instance
    pub fn create(&self, class: &str) -> ContainerResult<BeanHandle> {
        let factory = self.lookup(class)?;
        factory.create()
    }

    pub fn contains(&self, class: &str) -> bool {
        self.factories.read().contains_key(class)
    }

    /// All registered class names, sorted
    pub fn registered_classes(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    /// Move every factory of `staged` into this registry
    ///
    /// Stops at the first conflicting class name. Returns the number of
    /// factories moved.
    pub fn absorb(&self, staged: FactoryRegistry) -> ContainerResult<usize> {
        let staged = staged.factories.into_inner();
        let total = staged.len();

        for (class, factory) in staged {
            self.register(&class, factory)?;
        }

        Ok(total)
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    struct Gadget;

    impl Component for Gadget {
        fn class_name() -> &'static str {
            "weave::test::Gadget"
        }

        fn create() -> ContainerResult<Self> {
            Ok(Gadget)
        }
    }

    struct Gizmo;

    impl Component for Gizmo {
        fn class_name() -> &'static str {
            "weave::test::Gizmo"
        }

        fn create() -> ContainerResult<Self> {
            Ok(Gizmo)
        }
    }

    #[test]
    fn test_register_and_create() {
        let registry = FactoryRegistry::new();
        registry
            .register("Gadget", Arc::new(ComponentFactory::<Gadget>::new().unwrap()))
            .unwrap();

        let first = registry.create("Gadget").unwrap();
        let second = registry.create("Gadget").unwrap();

        assert!(first.downcast::<Gadget>().is_some());
        assert!(!first.ptr_eq(&second));
        assert_eq!(first.class_name(), "weave::test::Gadget");
        assert_eq!(registry.registered_classes(), vec!["Gadget".to_string()]);
    }

    #[test]
    fn test_register_is_idempotent_per_type() {
        let registry = FactoryRegistry::new();
        let gadget = || Arc::new(ComponentFactory::<Gadget>::new().unwrap());

        registry.register("Gadget", gadget()).unwrap();
        registry.register("Gadget", gadget()).unwrap();

        let error = registry
            .register("Gadget", Arc::new(ComponentFactory::<Gizmo>::new().unwrap()))
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Duplicate);
    }

    #[test]
    fn test_absorb_staged_factories() {
        let staged = FactoryRegistry::new();
        staged
            .register("Gadget", Arc::new(ComponentFactory::<Gadget>::new().unwrap()))
            .unwrap();

        let registry = FactoryRegistry::new();
        registry
            .register("Gizmo", Arc::new(ComponentFactory::<Gizmo>::new().unwrap()))
            .unwrap();

        assert_eq!(registry.absorb(staged).unwrap(), 1);
        assert_eq!(registry.registered_classes(), vec!["Gadget", "Gizmo"]);

        let conflicting = FactoryRegistry::new();
        conflicting
            .register("Gadget", Arc::new(ComponentFactory::<Gizmo>::new().unwrap()))
            .unwrap();
        let error = registry.absorb(conflicting).err().unwrap();
        assert_eq!(error.kind(), ErrorKind::Duplicate);
    }

    #[test]
    fn test_missing_factory() {
        let registry = FactoryRegistry::new();

        let error = registry.lookup("NoSuchClass").err().unwrap();
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.to_string(), "factory for class NoSuchClass is missing");
        assert!(!registry.contains("NoSuchClass"));
    }
}
