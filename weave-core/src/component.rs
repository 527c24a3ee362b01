use crate::bean::BeanDescriptor;
use crate::bean_factory::{ComponentFactory, FactoryRegistry};
use crate::cast::CastRegistry;
use crate::error::ContainerResult;
use std::sync::Arc;

/// Registration function type
///
/// Receives the registries to fill, which are not always the global ones: a
/// shared library registers into staging registries handed over by the host.
pub type ComponentRegistrar = fn(&FactoryRegistry, &CastRegistry) -> ContainerResult<()>;

/// Component registration entry, collected by inventory
pub struct ComponentRegistration {
    pub class: &'static str,
    pub registrar: ComponentRegistrar,
}

impl ComponentRegistration {
    pub const fn new(class: &'static str, registrar: ComponentRegistrar) -> Self {
        Self { class, registrar }
    }
}

inventory::collect!(ComponentRegistration);

/// Component trait - a type the configuration can instantiate by class name
///
/// Usually implemented through `#[derive(Component)]`.
///
/// # Example
///
/// ```ignore
/// use weave_core::prelude::*;
/// use weave_core_macros::Component;
///
/// #[derive(Component, Default)]
/// #[component(class = "gateway::UdpListener")]
/// #[castable(dyn Listener)]
/// #[property(name = "port", integer = UdpListener::set_port)]
/// #[hook(name = "done", call = UdpListener::bind)]
/// struct UdpListener {
///     port: Mutex<u16>,
/// }
/// ```
pub trait Component: Sized + Send + Sync + 'static {
    /// Name used by configuration to refer to this type
    fn class_name() -> &'static str;

    /// Construct a fresh, not yet injected instance
    fn create() -> ContainerResult<Self>;

    /// Declare properties and hooks
    fn describe(_descriptor: &mut BeanDescriptor<Self>) -> ContainerResult<()> {
        Ok(())
    }

    /// Declare ancestor interfaces this type may be injected as
    fn casts(_registry: &CastRegistry) {}

    /// Register factory and cast edges with the global registries
    ///
    /// Safe to call more than once.
    fn register() -> ContainerResult<()> {
        Self::register_into(FactoryRegistry::global(), CastRegistry::global())
    }

    fn register_into(factories: &FactoryRegistry, casts: &CastRegistry) -> ContainerResult<()> {
        let factory = ComponentFactory::<Self>::new()?;

        casts.register_identity::<Self>();
        Self::casts(casts);

        factories.register(Self::class_name(), Arc::new(factory))
    }
}

/// Register every component submitted through inventory
///
/// Returns the number of registered components.
pub fn scan_components() -> ContainerResult<usize> {
    scan_components_into(FactoryRegistry::global(), CastRegistry::global())
}

/// Same as [`scan_components`], into the given registries
pub fn scan_components_into(factories: &FactoryRegistry, casts: &CastRegistry) -> ContainerResult<usize> {
    let registrations: Vec<_> = inventory::iter::<ComponentRegistration>.into_iter().collect();
    let total = registrations.len();

    tracing::debug!("Scanning {} components", total);

    for (index, registration) in registrations.iter().enumerate() {
        tracing::trace!("[{}/{}] Registering component '{}'", index + 1, total, registration.class);
        (registration.registrar)(factories, casts)?;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::any::TypeId;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    impl Component for English {
        fn class_name() -> &'static str {
            "weave::test::English"
        }

        fn create() -> ContainerResult<Self> {
            Ok(English)
        }

        fn casts(registry: &CastRegistry) {
            registry.register::<Self, dyn Greeter>(|object: Arc<Self>| -> Arc<dyn Greeter> { object });
        }
    }

    struct Impostor;

    impl Component for Impostor {
        fn class_name() -> &'static str {
            "weave::test::English"
        }

        fn create() -> ContainerResult<Self> {
            Ok(Impostor)
        }
    }

    fn register_english(factories: &FactoryRegistry, casts: &CastRegistry) -> ContainerResult<()> {
        English::register_into(factories, casts)
    }

    inventory::submit! {
        ComponentRegistration::new("weave::test::English", register_english)
    }

    #[test]
    fn test_scan_registers_submitted_components() {
        assert!(scan_components().unwrap() >= 1);

        let handle = FactoryRegistry::global().create("weave::test::English").unwrap();
        assert_eq!(handle.cast::<dyn Greeter>().unwrap().greet(), "hello");
    }

    #[test]
    fn test_scan_into_private_registries() {
        let factories = FactoryRegistry::new();
        let casts = CastRegistry::new();

        assert!(scan_components_into(&factories, &casts).unwrap() >= 1);
        assert!(factories.contains("weave::test::English"));
        assert!(casts.can_cast(TypeId::of::<dyn Greeter>(), TypeId::of::<English>()));
    }

    #[test]
    fn test_register_twice_and_conflicting_type() {
        English::register().unwrap();
        English::register().unwrap();

        let error = Impostor::register().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Duplicate);
    }
}
