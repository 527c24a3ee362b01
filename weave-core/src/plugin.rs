//! Component export from shared libraries
//!
//! A library built as a `cdylib` links its own copy of this crate, so its
//! `#[derive(Component)]` submissions land in its own inventory and never in
//! the host's. Such a library calls [`export_components!`] once; the macro
//! emits the `weave_components_entry` symbol. The host resolves that symbol
//! after loading, hands over an empty [`ComponentHost`], lets the library
//! scan its components into it and then moves the result into the global
//! registries with its own code.
//!
//! Host and library must be built with the same toolchain, the same version
//! of this crate and the system allocator.
//!
//! ```ignore
//! // lib.rs of the plugin crate, crate-type = ["cdylib"]
//! use weave_core_macros::Component;
//!
//! #[derive(Component, Default)]
//! #[component(class = "echo::Repeater")]
//! struct Repeater;
//!
//! weave_core::export_components!();
//! ```

use crate::bean_factory::FactoryRegistry;
use crate::cast::CastRegistry;
use crate::component;
use crate::error::ContainerResult;
use std::panic::{self, AssertUnwindSafe};

/// Bumped whenever [`ComponentHost`] changes shape
pub const COMPONENT_ABI_VERSION: u32 = 1;

/// Name of the symbol emitted by [`export_components!`]
pub const ENTRY_SYMBOL: &[u8] = b"weave_components_entry\0";

/// Signature of the exported entry point
#[allow(improper_ctypes_definitions)]
pub type ComponentEntry = unsafe extern "C" fn(host: *const ComponentHost) -> EntryStatus;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Ok = 0,
    Failed = 1,
    Incompatible = 2,
}

/// Staging registries filled by a library's entry point
///
/// Only the entry point touches them while it runs, so no lock is ever
/// contended between the host's and the library's copy of the code.
#[repr(C)]
pub struct ComponentHost {
    pub abi_version: u32,
    pub factories: FactoryRegistry,
    pub casts: CastRegistry,
}

impl ComponentHost {
    pub fn new() -> Self {
        Self {
            abi_version: COMPONENT_ABI_VERSION,
            factories: FactoryRegistry::new(),
            casts: CastRegistry::new(),
        }
    }

    /// Move the staged registrations into the given registries
    ///
    /// Returns the number of classes published.
    pub fn publish(self, factories: &FactoryRegistry, casts: &CastRegistry) -> ContainerResult<usize> {
        casts.absorb(self.casts);
        factories.absorb(self.factories)
    }
}

impl Default for ComponentHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Body of the entry point emitted by [`export_components!`]
///
/// Runs inside the library and registers its components into `host`.
///
/// # Safety
///
/// `host` must be null or point to a live [`ComponentHost`] of the same
/// layout.
pub unsafe fn export_into(host: *const ComponentHost) -> EntryStatus {
    let Some(host) = host.as_ref() else {
        return EntryStatus::Failed;
    };

    if host.abi_version != COMPONENT_ABI_VERSION {
        return EntryStatus::Incompatible;
    }

    let scanned = panic::catch_unwind(AssertUnwindSafe(|| {
        component::scan_components_into(&host.factories, &host.casts)
    }));

    match scanned {
        Ok(Ok(total)) => {
            tracing::debug!("Exported {} components", total);
            EntryStatus::Ok
        }
        Ok(Err(e)) => {
            tracing::error!("Failed to export components: {}", e);
            EntryStatus::Failed
        }
        Err(_) => EntryStatus::Failed,
    }
}

/// Export the components of a shared library to the loading process
#[macro_export]
macro_rules! export_components {
    () => {
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub unsafe extern "C" fn weave_components_entry(
            host: *const $crate::plugin::ComponentHost,
        ) -> $crate::plugin::EntryStatus {
            $crate::plugin::export_into(host)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::error::ContainerResult;

    struct Exported;

    impl Component for Exported {
        fn class_name() -> &'static str {
            "weave::test::Exported"
        }

        fn create() -> ContainerResult<Self> {
            Ok(Exported)
        }
    }

    fn register_exported(factories: &FactoryRegistry, casts: &CastRegistry) -> ContainerResult<()> {
        Exported::register_into(factories, casts)
    }

    inventory::submit! {
        component::ComponentRegistration::new("weave::test::Exported", register_exported)
    }

    crate::export_components!();

    #[test]
    fn test_entry_fills_staging_registries() {
        let host = ComponentHost::new();
        let entry: ComponentEntry = weave_components_entry;

        assert_eq!(unsafe { entry(&host) }, EntryStatus::Ok);
        assert!(host.factories.contains("weave::test::Exported"));

        let factories = FactoryRegistry::new();
        let casts = CastRegistry::new();
        assert!(host.publish(&factories, &casts).unwrap() >= 1);
        assert!(factories.create("weave::test::Exported").is_ok());
    }

    #[test]
    fn test_entry_rejects_null_and_foreign_hosts() {
        assert_eq!(unsafe { export_into(std::ptr::null()) }, EntryStatus::Failed);

        let mut host = ComponentHost::new();
        host.abi_version = COMPONENT_ABI_VERSION + 1;
        assert_eq!(unsafe { export_into(&host) }, EntryStatus::Incompatible);
        assert!(host.factories.registered_classes().is_empty());
    }
}
