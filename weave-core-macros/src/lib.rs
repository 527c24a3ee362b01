mod attributes;
mod component_impl;

use proc_macro::TokenStream;
use proc_macro_error::proc_macro_error;

/// Component derive macro
///
/// Implements `weave_core::component::Component` and submits the type for
/// registration, so a factory document can instantiate it by class name.
///
/// Usage:
/// ```ignore
/// #[derive(Component, Default)]
/// #[component(class = "gateway::UdpListener")]        // required
/// #[component(constructor = UdpListener::new)]        // optional, defaults to Default::default
/// #[castable(dyn Listener, dyn Service)]              // optional: injectable as these interfaces
/// #[property(name = "port", integer = UdpListener::set_port)]
/// #[property(name = "router", reference = UdpListener::set_router)]
/// #[hook(name = "done", call = UdpListener::bind)]
/// #[hook(name = "cleanup", call = UdpListener::release)]
/// struct UdpListener { /* ... */ }
/// ```
///
/// Setter kinds: `reference`, `weak`, `number`, `integer`, `boolean`,
/// `character`, `text`, `time`, `list` and `map`. Setters and hooks take
/// `&self` and return `()` or a `Result<()>`.
#[proc_macro_derive(Component, attributes(component, castable, property, hook))]
#[proc_macro_error]
pub fn derive_component(input: TokenStream) -> TokenStream {
    component_impl::derive_component_impl(input)
}
