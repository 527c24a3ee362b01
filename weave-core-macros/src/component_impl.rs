use proc_macro::TokenStream;
use proc_macro_error::abort;
use quote::quote;
use syn::spanned::Spanned;
use syn::{parse_macro_input, DeriveInput};

use crate::attributes::{castable_types, component_attr, constructor_tokens, hooks, properties};

pub(crate) fn derive_component_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    // Factories are registered per concrete type
    if !input.generics.params.is_empty() {
        abort!(
            input.generics.span(),
            "Component cannot be derived for generic types";
            help = "implement weave_core::component::Component by hand for each instantiation"
        );
    }

    let component = component_attr(&input.attrs, name.span());
    let class = &component.class;
    let construct = constructor_tokens(&component);

    let property_bindings = properties(&input.attrs).into_iter().map(|property| {
        let property_name = &property.name;
        let method = property.kind.descriptor_method();
        let setter = &property.setter;

        quote! {
            descriptor.#method(#property_name, #setter)?;
        }
    });

    let hook_bindings = hooks(&input.attrs).into_iter().map(|hook| {
        let hook_name = &hook.name;
        let call = &hook.call;

        quote! {
            descriptor.hook(#hook_name, #call)?;
        }
    });

    let cast_edges = castable_types(&input.attrs).into_iter().map(|ancestor| {
        quote! {
            registry.register::<Self, #ancestor>(
                |object: ::std::sync::Arc<Self>| -> ::std::sync::Arc<#ancestor> { object }
            );
        }
    });

    let expanded = quote! {
        impl ::weave_core::component::Component for #name {
            fn class_name() -> &'static str {
                #class
            }

            fn create() -> ::weave_core::error::ContainerResult<Self> {
                ::std::result::Result::Ok(#construct)
            }

            #[allow(unused_variables)]
            fn describe(
                descriptor: &mut ::weave_core::bean::BeanDescriptor<Self>,
            ) -> ::weave_core::error::ContainerResult<()> {
                #(#property_bindings)*
                #(#hook_bindings)*
                ::std::result::Result::Ok(())
            }

            #[allow(unused_variables)]
            fn casts(registry: &::weave_core::cast::CastRegistry) {
                #(#cast_edges)*
            }
        }

        ::weave_core::inventory::submit! {
            ::weave_core::component::ComponentRegistration::new(
                #class,
                <#name as ::weave_core::component::Component>::register_into,
            )
        }
    };

    TokenStream::from(expanded)
}
