//! Parsing of the helper attributes accepted by `#[derive(Component)]`

use proc_macro2::{Span, TokenStream as TokenStream2};
use proc_macro_error::abort;
use quote::format_ident;
use syn::meta::ParseNestedMeta;
use syn::punctuated::Punctuated;
use syn::{Attribute, Ident, LitStr, Path, Token, Type};

/// `#[component(class = "...", constructor = path)]`
pub(crate) struct ComponentAttr {
    pub class: LitStr,
    pub constructor: Option<Path>,
}

/// Property kinds and the descriptor method binding each of them
#[derive(Clone, Copy)]
pub(crate) enum SetterKind {
    Reference,
    Weak,
    Number,
    Integer,
    Boolean,
    Character,
    Text,
    Time,
    List,
    Map,
}

const SETTER_KINDS: &[(&str, SetterKind)] = &[
    ("reference", SetterKind::Reference),
    ("weak", SetterKind::Weak),
    ("number", SetterKind::Number),
    ("integer", SetterKind::Integer),
    ("boolean", SetterKind::Boolean),
    ("character", SetterKind::Character),
    ("text", SetterKind::Text),
    ("time", SetterKind::Time),
    ("list", SetterKind::List),
    ("map", SetterKind::Map),
];

impl SetterKind {
    fn lookup(path: &Path) -> Option<Self> {
        SETTER_KINDS
            .iter()
            .find(|(name, _)| path.is_ident(name))
            .map(|(_, kind)| *kind)
    }

    pub fn descriptor_method(self) -> Ident {
        let method = match self {
            SetterKind::Reference => "reference",
            SetterKind::Weak => "weak_reference",
            SetterKind::Number => "number",
            SetterKind::Integer => "integer",
            SetterKind::Boolean => "boolean",
            SetterKind::Character => "character",
            SetterKind::Text => "text",
            SetterKind::Time => "time",
            SetterKind::List => "list",
            SetterKind::Map => "map",
        };

        format_ident!("{}", method)
    }
}

/// `#[property(name = "...", <kind> = path)]`
pub(crate) struct PropertyAttr {
    pub name: LitStr,
    pub kind: SetterKind,
    pub setter: Path,
}

/// `#[hook(name = "...", call = path)]`
pub(crate) struct HookAttr {
    pub name: LitStr,
    pub call: Path,
}

fn parse_or_abort(attr: &Attribute, parser: impl FnMut(ParseNestedMeta) -> syn::Result<()>) {
    if let Err(e) = attr.parse_nested_meta(parser) {
        abort!(e.span(), "{}", e);
    }
}

pub(crate) fn component_attr(attrs: &[Attribute], fallback: Span) -> ComponentAttr {
    let mut class = None;
    let mut constructor = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("component")) {
        parse_or_abort(attr, |meta| {
            if meta.path.is_ident("class") {
                class = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else if meta.path.is_ident("constructor") {
                constructor = Some(meta.value()?.parse::<Path>()?);
                Ok(())
            } else {
                Err(meta.error("expected `class` or `constructor`"))
            }
        });
    }

    let Some(class) = class else {
        abort!(
            fallback,
            "missing class name";
            help = "add #[component(class = \"my::Class\")]"
        );
    };

    if class.value().trim().is_empty() {
        abort!(class.span(), "class name must not be empty");
    }

    ComponentAttr { class, constructor }
}

pub(crate) fn castable_types(attrs: &[Attribute]) -> Vec<Type> {
    let mut types = Vec::new();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("castable")) {
        match attr.parse_args_with(Punctuated::<Type, Token![,]>::parse_terminated) {
            Ok(parsed) => types.extend(parsed),
            Err(e) => abort!(e.span(), "{}", e; help = "e.g. #[castable(dyn Listener, dyn Service)]"),
        }
    }

    types
}

pub(crate) fn properties(attrs: &[Attribute]) -> Vec<PropertyAttr> {
    let mut properties: Vec<PropertyAttr> = Vec::new();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("property")) {
        let mut name = None;
        let mut setter = None;

        parse_or_abort(attr, |meta| {
            if meta.path.is_ident("name") {
                name = Some(meta.value()?.parse::<LitStr>()?);
                return Ok(());
            }

            match SetterKind::lookup(&meta.path) {
                Some(kind) if setter.is_none() => {
                    setter = Some((kind, meta.value()?.parse::<Path>()?));
                    Ok(())
                }
                Some(_) => Err(meta.error("a property takes exactly one setter")),
                None => Err(meta.error(
                    "expected `name` or one of reference, weak, number, integer, boolean, \
                     character, text, time, list, map",
                )),
            }
        });

        let Some(name) = name else {
            abort!(attr, "property is missing `name`");
        };

        let Some((kind, setter)) = setter else {
            abort!(attr, "property `{}` is missing its setter", name.value());
        };

        if properties.iter().any(|p| p.name.value() == name.value()) {
            abort!(name.span(), "duplicate property `{}`", name.value());
        }

        properties.push(PropertyAttr { name, kind, setter });
    }

    properties
}

pub(crate) fn hooks(attrs: &[Attribute]) -> Vec<HookAttr> {
    let mut hooks: Vec<HookAttr> = Vec::new();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("hook")) {
        let mut name = None;
        let mut call = None;

        parse_or_abort(attr, |meta| {
            if meta.path.is_ident("name") {
                name = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else if meta.path.is_ident("call") {
                call = Some(meta.value()?.parse::<Path>()?);
                Ok(())
            } else {
                Err(meta.error("expected `name` or `call`"))
            }
        });

        let (Some(name), Some(call)) = (name, call) else {
            abort!(attr, "hook needs both `name` and `call`");
        };

        if hooks.iter().any(|h| h.name.value() == name.value()) {
            abort!(name.span(), "duplicate hook `{}`", name.value());
        }

        hooks.push(HookAttr { name, call });
    }

    hooks
}

/// Tokens of the expression constructing a fresh instance
pub(crate) fn constructor_tokens(component: &ComponentAttr) -> TokenStream2 {
    match &component.constructor {
        Some(constructor) => quote::quote! { #constructor() },
        None => quote::quote! { <Self as ::std::default::Default>::default() },
    }
}
