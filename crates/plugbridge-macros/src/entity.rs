//! `#[derive(Entity)]` implementation.
//!
//! Generates, for a struct with named fields:
//!
//! 1. `impl Entity` with a field-descriptor table built once in a
//!    `LazyLock` static
//! 2. `impl Referenced`, so other entities can point at this one
//!
//! # Container attributes `#[entity(...)]`
//!
//! | Key | Example | Description |
//! |-----|---------|-------------|
//! | `name` | `"Diagnosis"` | Entity name (default: type name) |
//! | `rename_all` | `"camelCase"` | Casing of record keys |
//!
//! # Field attributes `#[entity(...)]`
//!
//! | Key | Description |
//! |-----|-------------|
//! | `skip` | Not mapped in either direction |
//! | `rename = "..."` | Explicit record key |
//! | `flatten` | Embedded entity; its table is lifted in place |
//! | `reference` | Nested entity, encoded as its identifier |
//! | `id` | Identifier field; defaults to the field named `uuid` |

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, LitStr, Type, spanned::Spanned};

use crate::case::RenameRule;

// ============================================================================
// Attribute structures
// ============================================================================

#[derive(Default)]
struct ContainerAttrs {
    name: Option<String>,
    rename_all: Option<RenameRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldMode {
    Codec,
    Flatten,
    Reference,
}

struct FieldAttrs {
    skip: bool,
    rename: Option<String>,
    mode: FieldMode,
    id: bool,
}

impl Default for FieldAttrs {
    fn default() -> Self {
        Self {
            skip: false,
            rename: None,
            mode: FieldMode::Codec,
            id: false,
        }
    }
}

struct MappedField<'a> {
    ident: &'a Ident,
    ty: &'a Type,
    attrs: FieldAttrs,
}

// ============================================================================
// Entry point
// ============================================================================

pub fn derive_entity(input: &DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "Entity cannot be derived for generic types",
        ));
    }

    let container = parse_container_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new(
                    input.span(),
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        Data::Enum(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Entity cannot be derived for enums. Use EntityEnum for enumerations.",
            ));
        }
        Data::Union(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Entity cannot be derived for unions",
            ));
        }
    };

    let mut mapped = Vec::new();
    for field in fields {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        if let Some(ident) = field.ident.as_ref() {
            mapped.push(MappedField {
                ident,
                ty: &field.ty,
                attrs,
            });
        }
    }

    generate(input, &container, &mapped)
}

// ============================================================================
// Attribute parsing
// ============================================================================

fn parse_container_attrs(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut out = ContainerAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                out.name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("rename_all") {
                let lit = meta.value()?.parse::<LitStr>()?;
                out.rename_all = Some(RenameRule::parse(&lit.value(), lit.span())?);
            } else {
                return Err(meta.error("expected `name` or `rename_all`"));
            }
            Ok(())
        })?;
    }
    Ok(out)
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                out.skip = true;
            } else if meta.path.is_ident("rename") {
                out.rename = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("flatten") {
                out.mode = FieldMode::Flatten;
            } else if meta.path.is_ident("reference") {
                out.mode = FieldMode::Reference;
            } else if meta.path.is_ident("id") {
                out.id = true;
            } else {
                return Err(meta.error(
                    "expected one of `skip`, `rename`, `flatten`, `reference`, `id`",
                ));
            }
            Ok(())
        })?;

        if out.mode == FieldMode::Flatten && (out.rename.is_some() || out.id) {
            return Err(syn::Error::new(
                attr.span(),
                "`flatten` cannot be combined with `rename` or `id`",
            ));
        }
    }
    Ok(out)
}

// ============================================================================
// Code generation
// ============================================================================

fn generate(
    input: &DeriveInput,
    container: &ContainerAttrs,
    fields: &[MappedField<'_>],
) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let entity_name = container
        .name
        .clone()
        .unwrap_or_else(|| name.to_string());

    let core = quote! { ::plugbridge_core::mapper };

    let pushes = fields.iter().map(|field| {
        let ident = field.ident;
        let ty = field.ty;
        let key = field
            .attrs
            .rename
            .clone()
            .unwrap_or_else(|| match container.rename_all {
                Some(rule) => rule.apply(&ident.to_string()),
                None => ident.to_string().trim_start_matches("r#").to_string(),
            });

        match field.attrs.mode {
            FieldMode::Codec => quote! {
                fields.push(#core::FieldDescriptor::<#name>::of::<#ty, _, _>(
                    #key,
                    |e: &#name| &e.#ident,
                    |e: &mut #name| &mut e.#ident,
                ));
            },
            FieldMode::Reference => quote! {
                fields.push(#core::FieldDescriptor::<#name>::reference::<#ty, _>(
                    #key,
                    |e: &#name| &e.#ident,
                ));
            },
            FieldMode::Flatten => quote! {
                fields.extend(#core::FieldDescriptor::<#name>::flattened::<#ty, _, _>(
                    |e: &#name| &e.#ident,
                    |e: &mut #name| &mut e.#ident,
                ));
            },
        }
    });

    let identifier = identifier_expr(fields)?;

    Ok(quote! {
        impl #core::Entity for #name {
            const NAME: &'static str = #entity_name;

            fn fields() -> &'static [#core::FieldDescriptor<Self>] {
                static FIELDS: ::std::sync::LazyLock<
                    ::std::vec::Vec<#core::FieldDescriptor<#name>>,
                > = ::std::sync::LazyLock::new(|| {
                    let mut fields = ::std::vec::Vec::new();
                    #(#pushes)*
                    fields
                });
                &FIELDS
            }

            fn instantiate() -> ::plugbridge_core::error::MappingResult<Self> {
                ::std::result::Result::Ok(<Self as ::std::default::Default>::default())
            }

            fn identifier(&self) -> ::std::option::Option<::plugbridge_core::uuid::Uuid> {
                #identifier
            }
        }

        impl #core::Referenced for #name {
            fn reference_id(&self) -> ::std::option::Option<::plugbridge_core::uuid::Uuid> {
                <Self as #core::Entity>::identifier(self)
            }
        }
    })
}

/// Identifier source: an `#[entity(id)]` field, else a field named `uuid`,
/// else the first flattened base entity.
fn identifier_expr(fields: &[MappedField<'_>]) -> syn::Result<TokenStream> {
    let marked: Vec<&MappedField<'_>> = fields.iter().filter(|f| f.attrs.id).collect();
    if marked.len() > 1 {
        return Err(syn::Error::new(
            marked[1].ident.span(),
            "only one field can be marked `#[entity(id)]`",
        ));
    }

    let id_field = marked.first().copied().or_else(|| {
        fields
            .iter()
            .find(|f| f.attrs.mode == FieldMode::Codec && f.ident == "uuid")
    });

    if let Some(field) = id_field {
        let ident = field.ident;
        return Ok(quote! {
            ::plugbridge_core::mapper::AsIdentifier::as_identifier(&self.#ident)
        });
    }

    if let Some(base) = fields.iter().find(|f| f.attrs.mode == FieldMode::Flatten) {
        let ident = base.ident;
        return Ok(quote! {
            ::plugbridge_core::mapper::Entity::identifier(&self.#ident)
        });
    }

    Ok(quote! { ::std::option::Option::None })
}
