//! `#[derive(EntityEnum)]` implementation.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, spanned::Spanned};

use crate::case::RenameRule;

pub fn derive_entity_enum(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new(
            input.span(),
            "EntityEnum can only be derived for enums",
        ));
    };
    if data.variants.is_empty() {
        return Err(syn::Error::new(
            input.span(),
            "EntityEnum requires at least one variant",
        ));
    }

    let rename_all = parse_rename_all(&input.attrs)?;

    let mut idents = Vec::new();
    let mut symbols = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new(
                variant.span(),
                "EntityEnum variants cannot carry data",
            ));
        }
        let symbol = match parse_variant_rename(&variant.attrs)? {
            Some(rename) => rename,
            None => match rename_all {
                Some(rule) => rule.apply(&variant.ident.to_string()),
                None => variant.ident.to_string(),
            },
        };
        idents.push(&variant.ident);
        symbols.push(symbol);
    }

    let type_name = name.to_string();
    let core = quote! { ::plugbridge_core::mapper };

    Ok(quote! {
        impl #core::FieldCodec for #name {
            const KIND: #core::FieldKind = #core::FieldKind::Enumeration;

            fn encode(&self) -> ::plugbridge_core::serde_json::Value {
                let symbol = match self {
                    #( Self::#idents => #symbols, )*
                };
                ::plugbridge_core::serde_json::Value::String(symbol.to_string())
            }

            fn decode(
                value: &::plugbridge_core::serde_json::Value,
            ) -> ::std::result::Result<Self, ::plugbridge_core::error::ConversionError> {
                let text = #core::scalar_text(value, #type_name)?;
                #(
                    if text.eq_ignore_ascii_case(#symbols) {
                        return ::std::result::Result::Ok(Self::#idents);
                    }
                )*
                ::std::result::Result::Err(::plugbridge_core::error::ConversionError::invalid(
                    text,
                    #type_name,
                    "unknown variant",
                ))
            }
        }
    })
}

fn parse_rename_all(attrs: &[Attribute]) -> syn::Result<Option<RenameRule>> {
    let mut rule = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                let lit = meta.value()?.parse::<LitStr>()?;
                rule = Some(RenameRule::parse(&lit.value(), lit.span())?);
                Ok(())
            } else {
                Err(meta.error("expected `rename_all`"))
            }
        })?;
    }
    Ok(rule)
}

fn parse_variant_rename(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut rename = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                rename = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("expected `rename`"))
            }
        })?;
    }
    Ok(rename)
}
