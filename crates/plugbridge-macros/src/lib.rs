//! Procedural macros for plugbridge.
//!
//! This crate provides:
//!
//! - `#[derive(Entity)]` - Generates the field-descriptor table the entity
//!   mapper walks
//! - `#[derive(EntityEnum)]` - Generates symbolic-name conversion for
//!   fieldless enums
//!
//! The generated code refers to `::plugbridge_core`, so the deriving crate
//! must depend on `plugbridge-core` directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use plugbridge_core::{AuditFields, Entity, EntityEnum};
//!
//! #[derive(Debug, Clone, Copy, Default, EntityEnum)]
//! #[entity(rename_all = "SCREAMING_SNAKE_CASE")]
//! pub enum Severity {
//!     #[default]
//!     Mild,
//!     Severe,
//! }
//!
//! #[derive(Debug, Default, Entity)]
//! #[entity(name = "Diagnosis", rename_all = "camelCase")]
//! pub struct Diagnosis {
//!     #[entity(flatten)]
//!     pub audit: AuditFields,
//!     pub patient_uuid: Option<Uuid>,
//!     pub severity: Severity,
//!     #[entity(skip)]
//!     pub cached_label: String,
//! }
//! ```

mod case;
mod entity;
mod entity_enum;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `Entity` and `Referenced` for a struct with named fields.
///
/// The struct must implement `Default`; the mapper fills in a default value.
///
/// # Container attributes
///
/// - `#[entity(name = "...")]` - Entity name (default: the type name)
/// - `#[entity(rename_all = "...")]` - Key casing: `camelCase`, `PascalCase`,
///   `snake_case`, `SCREAMING_SNAKE_CASE`, `lowercase` or `UPPERCASE`
///
/// # Field attributes
///
/// - `#[entity(skip)]` - Transient or computed field, never mapped
/// - `#[entity(rename = "...")]` - Record key for this field
/// - `#[entity(flatten)]` - Embedded base entity; its fields are mapped inline
/// - `#[entity(reference)]` - Nested entity, carried as its identifier
/// - `#[entity(id)]` - Identifier field (default: the field named `uuid`)
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match entity::derive_entity(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derives `FieldCodec` for a fieldless enum.
///
/// Variants encode as their name and decode case-insensitively.
///
/// # Attributes
///
/// - `#[entity(rename_all = "...")]` on the enum - Casing of variant names
/// - `#[entity(rename = "...")]` on a variant - Explicit symbolic name
#[proc_macro_derive(EntityEnum, attributes(entity))]
pub fn derive_entity_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match entity_enum::derive_entity_enum(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
