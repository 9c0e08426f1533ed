//! Conversion between native entity types and [`Record`]s.
//!
//! Every entity carries a static table of [`FieldDescriptor`]s, normally
//! generated by `#[derive(Entity)]`. The [`EntityMapper`] walks that table in
//! both directions:
//!
//! - **entity → record** never fails. Identifiers become their canonical
//!   string, enums their symbolic name, temporal values ISO-8601 text, nested
//!   entities their identifier, and collections `null`.
//! - **record → entity** fails only when the record is empty or the type cannot
//!   be built. A value that does not convert leaves its field at the default
//!   and is reported in [`Mapped::Partial`].
//!
//! ```rust,ignore
//! #[derive(Debug, Default, Entity)]
//! #[entity(name = "Diagnosis", rename_all = "camelCase")]
//! pub struct Diagnosis {
//!     #[entity(flatten)]
//!     pub audit: AuditFields,
//!     pub code: String,
//!     pub severity: Severity,
//!     #[entity(reference)]
//!     pub patient: Option<Patient>,
//!     #[entity(skip)]
//!     pub display_label: String,
//! }
//!
//! let record = EntityMapper::to_record(&diagnosis);
//! let back = EntityMapper::to_entity::<Diagnosis>(&record)?.into_entity();
//! ```

mod audit;
mod codec;
mod descriptor;

pub use audit::AuditFields;
pub use codec::{AsIdentifier, FieldCodec, FieldKind, scalar_text};
pub use descriptor::{FieldDescriptor, Referenced};

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ConversionError, MappingError, MappingResult};
use crate::record::Record;

/// A native type that can cross a plugin boundary as a [`Record`].
pub trait Entity: Sized + 'static {
    /// Entity name used for registry lookups.
    const NAME: &'static str;

    /// Retained fields, ancestors first, in declaration order.
    fn fields() -> &'static [FieldDescriptor<Self>];

    /// Creates the zero value the mapper fills in.
    fn instantiate() -> MappingResult<Self>;

    /// The entity's identifier, if it has one and it is set.
    fn identifier(&self) -> Option<Uuid>;
}

// =============================================================================
// Mapping Results
// =============================================================================

/// A field value that could not be converted.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    /// Record key.
    pub field: String,
    /// The rejected value.
    pub value: Value,
    pub error: ConversionError,
}

/// Outcome of a record → entity conversion that produced an object.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapped<E> {
    /// Every present field converted.
    Complete(E),
    /// Some fields kept their defaults.
    Partial {
        entity: E,
        issues: Vec<FieldIssue>,
    },
}

impl<E> Mapped<E> {
    /// The entity, regardless of field issues.
    pub fn into_entity(self) -> E {
        match self {
            Mapped::Complete(entity) | Mapped::Partial { entity, .. } => entity,
        }
    }

    pub fn entity(&self) -> &E {
        match self {
            Mapped::Complete(entity) | Mapped::Partial { entity, .. } => entity,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Mapped::Complete(_))
    }

    /// Conversion issues; empty when complete.
    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            Mapped::Complete(_) => &[],
            Mapped::Partial { issues, .. } => issues,
        }
    }
}

// =============================================================================
// Entity Mapper
// =============================================================================

/// Stateless converter between entities and records.
pub struct EntityMapper;

impl EntityMapper {
    /// Converts an entity into a record.
    pub fn to_record<E: Entity>(entity: &E) -> Record {
        let fields = E::fields();
        let mut record = Record::with_capacity(fields.len());
        for field in fields {
            record.insert(field.name(), field.read(entity));
        }
        record
    }

    /// Converts an entity, then moves each named relationship under its
    /// identifier key.
    ///
    /// `relations` pairs a relationship field with the key that should carry
    /// its identifier, for example `("patient", "patientUuid")`. The key is
    /// always present in the result, `null` when the relationship is unset.
    pub fn to_record_with_relations<E: Entity>(entity: &E, relations: &[(&str, &str)]) -> Record {
        let mut record = Self::to_record(entity);
        for (relation, id_key) in relations {
            let id = record.remove(relation).unwrap_or(Value::Null);
            record.insert(*id_key, id);
        }
        record
    }

    /// Converts a record into an entity.
    ///
    /// Fields missing from the record or holding `null` are left untouched.
    pub fn to_entity<E: Entity>(record: &Record) -> MappingResult<Mapped<E>> {
        if record.is_empty() {
            return Err(MappingError::EmptyRecord { entity: E::NAME });
        }

        let mut entity = E::instantiate()?;
        let mut issues = Vec::new();

        for field in E::fields() {
            let Some(value) = record.get(field.name()) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            match field.write(&mut entity, value) {
                Ok(()) | Err(ConversionError::Blank) => {}
                Err(ConversionError::Unsupported { target }) => {
                    debug!(
                        entity = E::NAME,
                        field = field.name(),
                        field_type = target,
                        "Skipping field with unsupported type"
                    );
                }
                Err(error) => {
                    warn!(
                        entity = E::NAME,
                        field = field.name(),
                        %value,
                        %error,
                        "Field conversion failed, keeping default"
                    );
                    issues.push(FieldIssue {
                        field: field.name().to_string(),
                        value: value.clone(),
                        error,
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(Mapped::Complete(entity))
        } else {
            Ok(Mapped::Partial { entity, issues })
        }
    }

    /// Converts every record, dropping those that cannot be mapped at all.
    pub fn to_entities<E: Entity>(records: &[Record]) -> Vec<E> {
        records
            .iter()
            .filter_map(|record| match Self::to_entity::<E>(record) {
                Ok(mapped) => Some(mapped.into_entity()),
                Err(error) => {
                    warn!(entity = E::NAME, %error, "Dropping unmappable record");
                    None
                }
            })
            .collect()
    }
}
