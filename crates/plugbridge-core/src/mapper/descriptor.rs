//! Field descriptors: the per-type table the mapper walks.

use std::borrow::Cow;
use std::fmt;

use serde_json::Value;
use uuid::Uuid;

use super::codec::{FieldCodec, FieldKind};
use super::Entity;
use crate::error::ConversionError;

type ReadFn<E> = Box<dyn Fn(&E) -> Value + Send + Sync>;
type WriteFn<E> = Box<dyn Fn(&mut E, &Value) -> Result<(), ConversionError> + Send + Sync>;

/// Accessor pair for one retained field of `E`.
///
/// Tables are normally generated by `#[derive(Entity)]` and built once per
/// type.
pub struct FieldDescriptor<E> {
    name: Cow<'static, str>,
    kind: FieldKind,
    read: ReadFn<E>,
    write: WriteFn<E>,
}

impl<E: 'static> FieldDescriptor<E> {
    /// Descriptor for a field whose type has a [`FieldCodec`].
    pub fn of<T, G, M>(name: impl Into<Cow<'static, str>>, get: G, get_mut: M) -> Self
    where
        T: FieldCodec + 'static,
        G: Fn(&E) -> &T + Send + Sync + 'static,
        M: Fn(&mut E) -> &mut T + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: T::KIND,
            read: Box::new(move |entity: &E| get(entity).encode()),
            write: Box::new(move |entity: &mut E, value: &Value| {
                *get_mut(entity) = T::decode(value)?;
                Ok(())
            }),
        }
    }

    /// Descriptor for a nested domain object, carried as its identifier.
    ///
    /// References are write-only from the record's point of view: decoding
    /// reports [`ConversionError::Unsupported`] and the field is skipped.
    pub fn reference<T, G>(name: impl Into<Cow<'static, str>>, get: G) -> Self
    where
        T: Referenced + 'static,
        G: Fn(&E) -> &T + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: FieldKind::Reference,
            read: Box::new(move |entity: &E| {
                get(entity)
                    .reference_id()
                    .map_or(Value::Null, |id| Value::String(id.to_string()))
            }),
            write: Box::new(|_: &mut E, _: &Value| {
                Err(ConversionError::Unsupported {
                    target: "reference",
                })
            }),
        }
    }

    /// Lifts the table of an embedded base entity into `E`'s table.
    pub fn flattened<B, G, M>(get: G, get_mut: M) -> impl Iterator<Item = Self>
    where
        B: Entity,
        G: Fn(&E) -> &B + Copy + Send + Sync + 'static,
        M: Fn(&mut E) -> &mut B + Copy + Send + Sync + 'static,
    {
        B::fields().iter().map(move |inner: &'static FieldDescriptor<B>| Self {
            name: inner.name.clone(),
            kind: inner.kind,
            read: Box::new(move |entity: &E| inner.read(get(entity))),
            write: Box::new(move |entity: &mut E, value: &Value| {
                inner.write(get_mut(entity), value)
            }),
        })
    }
}

impl<E> FieldDescriptor<E> {
    /// Record key of the field.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Encodes the field's current value.
    pub fn read(&self, entity: &E) -> Value {
        (self.read)(entity)
    }

    /// Decodes `value` into the field.
    pub fn write(&self, entity: &mut E, value: &Value) -> Result<(), ConversionError> {
        (self.write)(entity, value)
    }
}

impl<E> fmt::Debug for FieldDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A domain object that other entities can point at.
///
/// `#[derive(Entity)]` implements this by delegating to
/// [`Entity::identifier`].
pub trait Referenced {
    fn reference_id(&self) -> Option<Uuid>;
}

impl<T: Referenced> Referenced for Option<T> {
    fn reference_id(&self) -> Option<Uuid> {
        self.as_ref().and_then(Referenced::reference_id)
    }
}

impl<T: Referenced + ?Sized> Referenced for Box<T> {
    fn reference_id(&self) -> Option<Uuid> {
        (**self).reference_id()
    }
}

impl<T: Referenced + ?Sized> Referenced for std::sync::Arc<T> {
    fn reference_id(&self) -> Option<Uuid> {
        (**self).reference_id()
    }
}
