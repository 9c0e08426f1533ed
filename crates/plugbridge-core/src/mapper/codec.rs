//! Per-type conversion rules between field values and record values.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ConversionError;

/// How a field is represented in a [`Record`](crate::record::Record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// String, number or boolean, passed through.
    Scalar,
    /// 128-bit identifier, carried as its canonical string.
    Identifier,
    /// Enumeration, carried as its symbolic name.
    Enumeration,
    /// Date, time or date-time, carried as ISO-8601 text.
    Temporal,
    /// Nested domain object, reduced to its identifier.
    Reference,
    /// Collection or map, never carried.
    Collection,
}

/// Conversion between a field type and a record value.
///
/// Implementations follow one leniency rule: a value that is already of the
/// right JSON shape is taken as is, anything else goes through the textual
/// form of the value.
pub trait FieldCodec: Sized {
    /// Representation kind of this type.
    const KIND: FieldKind;

    /// Encodes the field into a record value.
    fn encode(&self) -> Value;

    /// Decodes a non-null record value.
    fn decode(value: &Value) -> Result<Self, ConversionError>;
}

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const TIME_INPUT_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];
const DATE_TIME_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Trimmed textual form of a scalar value.
///
/// Returns [`ConversionError::Blank`] for blank strings and `Invalid` for
/// nested values, which can only appear in hand-built JSON.
pub fn scalar_text(value: &Value, target: &'static str) -> Result<String, ConversionError> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => return Err(ConversionError::Blank),
        other => {
            return Err(ConversionError::invalid(
                other.to_string(),
                target,
                "nested values are not convertible",
            ));
        }
    };
    if text.is_empty() {
        Err(ConversionError::Blank)
    } else {
        Ok(text)
    }
}

impl FieldCodec for String {
    const KIND: FieldKind = FieldKind::Scalar;

    fn encode(&self) -> Value {
        Value::String(self.clone())
    }

    fn decode(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => scalar_text(other, "String"),
        }
    }
}

impl FieldCodec for bool {
    const KIND: FieldKind = FieldKind::Scalar;

    fn encode(&self) -> Value {
        Value::Bool(*self)
    }

    /// Anything but a case-insensitive `"true"` decodes to `false`.
    fn decode(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Ok(scalar_text(other, "bool")?.eq_ignore_ascii_case("true")),
        }
    }
}

macro_rules! impl_integer_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldCodec for $ty {
                const KIND: FieldKind = FieldKind::Scalar;

                fn encode(&self) -> Value {
                    Value::from(*self)
                }

                fn decode(value: &Value) -> Result<Self, ConversionError> {
                    let target = stringify!($ty);
                    match value {
                        Value::Number(n) => {
                            if let Some(i) = n.as_i64() {
                                <$ty>::try_from(i)
                                    .map_err(|e| ConversionError::invalid(n.to_string(), target, e))
                            } else if let Some(u) = n.as_u64() {
                                <$ty>::try_from(u)
                                    .map_err(|e| ConversionError::invalid(n.to_string(), target, e))
                            } else {
                                let f = n.as_f64().unwrap_or(f64::NAN).trunc();
                                if f.is_finite() && f >= <$ty>::MIN as f64 && f <= <$ty>::MAX as f64 {
                                    Ok(f as $ty)
                                } else {
                                    Err(ConversionError::invalid(n.to_string(), target, "out of range"))
                                }
                            }
                        }
                        other => {
                            let text = scalar_text(other, target)?;
                            text.parse::<$ty>()
                                .map_err(|e| ConversionError::invalid(text, target, e))
                        }
                    }
                }
            }
        )*
    };
}

impl_integer_codec!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

macro_rules! impl_float_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldCodec for $ty {
                const KIND: FieldKind = FieldKind::Scalar;

                fn encode(&self) -> Value {
                    Value::from(*self)
                }

                fn decode(value: &Value) -> Result<Self, ConversionError> {
                    let target = stringify!($ty);
                    match value {
                        Value::Number(n) => n
                            .as_f64()
                            .map(|f| f as $ty)
                            .ok_or_else(|| ConversionError::invalid(n.to_string(), target, "not a number")),
                        other => {
                            let text = scalar_text(other, target)?;
                            text.parse::<$ty>()
                                .map_err(|e| ConversionError::invalid(text, target, e))
                        }
                    }
                }
            }
        )*
    };
}

impl_float_codec!(f32, f64);

impl FieldCodec for Uuid {
    const KIND: FieldKind = FieldKind::Identifier;

    fn encode(&self) -> Value {
        Value::String(self.to_string())
    }

    fn decode(value: &Value) -> Result<Self, ConversionError> {
        let text = scalar_text(value, "Uuid")?;
        Uuid::parse_str(&text).map_err(|e| ConversionError::invalid(text, "Uuid", e))
    }
}

impl FieldCodec for NaiveDate {
    const KIND: FieldKind = FieldKind::Temporal;

    fn encode(&self) -> Value {
        Value::String(self.format(DATE_FORMAT).to_string())
    }

    fn decode(value: &Value) -> Result<Self, ConversionError> {
        let text = scalar_text(value, "NaiveDate")?;
        NaiveDate::parse_from_str(&text, DATE_FORMAT)
            .map_err(|e| ConversionError::invalid(text, "NaiveDate", e))
    }
}

impl FieldCodec for NaiveTime {
    const KIND: FieldKind = FieldKind::Temporal;

    fn encode(&self) -> Value {
        Value::String(self.format(TIME_FORMAT).to_string())
    }

    fn decode(value: &Value) -> Result<Self, ConversionError> {
        let text = scalar_text(value, "NaiveTime")?;
        parse_first(&text, TIME_INPUT_FORMATS, NaiveTime::parse_from_str, "NaiveTime")
    }
}

impl FieldCodec for NaiveDateTime {
    const KIND: FieldKind = FieldKind::Temporal;

    fn encode(&self) -> Value {
        Value::String(self.format(DATE_TIME_FORMAT).to_string())
    }

    fn decode(value: &Value) -> Result<Self, ConversionError> {
        let text = scalar_text(value, "NaiveDateTime")?;
        parse_first(
            &text,
            DATE_TIME_INPUT_FORMATS,
            NaiveDateTime::parse_from_str,
            "NaiveDateTime",
        )
    }
}

fn parse_first<T>(
    text: &str,
    formats: &[&str],
    parse: fn(&str, &str) -> chrono::ParseResult<T>,
    target: &'static str,
) -> Result<T, ConversionError> {
    let mut last = None;
    for format in formats {
        match parse(text, format) {
            Ok(v) => return Ok(v),
            Err(e) => last = Some(e),
        }
    }
    Err(ConversionError::invalid(
        text,
        target,
        last.map(|e| e.to_string()).unwrap_or_default(),
    ))
}

impl<T: FieldCodec> FieldCodec for Option<T> {
    const KIND: FieldKind = T::KIND;

    fn encode(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldCodec::encode)
    }

    fn decode(value: &Value) -> Result<Self, ConversionError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::decode(value).map(Some)
        }
    }
}

macro_rules! impl_collection_codec {
    ($($ty:ident < $($param:ident),+ >),* $(,)?) => {
        $(
            impl<$($param),+> FieldCodec for $ty<$($param),+> {
                const KIND: FieldKind = FieldKind::Collection;

                fn encode(&self) -> Value {
                    Value::Null
                }

                fn decode(_value: &Value) -> Result<Self, ConversionError> {
                    Err(ConversionError::Unsupported { target: stringify!($ty) })
                }
            }
        )*
    };
}

impl_collection_codec!(Vec<T>, HashSet<T>, BTreeSet<T>, HashMap<K, V>, BTreeMap<K, V>);

/// A type usable as an entity identifier field.
pub trait AsIdentifier {
    /// The identifier, if set and well-formed.
    fn as_identifier(&self) -> Option<Uuid>;
}

impl AsIdentifier for Uuid {
    fn as_identifier(&self) -> Option<Uuid> {
        Some(*self)
    }
}

impl AsIdentifier for String {
    fn as_identifier(&self) -> Option<Uuid> {
        Uuid::parse_str(self.trim()).ok()
    }
}

impl<T: AsIdentifier> AsIdentifier for Option<T> {
    fn as_identifier(&self) -> Option<Uuid> {
        self.as_ref().and_then(AsIdentifier::as_identifier)
    }
}
