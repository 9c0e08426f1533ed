//! Dynamic argument and result values.

use std::fmt;

use uuid::Uuid;

use crate::record::Record;

// ============================================================================
// Arg
// ============================================================================

/// A dynamically typed argument or result.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Arg {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Text(String),
    Uuid(Uuid),
    Record(Record),
    List(Vec<Arg>),
}

impl Arg {
    /// Runtime type, `None` for [`Arg::Null`].
    pub fn arg_type(&self) -> Option<ArgType> {
        Some(match self {
            Arg::Null => return None,
            Arg::Bool(_) => ArgType::Bool,
            Arg::Int(_) => ArgType::Int,
            Arg::Long(_) => ArgType::Long,
            Arg::Double(_) => ArgType::Double,
            Arg::Text(_) => ArgType::Text,
            Arg::Uuid(_) => ArgType::Uuid,
            Arg::Record(_) => ArgType::Record,
            Arg::List(_) => ArgType::List,
        })
    }

    /// Name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self.arg_type() {
            Some(ty) => ty.name(),
            None => "Null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Arg::Null)
    }
}

macro_rules! impl_from_for_arg {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::$variant(value)
                }
            }
        )*
    };
}

impl_from_for_arg!(
    bool => Bool,
    i32 => Int,
    i64 => Long,
    f64 => Double,
    String => Text,
    Uuid => Uuid,
    Record => Record,
    Vec<Arg> => List,
);

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Text(value.to_string())
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::Null, Into::into)
    }
}

// ============================================================================
// ArgType / Param
// ============================================================================

/// Parameter and argument kinds used for signature matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    Bool,
    Int,
    Long,
    Double,
    Text,
    Uuid,
    Record,
    List,
    /// Accepts any argument.
    Any,
}

impl ArgType {
    /// Whether a parameter of this type takes an argument of type `arg`.
    pub fn accepts(self, arg: ArgType) -> bool {
        self == ArgType::Any || self == arg
    }

    pub fn name(self) -> &'static str {
        match self {
            ArgType::Bool => "Bool",
            ArgType::Int => "Int",
            ArgType::Long => "Long",
            ArgType::Double => "Double",
            ArgType::Text => "Text",
            ArgType::Uuid => "Uuid",
            ArgType::Record => "Record",
            ArgType::List => "List",
            ArgType::Any => "Any",
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared parameter of an operation.
///
/// A nullable parameter is the boxed form of its type: it matches the same
/// arguments as the plain form and additionally takes [`Arg::Null`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Param {
    pub ty: ArgType,
    pub nullable: bool,
}

impl Param {
    pub const fn new(ty: ArgType) -> Self {
        Self {
            ty,
            nullable: false,
        }
    }

    pub const fn nullable(ty: ArgType) -> Self {
        Self { ty, nullable: true }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{}?", self.ty)
        } else {
            write!(f, "{}", self.ty)
        }
    }
}

// ============================================================================
// FromArg
// ============================================================================

/// Converts a dynamic argument into an operation parameter.
pub trait FromArg: Sized {
    /// How this type is declared in an operation signature.
    const PARAM: Param;

    fn from_arg(arg: Arg) -> Result<Self, String>;
}

fn mismatch(expected: &str, arg: &Arg) -> String {
    format!("expected {expected}, found {}", arg.kind())
}

macro_rules! impl_from_arg {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromArg for $ty {
                const PARAM: Param = Param::new(ArgType::$variant);

                fn from_arg(arg: Arg) -> Result<Self, String> {
                    match arg {
                        Arg::$variant(value) => Ok(value),
                        other => Err(mismatch(stringify!($variant), &other)),
                    }
                }
            }
        )*
    };
}

impl_from_arg!(
    bool => Bool,
    i32 => Int,
    f64 => Double,
    String => Text,
    Uuid => Uuid,
    Record => Record,
    Vec<Arg> => List,
);

impl FromArg for i64 {
    const PARAM: Param = Param::new(ArgType::Long);

    fn from_arg(arg: Arg) -> Result<Self, String> {
        match arg {
            Arg::Long(value) => Ok(value),
            Arg::Int(value) => Ok(i64::from(value)),
            other => Err(mismatch("Long", &other)),
        }
    }
}

impl FromArg for Arg {
    const PARAM: Param = Param::nullable(ArgType::Any);

    fn from_arg(arg: Arg) -> Result<Self, String> {
        Ok(arg)
    }
}

impl<T: FromArg> FromArg for Option<T> {
    const PARAM: Param = Param::nullable(T::PARAM.ty);

    fn from_arg(arg: Arg) -> Result<Self, String> {
        match arg {
            Arg::Null => Ok(None),
            other => T::from_arg(other).map(Some),
        }
    }
}

// ============================================================================
// IntoReply
// ============================================================================

/// Converts an operation's return value into a dynamic result.
///
/// `Err` values become invocation failures.
pub trait IntoReply {
    fn into_reply(self) -> Result<Arg, String>;
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Arg, String> {
        Ok(Arg::Null)
    }
}

macro_rules! impl_into_reply {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoReply for $ty {
                fn into_reply(self) -> Result<Arg, String> {
                    Ok(Arg::from(self))
                }
            }
        )*
    };
}

impl_into_reply!(bool, i32, i64, f64, String, &str, Uuid, Record, Arg);

impl IntoReply for usize {
    fn into_reply(self) -> Result<Arg, String> {
        i64::try_from(self)
            .map(Arg::Long)
            .map_err(|e| e.to_string())
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Arg, String> {
        self.map_or(Ok(Arg::Null), IntoReply::into_reply)
    }
}

impl<T: IntoReply> IntoReply for Vec<T> {
    fn into_reply(self) -> Result<Arg, String> {
        self.into_iter()
            .map(IntoReply::into_reply)
            .collect::<Result<Vec<_>, _>>()
            .map(Arg::List)
    }
}

impl<T: IntoReply, E: fmt::Display> IntoReply for Result<T, E> {
    fn into_reply(self) -> Result<Arg, String> {
        self.map_err(|e| e.to_string())?.into_reply()
    }
}

// ============================================================================
// IntoArgs
// ============================================================================

/// Argument lists accepted by [`ServiceProxy`](super::ServiceProxy) calls.
///
/// Implemented for `Vec<Arg>` and for tuples of up to eight values
/// convertible into [`Arg`], so `()` is the empty list.
pub trait IntoArgs {
    fn into_args(self) -> Vec<Arg>;
}

impl IntoArgs for Vec<Arg> {
    fn into_args(self) -> Vec<Arg> {
        self
    }
}

macro_rules! impl_into_args {
    ($($ty:ident),*) => {
        #[allow(non_snake_case)]
        impl<$($ty: Into<Arg>,)*> IntoArgs for ($($ty,)*) {
            fn into_args(self) -> Vec<Arg> {
                let ($($ty,)*) = self;
                vec![$($ty.into(),)*]
            }
        }
    };
}

impl_into_args!();
impl_into_args!(T1);
impl_into_args!(T1, T2);
impl_into_args!(T1, T2, T3);
impl_into_args!(T1, T2, T3, T4);
impl_into_args!(T1, T2, T3, T4, T5);
impl_into_args!(T1, T2, T3, T4, T5, T6);
impl_into_args!(T1, T2, T3, T4, T5, T6, T7);
impl_into_args!(T1, T2, T3, T4, T5, T6, T7, T8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_params_keep_the_plain_type() {
        assert_eq!(<i32 as FromArg>::PARAM, Param::new(ArgType::Int));
        assert_eq!(<Option<i32> as FromArg>::PARAM, Param::nullable(ArgType::Int));
        assert_eq!(<Option<i32> as FromArg>::PARAM.to_string(), "Int?");
    }

    #[test]
    fn test_from_arg_conversions() {
        assert_eq!(i32::from_arg(Arg::Int(4)), Ok(4));
        assert_eq!(i64::from_arg(Arg::Int(4)), Ok(4));
        assert!(i32::from_arg(Arg::Long(4)).is_err());
        assert!(i32::from_arg(Arg::Null).is_err());
        assert_eq!(Option::<i32>::from_arg(Arg::Null), Ok(None));
        assert_eq!(String::from_arg(Arg::from("x")), Ok("x".into()));
    }

    #[test]
    fn test_replies() {
        assert_eq!(().into_reply(), Ok(Arg::Null));
        assert_eq!(Some(3).into_reply(), Ok(Arg::Int(3)));
        assert_eq!(
            vec![Record::new()].into_reply(),
            Ok(Arg::List(vec![Arg::Record(Record::new())]))
        );
        let failed: Result<i32, &str> = Err("boom");
        assert_eq!(failed.into_reply(), Err("boom".to_string()));
    }

    #[test]
    fn test_tuple_args() {
        assert!(().into_args().is_empty());
        assert_eq!(
            ("a", 1, None::<i64>).into_args(),
            vec![Arg::Text("a".into()), Arg::Int(1), Arg::Null]
        );
    }
}
