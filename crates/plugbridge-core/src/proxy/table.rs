//! Operation tables: the typed stand-in for runtime method lookup.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use super::arg::{Arg, ArgType, FromArg, IntoReply, Param};

// ============================================================================
// IntoOperation - closures usable as operations
// ============================================================================

/// Failure raised while calling an operation, before it is attributed to a
/// service.
#[doc(hidden)]
#[derive(Debug, Clone, PartialEq)]
pub enum CallError {
    Argument { index: usize, reason: String },
    Failed(String),
}

/// A function over a service that can be registered as an operation.
///
/// Implemented for every `Fn(&S, A1, .., An) -> R` with up to eight
/// arguments, where each `Ai` implements [`FromArg`] and `R` implements
/// [`IntoReply`]. Methods taking `&self` qualify directly:
///
/// ```rust,ignore
/// OperationTable::builder("diagnosisService", service)
///     .operation("count", DiagnosisService::count)
///     .operation("countByStatus", |s: &DiagnosisService, status: String| {
///         s.count_by_status(&status)
///     })
///     .build()
/// ```
pub trait IntoOperation<S, Args>: Send + Sync + 'static {
    /// Declared parameters, in order.
    fn params() -> Vec<Param>;

    #[doc(hidden)]
    fn invoke_with(&self, target: &S, args: Vec<Arg>) -> Result<Arg, CallError>;
}

macro_rules! impl_operation {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<S, F, R, $($ty,)*> IntoOperation<S, ($($ty,)*)> for F
        where
            F: Fn(&S, $($ty,)*) -> R + Send + Sync + 'static,
            R: IntoReply,
            $( $ty: FromArg, )*
        {
            fn params() -> Vec<Param> {
                vec![$(<$ty as FromArg>::PARAM,)*]
            }

            fn invoke_with(&self, target: &S, args: Vec<Arg>) -> Result<Arg, CallError> {
                let mut args = args.into_iter().enumerate();
                $(
                    let $ty = match args.next() {
                        Some((index, arg)) => <$ty as FromArg>::from_arg(arg)
                            .map_err(|reason| CallError::Argument { index, reason })?,
                        None => {
                            return Err(CallError::Failed("too few arguments".to_string()));
                        }
                    };
                )*

                (self)(target, $($ty,)*)
                    .into_reply()
                    .map_err(CallError::Failed)
            }
        }
    };
}

// Generate implementations for 0-8 parameters
impl_operation!();
impl_operation!(T1);
impl_operation!(T1, T2);
impl_operation!(T1, T2, T3);
impl_operation!(T1, T2, T3, T4);
impl_operation!(T1, T2, T3, T4, T5);
impl_operation!(T1, T2, T3, T4, T5, T6);
impl_operation!(T1, T2, T3, T4, T5, T6, T7);
impl_operation!(T1, T2, T3, T4, T5, T6, T7, T8);

// ============================================================================
// Operation
// ============================================================================

type BoxedCall = Box<dyn Fn(Vec<Arg>) -> Result<Arg, CallError> + Send + Sync>;

/// One named, typed entry of an [`OperationTable`].
pub struct Operation {
    name: String,
    params: Vec<Param>,
    call: BoxedCall,
}

impl Operation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Whether the operation takes `args` by name, arity and type.
    ///
    /// Null arguments are compatible with every parameter.
    pub fn accepts(&self, name: &str, args: &[Arg]) -> bool {
        self.name == name
            && self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| arg.arg_type().is_none_or(|ty| param.ty.accepts(ty)))
    }

    fn key(&self) -> (String, Vec<ArgType>) {
        (
            self.name.clone(),
            self.params.iter().map(|p| p.ty).collect(),
        )
    }

    pub(crate) fn call(&self, args: Vec<Arg>) -> Result<Arg, CallError> {
        (self.call)(args)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operation({self})")
    }
}

// ============================================================================
// OperationTable
// ============================================================================

/// The operations a plugin exposes on one service, under a declared name.
pub struct OperationTable {
    service_name: String,
    target: Arc<dyn Any + Send + Sync>,
    operations: Vec<Operation>,
    exact: HashMap<(String, Vec<ArgType>), usize>,
}

impl OperationTable {
    /// Starts a table for `target`.
    pub fn builder<S>(service_name: impl Into<String>, target: Arc<S>) -> OperationTableBuilder<S>
    where
        S: Send + Sync + 'static,
    {
        OperationTableBuilder {
            table: OperationTable {
                service_name: service_name.into(),
                target: target.clone(),
                operations: Vec::new(),
                exact: HashMap::new(),
            },
            target,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Operations in registration order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub(crate) fn target(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.target
    }

    /// Finds the operation for a call.
    ///
    /// The exact signature is tried first, with null arguments standing for
    /// [`ArgType::Any`]. Otherwise the first operation, in registration
    /// order, that [`accepts`](Operation::accepts) the arguments is returned.
    pub fn resolve(&self, name: &str, args: &[Arg]) -> Option<&Operation> {
        let key = (
            name.to_string(),
            args.iter()
                .map(|a| a.arg_type().unwrap_or(ArgType::Any))
                .collect::<Vec<_>>(),
        );
        if let Some(&index) = self.exact.get(&key) {
            return self.operations.get(index);
        }
        self.operations.iter().find(|op| op.accepts(name, args))
    }
}

impl fmt::Debug for OperationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationTable")
            .field("service_name", &self.service_name)
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

/// Builder returned by [`OperationTable::builder`].
pub struct OperationTableBuilder<S> {
    table: OperationTable,
    target: Arc<S>,
}

impl<S: Send + Sync + 'static> OperationTableBuilder<S> {
    /// Adds an operation.
    ///
    /// Registering the same name and parameters twice replaces the earlier
    /// operation in place. An operation that differs from an existing one only
    /// in parameter nullability would resolve to the same calls, so it is
    /// rejected and the earlier one is kept.
    pub fn operation<F, Args>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: IntoOperation<S, Args>,
    {
        let target = self.target.clone();
        let operation = Operation {
            name: name.into(),
            params: F::params(),
            call: Box::new(move |args: Vec<Arg>| f.invoke_with(&target, args)),
        };

        let key = operation.key();
        match self.table.exact.get(&key) {
            Some(&index) if self.table.operations[index].params != operation.params => {
                warn!(
                    service = %self.table.service_name,
                    operation = %operation,
                    existing = %self.table.operations[index],
                    "Ignoring operation that differs from an existing one only by nullability"
                );
            }
            Some(&index) => {
                warn!(
                    service = %self.table.service_name,
                    operation = %operation,
                    "Replacing operation with identical signature"
                );
                self.table.operations[index] = operation;
            }
            None => {
                self.table.exact.insert(key, self.table.operations.len());
                self.table.operations.push(operation);
            }
        }
        self
    }

    pub fn build(self) -> OperationTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        base: i32,
    }

    impl Counter {
        fn count(&self) -> i32 {
            self.base
        }
    }

    fn table() -> OperationTable {
        OperationTable::builder("counter", Arc::new(Counter { base: 10 }))
            .operation("count", Counter::count)
            .operation("add", |c: &Counter, n: i32| c.base + n)
            .operation("add", |c: &Counter, n: i64| i64::from(c.base) + n)
            .operation("label", |_: &Counter, prefix: Option<String>, n: i32| {
                format!("{}{n}", prefix.unwrap_or_default())
            })
            .build()
    }

    #[test]
    fn test_signatures() {
        let table = table();
        let sigs: Vec<String> = table.operations().iter().map(ToString::to_string).collect();
        assert_eq!(sigs, vec!["count()", "add(Int)", "add(Long)", "label(Text?, Int)"]);
    }

    #[test]
    fn test_resolve_exact_overload() {
        let table = table();
        let op = table.resolve("add", &[Arg::Long(1)]).unwrap();
        assert_eq!(op.params(), &[Param::new(ArgType::Long)]);
        assert_eq!(op.call(vec![Arg::Long(1)]), Ok(Arg::Long(11)));
    }

    #[test]
    fn test_resolve_with_null_scans_by_arity() {
        let table = table();
        let args = [Arg::Null, Arg::Int(2)];
        let op = table.resolve("label", &args).unwrap();
        assert_eq!(op.call(args.to_vec()), Ok(Arg::Text("2".into())));
        assert!(table.resolve("label", &[Arg::Int(2)]).is_none());
        assert!(table.resolve("missing", &[]).is_none());
    }

    #[test]
    fn test_argument_errors() {
        let table = table();
        let op = table.resolve("add", &[Arg::Int(1)]).unwrap();
        assert_eq!(
            op.call(vec![Arg::Null]),
            Err(CallError::Argument {
                index: 0,
                reason: "expected Int, found Null".into()
            })
        );
    }

    #[test]
    fn test_duplicate_signature_replaces() {
        let table = OperationTable::builder("counter", Arc::new(Counter { base: 1 }))
            .operation("count", |_: &Counter| 1)
            .operation("count", |_: &Counter| 2)
            .build();
        assert_eq!(table.len(), 1);
        let op = table.resolve("count", &[]).unwrap();
        assert_eq!(op.call(Vec::new()), Ok(Arg::Int(2)));
    }

    #[test]
    fn test_nullability_variant_does_not_replace() {
        let table = OperationTable::builder("counter", Arc::new(Counter { base: 1 }))
            .operation("scale", |c: &Counter, n: i32| c.base * n)
            .operation("scale", |_: &Counter, n: Option<i32>| n.unwrap_or(0))
            .build();

        assert_eq!(table.len(), 1);
        let op = table.resolve("scale", &[Arg::Int(3)]).unwrap();
        assert_eq!(op.params(), &[Param::new(ArgType::Int)]);
        assert_eq!(op.call(vec![Arg::Int(3)]), Ok(Arg::Int(3)));
        assert_eq!(op.to_string(), "scale(Int)");
    }
}
