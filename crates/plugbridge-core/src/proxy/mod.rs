//! Dynamic invocation of named operations on a plugin service.
//!
//! A plugin that wants to expose behavior beyond the fixed [`DataService`]
//! surface registers an [`OperationTable`]: a declared service name plus a
//! list of typed operations. Callers in other plugins get a [`ServiceProxy`]
//! from the registry and call operations by name with dynamic [`Arg`]s.
//!
//! Resolution tries the exact signature first, then the first operation with
//! the same name and arity whose parameters accept every non-null argument.
//! A nullable parameter (`Option<T>`) matches the same arguments as `T`, so an
//! `Int` argument resolves to either form.
//!
//! Nothing here panics or raises: [`ServiceProxy::invoke`] reports failures
//! as [`ProxyError`], and the typed `call_*` wrappers fall back to a default.
//!
//! ```rust,ignore
//! let proxy = registry.proxy_by_name("diagnosisService")?;
//! let total = proxy.call_int("count", ());
//! let active = proxy.call_long("countByStatus", ("ACTIVE",));
//! ```
//!
//! [`DataService`]: crate::service::DataService

mod arg;
mod table;

pub use arg::{Arg, ArgType, FromArg, IntoArgs, IntoReply, Param};
pub use table::{CallError, IntoOperation, Operation, OperationTable, OperationTableBuilder};

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::{ProxyError, ProxyResult};

/// Handle for calling operations on one registered [`OperationTable`].
///
/// Proxies are cheap to clone and are built per lookup; they hold no state
/// beyond the table they point at.
#[derive(Clone, Debug)]
pub struct ServiceProxy {
    table: Arc<OperationTable>,
}

impl ServiceProxy {
    pub fn new(table: Arc<OperationTable>) -> Self {
        Self { table }
    }

    /// Declared name of the service behind this proxy.
    pub fn service_name(&self) -> &str {
        self.table.service_name()
    }

    /// Available operations, in registration order.
    pub fn operations(&self) -> &[Operation] {
        self.table.operations()
    }

    /// The service object the table was built over.
    pub fn downcast<S: Send + Sync + 'static>(&self) -> Option<Arc<S>> {
        self.table.target().clone().downcast::<S>().ok()
    }

    /// Resolves and calls an operation.
    pub fn invoke(&self, operation: &str, args: impl IntoArgs) -> ProxyResult<Arg> {
        let args = args.into_args();
        let service = self.table.service_name();

        let Some(op) = self.table.resolve(operation, &args) else {
            warn!(service, operation, "Operation not found");
            return Err(ProxyError::MethodNotFound {
                service: service.to_string(),
                operation: operation.to_string(),
            });
        };

        debug!(service, operation = %op, "Invoking operation");
        let result = catch_unwind(AssertUnwindSafe(|| op.call(args)));

        let error = match result {
            Ok(Ok(reply)) => return Ok(reply),
            Ok(Err(CallError::Argument { index, reason })) => ProxyError::ArgumentMismatch {
                operation: operation.to_string(),
                index,
                reason,
            },
            Ok(Err(CallError::Failed(reason))) => ProxyError::InvocationFailed {
                service: service.to_string(),
                operation: operation.to_string(),
                reason,
            },
            Err(payload) => ProxyError::InvocationFailed {
                service: service.to_string(),
                operation: operation.to_string(),
                reason: panic_message(payload.as_ref()),
            },
        };
        error!(service, operation, %error, "Operation failed");
        Err(error)
    }

    /// Calls an operation, discarding a null result.
    pub fn call_optional(&self, operation: &str, args: impl IntoArgs) -> Option<Arg> {
        self.invoke(operation, args).ok().filter(|reply| !reply.is_null())
    }

    /// Calls an operation expected to return a boolean; `false` otherwise.
    pub fn call_bool(&self, operation: &str, args: impl IntoArgs) -> bool {
        self.coerce(operation, args, "Bool", |reply| match reply {
            Arg::Bool(b) => Some(b),
            _ => None,
        })
        .unwrap_or(false)
    }

    /// Calls an operation expected to return an integer; `0` otherwise.
    pub fn call_long(&self, operation: &str, args: impl IntoArgs) -> i64 {
        self.coerce(operation, args, "Long", |reply| match reply {
            Arg::Long(n) => Some(n),
            Arg::Int(n) => Some(i64::from(n)),
            _ => None,
        })
        .unwrap_or(0)
    }

    /// Calls an operation expected to return a 32-bit integer; `0` otherwise.
    ///
    /// A `Long` result is accepted when it fits.
    pub fn call_int(&self, operation: &str, args: impl IntoArgs) -> i32 {
        self.coerce(operation, args, "Int", |reply| match reply {
            Arg::Int(n) => Some(n),
            Arg::Long(n) => i32::try_from(n).ok(),
            _ => None,
        })
        .unwrap_or(0)
    }

    /// Calls an operation for its effect only.
    pub fn call_void(&self, operation: &str, args: impl IntoArgs) {
        let _ = self.invoke(operation, args);
    }

    /// Calls an operation and converts the result with [`FromArg`].
    ///
    /// Returns `None` on any failure, including a null result for a
    /// non-nullable `T`.
    pub fn call<T: FromArg>(&self, operation: &str, args: impl IntoArgs) -> Option<T> {
        let reply = self.invoke(operation, args).ok()?;
        let found = reply.kind();
        match T::from_arg(reply) {
            Ok(value) => Some(value),
            Err(reason) => {
                debug!(
                    service = self.service_name(),
                    operation,
                    found,
                    %reason,
                    "Unexpected result type"
                );
                None
            }
        }
    }

    fn coerce<T>(
        &self,
        operation: &str,
        args: impl IntoArgs,
        expected: &'static str,
        convert: impl FnOnce(Arg) -> Option<T>,
    ) -> Option<T> {
        let reply = self.invoke(operation, args).ok()?;
        let found = reply.kind();
        let converted = convert(reply);
        if converted.is_none() {
            let error = ProxyError::ReturnMismatch {
                operation: operation.to_string(),
                expected,
                found,
            };
            debug!(service = self.service_name(), %error, "Falling back to default");
        }
        converted
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "operation panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct DiagnosisOps {
        statuses: Vec<&'static str>,
        log: Mutex<Vec<String>>,
    }

    impl DiagnosisOps {
        fn count(&self) -> i32 {
            self.statuses.len() as i32
        }

        fn count_by_status(&self, status: String) -> i64 {
            self.statuses
                .iter()
                .filter(|s| s.eq_ignore_ascii_case(&status))
                .count() as i64
        }
    }

    fn proxy() -> ServiceProxy {
        let target = Arc::new(DiagnosisOps {
            statuses: vec!["ACTIVE", "ACTIVE", "RESOLVED"],
            log: Mutex::new(Vec::new()),
        });
        let table = OperationTable::builder("diagnosisService", target)
            .operation("count", DiagnosisOps::count)
            .operation("countByStatus", DiagnosisOps::count_by_status)
            .operation("hasAny", |s: &DiagnosisOps| !s.statuses.is_empty())
            .operation("scaled", |s: &DiagnosisOps, factor: Option<i32>| {
                s.count() * factor.unwrap_or(1)
            })
            .operation("record", |s: &DiagnosisOps, note: String| {
                s.log.lock().push(note);
            })
            .operation("find", |_: &DiagnosisOps, code: String| {
                (code == "J45").then(|| Record::new().with("code", code))
            })
            .operation("explode", |_: &DiagnosisOps| -> i32 { panic!("boom") })
            .operation("fail", |_: &DiagnosisOps| -> Result<i32, String> {
                Err("store offline".into())
            })
            .build();
        ServiceProxy::new(Arc::new(table))
    }

    #[test]
    fn test_call_int_returns_the_count() {
        let proxy = proxy();
        assert_eq!(proxy.call_int("count", ()), 3);
        assert_eq!(proxy.call_int("unknownOp", ()), 0);
    }

    #[test]
    fn test_typed_wrappers() {
        let proxy = proxy();
        assert_eq!(proxy.call_long("countByStatus", ("active",)), 2);
        assert_eq!(proxy.call_int("countByStatus", ("resolved",)), 1);
        assert!(proxy.call_bool("hasAny", ()));
        assert!(!proxy.call_bool("count", ()));
        assert_eq!(proxy.call::<String>("count", ()), None);
        assert_eq!(proxy.call::<i32>("count", ()), Some(3));
    }

    #[test]
    fn test_boxed_argument_resolves() {
        let proxy = proxy();
        assert_eq!(proxy.call_int("scaled", (2,)), 6);
        assert_eq!(proxy.call_int("scaled", (None::<i32>,)), 3);
        assert_eq!(proxy.call_int("scaled", vec![Arg::Null]), 3);
    }

    #[test]
    fn test_null_for_primitive_param_falls_back() {
        let proxy = proxy();
        let result = proxy.invoke("countByStatus", vec![Arg::Null]);
        assert!(matches!(
            result,
            Err(ProxyError::ArgumentMismatch { index: 0, .. })
        ));
        assert_eq!(proxy.call_long("countByStatus", vec![Arg::Null]), 0);
    }

    #[test]
    fn test_wrong_argument_type_is_not_found() {
        let proxy = proxy();
        let result = proxy.invoke("countByStatus", (5,));
        assert_eq!(
            result,
            Err(ProxyError::MethodNotFound {
                service: "diagnosisService".into(),
                operation: "countByStatus".into(),
            })
        );
    }

    #[test]
    fn test_failures_are_contained() {
        let proxy = proxy();
        assert!(matches!(
            proxy.invoke("explode", ()),
            Err(ProxyError::InvocationFailed { reason, .. }) if reason == "boom"
        ));
        assert!(matches!(
            proxy.invoke("fail", ()),
            Err(ProxyError::InvocationFailed { reason, .. }) if reason == "store offline"
        ));
        assert_eq!(proxy.call_int("explode", ()), 0);
    }

    #[test]
    fn test_optional_and_void() {
        let proxy = proxy();
        let found = proxy.call_optional("find", ("J45",));
        assert!(matches!(found, Some(Arg::Record(ref r)) if r.get_str("code") == Some("J45")));
        assert_eq!(proxy.call_optional("find", ("X00",)), None);

        proxy.call_void("record", ("seen",));
        let target = proxy.downcast::<DiagnosisOps>().unwrap();
        assert_eq!(target.log.lock().as_slice(), ["seen".to_string()]);
        assert!(proxy.downcast::<String>().is_none());
    }

    #[test]
    fn test_operations_are_listed() {
        let proxy = proxy();
        assert_eq!(proxy.service_name(), "diagnosisService");
        let names: Vec<&str> = proxy.operations().iter().map(Operation::name).collect();
        assert_eq!(names[..3], ["count", "countByStatus", "hasAny"]);
        assert_eq!(proxy.operations()[3].to_string(), "scaled(Int?)");
    }
}
