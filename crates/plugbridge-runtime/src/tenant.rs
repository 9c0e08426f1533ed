//! Task-scoped tenant context for async callers.
//!
//! [`ScopedTenant`](plugbridge_core::ScopedTenant) keys off the current
//! thread, which a multi-threaded runtime changes between polls. [`TaskTenant`]
//! stores the tenant in a tokio task-local instead, so the value follows the
//! future across `.await` points and worker threads.
//!
//! ```rust,ignore
//! use plugbridge_runtime::TaskTenant;
//!
//! TaskTenant::scope("facility-7", async {
//!     let saved = host.bridge().find("Diagnosis").by_tenant("facility-7");
//!     // ...
//! })
//! .await;
//! ```

use std::future::Future;

use plugbridge_core::TenantContext;

tokio::task_local! {
    static TASK_TENANT: String;
}

/// Tenant id bound to the running task by [`TaskTenant::scope`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskTenant;

impl TaskTenant {
    /// Runs `future` with `tenant_id` as the current tenant.
    ///
    /// Scopes nest; the inner value is visible until the inner future
    /// completes.
    pub async fn scope<F>(tenant_id: impl Into<String>, future: F) -> F::Output
    where
        F: Future,
    {
        TASK_TENANT.scope(tenant_id.into(), future).await
    }

    /// Runs `f` synchronously with `tenant_id` as the current tenant.
    pub fn sync_scope<R>(tenant_id: impl Into<String>, f: impl FnOnce() -> R) -> R {
        TASK_TENANT.sync_scope(tenant_id.into(), f)
    }

    /// The tenant bound to the current task, if any.
    pub fn current() -> Option<String> {
        TASK_TENANT.try_with(Clone::clone).ok()
    }
}

impl TenantContext for TaskTenant {
    fn tenant_id(&self) -> Option<String> {
        Self::current()
    }
}
