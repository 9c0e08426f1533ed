//! Tenant context accessors.
//!
//! The host application owns tenant resolution. The core only needs a
//! zero-argument accessor, so it is modeled as the [`TenantContext`] trait with
//! a few stock implementations:
//!
//! - [`StaticTenant`]: a fixed value, for tests and single-tenant setups
//! - [`ScopedTenant`]: a thread-local value set for the duration of a guard
//!   on synchronous code; async callers use the runtime's task-scoped context
//! - [`ChainedTenant`]: tries a primary source, then a fallback

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::TenantError;

/// Source of the current tenant id.
pub trait TenantContext: Send + Sync {
    /// The current tenant id, if any.
    fn tenant_id(&self) -> Option<String>;
}

impl<T: TenantContext + ?Sized> TenantContext for Arc<T> {
    fn tenant_id(&self) -> Option<String> {
        (**self).tenant_id()
    }
}

/// Resolves the tenant id, rejecting missing or blank values.
pub fn require_tenant(context: &dyn TenantContext) -> Result<String, TenantError> {
    let tenant = context.tenant_id().ok_or(TenantError::Missing)?;
    if tenant.trim().is_empty() {
        return Err(TenantError::Blank);
    }
    Ok(tenant)
}

// ─── Static ───

/// A fixed tenant id.
#[derive(Debug, Clone, Default)]
pub struct StaticTenant(Option<String>);

impl StaticTenant {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self(Some(tenant_id.into()))
    }

    /// A context that never yields a tenant.
    pub fn none() -> Self {
        Self(None)
    }
}

impl TenantContext for StaticTenant {
    fn tenant_id(&self) -> Option<String> {
        self.0.clone()
    }
}

// ─── Scoped ───

thread_local! {
    static CURRENT_TENANT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Thread-local tenant id, set with [`ScopedTenant::enter`].
///
/// Meant for development and background jobs where no request context exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopedTenant;

impl ScopedTenant {
    /// Sets the tenant for the current thread until the guard drops.
    ///
    /// Guards nest; dropping one restores the previous value.
    pub fn enter(tenant_id: impl Into<String>) -> TenantGuard {
        let previous = CURRENT_TENANT.with(|cell| cell.replace(Some(tenant_id.into())));
        TenantGuard {
            previous,
            _thread_bound: PhantomData,
        }
    }

    /// The tenant set on the current thread.
    pub fn current() -> Option<String> {
        CURRENT_TENANT.with(|cell| cell.borrow().clone())
    }
}

impl TenantContext for ScopedTenant {
    fn tenant_id(&self) -> Option<String> {
        Self::current()
    }
}

/// Restores the previous thread-local tenant when dropped.
///
/// The guard is `!Send`: it must drop on the thread that created it, so it
/// cannot be held across an `.await` in a future that may move between
/// worker threads.
#[must_use = "the tenant is cleared as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TenantGuard {
    previous: Option<String>,
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for TenantGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_TENANT.with(|cell| *cell.borrow_mut() = previous);
    }
}

// ─── Chained ───

/// Asks `primary` first and falls back to `fallback` when it yields nothing
/// or a blank id.
pub struct ChainedTenant {
    primary: Arc<dyn TenantContext>,
    fallback: Arc<dyn TenantContext>,
}

impl ChainedTenant {
    pub fn new(primary: Arc<dyn TenantContext>, fallback: Arc<dyn TenantContext>) -> Self {
        Self { primary, fallback }
    }
}

impl TenantContext for ChainedTenant {
    fn tenant_id(&self) -> Option<String> {
        self.primary
            .tenant_id()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.fallback.tenant_id())
    }
}
