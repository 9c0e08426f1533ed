use chrono::{NaiveDateTime, Utc};
use uuid::Uuid;

use crate::Entity;
use crate::error::TenantError;
use crate::tenant::{TenantContext, require_tenant};

/// Audit columns shared by tenant-scoped entities.
///
/// Embed with `#[entity(flatten)]`; its fields come first in the record and
/// its `uuid` becomes the entity identifier.
#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[entity(name = "AuditFields", rename_all = "camelCase")]
pub struct AuditFields {
    /// Storage row id, local to the owning plugin.
    pub id: Option<i64>,
    pub uuid: Option<Uuid>,
    pub created_at: Option<NaiveDateTime>,
    pub created_by: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
    pub updated_by: Option<String>,
    /// `0` for live rows.
    pub archived: i32,
    pub tenant_id: Option<String>,
}

impl AuditFields {
    /// Fills the columns a new row needs.
    ///
    /// A tenant id already set is kept; otherwise it is taken from `tenant`,
    /// which must yield a non-blank value.
    pub fn prepare_for_insert(&mut self, tenant: &dyn TenantContext) -> Result<(), TenantError> {
        if self.tenant_id.as_deref().is_none_or(|t| t.trim().is_empty()) {
            self.tenant_id = Some(require_tenant(tenant)?);
        }
        if self.uuid.is_none() {
            self.uuid = Some(Uuid::new_v4());
        }
        let now = Utc::now().naive_utc();
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
        Ok(())
    }

    /// Stamps an update by `actor`.
    pub fn touch(&mut self, actor: impl Into<String>) {
        self.updated_at = Some(Utc::now().naive_utc());
        self.updated_by = Some(actor.into());
    }

    pub fn is_archived(&self) -> bool {
        self.archived != 0
    }
}
