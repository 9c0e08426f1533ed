//! The data service capability a plugin implements to expose one entity.
//!
//! All operations speak [`Record`]s. Reads never fail: a service that cannot
//! answer returns an empty result. Writes report a [`ServiceError`].
//!
//! Every method has a default, so a read-only service only implements the
//! lookups it supports:
//!
//! ```rust,ignore
//! struct PatientService { store: Arc<PatientStore> }
//!
//! impl DataService for PatientService {
//!     fn entity_name(&self) -> &str { "Patient" }
//!
//!     fn find_by_id(&self, id: Uuid) -> Option<Record> {
//!         self.store.get(id).map(|p| EntityMapper::to_record(&p))
//!     }
//! }
//! ```

use serde_json::Value;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::record::Record;

/// Generic CRUD surface over one entity type.
///
/// Implementations are shared across threads and may block; the core never
/// calls them while holding a lock.
pub trait DataService: Send + Sync {
    /// Name of the entity this service exposes, unique within its plugin.
    fn entity_name(&self) -> &str;

    fn find_by_id(&self, _id: Uuid) -> Option<Record> {
        None
    }

    /// Looks up several ids; missing ids are left out of the result.
    fn find_by_ids(&self, ids: &[Uuid]) -> Vec<Record> {
        ids.iter().filter_map(|id| self.find_by_id(*id)).collect()
    }

    /// Records owned by `owner_id`.
    fn find_by_owner(&self, _owner_id: Uuid) -> Vec<Record> {
        Vec::new()
    }

    fn find_by_tenant(&self, _tenant_id: &str) -> Vec<Record> {
        Vec::new()
    }

    fn find_by_owner_and_tenant(&self, _owner_id: Uuid, _tenant_id: &str) -> Vec<Record> {
        Vec::new()
    }

    /// One page of a tenant's records; `page` is zero-based.
    fn find_all(&self, _tenant_id: &str, _page: usize, _size: usize) -> Vec<Record> {
        Vec::new()
    }

    /// Records whose `field` equals `value`.
    fn find_by_field(&self, _field: &str, _value: &Value) -> Vec<Record> {
        Vec::new()
    }

    /// Records matching every field of `criteria`.
    fn find_by_fields(&self, _criteria: &Record) -> Vec<Record> {
        Vec::new()
    }

    /// Creates or updates a record and returns the stored form.
    fn save(&self, _record: Record) -> ServiceResult<Record> {
        Err(ServiceError::Unsupported {
            entity: self.entity_name().to_string(),
            operation: "save",
        })
    }

    /// Saves each record in order, stopping at the first failure.
    fn save_all(&self, records: Vec<Record>) -> ServiceResult<Vec<Record>> {
        records.into_iter().map(|r| self.save(r)).collect()
    }

    /// Returns `true` when a record was removed.
    fn delete_by_id(&self, _id: Uuid) -> bool {
        false
    }
}
