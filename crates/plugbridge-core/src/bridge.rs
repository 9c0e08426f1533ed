//! Fluent façade over the registry for cross-plugin data access.
//!
//! The bridge hides whether a service exists at all. Reads on an entity no
//! plugin provides return empty results, deletes return `false`, and only a
//! save through [`SaveBuilder::execute`] reports the absence, as
//! [`BridgeError::ServiceUnavailable`].
//!
//! ```rust,ignore
//! let bridge = Bridge::new(registry.clone());
//!
//! let active = bridge
//!     .find("Diagnosis")
//!     .by_field_filtered("patientUuid", patient_id, "status", "active");
//!
//! let saved = bridge
//!     .save("Diagnosis")
//!     .field("patientUuid", patient_id)
//!     .field("code", "J45")
//!     .execute()?;
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BridgeError, BridgeResult};
use crate::record::Record;
use crate::registry::ServiceRegistry;
use crate::service::DataService;

/// Largest page size accepted by [`FindBuilder::paged`] unless configured.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 1000;

/// Entry point for find, save and delete requests by entity name.
#[derive(Debug, Clone)]
pub struct Bridge {
    registry: Option<Arc<ServiceRegistry>>,
    max_page_size: usize,
}

impl Bridge {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        info!("Bridge initialized with registry");
        Self {
            registry: Some(registry),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// A bridge with no registry. Every lookup finds nothing.
    pub fn detached() -> Self {
        info!("Bridge initialized without registry");
        Self {
            registry: None,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Caps the page size of paged reads.
    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    pub fn find<'a>(&'a self, entity: &'a str) -> FindBuilder<'a> {
        FindBuilder {
            bridge: self,
            entity,
        }
    }

    pub fn save<'a>(&'a self, entity: &'a str) -> SaveBuilder<'a> {
        SaveBuilder {
            bridge: self,
            entity,
            data: Record::new(),
        }
    }

    pub fn delete<'a>(&'a self, entity: &'a str) -> DeleteBuilder<'a> {
        DeleteBuilder {
            bridge: self,
            entity,
        }
    }

    /// Whether some plugin currently provides `entity`.
    pub fn is_available(&self, entity: &str) -> bool {
        self.service(entity).is_some()
    }

    fn service(&self, entity: &str) -> Option<Arc<dyn DataService>> {
        let Some(registry) = &self.registry else {
            warn!(entity, "Registry not available");
            return None;
        };
        registry.get_by_entity(entity)
    }
}

// ─── Find ───

/// Read requests for one entity. Absence yields empty results.
#[derive(Debug, Clone, Copy)]
pub struct FindBuilder<'a> {
    bridge: &'a Bridge,
    entity: &'a str,
}

impl FindBuilder<'_> {
    fn many(&self, f: impl FnOnce(&dyn DataService) -> Vec<Record>) -> Vec<Record> {
        self.bridge
            .service(self.entity)
            .map(|s| f(s.as_ref()))
            .unwrap_or_default()
    }

    pub fn by_id(&self, id: Uuid) -> Option<Record> {
        self.bridge.service(self.entity)?.find_by_id(id)
    }

    pub fn by_ids(&self, ids: &[Uuid]) -> Vec<Record> {
        self.many(|s| s.find_by_ids(ids))
    }

    pub fn by_owner(&self, owner_id: Uuid) -> Vec<Record> {
        self.many(|s| s.find_by_owner(owner_id))
    }

    pub fn by_tenant(&self, tenant_id: &str) -> Vec<Record> {
        self.many(|s| s.find_by_tenant(tenant_id))
    }

    pub fn by_owner_and_tenant(&self, owner_id: Uuid, tenant_id: &str) -> Vec<Record> {
        self.many(|s| s.find_by_owner_and_tenant(owner_id, tenant_id))
    }

    pub fn by_field(&self, field: &str, value: impl Into<Value>) -> Vec<Record> {
        let value = value.into();
        self.many(|s| s.find_by_field(field, &value))
    }

    /// Records matching every field of `criteria`.
    pub fn by_fields(&self, criteria: &Record) -> Vec<Record> {
        self.many(|s| s.find_by_fields(criteria))
    }

    /// [`by_field`](Self::by_field), then keeps the records whose
    /// `filter_field` equals `filter_value` ignoring case.
    ///
    /// The comparison uses [`Record::text`], so a missing field compares as
    /// `"null"`.
    pub fn by_field_filtered(
        &self,
        field: &str,
        value: impl Into<Value>,
        filter_field: &str,
        filter_value: &str,
    ) -> Vec<Record> {
        let mut records = self.by_field(field, value);
        records.retain(|r| r.text(filter_field).to_lowercase() == filter_value.to_lowercase());
        records
    }

    /// One zero-based page of a tenant's records.
    pub fn paged(&self, tenant_id: &str, page: usize, size: usize) -> Vec<Record> {
        let max = self.bridge.max_page_size;
        if size > max {
            debug!(entity = self.entity, size, max, "Clamping page size");
        }
        self.many(|s| s.find_all(tenant_id, page, size.min(max)))
    }
}

// ─── Save ───

/// Accumulates fields and saves them as one record.
#[derive(Debug, Clone)]
pub struct SaveBuilder<'a> {
    bridge: &'a Bridge,
    entity: &'a str,
    data: Record,
}

impl SaveBuilder<'_> {
    /// Adds a field. Null values are skipped and identifiers are stored as
    /// their canonical string.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let FieldValue(value) = value.into();
        if !value.is_null() {
            self.data.insert(key, value);
        }
        self
    }

    /// Adds every field of `record`, following the rules of
    /// [`field`](Self::field).
    pub fn fields(mut self, record: Record) -> Self {
        for (key, value) in record {
            self = self.field(key, value);
        }
        self
    }

    /// Alias of [`fields`](Self::fields) for a record built elsewhere.
    pub fn record(self, record: Record) -> Self {
        self.fields(record)
    }

    /// Saves the accumulated record.
    pub fn execute(self) -> BridgeResult<Record> {
        let Some(service) = self.bridge.service(self.entity) else {
            return Err(BridgeError::ServiceUnavailable {
                entity: self.entity.to_string(),
            });
        };

        debug!(
            entity = self.entity,
            fields = ?self.data.keys().collect::<Vec<_>>(),
            "Saving record"
        );
        let saved = service.save(self.data)?;
        info!(entity = self.entity, uuid = %saved.text(Record::ID_KEY), "Saved record");
        Ok(saved)
    }

    /// Like [`execute`](Self::execute) but logs any failure and returns
    /// `None`.
    pub fn execute_safe(self) -> Option<Record> {
        let entity = self.entity;
        match self.execute() {
            Ok(saved) => Some(saved),
            Err(error) if error.is_unavailable() => {
                warn!(entity, "Service unavailable, skipping save");
                None
            }
            Err(error) => {
                warn!(entity, %error, "Save failed, skipping");
                None
            }
        }
    }
}

/// A value accepted by [`SaveBuilder::field`].
///
/// Anything convertible into a JSON value, plus identifiers (stored as
/// strings) and optional values (`None` is skipped).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue(Value);

macro_rules! impl_field_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue(Value::from(value))
                }
            }
        )*
    };
}

impl_field_value!(Value, bool, i32, i64, u32, u64, f64, String, &str);

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        FieldValue(Value::String(value.to_string()))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue(Value::Null), Into::into)
    }
}

// ─── Delete ───

/// Delete requests for one entity.
#[derive(Debug, Clone, Copy)]
pub struct DeleteBuilder<'a> {
    bridge: &'a Bridge,
    entity: &'a str,
}

impl DeleteBuilder<'_> {
    /// Returns `false` when nothing was removed or no service exists.
    pub fn by_id(&self, id: Uuid) -> bool {
        self.bridge
            .service(self.entity)
            .is_some_and(|s| s.delete_by_id(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::service::DataService;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct MemoryService {
        rows: Mutex<Vec<Record>>,
        last_page: Mutex<Option<(usize, usize)>>,
    }

    impl DataService for MemoryService {
        fn entity_name(&self) -> &str {
            "Diagnosis"
        }

        fn find_by_id(&self, id: Uuid) -> Option<Record> {
            self.rows.lock().iter().find(|r| r.id() == Some(id)).cloned()
        }

        fn find_by_field(&self, field: &str, value: &Value) -> Vec<Record> {
            self.rows
                .lock()
                .iter()
                .filter(|r| r.get(field) == Some(value))
                .cloned()
                .collect()
        }

        fn find_all(&self, _tenant_id: &str, page: usize, size: usize) -> Vec<Record> {
            *self.last_page.lock() = Some((page, size));
            self.rows.lock().iter().skip(page * size).take(size).cloned().collect()
        }

        fn save(&self, mut record: Record) -> Result<Record, ServiceError> {
            if record.get_str("code").is_none() {
                return Err(ServiceError::rejected("Diagnosis", "code is required"));
            }
            if record.id().is_none() {
                record.insert(Record::ID_KEY, Uuid::new_v4().to_string());
            }
            self.rows.lock().push(record.clone());
            Ok(record)
        }

        fn delete_by_id(&self, id: Uuid) -> bool {
            let mut rows = self.rows.lock();
            let before = rows.len();
            rows.retain(|r| r.id() != Some(id));
            rows.len() != before
        }
    }

    fn bridge() -> (Bridge, Arc<MemoryService>) {
        let registry = Arc::new(ServiceRegistry::new());
        let service = Arc::new(MemoryService::default());
        registry.register("clinical", "Diagnosis", service.clone());
        (Bridge::new(registry), service)
    }

    #[test]
    fn test_absent_entity_degrades_gracefully() {
        let (bridge, _) = bridge();
        let find = bridge.find("Unknown");
        assert!(find.by_id(Uuid::new_v4()).is_none());
        assert!(find.by_ids(&[Uuid::new_v4()]).is_empty());
        assert!(find.by_tenant("t").is_empty());
        assert!(find.by_field("code", "J45").is_empty());
        assert!(find.by_owner(Uuid::new_v4()).is_empty());
        assert!(find.by_owner_and_tenant(Uuid::new_v4(), "t").is_empty());
        assert!(find.by_fields(&Record::new().with("code", "J45")).is_empty());
        assert!(find.by_field_filtered("code", "J45", "status", "active").is_empty());
        assert!(find.paged("t", 0, 10).is_empty());
        assert!(!bridge.delete("Unknown").by_id(Uuid::new_v4()));
        assert!(!bridge.is_available("Unknown"));
    }

    #[test]
    fn test_detached_bridge_finds_nothing() {
        let bridge = Bridge::detached();
        assert!(bridge.find("Diagnosis").by_tenant("t").is_empty());
        assert!(!bridge.is_available("Diagnosis"));
        assert!(bridge.save("Diagnosis").field("code", "x").execute_safe().is_none());
    }

    #[test]
    fn test_save_contract() {
        let (bridge, _) = bridge();
        let missing = bridge.save("Unknown").field("code", "J45").execute();
        assert_eq!(
            missing,
            Err(BridgeError::ServiceUnavailable {
                entity: "Unknown".into()
            })
        );
        assert!(bridge.save("Unknown").field("code", "J45").execute_safe().is_none());

        let rejected = bridge.save("Diagnosis").field("status", "active").execute();
        assert!(matches!(
            rejected,
            Err(BridgeError::Service(ServiceError::Rejected { .. }))
        ));
        assert!(bridge.save("Diagnosis").execute_safe().is_none());
    }

    #[test]
    fn test_save_stringifies_ids_and_skips_nulls() {
        let (bridge, service) = bridge();
        let patient = Uuid::new_v4();
        let saved = bridge
            .save("Diagnosis")
            .field("patientUuid", patient)
            .field("code", "J45")
            .field("note", None::<String>)
            .field("severity", Some(2))
            .execute()
            .unwrap();

        assert_eq!(saved.get_str("patientUuid"), Some(patient.to_string().as_str()));
        assert!(!saved.contains_key("note"));
        assert_eq!(saved.get_i64("severity"), Some(2));
        assert!(saved.id().is_some());
        assert_eq!(service.rows.lock().len(), 1);

        let found = bridge.find("Diagnosis").by_id(saved.id().unwrap()).unwrap();
        assert_eq!(found, saved);
        assert!(bridge.delete("Diagnosis").by_id(saved.id().unwrap()));
        assert!(!bridge.delete("Diagnosis").by_id(saved.id().unwrap()));
    }

    #[test]
    fn test_fields_copies_record() {
        let (bridge, _) = bridge();
        let saved = bridge
            .save("Diagnosis")
            .fields(Record::new().with("code", "E11").with("skip", Value::Null))
            .execute()
            .unwrap();
        assert_eq!(saved.get_str("code"), Some("E11"));
        assert!(!saved.contains_key("skip"));
    }

    #[test]
    fn test_by_field_filtered_ignores_case() {
        let (bridge, _) = bridge();
        let patient = Uuid::new_v4();
        for (code, status) in [("A", "ACTIVE"), ("B", "resolved"), ("C", "Active")] {
            bridge
                .save("Diagnosis")
                .field("patientUuid", patient)
                .field("code", code)
                .field("status", status)
                .execute()
                .unwrap();
        }
        bridge.save("Diagnosis").field("patientUuid", patient).field("code", "D").execute().unwrap();

        let find = bridge.find("Diagnosis");
        let active = find.by_field_filtered("patientUuid", patient.to_string(), "status", "active");
        let codes: Vec<String> = active.iter().map(|r| r.text("code")).collect();
        assert_eq!(codes, vec!["A", "C"]);

        let unset = find.by_field_filtered("patientUuid", patient.to_string(), "status", "NULL");
        assert_eq!(unset.len(), 1);
        assert_eq!(unset[0].get("code"), Some(&json!("D")));
    }

    #[test]
    fn test_paged_is_clamped() {
        let (bridge, service) = bridge();
        let bridge = bridge.with_max_page_size(50);
        bridge.find("Diagnosis").paged("t", 2, 500);
        assert_eq!(*service.last_page.lock(), Some((2, 50)));
    }
}
