//! In-memory diagnosis store exposed as a [`DataService`].

use std::sync::Arc;

use parking_lot::RwLock;
use plugbridge_core::{
    DataService, EntityMapper, Record, ServiceError, ServiceResult, TenantContext,
};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::model::{Diagnosis, DiagnosisStatus, PatientRef};

pub const ENTITY_NAME: &str = "Diagnosis";

/// Record key carrying the patient reference.
pub const PATIENT_KEY: &str = "patientUuid";

const RELATIONS: &[(&str, &str)] = &[("patient", PATIENT_KEY)];

/// Diagnoses kept in insertion order.
pub struct DiagnosisService {
    rows: RwLock<Vec<Diagnosis>>,
    tenant: Arc<dyn TenantContext>,
}

impl DiagnosisService {
    pub fn new(tenant: Arc<dyn TenantContext>) -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            tenant,
        }
    }

    fn to_record(diagnosis: &Diagnosis) -> Record {
        EntityMapper::to_record_with_relations(diagnosis, RELATIONS)
    }

    fn select<P>(&self, predicate: P) -> Vec<Record>
    where
        P: Fn(&Diagnosis) -> bool,
    {
        self.rows
            .read()
            .iter()
            .filter(|d| !d.audit.is_archived() && predicate(d))
            .map(Self::to_record)
            .collect()
    }

    /// Inserts a new diagnosis, stamping audit fields from the tenant context.
    pub fn insert(&self, diagnosis: Diagnosis) -> ServiceResult<Diagnosis> {
        let diagnosis = self.prepare_insert(diagnosis)?;
        self.rows.write().push(diagnosis.clone());
        Self::log_recorded(&diagnosis);
        Ok(diagnosis)
    }

    fn prepare_insert(&self, mut diagnosis: Diagnosis) -> ServiceResult<Diagnosis> {
        if diagnosis.code.trim().is_empty() {
            return Err(ServiceError::rejected(ENTITY_NAME, "code is required"));
        }
        diagnosis
            .audit
            .prepare_for_insert(self.tenant.as_ref())
            .map_err(|e| ServiceError::rejected(ENTITY_NAME, e.to_string()))?;
        Ok(diagnosis)
    }

    fn log_recorded(diagnosis: &Diagnosis) {
        info!(
            uuid = ?diagnosis.audit.uuid,
            code = %diagnosis.code,
            "Diagnosis recorded"
        );
    }

    /// Marks a diagnosis resolved. Returns `false` when it is unknown or
    /// already closed.
    pub fn resolve(&self, id: Uuid) -> bool {
        let mut rows = self.rows.write();
        match rows
            .iter_mut()
            .find(|d| d.audit.uuid == Some(id) && d.is_active())
        {
            Some(diagnosis) => {
                diagnosis.status = DiagnosisStatus::Resolved;
                diagnosis.audit.touch("diagnosis-plugin");
                true
            }
            None => false,
        }
    }

    pub fn count_by_patient(&self, patient: Uuid) -> usize {
        self.rows
            .read()
            .iter()
            .filter(|d| !d.audit.is_archived() && d.patient_id() == Some(patient))
            .count()
    }

    pub fn has_active(&self, patient: Uuid) -> bool {
        self.rows
            .read()
            .iter()
            .any(|d| d.is_active() && d.patient_id() == Some(patient))
    }

    pub fn count_by_status(&self, status: DiagnosisStatus) -> usize {
        self.rows
            .read()
            .iter()
            .filter(|d| !d.audit.is_archived() && d.status == status)
            .count()
    }

    /// Diagnoses with `code`, optionally restricted to one tenant.
    pub fn find_by_code(&self, code: &str, tenant_id: Option<&str>) -> Vec<Record> {
        self.select(|d| {
            d.code.eq_ignore_ascii_case(code)
                && tenant_id.is_none_or(|t| d.audit.tenant_id.as_deref() == Some(t))
        })
    }

    pub fn get(&self, id: Uuid) -> Option<Diagnosis> {
        self.rows
            .read()
            .iter()
            .find(|d| d.audit.uuid == Some(id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl DataService for DiagnosisService {
    fn entity_name(&self) -> &str {
        ENTITY_NAME
    }

    fn find_by_id(&self, id: Uuid) -> Option<Record> {
        self.select(|d| d.audit.uuid == Some(id)).into_iter().next()
    }

    fn find_by_owner(&self, owner_id: Uuid) -> Vec<Record> {
        self.select(|d| d.patient_id() == Some(owner_id))
    }

    fn find_by_tenant(&self, tenant_id: &str) -> Vec<Record> {
        self.select(|d| d.audit.tenant_id.as_deref() == Some(tenant_id))
    }

    fn find_by_owner_and_tenant(&self, owner_id: Uuid, tenant_id: &str) -> Vec<Record> {
        self.select(|d| {
            d.patient_id() == Some(owner_id) && d.audit.tenant_id.as_deref() == Some(tenant_id)
        })
    }

    fn find_all(&self, tenant_id: &str, page: usize, size: usize) -> Vec<Record> {
        self.find_by_tenant(tenant_id)
            .into_iter()
            .skip(page.saturating_mul(size))
            .take(size)
            .collect()
    }

    fn find_by_field(&self, field: &str, value: &Value) -> Vec<Record> {
        self.select(|d| Self::to_record(d).get(field) == Some(value))
    }

    fn find_by_fields(&self, criteria: &Record) -> Vec<Record> {
        self.select(|d| {
            let record = Self::to_record(d);
            criteria.iter().all(|(key, value)| record.get(key) == Some(value))
        })
    }

    /// Inserts a record without a known `uuid`; updates the stored row
    /// otherwise, keeping its creation audit.
    fn save(&self, record: Record) -> ServiceResult<Record> {
        let mapped = EntityMapper::to_entity::<Diagnosis>(&record)?;
        if !mapped.is_complete() {
            let fields: Vec<&str> = mapped.issues().iter().map(|i| i.field.as_str()).collect();
            warn!(?fields, "Saving diagnosis with unconverted fields");
        }
        let mut diagnosis = mapped.into_entity();
        if let Some(patient) = record.get_uuid(PATIENT_KEY) {
            diagnosis.patient = Some(PatientRef::new(patient));
        }

        // Lookup and write share one guard; a row deleted meanwhile is
        // inserted again.
        let mut rows = self.rows.write();
        let existing = record
            .id()
            .and_then(|id| rows.iter_mut().find(|d| d.audit.uuid == Some(id)));
        let stored = match existing {
            Some(current) => {
                diagnosis.audit.id = current.audit.id;
                diagnosis.audit.created_at = current.audit.created_at;
                diagnosis.audit.created_by = current.audit.created_by.take();
                diagnosis.audit.tenant_id = current.audit.tenant_id.take();
                let actor = record
                    .get_str("updatedBy")
                    .unwrap_or("diagnosis-plugin")
                    .to_string();
                diagnosis.audit.touch(actor);

                *current = diagnosis.clone();
                debug!(uuid = ?diagnosis.audit.uuid, "Diagnosis updated");
                diagnosis
            }
            None => {
                let diagnosis = self.prepare_insert(diagnosis)?;
                rows.push(diagnosis.clone());
                Self::log_recorded(&diagnosis);
                diagnosis
            }
        };
        drop(rows);

        Ok(Self::to_record(&stored))
    }

    fn delete_by_id(&self, id: Uuid) -> bool {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|d| d.audit.uuid != Some(id));
        before != rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use plugbridge_core::StaticTenant;

    fn service() -> DiagnosisService {
        DiagnosisService::new(Arc::new(StaticTenant::new("facility-1")))
    }

    #[test]
    fn test_insert_stamps_audit() {
        let service = service();
        let patient = Uuid::new_v4();
        let stored = service
            .insert(Diagnosis::new(patient, "J45", "Asthma"))
            .unwrap();

        assert!(stored.audit.uuid.is_some());
        assert_eq!(stored.audit.tenant_id.as_deref(), Some("facility-1"));
        assert!(stored.audit.created_at.is_some());
        assert_eq!(service.count_by_patient(patient), 1);
        assert!(service.has_active(patient));
    }

    #[test]
    fn test_insert_rejects_blank_code_and_missing_tenant() {
        let err = service()
            .insert(Diagnosis::new(Uuid::new_v4(), " ", "Unknown"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Rejected { .. }));

        let untenanted = DiagnosisService::new(Arc::new(StaticTenant::none()));
        assert!(
            untenanted
                .insert(Diagnosis::new(Uuid::new_v4(), "J45", "Asthma"))
                .is_err()
        );
        assert!(untenanted.is_empty());
    }

    #[test]
    fn test_save_insert_then_update() {
        let service = service();
        let patient = Uuid::new_v4();
        let created = service
            .save(
                Record::new()
                    .with("code", "I10")
                    .with("description", "Hypertension")
                    .with("severity", "SEVERE")
                    .with(PATIENT_KEY, patient.to_string()),
            )
            .unwrap();
        let id = created.id().unwrap();
        assert_eq!(created.get_str("severity"), Some("severe"));
        assert_eq!(created.get_uuid(PATIENT_KEY), Some(patient));

        let updated = service
            .save(
                created
                    .clone()
                    .with("status", "resolved")
                    .with("updatedBy", "dr.okafor"),
            )
            .unwrap();
        assert_eq!(updated.id(), Some(id));
        assert_eq!(updated.get_str("status"), Some("RESOLVED"));
        assert_eq!(updated.get_str("updatedBy"), Some("dr.okafor"));
        assert_eq!(updated.get("createdAt"), created.get("createdAt"));
        assert_eq!(service.len(), 1);
        assert!(!service.has_active(patient));
    }

    #[test]
    fn test_save_of_deleted_row_inserts_it_again() {
        let service = service();
        let patient = Uuid::new_v4();
        let created = service
            .save(
                Record::new()
                    .with("code", "E11")
                    .with("description", "Type 2 diabetes")
                    .with(PATIENT_KEY, patient.to_string()),
            )
            .unwrap();
        let id = created.id().unwrap();
        assert!(service.delete_by_id(id));
        assert!(service.is_empty());

        let saved = service
            .save(created.with("description", "Type 2 diabetes, controlled"))
            .unwrap();
        assert_eq!(saved.id(), Some(id));
        assert_eq!(service.len(), 1);
        assert_eq!(
            service.get(id).map(|d| d.description),
            Some("Type 2 diabetes, controlled".to_string())
        );
    }

    #[test]
    fn test_save_with_bad_field_keeps_default() {
        let service = service();
        let saved = service
            .save(
                Record::new()
                    .with("code", "K21")
                    .with("severity", "catastrophic"),
            )
            .unwrap();
        assert_eq!(saved.get_str("severity"), Some("mild"));
    }

    #[test]
    fn test_queries() {
        let service = service();
        let patient = Uuid::new_v4();
        let mut severe = Diagnosis::new(patient, "I10", "Hypertension");
        severe.severity = Severity::Severe;
        service.insert(severe).unwrap();
        service
            .insert(Diagnosis::new(patient, "E11.9", "Type 2 diabetes"))
            .unwrap();
        service
            .insert(Diagnosis::new(Uuid::new_v4(), "i10", "Hypertension"))
            .unwrap();

        assert_eq!(service.find_by_owner(patient).len(), 2);
        assert_eq!(service.find_by_tenant("facility-1").len(), 3);
        assert!(service.find_by_tenant("facility-2").is_empty());
        assert_eq!(service.find_all("facility-1", 1, 2).len(), 1);
        assert_eq!(service.find_by_code("I10", None).len(), 2);
        assert_eq!(
            service
                .find_by_field("severity", &Value::from("severe"))
                .len(),
            1
        );
        let criteria = Record::new()
            .with("code", "I10")
            .with(PATIENT_KEY, patient.to_string());
        assert_eq!(service.find_by_fields(&criteria).len(), 1);
        assert_eq!(service.count_by_status(DiagnosisStatus::Active), 3);
    }

    #[test]
    fn test_resolve_and_delete() {
        let service = service();
        let stored = service
            .insert(Diagnosis::new(Uuid::new_v4(), "J45", "Asthma"))
            .unwrap();
        let id = stored.audit.uuid.unwrap();

        assert!(service.resolve(id));
        assert!(!service.resolve(id));
        assert_eq!(service.count_by_status(DiagnosisStatus::Resolved), 1);

        assert!(service.delete_by_id(id));
        assert!(!service.delete_by_id(id));
        assert!(service.find_by_id(id).is_none());
    }
}
