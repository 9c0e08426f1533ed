//! End-to-end: three plugins sharing data through one host.

use std::sync::Arc;

use async_trait::async_trait;
use diagnosis_plugin::{DiagnosisPlugin, PATIENT_KEY, SERVICE_NAME};
use parking_lot::Mutex;
use plugbridge::prelude::*;
use plugbridge_core::{StaticTenant, TenantContext};
use serde_json::{Value, json};
use uuid::Uuid;

// ─── Patient plugin ───

#[derive(Default)]
struct PatientService {
    rows: Mutex<Vec<Record>>,
}

impl DataService for PatientService {
    fn entity_name(&self) -> &str {
        "Patient"
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

    fn save(&self, mut record: Record) -> ServiceResult<Record> {
        if record.get_str("name").is_none() {
            return Err(ServiceError::rejected("Patient", "name is required"));
        }
        if record.id().is_none() {
            record.insert(Record::ID_KEY, Uuid::new_v4().to_string());
        }
        self.rows.lock().push(record.clone());
        Ok(record)
    }
}

struct PatientPlugin {
    info: PluginInfo,
}

impl PatientPlugin {
    fn new() -> Self {
        Self {
            info: PluginInfo::new("patient", "Patients", "1.0.0").plugin_type(PluginType::Base),
        }
    }
}

#[async_trait]
impl Plugin for PatientPlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    async fn on_start(&self, ctx: &PluginContext) -> Result<(), BoxError> {
        ctx.register_service(Arc::new(PatientService::default()));
        Ok(())
    }
}

// ─── Consumer plugin ───

/// What the consumer saw about one patient when it started.
#[derive(Debug, Default, Clone, PartialEq)]
struct Summary {
    diagnoses: usize,
    has_active: bool,
    worst: Option<String>,
}

struct SummaryPlugin {
    info: PluginInfo,
    patient: Uuid,
    seen: Arc<Mutex<Option<Summary>>>,
}

#[async_trait]
impl Plugin for SummaryPlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    async fn on_start(&self, ctx: &PluginContext) -> Result<(), BoxError> {
        let diagnoses = ctx.bridge().find("Diagnosis").by_owner(self.patient).len();
        let proxy = ctx
            .registry()
            .proxy("diagnosis", SERVICE_NAME)
            .ok_or("diagnosis service missing")?;

        *self.seen.lock() = Some(Summary {
            diagnoses,
            has_active: proxy.call_bool("hasActiveDiagnosis", (self.patient,)),
            worst: proxy.call::<String>("highestSeverity", (self.patient,)),
        });
        Ok(())
    }
}

// ─── Harness ───

fn tenant() -> Arc<dyn TenantContext> {
    Arc::new(StaticTenant::new("facility-1"))
}

async fn started_host(patient: Uuid) -> (PluginHost, Arc<Mutex<Option<Summary>>>) {
    let seen = Arc::new(Mutex::new(None));
    let host = PluginHost::new().with_tenant(tenant()).with_plugin_config(
        "diagnosis",
        json!({ "seed_demo_data": true, "demo_patient": patient.to_string() }),
    );

    // Registered consumer-first; the host orders them by dependency.
    host.register(SummaryPlugin {
        info: PluginInfo::new("summary", "Summary", "1.0.0")
            .depends_on("diagnosis")
            .depends_on("patient"),
        patient,
        seen: Arc::clone(&seen),
    })
    .await
    .unwrap();
    host.register(DiagnosisPlugin::new().depends_on("patient"))
        .await
        .unwrap();
    host.register(PatientPlugin::new()).await.unwrap();

    let errors = host.start_all().await;
    assert!(errors.is_empty(), "start errors: {errors:?}");
    (host, seen)
}

// ─── Tests ───

#[tokio::test]
async fn test_consumer_reads_through_bridge_and_proxy() {
    let patient = Uuid::new_v4();
    let (host, seen) = started_host(patient).await;

    assert_eq!(
        seen.lock().clone(),
        Some(Summary {
            diagnoses: 2,
            has_active: true,
            worst: Some("moderate".to_string()),
        })
    );
    for id in ["patient", "diagnosis", "summary"] {
        assert_eq!(host.status(id).await, Some(PluginStatus::Active));
    }
}

#[tokio::test]
async fn test_records_cross_plugins_both_ways() {
    let patient = Uuid::new_v4();
    let (host, _) = started_host(patient).await;
    let bridge = host.bridge();

    let person = bridge
        .save("Patient")
        .field("name", "Amara Nwosu")
        .field("birthYear", 1984)
        .execute()
        .unwrap();
    let person_id = person.id().unwrap();
    assert_eq!(
        bridge.find("Patient").by_id(person_id).unwrap().get_str("name"),
        Some("Amara Nwosu")
    );

    // A diagnosis written by a plugin that never sees the Diagnosis type.
    let saved = bridge
        .save("Diagnosis")
        .field("code", "E11.9")
        .field("description", "Type 2 diabetes")
        .field("severity", "SEVERE")
        .field(PATIENT_KEY, person_id)
        .field("onsetDate", None::<String>)
        .execute()
        .unwrap();
    assert_eq!(saved.get_str("tenantId"), Some("facility-1"));
    assert_eq!(saved.get_uuid(PATIENT_KEY), Some(person_id));

    let for_person = bridge.find("Diagnosis").by_owner(person_id);
    assert_eq!(for_person.len(), 1);
    assert_eq!(for_person[0].get_str("severity"), Some("severe"));

    let filtered = bridge
        .find("Diagnosis")
        .by_field_filtered("code", "I10", "status", "active");
    assert_eq!(filtered.len(), 1);

    let proxy = host.service_proxy("diagnosis", SERVICE_NAME).await.unwrap();
    assert_eq!(proxy.call_long("countByPatient", (person_id,)), 1);
    assert_eq!(proxy.call_long("countByPatient", (patient,)), 2);

    let id = saved.id().unwrap();
    assert!(bridge.delete("Diagnosis").by_id(id));
    assert!(bridge.find("Diagnosis").by_id(id).is_none());
}

#[tokio::test]
async fn test_rejected_save_surfaces_through_bridge() {
    let (host, _) = started_host(Uuid::new_v4()).await;
    let bridge = host.bridge();

    let err = bridge
        .save("Patient")
        .field("birthYear", 1990)
        .execute()
        .unwrap_err();
    assert!(!err.is_unavailable());
    assert!(bridge.save("Patient").field("birthYear", 1990).execute_safe().is_none());

    let err = bridge.save("Prescription").field("drug", "x").execute().unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_stop_withdraws_every_plugin_service() {
    let patient = Uuid::new_v4();
    let (host, _) = started_host(patient).await;
    assert_eq!(host.registry().plugins().len(), 2);

    let errors = host.stop_all().await;
    assert!(errors.is_empty());

    let bridge = host.bridge();
    assert!(!bridge.is_available("Patient"));
    assert!(!bridge.is_available("Diagnosis"));
    assert!(bridge.find("Diagnosis").by_owner(patient).is_empty());
    assert!(host.service_proxy("diagnosis", SERVICE_NAME).await.is_none());
    assert_eq!(host.status("summary").await, Some(PluginStatus::Stopped));
}

#[tokio::test]
async fn test_missing_provider_leaves_consumer_waiting() {
    let host = PluginHost::new().with_tenant(tenant());
    host.register(DiagnosisPlugin::new().depends_on("patient"))
        .await
        .unwrap();

    let errors = host.start_all().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(
        host.status("diagnosis").await,
        Some(PluginStatus::MissingDependencies)
    );
    assert!(!host.bridge().is_available("Diagnosis"));

    // The provider arrives later; the next start picks the consumer up.
    host.register(PatientPlugin::new()).await.unwrap();
    assert!(host.start_all().await.is_empty());
    assert!(host.is_plugin_available("diagnosis").await);
    assert!(host.bridge().is_available("Diagnosis"));
}

#[test]
fn test_detached_bridge_degrades() {
    let bridge = Bridge::detached();
    assert!(bridge.find("Diagnosis").by_owner(Uuid::new_v4()).is_empty());
    assert!(bridge.find("Diagnosis").by_id(Uuid::new_v4()).is_none());
    assert!(!bridge.delete("Diagnosis").by_id(Uuid::new_v4()));
    tokio_test::assert_err!(bridge.save("Diagnosis").field("code", "I10").execute());
}
