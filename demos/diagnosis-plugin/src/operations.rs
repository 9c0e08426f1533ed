//! Operations other plugins can call through a `ServiceProxy`.
//!
//! | Operation | Parameters | Returns |
//! |-----------|------------|---------|
//! | `countByPatient` | `Uuid` | `Long` |
//! | `hasActiveDiagnosis` | `Uuid` | `Bool` |
//! | `countByStatus` | `Text` | `Long`, fails on an unknown status |
//! | `findByCode` | `Text`, optional `Text` tenant | `List` of records |
//! | `resolve` | `Uuid` | `Bool` |
//! | `highestSeverity` | `Uuid` | `Text` or null |

use std::sync::Arc;

use plugbridge_core::mapper::FieldCodec;
use plugbridge_core::{DataService, OperationTable};
use serde_json::Value;
use uuid::Uuid;

use crate::model::{DiagnosisStatus, Severity};
use crate::service::DiagnosisService;

pub const SERVICE_NAME: &str = "diagnosisService";

/// Builds the operation table over `service`.
pub fn operation_table(service: Arc<DiagnosisService>) -> OperationTable {
    OperationTable::builder(SERVICE_NAME, service)
        .operation("countByPatient", |s: &DiagnosisService, patient: Uuid| {
            s.count_by_patient(patient)
        })
        .operation("hasActiveDiagnosis", DiagnosisService::has_active)
        .operation("countByStatus", |s: &DiagnosisService, status: String| {
            DiagnosisStatus::decode(&Value::String(status))
                .map(|status| s.count_by_status(status))
                .map_err(|e| e.to_string())
        })
        .operation("findByCode", |s: &DiagnosisService, code: String| {
            s.find_by_code(&code, None)
        })
        .operation(
            "findByCode",
            |s: &DiagnosisService, code: String, tenant: Option<String>| {
                s.find_by_code(&code, tenant.as_deref())
            },
        )
        .operation("resolve", DiagnosisService::resolve)
        .operation("highestSeverity", |s: &DiagnosisService, patient: Uuid| {
            highest_severity(s, patient)
        })
        .build()
}

/// Severity of the patient's worst active diagnosis, as its symbolic name.
fn highest_severity(service: &DiagnosisService, patient: Uuid) -> Option<String> {
    service
        .find_by_owner(patient)
        .iter()
        .filter(|r| r.get_str("status") == Some("ACTIVE"))
        .filter_map(|r| r.get("severity"))
        .filter_map(|v| Severity::decode(v).ok())
        .max()
        .and_then(|severity| severity.encode().as_str().map(str::to_string))
}
