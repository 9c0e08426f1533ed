//! Diagnosis domain types.

use chrono::NaiveDate;
use plugbridge_core::{AuditFields, Entity, EntityEnum};
use uuid::Uuid;

/// Clinical state of a diagnosis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EntityEnum)]
#[entity(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosisStatus {
    #[default]
    Active,
    Resolved,
    RuledOut,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, EntityEnum)]
#[entity(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Mild,
    Moderate,
    Severe,
}

/// The patient a diagnosis belongs to. Owned by another plugin; only the
/// identifier travels here.
#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[entity(name = "Patient")]
pub struct PatientRef {
    pub uuid: Option<Uuid>,
}

impl PatientRef {
    pub fn new(uuid: Uuid) -> Self {
        Self { uuid: Some(uuid) }
    }
}

/// A coded diagnosis recorded for a patient.
#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[entity(name = "Diagnosis", rename_all = "camelCase")]
pub struct Diagnosis {
    #[entity(flatten)]
    pub audit: AuditFields,
    /// Carried as `patientUuid` in records.
    #[entity(reference)]
    pub patient: Option<PatientRef>,
    /// ICD-10 code, e.g. `E11.9`.
    pub code: String,
    pub description: String,
    pub status: DiagnosisStatus,
    pub severity: Severity,
    pub onset_date: Option<NaiveDate>,
    #[entity(rename = "notes")]
    pub note: Option<String>,
    pub tags: Vec<String>,
    #[entity(skip)]
    pub display_label: String,
}

impl Diagnosis {
    pub fn new(patient: Uuid, code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            patient: Some(PatientRef::new(patient)),
            code: code.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn patient_id(&self) -> Option<Uuid> {
        self.patient.as_ref().and_then(|p| p.uuid)
    }

    pub fn is_active(&self) -> bool {
        self.status == DiagnosisStatus::Active && !self.audit.is_archived()
    }
}
