//! Sample plugbridge plugin.
//!
//! Keeps diagnoses in memory and exposes them two ways:
//!
//! - as the `Diagnosis` entity, reachable from any plugin through the
//!   [`Bridge`](plugbridge_core::Bridge)
//! - as the `diagnosisService` operation table, reachable through a
//!   [`ServiceProxy`](plugbridge_core::ServiceProxy)
//!
//! ```rust,ignore
//! host.register(DiagnosisPlugin::new()).await?;
//! host.start_all().await;
//!
//! let active = host
//!     .service_proxy("diagnosis", "diagnosisService")
//!     .await
//!     .is_some_and(|p| p.call_bool("hasActiveDiagnosis", (patient,)));
//! ```

pub mod model;
pub mod operations;
pub mod plugin;
pub mod service;

pub use model::{Diagnosis, DiagnosisStatus, PatientRef, Severity};
pub use operations::{SERVICE_NAME, operation_table};
pub use plugin::{DiagnosisConfig, DiagnosisPlugin, PLUGIN_ID};
pub use service::{DiagnosisService, ENTITY_NAME, PATIENT_KEY};
