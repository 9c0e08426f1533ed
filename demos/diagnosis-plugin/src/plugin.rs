use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use plugbridge_core::{PluginInfo, PluginType};
use plugbridge_runtime::{BoxError, Plugin, PluginContext};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::model::{Diagnosis, DiagnosisStatus, Severity};
use crate::operations::operation_table;
use crate::service::DiagnosisService;

pub const PLUGIN_ID: &str = "diagnosis";

/// `[plugins.diagnosis]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiagnosisConfig {
    /// Load a few sample diagnoses for `demo_patient` on start.
    pub seed_demo_data: bool,
    pub demo_patient: Option<Uuid>,
}

pub struct DiagnosisPlugin {
    info: PluginInfo,
    service: Mutex<Option<Arc<DiagnosisService>>>,
}

impl Default for DiagnosisPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosisPlugin {
    pub fn new() -> Self {
        Self {
            info: PluginInfo::new(PLUGIN_ID, "Diagnosis Records", env!("CARGO_PKG_VERSION"))
                .description("Coded diagnoses per patient")
                .plugin_type(PluginType::Service),
            service: Mutex::new(None),
        }
    }

    /// Requires another plugin to be active first.
    pub fn depends_on(mut self, plugin_id: &str) -> Self {
        self.info = self.info.depends_on(plugin_id);
        self
    }

    /// The live service while the plugin is started.
    pub fn service(&self) -> Option<Arc<DiagnosisService>> {
        self.service.lock().clone()
    }

    fn seed(service: &DiagnosisService, patient: Uuid) -> Result<(), BoxError> {
        let mut hypertension = Diagnosis::new(patient, "I10", "Essential hypertension");
        hypertension.severity = Severity::Moderate;
        hypertension.onset_date = NaiveDate::from_ymd_opt(2021, 3, 14);

        let mut bronchitis = Diagnosis::new(patient, "J20.9", "Acute bronchitis");
        bronchitis.status = DiagnosisStatus::Resolved;

        for diagnosis in [hypertension, bronchitis] {
            service.insert(diagnosis)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for DiagnosisPlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    async fn on_start(&self, ctx: &PluginContext) -> Result<(), BoxError> {
        let config: DiagnosisConfig = ctx.config()?;
        let service = Arc::new(DiagnosisService::new(ctx.tenant()));

        if config.seed_demo_data {
            let patient = config.demo_patient.unwrap_or_else(Uuid::new_v4);
            Self::seed(&service, patient)?;
            info!(%patient, rows = service.len(), "Seeded demo diagnoses");
        }

        ctx.register_service(service.clone());
        ctx.register_operations(operation_table(Arc::clone(&service)));
        *self.service.lock() = Some(service);
        Ok(())
    }

    async fn on_stop(&self, _ctx: &PluginContext) -> Result<(), BoxError> {
        if let Some(service) = self.service.lock().take() {
            info!(rows = service.len(), "Diagnosis store released");
        }
        Ok(())
    }
}
