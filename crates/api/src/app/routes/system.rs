use std::collections::BTreeMap;

use axum::{Json, extract::State};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::error;

use crate::app::services::AppState;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ComponentStatus {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub timestamp: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub service: BTreeMap<&'static str, ComponentStatus>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<&'static str, String>,
}

/// Always 200; failing dependencies are listed under `errors`.
pub async fn healthcheck(State(state): State<AppState>) -> Json<HealthReport> {
    let mut report = HealthReport {
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        service: BTreeMap::new(),
        errors: BTreeMap::new(),
    };

    match state.companies.store().ping().await {
        Ok(()) => {
            report.service.insert("DB", ComponentStatus { status: "OK" });
        }
        Err(e) => {
            error!(error = %e, "healthcheck: database ping failed");
            report.errors.insert("DB", e.to_string());
        }
    }

    Json(report)
}
