use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use super::blocking;
use crate::api::response::{ApiError, JSend};
use crate::maintenance::{self, SweepStats};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Run the maintenance sweep now instead of waiting for the next tick
pub async fn run_maintenance(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<SweepStats>>, ApiError> {
    let db = state.db.clone();
    let config = state.config.clone();
    let stats = blocking(move || maintenance::run_sweep(&db, &config, Utc::now())).await?;

    tracing::info!(
        sessions_removed = stats.sessions_removed,
        audit_entries_removed = stats.audit_entries_removed,
        "Manual maintenance sweep finished"
    );
    Ok(JSend::success(stats))
}
