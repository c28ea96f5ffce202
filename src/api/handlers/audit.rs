use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery, JSend};
use crate::audit::{self, AuditQuery};
use crate::storage::models::{AuditEntry, EntityType};
use crate::storage::DatabaseError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Latest audit entries, filtered by the query string
pub async fn recent_activity(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<AuditQuery>,
) -> Result<Json<JSend<Vec<AuditEntry>>>, ApiError> {
    audit::recent(&state.db, &query)
        .map(JSend::success)
        .map_err(read_failed)
}

/// Audit trail of one entity
pub async fn entity_history(
    State(state): State<Arc<AppState>>,
    Path((entity_type, entity_id)): Path<(String, String)>,
    AppQuery(params): AppQuery<HistoryParams>,
) -> Result<Json<JSend<Vec<AuditEntry>>>, ApiError> {
    let entity_type = entity_type
        .parse::<EntityType>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    audit::history(&state.db, entity_type, &entity_id, params.limit)
        .map(JSend::success)
        .map_err(read_failed)
}

fn read_failed(e: DatabaseError) -> ApiError {
    tracing::error!(error = %e, "Failed to read audit log");
    ApiError::internal("Failed to read audit log")
}
