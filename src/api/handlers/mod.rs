mod admin;
mod audit;
mod pin;

use chrono::Utc;

use crate::api::response::ApiError;
use crate::audit::AuditRecord;
use crate::context::RequestIdentity;
use crate::error::AccessError;
use crate::AppState;

pub use admin::{health, run_maintenance};
pub use audit::{entity_history, recent_activity};
pub use pin::{auth_context, change_pin, disable_pin, logout, pin_status, setup_pin, verify_pin};

/// Run a core operation on the blocking pool. PIN hashing and redb
/// transactions both block.
async fn blocking<T, F>(operation: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, AccessError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(operation).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            tracing::error!(error = %e, "Blocking task panicked");
            Err(ApiError::internal("Internal server error"))
        }
    }
}

/// Write an audit entry for this request. Never fails the request.
fn audit_event(state: &AppState, identity: &RequestIdentity, record: AuditRecord) {
    crate::audit::record(
        &state.db,
        state.directory.as_ref(),
        Some(identity),
        record,
        Utc::now(),
    );
}
