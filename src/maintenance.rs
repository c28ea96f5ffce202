//! Periodic sweep of expired sessions and old audit entries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::audit;
use crate::config::Config;
use crate::error::AccessError;
use crate::storage::Database;
use crate::tokens::session;
use crate::AppState;

/// What one sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub audit_entries_removed: usize,
    pub sessions_removed: usize,
}

/// Delete expired sessions and audit entries past the retention window
pub fn run_sweep(
    db: &Database,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<SweepStats, AccessError> {
    let sessions_removed = session::cleanup_expired(db, now)?;
    let audit_entries_removed = audit::cleanup(db, config.audit.retention_days, now)?;

    Ok(SweepStats {
        audit_entries_removed,
        sessions_removed,
    })
}

/// Start the background maintenance task. Returns `None` when the interval
/// is configured as 0.
pub fn start_maintenance_loop(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    let seconds = state.config.tokens.cleanup_interval_seconds;
    if seconds == 0 {
        debug!("Maintenance sweep disabled");
        return None;
    }
    let interval = Duration::from_secs(seconds);

    Some(tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);

        loop {
            interval_timer.tick().await;
            sweep_in_background(&state).await;
        }
    }))
}

async fn sweep_in_background(state: &AppState) {
    debug!("Running maintenance sweep");

    let db = state.db.clone();
    let config = state.config.clone();
    let result = tokio::task::spawn_blocking(move || run_sweep(&db, &config, Utc::now())).await;

    match result {
        Ok(Ok(stats)) if stats != SweepStats::default() => debug!(
            sessions_removed = stats.sessions_removed,
            audit_entries_removed = stats.audit_entries_removed,
            "Maintenance sweep finished"
        ),
        Ok(Ok(_)) => {}
        Ok(Err(e)) => error!(error = %e, "Maintenance sweep failed"),
        Err(e) => error!(error = %e, "Maintenance sweep task panicked"),
    }
}
