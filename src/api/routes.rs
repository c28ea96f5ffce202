use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::route_guard;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // PIN lifecycle; change/disable sit behind the PIN gate via the route table
    let pin_routes = Router::new()
        .route("/api/pin/change", post(handlers::change_pin))
        .route("/api/pin/disable", post(handlers::disable_pin))
        .route("/api/pin/logout", post(handlers::logout))
        .route("/api/pin/setup", post(handlers::setup_pin))
        .route("/api/pin/status", get(handlers::pin_status))
        .route("/api/pin/verify", post(handlers::verify_pin))
        .route("/api/auth/context", get(handlers::auth_context));

    let audit_routes = Router::new()
        .route("/api/audit", get(handlers::recent_activity))
        .route(
            "/api/audit/:entity_type/:entity_id",
            get(handlers::entity_history),
        );

    let admin_routes =
        Router::new().route("/api/admin/maintenance", post(handlers::run_maintenance));

    let internal_routes = Router::new().route("/_internal/health", get(handlers::health));

    Router::new()
        .merge(pin_routes)
        .merge(audit_routes)
        .merge(admin_routes)
        .merge(internal_routes)
        .layer(middleware::from_fn_with_state(Arc::clone(&state), route_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
