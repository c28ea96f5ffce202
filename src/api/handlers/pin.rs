use axum::extract::{Extension, State};
use axum::http::{header, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{audit_event, blocking};
use crate::api::response::{ApiError, AppJson, JSend};
use crate::api::middleware::SESSION_COOKIE;
use crate::audit::AuditRecord;
use crate::config::Config;
use crate::context::{self, AuthContext, RequestIdentity};
use crate::permissions::{permissions_for, Permission};
use crate::pin::{manager, PinStatus, VerifyOutcome};
use crate::storage::models::{AuditAction, ClientInfo, EntityType};
use crate::storage::CREDENTIAL_KEY;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SetupPinRequest {
    pub confirm_pin: String,
    pub pin: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPinRequest {
    pub pin: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePinRequest {
    pub confirm_pin: String,
    pub current_pin: String,
    pub new_pin: String,
}

#[derive(Debug, Deserialize)]
pub struct DisablePinRequest {
    pub pin: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPinResponse {
    pub expires_at: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

#[derive(Debug, Serialize)]
pub struct AuthContextResponse {
    #[serde(flatten)]
    pub context: AuthContext,
    pub permissions: Vec<Permission>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn pin_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PinStatus>>, ApiError> {
    Ok(JSend::success(manager::status(&state.db, Utc::now())?))
}

pub async fn setup_pin(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    Extension(client): Extension<ClientInfo>,
    AppJson(req): AppJson<SetupPinRequest>,
) -> Result<Json<JSend<PinStatus>>, ApiError> {
    let db = state.db.clone();
    blocking(move || manager::setup(&db, &req.pin, &req.confirm_pin, Utc::now())).await?;

    audit_event(
        &state,
        &identity,
        pin_record(AuditAction::PinSetup, client).description("PIN protection enabled"),
    );
    Ok(JSend::success(manager::status(&state.db, Utc::now())?))
}

pub async fn verify_pin(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    Extension(client): Extension<ClientInfo>,
    AppJson(req): AppJson<VerifyPinRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let config = state.config.clone();
    let outcome = blocking(move || manager::verify(&db, &config, &req.pin, Utc::now())).await?;

    match outcome {
        VerifyOutcome::Verified(session) => {
            let mut actor =
                context::resolve(&state.db, state.directory.as_ref(), &identity, Utc::now());
            actor.is_pin_authenticated = true;
            audit_event(
                &state,
                &identity,
                AuditRecord::new(AuditAction::Login, EntityType::Session, CREDENTIAL_KEY)
                    .actor(&actor)
                    .client(client),
            );

            let cookie = session_cookie(&state.config, &session.token)?;
            Ok((
                [(header::SET_COOKIE, cookie)],
                JSend::success(VerifyPinResponse {
                    expires_at: session.expires_at.to_rfc3339(),
                    token: session.token,
                }),
            ))
        }
        VerifyOutcome::Rejected {
            locked,
            lockout_remaining,
            lockout_started,
        } => {
            if lockout_started {
                audit_event(
                    &state,
                    &identity,
                    pin_record(AuditAction::Lockout, client).description(format!(
                        "PIN locked for {lockout_remaining} seconds after repeated failures"
                    )),
                );
            }

            if locked {
                Err(ApiError::locked(lockout_remaining))
            } else {
                Err(ApiError::unauthorized("Incorrect PIN"))
            }
        }
    }
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    Extension(client): Extension<ClientInfo>,
) -> Result<impl IntoResponse, ApiError> {
    let logged_out = match identity.session_token.as_deref() {
        Some(token) => {
            let actor = context::resolve(&state.db, state.directory.as_ref(), &identity, Utc::now());
            let deleted = manager::logout(&state.db, token)?;
            if deleted {
                audit_event(
                    &state,
                    &identity,
                    AuditRecord::new(AuditAction::Logout, EntityType::Session, CREDENTIAL_KEY)
                        .actor(&actor)
                        .client(client),
                );
            }
            deleted
        }
        None => false,
    };

    Ok((
        [(header::SET_COOKIE, clear_session_cookie(&state.config)?)],
        JSend::success(LogoutResponse { logged_out }),
    ))
}

pub async fn change_pin(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    Extension(client): Extension<ClientInfo>,
    AppJson(req): AppJson<ChangePinRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = context::resolve(&state.db, state.directory.as_ref(), &identity, Utc::now());

    let db = state.db.clone();
    let config = state.config.clone();
    blocking(move || {
        manager::change(
            &db,
            &config,
            &req.current_pin,
            &req.new_pin,
            &req.confirm_pin,
            Utc::now(),
        )
    })
    .await?;

    audit_event(
        &state,
        &identity,
        pin_record(AuditAction::PinChange, client)
            .actor(&actor)
            .description("PIN changed, all sessions revoked"),
    );

    Ok((
        [(header::SET_COOKIE, clear_session_cookie(&state.config)?)],
        JSend::success(manager::status(&state.db, Utc::now())?),
    ))
}

pub async fn disable_pin(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    Extension(client): Extension<ClientInfo>,
    AppJson(req): AppJson<DisablePinRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = context::resolve(&state.db, state.directory.as_ref(), &identity, Utc::now());

    let db = state.db.clone();
    let config = state.config.clone();
    blocking(move || manager::disable(&db, &config, &req.pin, Utc::now())).await?;

    audit_event(
        &state,
        &identity,
        pin_record(AuditAction::PinDisable, client)
            .actor(&actor)
            .description("PIN protection disabled, all sessions revoked"),
    );

    Ok((
        [(header::SET_COOKIE, clear_session_cookie(&state.config)?)],
        JSend::success(manager::status(&state.db, Utc::now())?),
    ))
}

pub async fn auth_context(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
) -> Json<JSend<AuthContextResponse>> {
    let context = context::resolve(&state.db, state.directory.as_ref(), &identity, Utc::now());
    JSend::success(AuthContextResponse {
        permissions: permissions_for(context.role),
        context,
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn pin_record(action: AuditAction, client: ClientInfo) -> AuditRecord {
    AuditRecord::new(action, EntityType::Pin, CREDENTIAL_KEY).client(client)
}

/// `HttpOnly` session cookie living as long as the session
fn session_cookie(config: &Config, token: &str) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        config.tokens.session_ttl_seconds
    );
    if config.server.secure_cookies {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|_| ApiError::internal("Invalid session cookie"))
}

fn clear_session_cookie(config: &Config) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0");
    if config.server.secure_cookies {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|_| ApiError::internal("Invalid session cookie"))
}
