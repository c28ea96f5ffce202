//! Per-request identity resolution.
//!
//! Callers pass an explicit [`RequestIdentity`] (bearer token and member
//! signal, already lifted out of cookies or headers) and get back one
//! [`AuthContext`]. Lookup failures never propagate: they are logged and the
//! affected path simply does not authenticate.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::directory::MemberDirectory;
use crate::permissions::Role;
use crate::storage::Database;
use crate::tokens::session;

/// Identity signals supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    pub member_id: Option<String>,
    pub session_token: Option<String>,
}

impl RequestIdentity {
    pub fn with_session(token: impl Into<String>) -> Self {
        Self {
            session_token: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn with_member(member_id: impl Into<String>) -> Self {
        Self {
            member_id: Some(member_id.into()),
            ..Default::default()
        }
    }

    pub fn and_member(mut self, member_id: impl Into<String>) -> Self {
        self.member_id = Some(member_id.into());
        self
    }
}

/// Who is making the request, as far as the core can tell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    pub is_authenticated: bool,
    pub is_pin_authenticated: bool,
    pub member_id: Option<String>,
    pub member_name: Option<String>,
    pub role: Option<Role>,
}

/// Resolve the request identity.
///
/// 1. A valid PIN session authenticates the request as PARENT.
/// 2. A member id that resolves to a member with a recognized role sets the
///    member id and name and authenticates the request.
///
/// When both apply, the PIN session keeps the PARENT role and the member only
/// contributes id and name. A member signal never downgrades a PIN session.
pub fn resolve(
    db: &Database,
    directory: &dyn MemberDirectory,
    identity: &RequestIdentity,
    now: DateTime<Utc>,
) -> AuthContext {
    let mut context = AuthContext::default();

    if let Some(token) = identity.session_token.as_deref() {
        match session::validate(db, token, now) {
            Ok(true) => {
                context.is_authenticated = true;
                context.is_pin_authenticated = true;
                context.role = Some(Role::Parent);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Session lookup failed, ignoring session token");
            }
        }
    }

    if let Some(member_id) = identity.member_id.as_deref() {
        match directory.find_member(member_id) {
            Ok(Some(member)) => match Role::parse(&member.role) {
                Some(role) => {
                    context.is_authenticated = true;
                    context.member_id = Some(member.id);
                    context.member_name = Some(member.name);
                    if !context.is_pin_authenticated {
                        context.role = Some(role);
                    }
                }
                None => {
                    tracing::warn!(
                        member_id = %member_id,
                        role = %member.role,
                        "Member has an unrecognized role"
                    );
                }
            },
            Ok(None) => {
                tracing::debug!(member_id = %member_id, "Unknown member id");
            }
            Err(e) => {
                tracing::warn!(error = %e, member_id = %member_id, "Member lookup failed");
            }
        }
    }

    context
}
