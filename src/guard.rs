//! Route protection: static classification of paths and the two guards
//! handlers run before business logic.

use chrono::{DateTime, Utc};

use crate::context::{self, AuthContext, RequestIdentity};
use crate::directory::MemberDirectory;
use crate::error::AccessError;
use crate::permissions::{has_permission, Permission};
use crate::storage::Database;
use crate::tokens::session;

/// How a path is protected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    PinProtected,
    Permission(Permission),
}

/// Prefix lists that drive [`RouteTable::classify`]
#[derive(Debug)]
pub struct RouteTable {
    pub public: &'static [&'static str],
    pub pin_protected: &'static [&'static str],
    pub permissions: &'static [(&'static str, Permission)],
}

pub const ROUTE_TABLE: RouteTable = RouteTable {
    public: &[
        "/_internal/health",
        "/api/auth/context",
        "/api/pin/logout",
        "/api/pin/setup",
        "/api/pin/status",
        "/api/pin/verify",
    ],
    pin_protected: &["/api/admin", "/api/backup", "/api/pin", "/api/settings"],
    permissions: &[
        ("/api/audit", Permission::AuditView),
        ("/api/calendar", Permission::CalendarManage),
        ("/api/chores/complete", Permission::ChoresCompleteOwn),
        ("/api/chores/verify", Permission::ChoresVerify),
        ("/api/habits/log", Permission::HabitsLogOwn),
        ("/api/meals", Permission::MealsManage),
        ("/api/members", Permission::MembersManage),
        ("/api/photos", Permission::PhotosManage),
        ("/api/points/award", Permission::PointsAward),
        ("/api/points/deduct", Permission::PointsDeduct),
        ("/api/rewards/approve", Permission::RewardsApprove),
        ("/api/rewards/request", Permission::RewardsRequest),
        ("/api/shopping/check", Permission::ShoppingCheck),
        ("/api/tasks/complete", Permission::TasksComplete),
    ],
};

/// `prefix` matches `path` only on a segment boundary
fn prefix_matches(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

impl RouteTable {
    /// Classify a request path.
    ///
    /// The longest matching prefix wins; on equal length the stricter class
    /// wins. Paths matching nothing are public and left to their handler.
    pub fn classify(&self, path: &str) -> RouteClass {
        let public = self
            .public
            .iter()
            .filter(|p| prefix_matches(p, path))
            .map(|p| (p.len(), 0u8, RouteClass::Public));
        let pin = self
            .pin_protected
            .iter()
            .filter(|p| prefix_matches(p, path))
            .map(|p| (p.len(), 1u8, RouteClass::PinProtected));
        let permission = self
            .permissions
            .iter()
            .filter(|(p, _)| prefix_matches(p, path))
            .map(|(p, perm)| (p.len(), 2u8, RouteClass::Permission(*perm)));

        public
            .chain(pin)
            .chain(permission)
            .max_by_key(|(len, rank, _)| (*len, *rank))
            .map(|(_, _, class)| class)
            .unwrap_or(RouteClass::Public)
    }
}

/// Classify against the built-in [`ROUTE_TABLE`]
pub fn classify(path: &str) -> RouteClass {
    ROUTE_TABLE.classify(path)
}

/// Require a valid PIN session. A household without an enabled PIN has no
/// way to mint one, so its PIN-protected routes stay closed.
pub fn require_pin_auth(
    db: &Database,
    identity: &RequestIdentity,
    now: DateTime<Utc>,
) -> Result<(), AccessError> {
    let token = match identity.session_token.as_deref() {
        Some(token) if !token.is_empty() => token,
        _ => return Err(AccessError::AuthenticationRequired),
    };

    if session::validate(db, token, now)? {
        Ok(())
    } else {
        Err(AccessError::AuthenticationExpired)
    }
}

/// Require that the resolved identity holds `permission`.
///
/// Returns the resolved context so the caller can use it without resolving
/// twice.
pub fn require_permission(
    db: &Database,
    directory: &dyn MemberDirectory,
    identity: &RequestIdentity,
    permission: Permission,
    now: DateTime<Utc>,
) -> Result<AuthContext, AccessError> {
    let context = context::resolve(db, directory, identity, now);

    if !context.is_authenticated {
        return Err(AccessError::AuthenticationRequired);
    }

    if !has_permission(context.role, permission) {
        tracing::info!(
            member_id = ?context.member_id,
            role = ?context.role,
            permission = %permission,
            "Permission denied"
        );
        return Err(AccessError::AuthorizationDenied { permission });
    }

    Ok(context)
}
