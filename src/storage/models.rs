use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The household PIN credential (one row per deployment)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Whether PIN protection is switched on
    pub enabled: bool,
    /// Consecutive failed verifications since the last success
    pub failed_attempts: u32,
    /// Verification is refused while this lies in the future
    pub locked_until: Option<DateTime<Utc>>,
    /// Argon2id PHC string; `None` once protection is disabled
    pub pin_hash: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    /// Whether a PIN hash is stored
    pub fn is_configured(&self) -> bool {
        self.pin_hash.as_deref().is_some_and(|h| !h.is_empty())
    }
}

/// A PIN session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub created_at: DateTime<Utc>,
    /// Fixed at creation, never extended by use
    pub expires_at: DateTime<Utc>,
    /// Opaque bearer secret (32-byte hex)
    pub token: String,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Where a request came from, copied into audit entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Kind of sensitive mutation recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Approve,
    Award,
    Backup,
    Complete,
    Create,
    Deduct,
    Delete,
    Lockout,
    Login,
    Logout,
    PinChange,
    PinDisable,
    PinSetup,
    Redeem,
    Reject,
    Restore,
    SettingsChange,
    Update,
}

impl AuditAction {
    pub const ALL: [AuditAction; 18] = [
        Self::Approve,
        Self::Award,
        Self::Backup,
        Self::Complete,
        Self::Create,
        Self::Deduct,
        Self::Delete,
        Self::Lockout,
        Self::Login,
        Self::Logout,
        Self::PinChange,
        Self::PinDisable,
        Self::PinSetup,
        Self::Redeem,
        Self::Reject,
        Self::Restore,
        Self::SettingsChange,
        Self::Update,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Award => "award",
            Self::Backup => "backup",
            Self::Complete => "complete",
            Self::Create => "create",
            Self::Deduct => "deduct",
            Self::Delete => "delete",
            Self::Lockout => "lockout",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::PinChange => "pin_change",
            Self::PinDisable => "pin_disable",
            Self::PinSetup => "pin_setup",
            Self::Redeem => "redeem",
            Self::Reject => "reject",
            Self::Restore => "restore",
            Self::SettingsChange => "settings_change",
            Self::Update => "update",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// What kind of record an audit entry is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Backup,
    Calendar,
    Chore,
    Habit,
    MealPlan,
    Member,
    Photo,
    Pin,
    Points,
    Reward,
    Session,
    Settings,
    ShoppingItem,
    Task,
}

impl EntityType {
    pub const ALL: [EntityType; 14] = [
        Self::Backup,
        Self::Calendar,
        Self::Chore,
        Self::Habit,
        Self::MealPlan,
        Self::Member,
        Self::Photo,
        Self::Pin,
        Self::Points,
        Self::Reward,
        Self::Session,
        Self::Settings,
        Self::ShoppingItem,
        Self::Task,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::Calendar => "calendar",
            Self::Chore => "chore",
            Self::Habit => "habit",
            Self::MealPlan => "meal_plan",
            Self::Member => "member",
            Self::Photo => "photo",
            Self::Pin => "pin",
            Self::Points => "points",
            Self::Reward => "reward",
            Self::Session => "session",
            Self::Settings => "settings",
            Self::ShoppingItem => "shopping_item",
            Self::Task => "task",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value: {0}")]
pub struct UnknownVariant(pub String);

/// An immutable audit log row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
    pub entity_id: String,
    pub entity_type: EntityType,
    pub id: String,
    pub ip_address: Option<String>,
    pub new_value: Option<serde_json::Value>,
    /// Snapshot before the mutation
    pub old_value: Option<serde_json::Value>,
    /// Member id of the actor, if known
    pub performed_by: Option<String>,
    pub performed_by_name: Option<String>,
    pub user_agent: Option<String>,
}
