//! Fixed role → permission matrix.
//!
//! Roles and permissions are closed enums so every pair is covered by an
//! exhaustive match. Role strings coming from the member directory that do not
//! parse into a [`Role`] are denied everything.

use serde::{Deserialize, Serialize};

/// Coarse identity class of a household member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Child,
    Parent,
}

impl Role {
    /// Parse a directory role string. Unknown roles give `None`.
    pub fn parse(role: &str) -> Option<Role> {
        match role.trim().to_ascii_uppercase().as_str() {
            "PARENT" => Some(Role::Parent),
            "CHILD" => Some(Role::Child),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Child => "CHILD",
            Role::Parent => "PARENT",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability checked before a state-mutating operation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "audit:view")]
    AuditView,
    #[serde(rename = "backup:manage")]
    BackupManage,
    #[serde(rename = "calendar:manage")]
    CalendarManage,
    #[serde(rename = "chores:complete_own")]
    ChoresCompleteOwn,
    #[serde(rename = "chores:manage")]
    ChoresManage,
    #[serde(rename = "chores:verify")]
    ChoresVerify,
    #[serde(rename = "habits:log_own")]
    HabitsLogOwn,
    #[serde(rename = "habits:manage")]
    HabitsManage,
    #[serde(rename = "meals:manage")]
    MealsManage,
    #[serde(rename = "members:manage")]
    MembersManage,
    #[serde(rename = "photos:manage")]
    PhotosManage,
    #[serde(rename = "points:award")]
    PointsAward,
    #[serde(rename = "points:deduct")]
    PointsDeduct,
    #[serde(rename = "points:view_all")]
    PointsViewAll,
    #[serde(rename = "points:view_own")]
    PointsViewOwn,
    #[serde(rename = "rewards:approve")]
    RewardsApprove,
    #[serde(rename = "rewards:manage")]
    RewardsManage,
    #[serde(rename = "rewards:request")]
    RewardsRequest,
    #[serde(rename = "settings:manage")]
    SettingsManage,
    #[serde(rename = "shopping:check")]
    ShoppingCheck,
    #[serde(rename = "shopping:manage")]
    ShoppingManage,
    #[serde(rename = "tasks:complete")]
    TasksComplete,
    #[serde(rename = "tasks:manage")]
    TasksManage,
}

impl Permission {
    pub const ALL: [Permission; 23] = [
        Permission::AuditView,
        Permission::BackupManage,
        Permission::CalendarManage,
        Permission::ChoresCompleteOwn,
        Permission::ChoresManage,
        Permission::ChoresVerify,
        Permission::HabitsLogOwn,
        Permission::HabitsManage,
        Permission::MealsManage,
        Permission::MembersManage,
        Permission::PhotosManage,
        Permission::PointsAward,
        Permission::PointsDeduct,
        Permission::PointsViewAll,
        Permission::PointsViewOwn,
        Permission::RewardsApprove,
        Permission::RewardsManage,
        Permission::RewardsRequest,
        Permission::SettingsManage,
        Permission::ShoppingCheck,
        Permission::ShoppingManage,
        Permission::TasksComplete,
        Permission::TasksManage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::AuditView => "audit:view",
            Permission::BackupManage => "backup:manage",
            Permission::CalendarManage => "calendar:manage",
            Permission::ChoresCompleteOwn => "chores:complete_own",
            Permission::ChoresManage => "chores:manage",
            Permission::ChoresVerify => "chores:verify",
            Permission::HabitsLogOwn => "habits:log_own",
            Permission::HabitsManage => "habits:manage",
            Permission::MealsManage => "meals:manage",
            Permission::MembersManage => "members:manage",
            Permission::PhotosManage => "photos:manage",
            Permission::PointsAward => "points:award",
            Permission::PointsDeduct => "points:deduct",
            Permission::PointsViewAll => "points:view_all",
            Permission::PointsViewOwn => "points:view_own",
            Permission::RewardsApprove => "rewards:approve",
            Permission::RewardsManage => "rewards:manage",
            Permission::RewardsRequest => "rewards:request",
            Permission::SettingsManage => "settings:manage",
            Permission::ShoppingCheck => "shopping:check",
            Permission::ShoppingManage => "shopping:manage",
            Permission::TasksComplete => "tasks:complete",
            Permission::TasksManage => "tasks:manage",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl std::str::FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// Whether `role` grants `permission`. `None` (unknown role) grants nothing.
pub fn has_permission(role: Option<Role>, permission: Permission) -> bool {
    match role {
        Some(Role::Parent) => parent_grants(permission),
        Some(Role::Child) => child_grants(permission),
        None => false,
    }
}

// Both tables list every variant so a new permission must be placed by hand.
fn parent_grants(permission: Permission) -> bool {
    match permission {
        Permission::AuditView
        | Permission::BackupManage
        | Permission::CalendarManage
        | Permission::ChoresCompleteOwn
        | Permission::ChoresManage
        | Permission::ChoresVerify
        | Permission::HabitsLogOwn
        | Permission::HabitsManage
        | Permission::MealsManage
        | Permission::MembersManage
        | Permission::PhotosManage
        | Permission::PointsAward
        | Permission::PointsDeduct
        | Permission::PointsViewAll
        | Permission::PointsViewOwn
        | Permission::RewardsApprove
        | Permission::RewardsManage
        | Permission::RewardsRequest
        | Permission::SettingsManage
        | Permission::ShoppingCheck
        | Permission::ShoppingManage
        | Permission::TasksComplete
        | Permission::TasksManage => true,
    }
}

fn child_grants(permission: Permission) -> bool {
    match permission {
        Permission::ChoresCompleteOwn
        | Permission::HabitsLogOwn
        | Permission::PointsViewOwn
        | Permission::RewardsRequest
        | Permission::ShoppingCheck
        | Permission::TasksComplete => true,
        Permission::AuditView
        | Permission::BackupManage
        | Permission::CalendarManage
        | Permission::ChoresManage
        | Permission::ChoresVerify
        | Permission::HabitsManage
        | Permission::MealsManage
        | Permission::MembersManage
        | Permission::PhotosManage
        | Permission::PointsAward
        | Permission::PointsDeduct
        | Permission::PointsViewAll
        | Permission::RewardsApprove
        | Permission::RewardsManage
        | Permission::SettingsManage
        | Permission::ShoppingManage
        | Permission::TasksManage => false,
    }
}

/// Same as [`has_permission`] for a raw directory role string
pub fn has_permission_named(role: &str, permission: Permission) -> bool {
    has_permission(Role::parse(role), permission)
}

/// True when the role holds at least one of `permissions`
pub fn has_any(role: Option<Role>, permissions: &[Permission]) -> bool {
    permissions.iter().any(|p| has_permission(role, *p))
}

/// True when the role holds every one of `permissions`
pub fn has_all(role: Option<Role>, permissions: &[Permission]) -> bool {
    permissions.iter().all(|p| has_permission(role, *p))
}

/// Every permission the role holds
pub fn permissions_for(role: Option<Role>) -> Vec<Permission> {
    Permission::ALL
        .into_iter()
        .filter(|p| has_permission(role, *p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_child_has_exactly_self_service_set() {
        let child: HashSet<_> = permissions_for(Some(Role::Child)).into_iter().collect();
        let expected: HashSet<_> = [
            Permission::PointsViewOwn,
            Permission::RewardsRequest,
            Permission::ChoresCompleteOwn,
            Permission::HabitsLogOwn,
            Permission::ShoppingCheck,
            Permission::TasksComplete,
        ]
        .into_iter()
        .collect();
        assert_eq!(child, expected);
    }

    #[test]
    fn test_matrix_by_token() {
        const CHILD_TOKENS: [&str; 6] = [
            "chores:complete_own",
            "habits:log_own",
            "points:view_own",
            "rewards:request",
            "shopping:check",
            "tasks:complete",
        ];
        for p in Permission::ALL {
            assert!(has_permission(Some(Role::Parent), p), "parent lacks {p}");
            assert_eq!(
                has_permission(Some(Role::Child), p),
                CHILD_TOKENS.contains(&p.as_str()),
                "child grant for {p}"
            );
        }
    }

    #[test]
    fn test_parent_is_strict_superset_of_child() {
        let parent: HashSet<_> = permissions_for(Some(Role::Parent)).into_iter().collect();
        let child: HashSet<_> = permissions_for(Some(Role::Child)).into_iter().collect();
        assert_eq!(parent.len(), Permission::ALL.len());
        assert!(parent.is_superset(&child));
        assert!(parent.len() > child.len());
    }

    #[test]
    fn test_unknown_role_is_denied_everything() {
        for p in Permission::ALL {
            assert!(!has_permission(None, p));
            assert!(!has_permission_named("GRANDPARENT", p));
            assert!(!has_permission_named("", p));
        }
        assert!(permissions_for(None).is_empty());
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("parent"), Some(Role::Parent));
        assert_eq!(Role::parse(" CHILD "), Some(Role::Child));
        assert_eq!(Role::parse("admin"), None);
        assert!(has_permission_named("Parent", Permission::AuditView));
    }

    #[test]
    fn test_has_any_and_has_all() {
        let child = Some(Role::Child);
        assert!(has_any(child, &[Permission::PointsAward, Permission::TasksComplete]));
        assert!(!has_all(child, &[Permission::PointsAward, Permission::TasksComplete]));
        assert!(has_all(Some(Role::Parent), &Permission::ALL));
        assert!(!has_any(None, &Permission::ALL));
        // Vacuous cases
        assert!(has_all(None, &[]));
        assert!(!has_any(Some(Role::Parent), &[]));
    }

    #[test]
    fn test_permission_tokens_roundtrip() {
        for p in Permission::ALL {
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), p);
            let json = serde_json::to_string(&p).unwrap();
            assert_eq!(json, format!("\"{}\"", p.as_str()));
        }
        assert!("points:steal".parse::<Permission>().is_err());
    }
}
