//! household-access - access control for a shared household dashboard
//!
//! This crate provides:
//! - A household PIN stored as an Argon2id hash, with a lockout after
//!   repeated failures
//! - Opaque PIN sessions with a fixed lifetime
//! - Role permissions for PARENT and CHILD members
//! - Per-request identity resolution and route guards
//! - An append-only audit trail with retention cleanup
//! - redb embedded database (ACID, MVCC, crash-safe)
//! - REST API

pub mod api;
pub mod audit;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod guard;
pub mod maintenance;
pub mod permissions;
pub mod pin;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;

use std::sync::Arc;

use config::Config;
use directory::MemberDirectory;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub directory: Arc<dyn MemberDirectory>,
}
