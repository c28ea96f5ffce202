//! Read-only access to the family-member directory.
//!
//! The directory is owned elsewhere; this crate only needs `{id, name, role}`
//! by id. [`StaticDirectory`] serves standalone deployments and tests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid member list: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// A household member as the directory stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    /// Raw role string; parsed with [`crate::permissions::Role::parse`]
    pub role: String,
}

/// Lookup of members by id
pub trait MemberDirectory: Send + Sync {
    fn find_member(&self, id: &str) -> Result<Option<Member>, DirectoryError>;
}

/// In-memory directory, optionally loaded from a JSON array of members
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    members: HashMap<String, Member>,
}

impl StaticDirectory {
    pub fn new(members: impl IntoIterator<Item = Member>) -> Self {
        Self {
            members: members.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    /// Load `[{"id": "...", "name": "...", "role": "PARENT"}, ...]` from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DirectoryError> {
        let raw = std::fs::read_to_string(path)?;
        let members: Vec<Member> = serde_json::from_str(&raw)?;
        Ok(Self::new(members))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl MemberDirectory for StaticDirectory {
    fn find_member(&self, id: &str) -> Result<Option<Member>, DirectoryError> {
        Ok(self.members.get(id).cloned())
    }
}
