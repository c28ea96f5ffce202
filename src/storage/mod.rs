mod audit_log;
mod credential;
pub mod db;
pub mod models;
mod sessions;
mod tables;

pub use db::{Database, DatabaseError};
pub use tables::*;
