//! Household PIN: hashing, lockout, and the setup/verify/change/disable flows.

pub mod hash;
pub mod lockout;
pub mod manager;

pub use manager::{PinStatus, VerifyOutcome};
