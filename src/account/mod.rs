//! Account directory for Tavern.
//!
//! Registration, login, lookups, profile fields and the per-account topic
//! and post counters.

mod directory;
mod user;

pub(crate) use directory::{bump_counters, write_password};
pub use directory::AccountDirectory;
pub use user::AccountUser;
