//! Tavern - discussion board backend
//!
//! Boards contain topics, topics contain posts, and registered accounts
//! authenticate with a password and a cookie-carried session. This crate is
//! the storage-backed core; HTTP routing and rendering live elsewhere and
//! talk to it through [`Forum`].

pub mod account;
pub mod auth;
pub mod board;
pub mod config;
pub mod db;
pub mod error;
pub mod forum;
pub mod logging;

pub use account::{AccountDirectory, AccountUser};
pub use auth::{
    hash_password, verify_password, CookieSettings, Credentials, LogNotifier,
    PasswordResetManager, PasswordResetToken, ResetNotifier, SessionManager, UserSession,
    ValidationError,
};
pub use board::{Board, BoardSummary, ContentStore, LastPostSummary, Page, Post, Topic};
pub use config::Config;
pub use db::{Database, DbPool};
pub use error::{Result, TavernError};
pub use forum::{Forum, ForumSettings};
