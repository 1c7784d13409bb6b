//! Authentication module for Tavern.
//!
//! This module provides password hashing, opaque tokens, database-backed
//! sessions, single-use password reset tokens, the session cookie binding
//! and input validation.

pub mod cookie;
mod password;
pub mod reset;
mod session;
mod token;
pub mod validation;

pub use cookie::CookieSettings;
pub use password::{
    constant_time_eq, generate_salt, hash_password, hash_password_with_iterations,
    verify_password, Credentials, PasswordDigest, PasswordError, DEFAULT_ITERATIONS, HASH_LENGTH,
    SALT_LENGTH,
};
pub use reset::{LogNotifier, PasswordResetManager, PasswordResetToken, ResetNotifier};
pub use session::{SessionManager, UserSession};
pub use token::{generate_token, TOKEN_BYTES};
pub use validation::ValidationError;
