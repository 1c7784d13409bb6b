//! Error types for Tavern.

use thiserror::Error;
use tracing::error;

/// Common error type for Tavern.
///
/// `NotFound`, `Validation`, `Conflict`, `Unauthorized` and `Forbidden` are
/// expected outcomes the caller maps to a response. The remaining variants are
/// internal failures whose detail must stay on the server side.
#[derive(Error, Debug)]
pub enum TavernError {
    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Uniqueness conflict (duplicate username, email, slug).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A signed-in session is required.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Acting on another account's resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Storage or connection failure.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TavernError {
    /// Whether this is an internal failure rather than an expected outcome.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            TavernError::Database(_) | TavernError::Io(_) | TavernError::Config(_)
        )
    }

    /// HTTP status code the boundary should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            TavernError::NotFound(_) => 404,
            TavernError::Validation(_) => 400,
            TavernError::Conflict(_) => 409,
            TavernError::Unauthorized(_) => 401,
            TavernError::Forbidden(_) => 403,
            TavernError::Database(_) | TavernError::Io(_) | TavernError::Config(_) => 500,
        }
    }

    /// Message that is safe to show to a client.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    /// Log the original cause of an internal failure.
    ///
    /// Returns the client-safe message so the boundary can do both in one call.
    pub fn log_internal(&self) -> String {
        if self.is_internal() {
            error!(error = %self, "internal failure");
        }
        self.public_message()
    }
}

impl From<sqlx::Error> for TavernError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return TavernError::Conflict(db_err.message().to_string());
            }
        }
        TavernError::Database(e.to_string())
    }
}

/// Result type alias for Tavern operations.
pub type Result<T> = std::result::Result<T, TavernError>;
