//! Login sessions for Tavern.
//!
//! A session is an opaque token bound to a user id. Its life cycle:
//!
//! - **Active**: `expires_at` is in the future; the token resolves.
//! - **Expired**: `expires_at` has passed but the row still exists. It is
//!   inert and deleted by the first lookup that sees it.
//! - **Absent**: the row is gone, via logout or lazy expiry.
//!
//! There is no background sweeper. [`SessionManager::purge_expired`] exists
//! for maintenance tasks that want one.

use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info};

use super::token::generate_token;
use crate::db::{now, DbPool};
use crate::Result;

/// Session row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserSession {
    /// Session ID.
    pub id: i64,
    /// Bound user ID.
    pub user_id: i64,
    /// Bearer token.
    #[serde(skip_serializing)]
    pub token: String,
    /// Expiration timestamp.
    pub expires_at: i64,
    /// Creation timestamp.
    pub created_at: i64,
}

impl UserSession {
    /// Whether the session has expired at `at`.
    pub fn is_expired_at(&self, at: i64) -> bool {
        self.expires_at <= at
    }
}

/// Database-backed session manager.
pub struct SessionManager<'a> {
    pool: &'a DbPool,
}

impl<'a> SessionManager<'a> {
    /// Create a new session manager over the given pool.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a session for `user_id` that expires `ttl` from now.
    ///
    /// Returns the bearer token. A non-positive `ttl` yields a session that is
    /// already expired.
    pub async fn create(&self, user_id: i64, ttl: Duration) -> Result<String> {
        let token = generate_token();
        let created_at = now();
        let expires_at = created_at.saturating_add(ttl.num_seconds());

        sqlx::query(
            "INSERT INTO user_session (user_id, token, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&token)
        .bind(expires_at)
        .bind(created_at)
        .execute(self.pool)
        .await?;

        info!(user_id, expires_at, "Session created");
        Ok(token)
    }

    /// Get a session row by token, expired or not.
    pub async fn get(&self, token: &str) -> Result<Option<UserSession>> {
        let session = sqlx::query_as::<_, UserSession>(
            "SELECT id, user_id, token, expires_at, created_at FROM user_session WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        Ok(session)
    }

    /// Resolve a token to its user id.
    ///
    /// An expired session is deleted and treated as absent.
    pub async fn resolve(&self, token: &str) -> Result<Option<i64>> {
        if token.is_empty() {
            return Ok(None);
        }

        let Some(session) = self.get(token).await? else {
            return Ok(None);
        };

        if session.is_expired_at(now()) {
            sqlx::query("DELETE FROM user_session WHERE id = ?")
                .bind(session.id)
                .execute(self.pool)
                .await?;
            debug!(user_id = session.user_id, "Expired session removed on lookup");
            return Ok(None);
        }

        Ok(Some(session.user_id))
    }

    /// Delete the session for `token`. Missing tokens are ignored.
    pub async fn clear(&self, token: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM user_session WHERE token = ?")
            .bind(token)
            .execute(self.pool)
            .await?;
        if result.rows_affected() > 0 {
            info!("Session cleared");
        }
        Ok(())
    }

    /// Delete every session of a user. Returns the number removed.
    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_session WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        info!(user_id, revoked = result.rows_affected(), "Sessions revoked");
        Ok(result.rows_affected())
    }

    /// Delete every expired session. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_session WHERE expires_at <= ?")
            .bind(now())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of session rows for a user, expired ones included.
    pub async fn count_for_user(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_session WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
