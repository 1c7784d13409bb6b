//! Single-use password reset tokens.
//!
//! A token authorizes one password change: it must exist, be unused
//! (`used_at = 0`) and be unexpired. Consumption is a single conditional
//! `UPDATE`, so of any number of concurrent attempts exactly one sees a
//! changed row. Unknown, used and expired tokens are indistinguishable to
//! the caller.
//!
//! Delivering the token to its owner is someone else's job; see
//! [`ResetNotifier`].

use chrono::Duration;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;

use super::token::generate_token;
use crate::account::AccountUser;
use crate::db::{now, DbPool};
use crate::Result;

/// `used_at` value of a token that has not been consumed.
pub const UNUSED: i64 = 0;

/// Password reset token row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PasswordResetToken {
    /// Token ID.
    pub id: i64,
    /// Owning user ID.
    pub user_id: i64,
    /// Token string.
    #[serde(skip_serializing)]
    pub token: String,
    /// Expiration timestamp.
    pub expires_at: i64,
    /// When the token was consumed, or [`UNUSED`].
    pub used_at: i64,
    /// Creation timestamp.
    pub created_at: i64,
}

impl PasswordResetToken {
    /// Check if the token has been used.
    pub fn is_used(&self) -> bool {
        self.used_at != UNUSED
    }
}

/// Sink that delivers a freshly minted reset token to its owner.
pub trait ResetNotifier: Send + Sync {
    /// Deliver `token` to `user`.
    fn deliver(&self, user: &AccountUser, token: &str);
}

/// Notifier that writes the reset link to the log.
///
/// Suitable for development and single-operator installs; the log then
/// contains live credentials and must be protected accordingly.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    base_url: String,
}

impl LogNotifier {
    /// Create a notifier that renders links under `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Render the reset link for a token.
    pub fn link(&self, token: &str) -> String {
        format!(
            "{}/reset-password?token={}",
            self.base_url.trim_end_matches('/'),
            token
        )
    }
}

impl ResetNotifier for LogNotifier {
    fn deliver(&self, user: &AccountUser, token: &str) {
        info!(
            user_id = user.id,
            email = %user.email,
            link = %self.link(token),
            "Password reset requested"
        );
    }
}

/// Manager for password reset tokens.
pub struct PasswordResetManager<'a> {
    pool: &'a DbPool,
}

impl<'a> PasswordResetManager<'a> {
    /// Create a new manager over the given pool.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Mint a token for `user_id` valid for `ttl`.
    pub async fn create(&self, user_id: i64, ttl: Duration) -> Result<String> {
        let token = generate_token();
        let created_at = now();
        let expires_at = created_at.saturating_add(ttl.num_seconds());

        sqlx::query(
            "INSERT INTO password_reset_token (user_id, token, expires_at, used_at, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&token)
        .bind(expires_at)
        .bind(UNUSED)
        .bind(created_at)
        .execute(self.pool)
        .await?;

        info!(user_id, expires_at, "Password reset token created");
        Ok(token)
    }

    /// Get a token row by its string, in whatever state.
    pub async fn get(&self, token: &str) -> Result<Option<PasswordResetToken>> {
        let row = sqlx::query_as::<_, PasswordResetToken>(
            "SELECT id, user_id, token, expires_at, used_at, created_at
             FROM password_reset_token WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Consume a token, returning the bound user id on the first valid call.
    pub async fn consume(&self, token: &str) -> Result<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        consume_in(&mut conn, token, now()).await
    }

    /// Delete used or expired tokens. Returns the number removed.
    pub async fn purge_stale(&self) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM password_reset_token WHERE used_at != ? OR expires_at <= ?")
                .bind(UNUSED)
                .bind(now())
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

/// Consume a token on an existing connection or open transaction.
///
/// The update is conditioned on the stored unused state, which is what makes
/// the token single-use under concurrency.
pub async fn consume_in(conn: &mut SqliteConnection, token: &str, at: i64) -> Result<Option<i64>> {
    if token.is_empty() {
        return Ok(None);
    }

    let user_id: Option<i64> = sqlx::query_scalar(
        "UPDATE password_reset_token
         SET used_at = ?
         WHERE token = ? AND used_at = ? AND expires_at > ?
         RETURNING user_id",
    )
    .bind(at.max(1))
    .bind(token)
    .bind(UNUSED)
    .bind(at)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(user_id) = user_id {
        info!(user_id, "Password reset token consumed");
    }
    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_db() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO account_user (username, email, password_salt, password_hash,
                                       password_iterations, created_at, updated_at)
             VALUES ('nova', 'nova@example.com', x'00', x'00', 1, 0, 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_create_token_is_unused() {
        let db = setup_db().await;
        let resets = PasswordResetManager::new(db.pool());

        let token = resets.create(1, Duration::hours(1)).await.unwrap();
        let row = resets.get(&token).await.unwrap().unwrap();
        assert_eq!(row.user_id, 1);
        assert_eq!(row.used_at, UNUSED);
        assert!(!row.is_used());
    }

    #[tokio::test]
    async fn test_consume_once() {
        let db = setup_db().await;
        let resets = PasswordResetManager::new(db.pool());

        let token = resets.create(1, Duration::hours(1)).await.unwrap();
        assert_eq!(resets.consume(&token).await.unwrap(), Some(1));
        assert_eq!(resets.consume(&token).await.unwrap(), None);

        let row = resets.get(&token).await.unwrap().unwrap();
        assert!(row.is_used());
    }

    #[tokio::test]
    async fn test_consume_expired_token() {
        let db = setup_db().await;
        let resets = PasswordResetManager::new(db.pool());

        let token = resets.create(1, Duration::seconds(-1)).await.unwrap();
        assert_eq!(resets.consume(&token).await.unwrap(), None);

        let row = resets.get(&token).await.unwrap().unwrap();
        assert!(!row.is_used());
    }

    #[tokio::test]
    async fn test_consume_unknown_token() {
        let db = setup_db().await;
        let resets = PasswordResetManager::new(db.pool());

        assert_eq!(resets.consume("never-issued").await.unwrap(), None);
        assert_eq!(resets.consume("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_consume_in_rolled_back_transaction_keeps_token() {
        let db = setup_db().await;
        let resets = PasswordResetManager::new(db.pool());
        let token = resets.create(1, Duration::hours(1)).await.unwrap();

        {
            let mut tx = db.begin().await.unwrap();
            assert_eq!(consume_in(&mut tx, &token, now()).await.unwrap(), Some(1));
            tx.rollback().await.unwrap();
        }

        assert_eq!(resets.consume(&token).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let db = setup_db().await;
        let resets = PasswordResetManager::new(db.pool());

        resets.create(1, Duration::seconds(-1)).await.unwrap();
        let used = resets.create(1, Duration::hours(1)).await.unwrap();
        resets.consume(&used).await.unwrap();
        let live = resets.create(1, Duration::hours(1)).await.unwrap();

        assert_eq!(resets.purge_stale().await.unwrap(), 2);
        assert_eq!(resets.consume(&live).await.unwrap(), Some(1));
    }

    #[test]
    fn test_log_notifier_link() {
        let notifier = LogNotifier::new("https://board.example/");
        assert_eq!(
            notifier.link("abc"),
            "https://board.example/reset-password?token=abc"
        );
    }
}
