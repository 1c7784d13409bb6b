//! Account directory: registration, login and profile maintenance.

use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::user::AccountUser;
use crate::auth::validation::{
    clamp_text, normalize_email, normalize_username, validate_email, validate_password,
    validate_username, MAX_BIO_LENGTH, MAX_STATUS_LENGTH,
};
use crate::auth::{Credentials, PasswordDigest, HASH_LENGTH, SALT_LENGTH};
use crate::db::{now, DbPool};
use crate::{Result, TavernError};

const USER_COLUMNS: &str = "id, username, email, password_salt, password_hash, \
     password_iterations, thread_count, post_count, is_admin, user_status, user_bio, \
     created_at, updated_at";

/// Directory of registered accounts.
pub struct AccountDirectory<'a> {
    pool: &'a DbPool,
    credentials: &'a Credentials,
}

impl<'a> AccountDirectory<'a> {
    /// Create a new directory over the given pool and password hasher.
    pub fn new(pool: &'a DbPool, credentials: &'a Credentials) -> Self {
        Self { pool, credentials }
    }

    /// Register a new account.
    ///
    /// The username is trimmed and the email trimmed and lowercased before
    /// validation. A username differing only in case from an existing one,
    /// or an already registered email, fails with `Conflict`.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<AccountUser> {
        let username = normalize_username(username);
        let email = normalize_email(email);

        validate_username(&username)?;
        validate_email(&email)?;
        validate_password(password)?;

        if self.get_by_username(&username).await?.is_some() {
            return Err(TavernError::Conflict("username already taken".to_string()));
        }
        if self.get_by_email(&email).await?.is_some() {
            return Err(TavernError::Conflict("email already registered".to_string()));
        }

        let digest = self.hash(&username, password)?;
        let at = now();

        // The unique indexes still decide a race between two registrations
        // that both passed the checks above.
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO account_user (username, email, password_salt, password_hash,
                                       password_iterations, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&username)
        .bind(&email)
        .bind(&digest.salt)
        .bind(&digest.hash)
        .bind(i64::from(digest.iterations))
        .bind(at)
        .bind(at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match TavernError::from(e) {
            TavernError::Conflict(_) => {
                TavernError::Conflict("username or email already registered".to_string())
            }
            other => other,
        })?;

        info!(username = %username, user_id = id, "New account registered");

        self.get_by_id(id)
            .await?
            .ok_or_else(|| TavernError::NotFound("user".to_string()))
    }

    /// Check a username and password.
    ///
    /// Returns `None` for an unknown user and for a wrong password alike. An
    /// unknown user still pays for one digest computation so the two cases
    /// take comparable time.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<AccountUser>> {
        let username = normalize_username(username);

        let Some(user) = self.get_by_username(&username).await? else {
            let _ = self.credentials.verify(
                &username,
                password,
                &[0u8; SALT_LENGTH],
                &[0u8; HASH_LENGTH],
                i64::from(self.credentials.iterations()),
            );
            debug!("Login failed");
            return Ok(None);
        };

        // The digest is seeded with the stored spelling, not the typed one.
        let ok = self.credentials.verify(
            &user.username,
            password,
            &user.password_salt,
            &user.password_hash,
            user.password_iterations,
        );

        if ok {
            info!(user_id = user.id, "Login succeeded");
            Ok(Some(user))
        } else {
            debug!("Login failed");
            Ok(None)
        }
    }

    /// Get an account by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<AccountUser>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM account_user WHERE id = ?");
        let user = sqlx::query_as::<_, AccountUser>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Get an account by username, ignoring case.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<AccountUser>> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM account_user WHERE username = ? COLLATE NOCASE");
        let user = sqlx::query_as::<_, AccountUser>(&sql)
            .bind(normalize_username(username))
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Get an account by email, ignoring case.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<AccountUser>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM account_user WHERE email = ?");
        let user = sqlx::query_as::<_, AccountUser>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Replace an account's password with a freshly salted digest.
    pub async fn set_password(&self, user: &AccountUser, new_password: &str) -> Result<AccountUser> {
        validate_password(new_password)?;
        let digest = self.hash(&user.username, new_password)?;

        let mut conn = self.pool.acquire().await?;
        if !write_password(&mut conn, user.id, &digest, now()).await? {
            return Err(TavernError::NotFound("user".to_string()));
        }
        drop(conn);

        info!(user_id = user.id, "Password changed");
        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| TavernError::NotFound("user".to_string()))
    }

    /// Update the status line and bio, truncating both to their limits.
    pub async fn update_profile(
        &self,
        user: &AccountUser,
        status: &str,
        bio: &str,
    ) -> Result<AccountUser> {
        let status = clamp_text(status.trim(), MAX_STATUS_LENGTH);
        let bio = clamp_text(bio, MAX_BIO_LENGTH);

        let result = sqlx::query(
            "UPDATE account_user SET user_status = ?, user_bio = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&status)
        .bind(&bio)
        .bind(now())
        .bind(user.id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TavernError::NotFound("user".to_string()));
        }

        debug!(user_id = user.id, "Profile updated");
        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| TavernError::NotFound("user".to_string()))
    }

    /// Grant or revoke administrator rights.
    pub async fn set_admin(&self, user_id: i64, is_admin: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE account_user SET is_admin = ?, updated_at = ? WHERE id = ?")
            .bind(is_admin)
            .bind(now())
            .bind(user_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() > 0 {
            info!(user_id, is_admin, "Administrator flag changed");
        }
        Ok(result.rows_affected() > 0)
    }

    /// Recompute every account's topic and post counts from authored rows.
    ///
    /// Only rows whose counters drifted are written. Returns how many were.
    pub async fn sync_counters(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE account_user
             SET thread_count = (SELECT COUNT(*) FROM topic WHERE topic.author_name = account_user.username),
                 post_count   = (SELECT COUNT(*) FROM post  WHERE post.author_name  = account_user.username)
             WHERE thread_count != (SELECT COUNT(*) FROM topic WHERE topic.author_name = account_user.username)
                OR post_count   != (SELECT COUNT(*) FROM post  WHERE post.author_name  = account_user.username)",
        )
        .execute(self.pool)
        .await?;

        let changed = result.rows_affected();
        if changed > 0 {
            info!(changed, "Account counters resynchronized");
        }
        Ok(changed)
    }

    /// Number of registered accounts.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account_user")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    fn hash(&self, username: &str, password: &str) -> Result<PasswordDigest> {
        self.credentials
            .hash(username, password)
            .map_err(|e| TavernError::Database(e.to_string()))
    }
}

/// Store a new digest for `user_id`. Returns false if no such account.
pub(crate) async fn write_password(
    conn: &mut SqliteConnection,
    user_id: i64,
    digest: &PasswordDigest,
    at: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE account_user
         SET password_salt = ?, password_hash = ?, password_iterations = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&digest.salt)
    .bind(&digest.hash)
    .bind(i64::from(digest.iterations))
    .bind(at)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Add to an author's counters inside the authoring transaction.
pub(crate) async fn bump_counters(
    conn: &mut SqliteConnection,
    username: &str,
    threads: i64,
    posts: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE account_user SET thread_count = thread_count + ?, post_count = post_count + ?
         WHERE username = ?",
    )
    .bind(threads)
    .bind(posts)
    .bind(username)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
