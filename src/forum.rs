//! Forum context.
//!
//! [`Forum`] owns the database and the settings every component needs and
//! hands out borrowed components. The HTTP layer holds one `Forum` and
//! passes the raw session cookie value into each call; authorship is always
//! taken from the session, never from form fields.

use std::sync::Arc;

use axum_extra::extract::cookie::CookieJar;
use chrono::Duration;
use tracing::{debug, info, warn};

use crate::account::{write_password, AccountDirectory, AccountUser};
use crate::auth::reset::consume_in;
use crate::auth::validation::validate_password_pair;
use crate::auth::{
    CookieSettings, Credentials, LogNotifier, PasswordResetManager, ResetNotifier, SessionManager,
};
use crate::board::{Board, ContentStore, Page, Post, Topic};
use crate::config::{Config, DEFAULT_RESET_TTL_SECS, DEFAULT_SESSION_TTL_SECS};
use crate::db::{now, Database};
use crate::{Result, TavernError};

/// Settings shared by the forum's components.
#[derive(Debug, Clone)]
pub struct ForumSettings {
    /// Password hasher bound to the server secret.
    pub credentials: Credentials,
    /// Lifetime of a login session.
    pub session_ttl: Duration,
    /// Lifetime of a password reset token.
    pub reset_ttl: Duration,
    /// Session cookie naming and attributes.
    pub cookie: CookieSettings,
    /// Topics per board page.
    pub topics_per_page: i64,
    /// Posts per topic page.
    pub posts_per_page: i64,
}

impl ForumSettings {
    /// Default settings around the given server secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(secret),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            reset_ttl: Duration::seconds(DEFAULT_RESET_TTL_SECS),
            cookie: CookieSettings::new("tavern_session"),
            topics_per_page: 20,
            posts_per_page: 20,
        }
    }

    /// Build settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        let auth = &config.auth;
        if auth.uses_dev_secret() {
            warn!("No server secret configured; using the development secret");
        }
        Self {
            credentials: Credentials::new(auth.effective_secret())
                .with_iterations(auth.password_iterations),
            session_ttl: Duration::try_seconds(auth.session_ttl_secs)
                .unwrap_or_else(|| Duration::seconds(DEFAULT_SESSION_TTL_SECS)),
            reset_ttl: Duration::try_seconds(auth.reset_ttl_secs)
                .unwrap_or_else(|| Duration::seconds(DEFAULT_RESET_TTL_SECS)),
            cookie: CookieSettings::new(auth.cookie_name.clone()).secure(auth.cookie_secure),
            topics_per_page: config.board.topics_per_page,
            posts_per_page: config.board.posts_per_page,
        }
    }
}

/// Composition root for the forum backend.
pub struct Forum {
    db: Database,
    settings: ForumSettings,
    notifier: Arc<dyn ResetNotifier>,
}

impl Forum {
    /// Create a forum over an opened database.
    ///
    /// Reset links go to the log until [`Forum::with_notifier`] installs
    /// another sink.
    pub fn new(db: Database, settings: ForumSettings) -> Self {
        Self {
            db,
            settings,
            notifier: Arc::new(LogNotifier::new("")),
        }
    }

    /// Replace the password reset delivery sink.
    pub fn with_notifier(mut self, notifier: Arc<dyn ResetNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Shared settings.
    pub fn settings(&self) -> &ForumSettings {
        &self.settings
    }

    /// Account directory over the forum's pool.
    pub fn accounts(&self) -> AccountDirectory<'_> {
        AccountDirectory::new(self.db.pool(), &self.settings.credentials)
    }

    /// Content store over the forum's pool.
    pub fn content(&self) -> ContentStore<'_> {
        ContentStore::new(self.db.pool())
    }

    /// Session manager over the forum's pool.
    pub fn sessions(&self) -> SessionManager<'_> {
        SessionManager::new(self.db.pool())
    }

    /// Reset token manager over the forum's pool.
    pub fn resets(&self) -> PasswordResetManager<'_> {
        PasswordResetManager::new(self.db.pool())
    }

    /// Session token carried by a request's cookies.
    pub fn session_token(&self, jar: &CookieJar) -> Option<String> {
        self.settings.cookie.token_from_jar(jar)
    }

    /// Register an account and log it in. Returns the user and session token.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
        password_repeat: &str,
    ) -> Result<(AccountUser, String)> {
        validate_password_pair(password, password_repeat)?;
        let user = self.accounts().register(username, email, password).await?;
        let token = self.sessions().create(user.id, self.settings.session_ttl).await?;
        Ok((user, token))
    }

    /// Log in. Unknown user and wrong password fail identically.
    pub async fn log_in(&self, username: &str, password: &str) -> Result<(AccountUser, String)> {
        let Some(user) = self.accounts().authenticate(username, password).await? else {
            return Err(TavernError::Unauthorized(
                "invalid username or password".to_string(),
            ));
        };
        let token = self.sessions().create(user.id, self.settings.session_ttl).await?;
        Ok((user, token))
    }

    /// Log out. Missing or already cleared sessions are fine.
    pub async fn log_out(&self, session: Option<&str>) -> Result<()> {
        if let Some(token) = session {
            self.sessions().clear(token).await?;
        }
        Ok(())
    }

    /// The user a session token belongs to, if it is live.
    pub async fn current_user(&self, session: Option<&str>) -> Result<Option<AccountUser>> {
        let Some(token) = session else {
            return Ok(None);
        };
        let Some(user_id) = self.sessions().resolve(token).await? else {
            return Ok(None);
        };
        self.accounts().get_by_id(user_id).await
    }

    /// Like [`Forum::current_user`], failing with `Unauthorized` when anonymous.
    pub async fn require_user(&self, session: Option<&str>) -> Result<AccountUser> {
        self.current_user(session)
            .await?
            .ok_or_else(|| TavernError::Unauthorized("login required".to_string()))
    }

    /// A board and one page of its topics.
    pub async fn board_page(&self, slug: &str, page: i64) -> Result<(Board, Page<Topic>)> {
        let content = self.content();
        let board = content
            .get_board_by_slug(slug)
            .await?
            .ok_or_else(|| TavernError::NotFound("board".to_string()))?;
        let topics = content
            .list_topics_by_board(board.id, page, self.settings.topics_per_page)
            .await?;
        Ok((board, topics))
    }

    /// A topic and one page of its posts.
    pub async fn topic_page(&self, topic_id: i64, page: i64) -> Result<(Topic, Page<Post>)> {
        let content = self.content();
        let topic = content
            .get_topic(topic_id)
            .await?
            .ok_or_else(|| TavernError::NotFound("topic".to_string()))?;
        let posts = content
            .list_posts_by_topic(topic.id, page, self.settings.posts_per_page)
            .await?;
        Ok((topic, posts))
    }

    /// Start a topic as the session's user.
    pub async fn start_topic(
        &self,
        session: Option<&str>,
        board_id: i64,
        title: &str,
        body: &str,
    ) -> Result<Topic> {
        let user = self.require_user(session).await?;
        self.content()
            .create_topic_with_first_post(board_id, title, &user.username, body, now())
            .await
    }

    /// Reply to a topic as the session's user.
    pub async fn reply(&self, session: Option<&str>, topic_id: i64, body: &str) -> Result<Post> {
        let user = self.require_user(session).await?;
        self.content()
            .create_reply(topic_id, &user.username, body, now())
            .await?
            .ok_or_else(|| TavernError::NotFound("topic".to_string()))
    }

    /// Change the session user's password.
    ///
    /// Every existing session of the user is revoked; the returned token is
    /// a fresh session for the caller.
    pub async fn change_password(
        &self,
        session: Option<&str>,
        current_password: &str,
        new_password: &str,
        new_password_repeat: &str,
    ) -> Result<String> {
        let user = self.require_user(session).await?;
        validate_password_pair(new_password, new_password_repeat)?;

        let accounts = self.accounts();
        if accounts
            .authenticate(&user.username, current_password)
            .await?
            .is_none()
        {
            return Err(TavernError::Unauthorized(
                "current password is incorrect".to_string(),
            ));
        }

        let user = accounts.set_password(&user, new_password).await?;
        let sessions = self.sessions();
        sessions.revoke_all_for_user(user.id).await?;
        sessions.create(user.id, self.settings.session_ttl).await
    }

    /// Mint a reset token for the account with this email and deliver it.
    ///
    /// Succeeds silently for unknown addresses.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let Some(user) = self.accounts().get_by_email(email).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(());
        };
        let token = self.resets().create(user.id, self.settings.reset_ttl).await?;
        self.notifier.deliver(&user, &token);
        Ok(())
    }

    /// Set a new password with a reset token.
    ///
    /// The new digest is computed before any lock is taken. The token is
    /// then consumed and the password written in one short transaction.
    /// Unknown, used and expired tokens all fail with the same `NotFound`.
    /// All sessions of the account are revoked afterwards.
    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
        new_password_repeat: &str,
    ) -> Result<AccountUser> {
        validate_password_pair(new_password, new_password_repeat)?;
        let invalid = || TavernError::NotFound("reset token".to_string());

        let Some(pending) = self.resets().get(reset_token).await? else {
            return Err(invalid());
        };
        if pending.is_used() || pending.expires_at <= now() {
            return Err(invalid());
        }
        let Some(user) = self.accounts().get_by_id(pending.user_id).await? else {
            return Err(invalid());
        };

        let digest = self
            .settings
            .credentials
            .hash(&user.username, new_password)
            .map_err(|e| TavernError::Database(e.to_string()))?;

        let at = now();
        let mut tx = self.db.begin().await?;

        // The read above was only a hint; this update decides who wins.
        match consume_in(&mut tx, reset_token, at).await? {
            Some(user_id) if user_id == user.id => {}
            _ => {
                tx.rollback().await?;
                return Err(invalid());
            }
        }
        if !write_password(&mut tx, user.id, &digest, at).await? {
            tx.rollback().await?;
            return Err(invalid());
        }
        tx.commit().await?;

        let revoked = self.sessions().revoke_all_for_user(user.id).await?;
        info!(user_id = user.id, revoked, "Password reset completed");

        self.accounts()
            .get_by_id(user.id)
            .await?
            .ok_or_else(|| TavernError::NotFound("user".to_string()))
    }

    /// Update an account's status and bio. Owners and admins only.
    pub async fn update_profile(
        &self,
        session: Option<&str>,
        user_id: i64,
        status: &str,
        bio: &str,
    ) -> Result<AccountUser> {
        let actor = self.require_user(session).await?;
        let accounts = self.accounts();
        let target = accounts
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| TavernError::NotFound("user".to_string()))?;

        if !target.can_be_modified_by(&actor) {
            return Err(TavernError::Forbidden(
                "cannot modify another user's profile".to_string(),
            ));
        }

        accounts.update_profile(&target, status, bio).await
    }

    /// Drain the connection pool.
    pub async fn shutdown(self) {
        self.db.close().await;
        info!("Forum shut down");
    }
}
