//! Database schema and migrations for Tavern.
//!
//! Migrations are applied in order and recorded in `schema_version`. A
//! migration is never edited once released; schema changes are appended.

/// Database migrations.
///
/// Each migration is a SQL script executed inside its own transaction.
/// Timestamps are UNIX seconds.
pub const MIGRATIONS: &[&str] = &[
    // v1: Content tables
    r#"
CREATE TABLE board (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    section     TEXT NOT NULL,
    slug        TEXT NOT NULL,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at  INTEGER NOT NULL
);

CREATE UNIQUE INDEX idx_board_slug ON board(slug);
CREATE INDEX idx_board_section ON board(section);

CREATE TABLE topic (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    board_id    INTEGER NOT NULL REFERENCES board(id),
    title       TEXT NOT NULL,
    author_name TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);

CREATE INDEX idx_topic_board_id ON topic(board_id);
CREATE INDEX idx_topic_updated_at ON topic(updated_at);
CREATE INDEX idx_topic_author_name ON topic(author_name);

CREATE TABLE post (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    topic_id    INTEGER NOT NULL REFERENCES topic(id),
    author_name TEXT NOT NULL,
    body        TEXT NOT NULL,
    created_at  INTEGER NOT NULL
);

CREATE INDEX idx_post_topic_id ON post(topic_id);
CREATE INDEX idx_post_author_name ON post(author_name);
"#,
    // v2: Accounts
    r#"
CREATE TABLE account_user (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    username            TEXT NOT NULL,
    email               TEXT NOT NULL,           -- stored lowercased
    password_salt       BLOB NOT NULL,
    password_hash       BLOB NOT NULL,
    password_iterations INTEGER NOT NULL,
    thread_count        INTEGER NOT NULL DEFAULT 0,
    post_count          INTEGER NOT NULL DEFAULT 0,
    is_admin            INTEGER NOT NULL DEFAULT 0,
    created_at          INTEGER NOT NULL,
    updated_at          INTEGER NOT NULL
);

CREATE INDEX idx_account_user_username ON account_user(username);
CREATE UNIQUE INDEX idx_account_user_email ON account_user(email);
"#,
    // v3: Login sessions
    r#"
CREATE TABLE user_session (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES account_user(id),
    token       TEXT NOT NULL,
    expires_at  INTEGER NOT NULL,
    created_at  INTEGER NOT NULL
);

CREATE UNIQUE INDEX idx_user_session_token ON user_session(token);
CREATE INDEX idx_user_session_user_id ON user_session(user_id);
CREATE INDEX idx_user_session_expires_at ON user_session(expires_at);
"#,
    // v4: Password reset tokens (used_at = 0 while unused)
    r#"
CREATE TABLE password_reset_token (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES account_user(id),
    token       TEXT NOT NULL,
    expires_at  INTEGER NOT NULL,
    used_at     INTEGER NOT NULL DEFAULT 0,
    created_at  INTEGER NOT NULL
);

CREATE UNIQUE INDEX idx_password_reset_token_token ON password_reset_token(token);
CREATE INDEX idx_password_reset_token_user_id ON password_reset_token(user_id);
CREATE INDEX idx_password_reset_token_expires_at ON password_reset_token(expires_at);
"#,
    // v5: Profile fields
    r#"
ALTER TABLE account_user ADD COLUMN user_status TEXT NOT NULL DEFAULT '';
ALTER TABLE account_user ADD COLUMN user_bio TEXT NOT NULL DEFAULT '';
"#,
    // v6: Case-insensitive username uniqueness enforced by the database
    r#"
DROP INDEX IF EXISTS idx_account_user_username;
CREATE UNIQUE INDEX idx_account_user_username_nocase ON account_user(username COLLATE NOCASE);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_migrations_are_valid_sql() {
        for migration in MIGRATIONS {
            assert!(!migration.trim().is_empty());
            assert!(
                migration.contains("CREATE TABLE")
                    || migration.contains("ALTER TABLE")
                    || migration.contains("CREATE UNIQUE INDEX")
            );
        }
    }

    #[test]
    fn test_migrations_never_drop_tables() {
        for migration in MIGRATIONS {
            assert!(!migration.contains("DROP TABLE"));
            assert!(!migration.contains("DELETE FROM"));
        }
    }

    #[test]
    fn test_content_migration_contains_tables() {
        let content = MIGRATIONS[0];
        assert!(content.contains("CREATE TABLE board"));
        assert!(content.contains("CREATE TABLE topic"));
        assert!(content.contains("CREATE TABLE post"));
    }

    #[test]
    fn test_reset_token_migration_has_unused_sentinel() {
        let reset = MIGRATIONS[3];
        assert!(reset.contains("CREATE TABLE password_reset_token"));
        assert!(reset.contains("used_at     INTEGER NOT NULL DEFAULT 0"));
    }
}
