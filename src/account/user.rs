//! Account model for Tavern.

use std::fmt;

use serde::Serialize;

/// Registered account.
///
/// `thread_count` and `post_count` are derived from authored topics and
/// posts; see [`AccountDirectory::sync_counters`](super::AccountDirectory::sync_counters).
#[derive(Clone, Serialize, sqlx::FromRow)]
pub struct AccountUser {
    /// Unique user ID.
    pub id: i64,
    /// Login name, unique ignoring case, stored as entered (trimmed).
    pub username: String,
    /// Email address, unique, stored lowercased.
    pub email: String,
    /// Per-account random salt.
    #[serde(skip_serializing)]
    pub password_salt: Vec<u8>,
    /// Password digest.
    #[serde(skip_serializing)]
    pub password_hash: Vec<u8>,
    /// Iteration count the digest was derived with.
    #[serde(skip_serializing)]
    pub password_iterations: i64,
    /// Number of topics started.
    pub thread_count: i64,
    /// Number of posts written, first posts included.
    pub post_count: i64,
    /// Administrator flag.
    pub is_admin: bool,
    /// Short status line.
    pub user_status: String,
    /// Free-form biography, stored raw.
    pub user_bio: String,
    /// Registration timestamp.
    pub created_at: i64,
    /// Last password or profile change.
    pub updated_at: i64,
}

impl AccountUser {
    /// Whether `actor` may modify this account.
    pub fn can_be_modified_by(&self, actor: &AccountUser) -> bool {
        actor.id == self.id || actor.is_admin
    }
}

impl fmt::Debug for AccountUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountUser")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("thread_count", &self.thread_count)
            .field("post_count", &self.post_count)
            .field("is_admin", &self.is_admin)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: i64, is_admin: bool) -> AccountUser {
        AccountUser {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            password_salt: vec![1, 2, 3],
            password_hash: vec![9, 9, 9],
            password_iterations: 2,
            thread_count: 0,
            post_count: 0,
            is_admin,
            user_status: String::new(),
            user_bio: String::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_can_be_modified_by() {
        let owner = sample(1, false);
        let other = sample(2, false);
        let admin = sample(3, true);

        assert!(owner.can_be_modified_by(&owner));
        assert!(!owner.can_be_modified_by(&other));
        assert!(owner.can_be_modified_by(&admin));
    }

    #[test]
    fn test_serialization_skips_password_material() {
        let json = serde_json::to_value(sample(1, false)).unwrap();
        assert!(json.get("password_salt").is_none());
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password_iterations").is_none());
        assert_eq!(json["username"], "user1");
    }

    #[test]
    fn test_debug_skips_password_material() {
        let rendered = format!("{:?}", sample(1, false));
        assert!(rendered.contains("user1"));
        assert!(!rendered.contains("password"));
    }
}
