//! Shared helpers for Tavern integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tavern::{AccountUser, Board, Database, Forum, ForumSettings, ResetNotifier};
use tempfile::TempDir;

/// Settings with a fixed secret and the cheapest hash parameters.
pub fn test_settings() -> ForumSettings {
    let mut settings = ForumSettings::new("integration-secret");
    settings.credentials = settings.credentials.with_iterations(1);
    settings
}

/// Forum over an isolated in-memory database.
pub async fn memory_forum() -> Forum {
    let db = Database::open_in_memory().await.unwrap();
    Forum::new(db, test_settings())
}

/// Forum over a file-backed pool, shareable across tasks.
///
/// Keep the returned directory alive for the duration of the test.
pub async fn file_forum(pool_size: u32) -> (TempDir, Arc<Forum>) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("tavern.db"), pool_size)
        .await
        .unwrap();
    (dir, Arc::new(Forum::new(db, test_settings())))
}

/// Create the "lounge" board.
pub async fn create_lounge(forum: &Forum) -> Board {
    forum
        .content()
        .create_board("General", "lounge", "Lounge", "Talk about anything")
        .await
        .unwrap()
}

/// Notifier that keeps delivered tokens in memory.
#[derive(Default)]
pub struct CapturingNotifier {
    sent: Mutex<Vec<(i64, String)>>,
}

impl CapturingNotifier {
    pub fn last_token(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, t)| t.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl ResetNotifier for CapturingNotifier {
    fn deliver(&self, user: &AccountUser, token: &str) {
        self.sent.lock().unwrap().push((user.id, token.to_string()));
    }
}
