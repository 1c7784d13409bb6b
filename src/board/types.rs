//! Content records for Tavern boards.

use serde::Serialize;

/// Board grouping topics, ordered for display by section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Board {
    /// Unique board ID.
    pub id: i64,
    /// Display section the board is listed under.
    pub section: String,
    /// URL identifier (unique, immutable).
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Board description.
    pub description: String,
    /// Creation timestamp.
    pub created_at: i64,
}

/// Topic within a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Topic {
    /// Unique topic ID.
    pub id: i64,
    /// Board the topic belongs to.
    pub board_id: i64,
    /// Topic title.
    pub title: String,
    /// Username of the topic starter.
    pub author_name: String,
    /// Creation timestamp.
    pub created_at: i64,
    /// Time of the latest post.
    pub updated_at: i64,
}

/// Post within a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Post {
    /// Unique post ID.
    pub id: i64,
    /// Topic the post belongs to.
    pub topic_id: i64,
    /// Username of the author.
    pub author_name: String,
    /// Raw body text.
    pub body: String,
    /// Creation timestamp.
    pub created_at: i64,
}

/// Latest post on a board, for index pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LastPostSummary {
    /// The post itself.
    pub post_id: i64,
    /// Topic the post belongs to.
    pub topic_id: i64,
    /// Title of that topic, for the link text.
    pub topic_title: String,
    /// Username of the author as it was stored on the post.
    pub author_name: String,
    /// UNIX timestamp of the post.
    pub created_at: i64,
}

/// Board with its aggregate counts.
#[derive(Debug, Clone, Serialize)]
pub struct BoardSummary {
    pub board: Board,
    /// Topics on the board.
    pub topic_count: i64,
    /// Posts across all of the board's topics, first posts included.
    pub post_count: i64,
    /// Most recent post, or `None` for an empty board.
    pub last_post: Option<LastPostSummary>,
}
