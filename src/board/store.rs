//! Content store for boards, topics and posts.
//!
//! Multi-row writes run in one transaction that opens with a write
//! statement, so SQLite takes the write lock up front instead of upgrading a
//! read snapshot mid-transaction.

use tracing::{debug, info};

use super::pagination::{Page, PageRequest};
use super::types::{Board, BoardSummary, LastPostSummary, Post, Topic};
use crate::account::bump_counters;
use crate::auth::validation::{validate_body, validate_slug, validate_title};
use crate::db::{now, DbPool};
use crate::{Result, TavernError};

const TOPIC_COLUMNS: &str = "id, board_id, title, author_name, created_at, updated_at";
const POST_COLUMNS: &str = "id, topic_id, author_name, body, created_at";

/// Store for board content.
pub struct ContentStore<'a> {
    pool: &'a DbPool,
}

impl<'a> ContentStore<'a> {
    /// Create a new store over the given pool.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// All boards, ordered by section and then creation order.
    pub async fn list_boards(&self) -> Result<Vec<Board>> {
        let boards = sqlx::query_as::<_, Board>(
            "SELECT id, section, slug, title, description, created_at
             FROM board ORDER BY section, id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(boards)
    }

    /// Create a board. A duplicate slug fails with `Conflict`.
    pub async fn create_board(
        &self,
        section: &str,
        slug: &str,
        title: &str,
        description: &str,
    ) -> Result<Board> {
        validate_slug(slug)?;
        validate_title(title)?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO board (section, slug, title, description, created_at)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(section.trim())
        .bind(slug)
        .bind(title.trim())
        .bind(description)
        .bind(now())
        .fetch_one(self.pool)
        .await
        .map_err(|e| match TavernError::from(e) {
            TavernError::Conflict(_) => {
                TavernError::Conflict(format!("board slug '{slug}' already exists"))
            }
            other => other,
        })?;

        info!(board_id = id, slug, "Board created");
        self.get_board(id)
            .await?
            .ok_or_else(|| TavernError::NotFound("board".to_string()))
    }

    /// Get a board by ID.
    pub async fn get_board(&self, id: i64) -> Result<Option<Board>> {
        let board = sqlx::query_as::<_, Board>(
            "SELECT id, section, slug, title, description, created_at FROM board WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(board)
    }

    /// Get a board by slug.
    pub async fn get_board_by_slug(&self, slug: &str) -> Result<Option<Board>> {
        let board = sqlx::query_as::<_, Board>(
            "SELECT id, section, slug, title, description, created_at FROM board WHERE slug = ?",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(board)
    }

    /// Get a topic by ID.
    pub async fn get_topic(&self, id: i64) -> Result<Option<Topic>> {
        let sql = format!("SELECT {TOPIC_COLUMNS} FROM topic WHERE id = ?");
        let topic = sqlx::query_as::<_, Topic>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(topic)
    }

    /// Get a post by ID.
    pub async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM post WHERE id = ?");
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(post)
    }

    /// Create a topic together with its first post.
    ///
    /// Both rows and the author's counters are written in one transaction.
    /// Fails with `NotFound` if the board does not exist.
    pub async fn create_topic_with_first_post(
        &self,
        board_id: i64,
        title: &str,
        author: &str,
        body: &str,
        at: i64,
    ) -> Result<Topic> {
        validate_title(title)?;
        validate_body(body)?;
        let title = title.trim();

        let mut tx = self.pool.begin().await?;

        let topic_id: Option<i64> = sqlx::query_scalar(
            "INSERT INTO topic (board_id, title, author_name, created_at, updated_at)
             SELECT ?, ?, ?, ?, ? WHERE EXISTS (SELECT 1 FROM board WHERE id = ?)
             RETURNING id",
        )
        .bind(board_id)
        .bind(title)
        .bind(author)
        .bind(at)
        .bind(at)
        .bind(board_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(topic_id) = topic_id else {
            return Err(TavernError::NotFound("board".to_string()));
        };

        sqlx::query("INSERT INTO post (topic_id, author_name, body, created_at) VALUES (?, ?, ?, ?)")
            .bind(topic_id)
            .bind(author)
            .bind(body)
            .bind(at)
            .execute(&mut *tx)
            .await?;

        bump_counters(&mut tx, author, 1, 1).await?;

        let sql = format!("SELECT {TOPIC_COLUMNS} FROM topic WHERE id = ?");
        let topic = sqlx::query_as::<_, Topic>(&sql)
            .bind(topic_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(topic_id, board_id, author, "Topic created");
        Ok(topic)
    }

    /// Reply to a topic.
    ///
    /// Returns `None`, writing nothing, if the topic does not exist.
    /// Otherwise the post is inserted and the topic bumped in one transaction.
    pub async fn create_reply(
        &self,
        topic_id: i64,
        author: &str,
        body: &str,
        at: i64,
    ) -> Result<Option<Post>> {
        validate_body(body)?;

        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query("UPDATE topic SET updated_at = MAX(created_at, ?) WHERE id = ?")
            .bind(at)
            .bind(topic_id)
            .execute(&mut *tx)
            .await?;

        if bumped.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(topic_id, "Reply to missing topic");
            return Ok(None);
        }

        let sql = format!(
            "INSERT INTO post (topic_id, author_name, body, created_at) VALUES (?, ?, ?, ?)
             RETURNING {POST_COLUMNS}"
        );
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(topic_id)
            .bind(author)
            .bind(body)
            .bind(at)
            .fetch_one(&mut *tx)
            .await?;

        bump_counters(&mut tx, author, 0, 1).await?;

        tx.commit().await?;

        info!(post_id = post.id, topic_id, author, "Reply posted");
        Ok(Some(post))
    }

    /// Topics of a board, most recently updated first.
    pub async fn list_topics_by_board(
        &self,
        board_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<Page<Topic>> {
        let request = PageRequest::new(page, page_size);
        let sql = format!(
            "SELECT {TOPIC_COLUMNS} FROM topic WHERE board_id = ?
             ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let topics = sqlx::query_as::<_, Topic>(&sql)
            .bind(board_id)
            .bind(request.page_size)
            .bind(request.offset())
            .fetch_all(self.pool)
            .await?;
        let total = self.count_topics_by_board(board_id).await?;
        Ok(Page::new(topics, total, request))
    }

    /// Posts of a topic in chronological order, thread starter first.
    pub async fn list_posts_by_topic(
        &self,
        topic_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<Page<Post>> {
        let request = PageRequest::new(page, page_size);
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM post WHERE topic_id = ?
             ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?"
        );
        let posts = sqlx::query_as::<_, Post>(&sql)
            .bind(topic_id)
            .bind(request.page_size)
            .bind(request.offset())
            .fetch_all(self.pool)
            .await?;
        let total = self.count_posts_by_topic(topic_id).await?;
        Ok(Page::new(posts, total, request))
    }

    /// Count topics in a board.
    pub async fn count_topics_by_board(&self, board_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topic WHERE board_id = ?")
            .bind(board_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Count posts across all topics of a board.
    pub async fn count_posts_by_board(&self, board_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM post JOIN topic ON topic.id = post.topic_id
             WHERE topic.board_id = ?",
        )
        .bind(board_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Count posts in a topic.
    pub async fn count_posts_by_topic(&self, topic_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post WHERE topic_id = ?")
            .bind(topic_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Latest post on a board, if any.
    pub async fn get_last_post_summary(&self, board_id: i64) -> Result<Option<LastPostSummary>> {
        let summary = sqlx::query_as::<_, LastPostSummary>(
            "SELECT post.id AS post_id, topic.id AS topic_id, topic.title AS topic_title,
                    post.author_name, post.created_at
             FROM post JOIN topic ON topic.id = post.topic_id
             WHERE topic.board_id = ?
             ORDER BY post.created_at DESC, post.id DESC
             LIMIT 1",
        )
        .bind(board_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(summary)
    }

    /// Every board with its counts, in board listing order.
    pub async fn list_board_summaries(&self) -> Result<Vec<BoardSummary>> {
        let boards = self.list_boards().await?;
        let mut summaries = Vec::with_capacity(boards.len());
        for board in boards {
            let topic_count = self.count_topics_by_board(board.id).await?;
            let post_count = self.count_posts_by_board(board.id).await?;
            let last_post = self.get_last_post_summary(board.id).await?;
            summaries.push(BoardSummary {
                board,
                topic_count,
                post_count,
                last_post,
            });
        }
        Ok(summaries)
    }
}
