//! Database operations for Gramcast
//!
//! The scheduled-post store is a single sqlite table. All mutations are
//! single-row conditional updates; there are no multi-row transactions.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{PostStatus, PostType, ScheduledPost};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        let pool = if db_path == ":memory:" {
            // An in-memory database must live on exactly one connection;
            // a second connection would see an empty schema.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await
                .map_err(DbError::SqlxError)?
        } else {
            // Expand path and create parent directories
            let expanded_path = shellexpand::tilde(db_path).to_string();
            let path = Path::new(&expanded_path);

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }

            // mode=rwc creates the database file if it doesn't exist
            let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));
            SqlitePool::connect(&db_url)
                .await
                .map_err(DbError::SqlxError)?
        };

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a new scheduled post
    pub async fn create_post(&self, post: &ScheduledPost) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_posts
                (id, post_type, media_urls, caption, hashtags, scheduled_time,
                 status, attempts, error, error_details, instagram_post_id,
                 created_at, updated_at, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(post.post_type.as_str())
        .bind(serde_json::to_string(&post.media_urls).unwrap_or_else(|_| "[]".to_string()))
        .bind(&post.caption)
        .bind(serde_json::to_string(&post.hashtags).unwrap_or_else(|_| "[]".to_string()))
        .bind(post.scheduled_time)
        .bind(post.status.as_str())
        .bind(post.attempts)
        .bind(&post.error)
        .bind(&post.error_details)
        .bind(&post.instagram_post_id)
        .bind(post.created_at)
        .bind(post.updated_at)
        .bind(post.published_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: &str) -> Result<Option<ScheduledPost>> {
        let row = sqlx::query("SELECT * FROM scheduled_posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| row_to_post(&r)))
    }

    /// Pending posts whose scheduled time has passed, oldest-due first.
    ///
    /// The status filter naturally excludes posts another still-running
    /// invocation has already moved to processing.
    pub async fn due_posts(&self, now: i64, limit: usize) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM scheduled_posts
            WHERE status = 'pending' AND scheduled_time <= ?
            ORDER BY scheduled_time ASC
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(row_to_post).collect())
    }

    /// Atomically claim a pending post for processing.
    ///
    /// The claim is a single conditional update so two overlapping pipeline
    /// runs can never both win the same post. Returns false if the post was
    /// no longer pending.
    pub async fn claim(&self, post_id: &str, now: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'processing', updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a successful publication
    pub async fn mark_published(
        &self,
        post_id: &str,
        instagram_post_id: &str,
        now: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'published',
                instagram_post_id = ?,
                published_at = ?,
                error = NULL,
                error_details = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(instagram_post_id)
        .bind(now)
        .bind(now)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Record a failed publish attempt; increments the attempt counter
    pub async fn mark_failed(
        &self,
        post_id: &str,
        error: &str,
        error_details: Option<&str>,
        now: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'failed',
                error = ?,
                error_details = ?,
                attempts = attempts + 1,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(error)
        .bind(error_details)
        .bind(now)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Return posts stuck in processing since before the cutoff to pending.
    ///
    /// A run whose process died mid-post leaves the post in processing
    /// forever; this sweep makes it eligible for a future run again.
    pub async fn release_stale_processing(&self, cutoff: i64, now: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'pending', updated_at = ?
            WHERE status = 'processing' AND updated_at < ?
            "#,
        )
        .bind(now)
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected())
    }

    /// List queued posts, optionally filtered by status, soonest first
    pub async fn queue_posts(
        &self,
        status: Option<PostStatus>,
        limit: usize,
    ) -> Result<Vec<ScheduledPost>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    r#"
                    SELECT * FROM scheduled_posts
                    WHERE status = ?
                    ORDER BY scheduled_time ASC
                    LIMIT ?
                    "#,
                )
                .bind(status.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM scheduled_posts
                    ORDER BY scheduled_time ASC
                    LIMIT ?
                    "#,
                )
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(row_to_post).collect())
    }

    /// Delete a pending post from the queue. Returns false if the post does
    /// not exist or has already left the pending state.
    pub async fn cancel_post(&self, post_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM scheduled_posts WHERE id = ? AND status = 'pending'",
        )
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Move a pending post to a new scheduled time
    pub async fn reschedule_post(&self, post_id: &str, scheduled_time: i64, now: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET scheduled_time = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(scheduled_time)
        .bind(now)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Make a pending post due immediately
    pub async fn post_now(&self, post_id: &str, now: i64) -> Result<bool> {
        self.reschedule_post(post_id, now, now).await
    }
}

fn row_to_post(r: &SqliteRow) -> ScheduledPost {
    let media_urls: Vec<String> =
        serde_json::from_str(&r.get::<String, _>("media_urls")).unwrap_or_default();
    let hashtags: Vec<String> =
        serde_json::from_str(&r.get::<String, _>("hashtags")).unwrap_or_default();

    ScheduledPost {
        id: r.get("id"),
        post_type: PostType::parse(&r.get::<String, _>("post_type")).unwrap_or(PostType::Feed),
        media_urls,
        caption: r.get("caption"),
        hashtags,
        scheduled_time: r.get("scheduled_time"),
        status: PostStatus::parse(&r.get::<String, _>("status")).unwrap_or(PostStatus::Pending),
        attempts: r.get("attempts"),
        error: r.get("error"),
        error_details: r.get("error_details"),
        instagram_post_id: r.get("instagram_post_id"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        published_at: r.get("published_at"),
    }
}
