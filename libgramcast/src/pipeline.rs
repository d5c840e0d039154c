//! Scheduled post publishing pipeline
//!
//! One `run_once` per trigger invocation: select due pending posts
//! (bounded batch, oldest first), claim each with a conditional status
//! update, drive the publish sequence, and record the outcome. Posts are
//! processed concurrently and fail independently; a post's failure never
//! disturbs its siblings or the trigger cadence.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::error::{GramcastError, Result};
use crate::platforms::{MediaPublisher, PublishRequest};
use crate::types::ScheduledPost;

pub const DEFAULT_BATCH_SIZE: usize = 10;

pub struct Pipeline {
    db: Database,
    publisher: Arc<dyn MediaPublisher>,
    batch_size: usize,
}

/// Outcome counts for one pipeline invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Posts selected by the due query
    pub selected: usize,
    pub published: usize,
    pub failed: usize,
    /// Posts left untouched (lost claim or missing credentials)
    pub skipped: usize,
}

enum PostOutcome {
    Published,
    Failed,
    Skipped,
}

impl Pipeline {
    pub fn new(db: Database, publisher: Arc<dyn MediaPublisher>) -> Self {
        Self {
            db,
            publisher,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Process one batch of due posts.
    ///
    /// An empty due set is a cheap no-op with zero store mutations.
    /// Missing credentials abort the run before any post is touched.
    /// Per-post failures land in the report, never in the returned error;
    /// only store-read failures surface as `Err`.
    pub async fn run_once(&self) -> Result<RunReport> {
        let now = chrono::Utc::now().timestamp();
        let due = self.db.due_posts(now, self.batch_size).await?;

        if due.is_empty() {
            debug!("no scheduled posts due");
            return Ok(RunReport::default());
        }

        info!(count = due.len(), "found scheduled posts due for publishing");

        if !self.publisher.is_configured() {
            error!("Instagram credentials missing, leaving batch untouched");
            let selected = due.len();
            return Ok(RunReport {
                selected,
                skipped: selected,
                ..Default::default()
            });
        }

        let outcomes = join_all(due.into_iter().map(|post| self.process_post(post, now))).await;

        let mut report = RunReport {
            selected: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                PostOutcome::Published => report.published += 1,
                PostOutcome::Failed => report.failed += 1,
                PostOutcome::Skipped => report.skipped += 1,
            }
        }

        info!(
            published = report.published,
            failed = report.failed,
            skipped = report.skipped,
            "batch completed"
        );
        Ok(report)
    }

    /// Return posts stuck in processing longer than `older_than` to pending.
    ///
    /// Separate reconciliation pass, never part of `run_once`; a post only
    /// gets stuck when the process died mid-publish.
    pub async fn reclaim_stale(&self, older_than: Duration) -> Result<u64> {
        let now = chrono::Utc::now().timestamp();
        let cutoff = now - older_than.as_secs() as i64;
        let released = self.db.release_stale_processing(cutoff, now).await?;
        if released > 0 {
            warn!(count = released, "returned stale processing posts to pending");
        }
        Ok(released)
    }

    async fn process_post(&self, post: ScheduledPost, now: i64) -> PostOutcome {
        // conditional claim: exactly one run wins a pending post
        match self.db.claim(&post.id, now).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(post_id = %post.id, "post already claimed by another run");
                return PostOutcome::Skipped;
            }
            Err(e) => {
                warn!(post_id = %post.id, error = %e, "failed to claim post");
                return PostOutcome::Skipped;
            }
        }

        info!(
            post_id = %post.id,
            post_type = %post.post_type,
            media_count = post.media_urls.len(),
            "publishing post"
        );

        let request = PublishRequest {
            post_type: post.post_type,
            media_urls: post.media_urls.clone(),
            caption: post.publish_caption(),
        };

        match self.publisher.publish(&request).await {
            Ok(instagram_post_id) => {
                info!(post_id = %post.id, instagram_post_id = %instagram_post_id, "post published");
                let now = chrono::Utc::now().timestamp();
                if let Err(e) = self
                    .db
                    .mark_published(&post.id, &instagram_post_id, now)
                    .await
                {
                    warn!(post_id = %post.id, error = %e, "failed to record published status");
                }
                PostOutcome::Published
            }
            Err(e) => {
                warn!(post_id = %post.id, error = %e, "failed to publish post");
                let now = chrono::Utc::now().timestamp();
                let details = error_details(&e);
                if let Err(db_err) = self
                    .db
                    .mark_failed(&post.id, &e.to_string(), details.as_deref(), now)
                    .await
                {
                    warn!(post_id = %post.id, error = %db_err, "failed to record failed status");
                }
                PostOutcome::Failed
            }
        }
    }
}

/// Remote diagnostic payload for the error_details column, when present
fn error_details(error: &GramcastError) -> Option<String> {
    match error {
        GramcastError::Publish(publish_error) => publish_error.payload().map(str::to_string),
        _ => None,
    }
}
