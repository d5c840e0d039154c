//! Core types for Gramcast

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A post waiting in the publishing queue.
///
/// One record per requested publication. The pipeline drives `status`
/// through pending -> processing -> published | failed; `attempts` counts
/// failed publish attempts and `instagram_post_id` is set only on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub post_type: PostType,
    /// Ordered media URLs; order determines carousel child ordering
    pub media_urls: Vec<String>,
    pub caption: String,
    pub hashtags: Vec<String>,
    /// Earliest publish time (Unix seconds, UTC)
    pub scheduled_time: i64,
    pub status: PostStatus,
    pub attempts: i64,
    pub error: Option<String>,
    pub error_details: Option<String>,
    pub instagram_post_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub published_at: Option<i64>,
}

impl ScheduledPost {
    pub fn new(
        post_type: PostType,
        media_urls: Vec<String>,
        caption: String,
        hashtags: Vec<String>,
        scheduled_time: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            post_type,
            media_urls,
            caption,
            hashtags,
            scheduled_time,
            status: PostStatus::Pending,
            attempts: 0,
            error: None,
            error_details: None,
            instagram_post_id: None,
            created_at: now,
            updated_at: now,
            published_at: None,
        }
    }

    /// The final caption sent to Instagram: hashtags are kept as a separate
    /// sequence in the record and joined onto the caption at publish time.
    pub fn publish_caption(&self) -> String {
        if self.hashtags.is_empty() {
            self.caption.clone()
        } else if self.caption.is_empty() {
            self.hashtags.join(" ")
        } else {
            format!("{} {}", self.caption, self.hashtags.join(" "))
        }
    }
}

/// Post shape. `Feed` covers single image/video and carousel posts,
/// distinguished by the number of media URLs; `Reel` is always one video.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Feed,
    Reel,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Reel => "reel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "feed" => Some(Self::Feed),
            "reel" => Some(Self::Reel),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Processing,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "published" => Some(Self::Published),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Media kind detected from a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Detect the media kind from a URL's file extension.
    ///
    /// `.mp4` and `.mov` are videos, everything else is treated as an
    /// image. Query strings and fragments are ignored.
    pub fn from_url(url: &str) -> Self {
        let path = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_lowercase();
        if path.ends_with(".mp4") || path.ends_with(".mov") {
            Self::Video
        } else {
            Self::Image
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video)
    }
}
