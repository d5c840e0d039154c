//! Instagram publishing abstraction
//!
//! The remote platform is reached through two seams: `MediaGateway` is the
//! raw Graph API contract (container create, status query, publish confirm),
//! and `MediaPublisher` is the full per-post publish sequence the pipeline
//! drives. Both are trait objects so tests can substitute mocks.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::PostType;

pub mod instagram;

// Mock gateway is available for all builds (not just tests) to support
// integration tests
pub mod mock;

/// Remote-side processing state of a media container.
///
/// A container is created by a publish request, polled until FINISHED or a
/// terminal failure, then consumed exactly once by a publish-confirm call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    InProgress,
    Finished,
    Error,
    Expired,
    /// Status codes this client does not know; treated as still in progress
    Unknown(String),
}

impl ContainerStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "IN_PROGRESS" => Self::InProgress,
            "FINISHED" => Self::Finished,
            "ERROR" => Self::Error,
            "EXPIRED" => Self::Expired,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
            Self::Expired => "EXPIRED",
            Self::Unknown(s) => s,
        }
    }
}

/// The shape of a container creation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerSpec {
    Image {
        url: String,
        caption: Option<String>,
        carousel_item: bool,
    },
    Video {
        url: String,
        caption: Option<String>,
        carousel_item: bool,
    },
    Reel {
        video_url: String,
        caption: String,
    },
    Carousel {
        /// Ready child container ids, in presentation order
        children: Vec<String>,
        caption: String,
    },
}

impl ContainerSpec {
    pub fn is_carousel_parent(&self) -> bool {
        matches!(self, Self::Carousel { .. })
    }

    pub fn is_carousel_item(&self) -> bool {
        matches!(
            self,
            Self::Image { carousel_item: true, .. } | Self::Video { carousel_item: true, .. }
        )
    }
}

/// Raw Instagram Graph API contract.
///
/// All calls carry the bearer credential and may fail with rate-limit,
/// auth-expired, or validation error classes.
#[async_trait]
pub trait MediaGateway: Send + Sync {
    /// Create a media container; returns the container id
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Query the processing status of a container
    async fn container_status(&self, container_id: &str) -> Result<ContainerStatus>;

    /// Exchange a ready container for a published media id
    async fn publish_container(&self, container_id: &str) -> Result<String>;

    /// Delete published media
    async fn delete_media(&self, media_id: &str) -> Result<()>;
}

/// One logical post to publish
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub post_type: PostType,
    pub media_urls: Vec<String>,
    /// Final caption, hashtags already joined on
    pub caption: String,
}

/// The full publish sequence for one post, as consumed by the pipeline
#[async_trait]
pub trait MediaPublisher: Send + Sync {
    /// Whether credentials are present. The pipeline skips a whole batch
    /// without mutating any post when this is false.
    fn is_configured(&self) -> bool;

    /// Drive create -> poll -> publish for one post; returns the remote
    /// post id
    async fn publish(&self, request: &PublishRequest) -> Result<String>;
}

/// Readiness polling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    /// Fixed interval between status polls
    pub interval: Duration,
    /// Readiness deadline for feed media
    pub max_wait: Duration,
    /// Readiness deadline for reels
    pub reel_max_wait: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(60),
            reel_max_wait: Duration::from_secs(180),
        }
    }
}
