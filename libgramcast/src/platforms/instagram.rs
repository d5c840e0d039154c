//! Instagram Graph API client
//!
//! Publishing to Instagram is asynchronous on the remote side: every post
//! starts as a media container that the platform processes in the
//! background. `GraphGateway` speaks the raw HTTP protocol; the
//! `InstagramPublisher` drives the full sequence for one post, selecting
//! the reel, carousel, or single-media sub-protocol by shape.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{Config, Credentials};
use crate::error::{GramcastError, PublishError, Result};
use crate::platforms::{
    ContainerSpec, ContainerStatus, MediaGateway, MediaPublisher, PollTiming, PublishRequest,
};
use crate::types::{MediaKind, PostType};

pub const GRAPH_API_BASE: &str = "https://graph.facebook.com/v21.0";

/// HTTP client for the Instagram Graph API
pub struct GraphGateway {
    http: reqwest::Client,
    api_base: String,
    credentials: Credentials,
}

impl GraphGateway {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_api_base(credentials, GRAPH_API_BASE)
    }

    /// Create a gateway against a non-default API base (used by tests)
    pub fn with_api_base(credentials: Credentials, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            credentials,
        }
    }

    fn token(&self) -> &str {
        &self.credentials.access_token
    }
}

/// Graph API request body for a container creation
fn container_payload(spec: &ContainerSpec) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    match spec {
        ContainerSpec::Image {
            url,
            caption,
            carousel_item,
        } => {
            body.insert("image_url".to_string(), url.as_str().into());
            if let Some(caption) = caption {
                body.insert("caption".to_string(), caption.as_str().into());
            }
            if *carousel_item {
                body.insert("is_carousel_item".to_string(), true.into());
            }
        }
        ContainerSpec::Video {
            url,
            caption,
            carousel_item,
        } => {
            body.insert("video_url".to_string(), url.as_str().into());
            if let Some(caption) = caption {
                body.insert("caption".to_string(), caption.as_str().into());
            }
            if *carousel_item {
                body.insert("is_carousel_item".to_string(), true.into());
            }
        }
        ContainerSpec::Reel { video_url, caption } => {
            body.insert("media_type".to_string(), "REELS".into());
            body.insert("video_url".to_string(), video_url.as_str().into());
            body.insert("caption".to_string(), caption.as_str().into());
        }
        ContainerSpec::Carousel { children, caption } => {
            body.insert("media_type".to_string(), "CAROUSEL".into());
            body.insert("children".to_string(), children.as_slice().into());
            body.insert("caption".to_string(), caption.as_str().into());
        }
    }
    body.into()
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status_code: String,
}

fn network_error(e: reqwest::Error) -> GramcastError {
    PublishError::Network(e.to_string()).into()
}

fn decode_error(context: &str, e: reqwest::Error) -> GramcastError {
    PublishError::Api {
        message: format!("{}: invalid response: {}", context, e),
        payload: None,
    }
    .into()
}

/// Map a non-2xx Graph API response to an error class, capturing the raw
/// body as the remote diagnostic payload
async fn api_error(context: &str, resp: reqwest::Response) -> GramcastError {
    let status = resp.status();
    let payload = resp.text().await.ok().filter(|body| !body.is_empty());

    let error = match status.as_u16() {
        401 | 403 => PublishError::Authentication(format!(
            "{} rejected with status {}",
            context, status
        )),
        429 => PublishError::RateLimit(format!("{} throttled with status {}", context, status)),
        _ => PublishError::Api {
            message: format!("{} failed with status {}", context, status),
            payload,
        },
    };
    error.into()
}

#[async_trait]
impl MediaGateway for GraphGateway {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let url = format!("{}/{}/media", self.api_base, self.credentials.account_id);
        let resp = self
            .http
            .post(&url)
            .query(&[("access_token", self.token())])
            .json(&container_payload(spec))
            .send()
            .await
            .map_err(network_error)?;

        if !resp.status().is_success() {
            return Err(api_error("container creation", resp).await);
        }

        let body: IdResponse = resp
            .json()
            .await
            .map_err(|e| decode_error("container creation", e))?;
        Ok(body.id)
    }

    async fn container_status(&self, container_id: &str) -> Result<ContainerStatus> {
        let url = format!("{}/{}", self.api_base, container_id);
        let resp = self
            .http
            .get(&url)
            .query(&[("fields", "status_code"), ("access_token", self.token())])
            .send()
            .await
            .map_err(network_error)?;

        if !resp.status().is_success() {
            return Err(api_error("status query", resp).await);
        }

        let body: StatusResponse = resp
            .json()
            .await
            .map_err(|e| decode_error("status query", e))?;
        Ok(ContainerStatus::parse(&body.status_code))
    }

    async fn publish_container(&self, container_id: &str) -> Result<String> {
        let url = format!(
            "{}/{}/media_publish",
            self.api_base, self.credentials.account_id
        );
        let resp = self
            .http
            .post(&url)
            .query(&[("access_token", self.token())])
            .json(&serde_json::json!({ "creation_id": container_id }))
            .send()
            .await
            .map_err(network_error)?;

        if !resp.status().is_success() {
            return Err(api_error("publish", resp).await);
        }

        let body: IdResponse = resp.json().await.map_err(|e| decode_error("publish", e))?;
        Ok(body.id)
    }

    async fn delete_media(&self, media_id: &str) -> Result<()> {
        let url = format!("{}/{}", self.api_base, media_id);
        let resp = self
            .http
            .delete(&url)
            .query(&[("access_token", self.token())])
            .send()
            .await
            .map_err(network_error)?;

        if !resp.status().is_success() {
            return Err(api_error("media deletion", resp).await);
        }
        Ok(())
    }
}

/// Drives the full publish sequence for one post
pub struct InstagramPublisher {
    gateway: Option<Arc<dyn MediaGateway>>,
    timing: PollTiming,
}

impl InstagramPublisher {
    /// Build a publisher from configuration.
    ///
    /// Missing credentials leave the publisher unconfigured rather than
    /// failing; the pipeline checks `is_configured` per run.
    pub fn from_config(config: &Config) -> Self {
        let timing = config.publish.timing();
        let gateway = config.instagram.as_ref().and_then(|instagram| {
            let credentials = instagram.credentials()?;
            let api_base = instagram
                .api_base
                .clone()
                .unwrap_or_else(|| GRAPH_API_BASE.to_string());
            Some(Arc::new(GraphGateway::with_api_base(credentials, api_base))
                as Arc<dyn MediaGateway>)
        });
        Self { gateway, timing }
    }

    /// Build a publisher over an arbitrary gateway (used by tests)
    pub fn with_gateway(gateway: Arc<dyn MediaGateway>, timing: PollTiming) -> Self {
        Self {
            gateway: Some(gateway),
            timing,
        }
    }

    fn gateway(&self) -> Result<&dyn MediaGateway> {
        self.gateway
            .as_deref()
            .ok_or_else(|| {
                PublishError::Authentication(
                    "Instagram credentials are not configured".to_string(),
                )
                .into()
            })
    }

    async fn publish_reel(&self, request: &PublishRequest) -> Result<String> {
        let gateway = self.gateway()?;
        let video_url = first_url(request)?;

        debug!("creating reel container");
        let container_id = gateway
            .create_container(&ContainerSpec::Reel {
                video_url: video_url.to_string(),
                caption: request.caption.clone(),
            })
            .await?;

        self.wait_for_ready(gateway, &container_id, self.timing.reel_max_wait)
            .await?;
        gateway.publish_container(&container_id).await
    }

    async fn publish_carousel(&self, request: &PublishRequest) -> Result<String> {
        let gateway = self.gateway()?;

        // children are created in order; that order is the presentation order
        let mut children = Vec::with_capacity(request.media_urls.len());
        for url in &request.media_urls {
            let spec = match MediaKind::from_url(url) {
                MediaKind::Video => ContainerSpec::Video {
                    url: url.clone(),
                    caption: None,
                    carousel_item: true,
                },
                MediaKind::Image => ContainerSpec::Image {
                    url: url.clone(),
                    caption: None,
                    carousel_item: true,
                },
            };
            let child_id = gateway.create_container(&spec).await?;
            debug!(container = %child_id, url = %url, "created carousel child");
            children.push(child_id);
        }

        // all children must be ready before the parent exists; the first
        // child ERROR aborts the whole post
        debug!(count = children.len(), "waiting for carousel children");
        futures::future::try_join_all(
            children
                .iter()
                .map(|id| self.wait_for_ready(gateway, id, self.timing.max_wait)),
        )
        .await?;

        let parent_id = gateway
            .create_container(&ContainerSpec::Carousel {
                children,
                caption: request.caption.clone(),
            })
            .await?;
        self.wait_for_ready(gateway, &parent_id, self.timing.max_wait)
            .await?;
        gateway.publish_container(&parent_id).await
    }

    async fn publish_single(&self, request: &PublishRequest) -> Result<String> {
        let gateway = self.gateway()?;
        let url = first_url(request)?;

        let spec = match MediaKind::from_url(url) {
            MediaKind::Video => ContainerSpec::Video {
                url: url.to_string(),
                caption: Some(request.caption.clone()),
                carousel_item: false,
            },
            MediaKind::Image => ContainerSpec::Image {
                url: url.to_string(),
                caption: Some(request.caption.clone()),
                carousel_item: false,
            },
        };

        let container_id = gateway.create_container(&spec).await?;
        self.wait_for_ready(gateway, &container_id, self.timing.max_wait)
            .await?;
        gateway.publish_container(&container_id).await
    }

    /// Poll a container at a fixed interval until it is FINISHED.
    ///
    /// ERROR fails immediately; IN_PROGRESS and EXPIRED keep polling.
    /// Transient failures of the status call itself are retried until the
    /// deadline, and only the final attempt's error surfaces. Running out
    /// of time yields a timeout error naming the container.
    async fn wait_for_ready(
        &self,
        gateway: &dyn MediaGateway,
        container_id: &str,
        max_wait: std::time::Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + max_wait;

        loop {
            let attempt = gateway.container_status(container_id).await;
            let out_of_time = Instant::now() + self.timing.interval > deadline;

            match attempt {
                Ok(ContainerStatus::Finished) => return Ok(()),
                Ok(ContainerStatus::Error) => {
                    return Err(PublishError::ContainerFailed {
                        container_id: container_id.to_string(),
                    }
                    .into());
                }
                Ok(status) => {
                    debug!(container = %container_id, status = %status.as_str(), "container not ready");
                }
                Err(e) => {
                    if out_of_time {
                        return Err(e);
                    }
                    warn!(container = %container_id, error = %e, "status check failed, retrying");
                }
            }

            if out_of_time {
                return Err(PublishError::Timeout {
                    container_id: container_id.to_string(),
                }
                .into());
            }
            tokio::time::sleep(self.timing.interval).await;
        }
    }
}

fn first_url(request: &PublishRequest) -> Result<&str> {
    request
        .media_urls
        .first()
        .map(String::as_str)
        .ok_or_else(|| PublishError::Validation("post has no media URLs".to_string()).into())
}

#[async_trait]
impl MediaPublisher for InstagramPublisher {
    fn is_configured(&self) -> bool {
        self.gateway.is_some()
    }

    async fn publish(&self, request: &PublishRequest) -> Result<String> {
        let media_id = match request.post_type {
            PostType::Reel => self.publish_reel(request).await?,
            _ if request.media_urls.len() > 1 => self.publish_carousel(request).await?,
            _ => self.publish_single(request).await?,
        };
        info!(instagram_post_id = %media_id, "media published");
        Ok(media_id)
    }
}
