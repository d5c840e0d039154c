//! Mock gateway and publisher implementations for testing
//!
//! `MockGateway` simulates the remote media platform with scripted
//! per-container status sequences and failure injection, so protocol tests
//! can exercise polling and carousel fan-out without network access.
//! `MockPublisher` stands in for the whole publish sequence in pipeline
//! tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{PublishError, Result};
use crate::platforms::{
    ContainerSpec, ContainerStatus, MediaGateway, MediaPublisher, PublishRequest,
};

/// One scripted reply to a container status poll
#[derive(Debug, Clone)]
pub enum StatusStep {
    Status(ContainerStatus),
    /// Simulated transient failure of the status call itself
    Error(PublishError),
}

#[derive(Default)]
struct MockState {
    created: Vec<ContainerSpec>,
    scripts: HashMap<String, VecDeque<StatusStep>>,
    url_scripts: Vec<(String, Vec<StatusStep>)>,
    create_error: Option<PublishError>,
    publish_error: Option<PublishError>,
    published: Vec<String>,
    deleted: Vec<String>,
    status_calls: HashMap<String, usize>,
}

fn spec_url(spec: &ContainerSpec) -> Option<&str> {
    match spec {
        ContainerSpec::Image { url, .. } | ContainerSpec::Video { url, .. } => Some(url),
        ContainerSpec::Reel { video_url, .. } => Some(video_url),
        ContainerSpec::Carousel { .. } => None,
    }
}

/// Mock remote media platform.
///
/// Container ids are assigned deterministically in creation order
/// ("container-1", "container-2", ...) so tests can script status
/// sequences before the publish sequence runs. Containers without a script
/// report FINISHED immediately. The last step of a script repeats forever,
/// which makes "never becomes ready" a one-line script.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    /// A gateway where every container is immediately ready
    pub fn ready() -> Self {
        Self::default()
    }

    /// Script the status replies for one container
    pub fn script_statuses(&self, container_id: &str, statuses: Vec<ContainerStatus>) {
        self.script_steps(
            container_id,
            statuses.into_iter().map(StatusStep::Status).collect(),
        );
    }

    /// Script raw steps (statuses and poll errors) for one container
    pub fn script_steps(&self, container_id: &str, steps: Vec<StatusStep>) {
        let mut state = self.state.lock().unwrap();
        state
            .scripts
            .insert(container_id.to_string(), steps.into());
    }

    /// Script the status replies for whichever container gets created from
    /// a URL containing the given substring.
    ///
    /// Useful when concurrent posts make container id assignment order
    /// unpredictable.
    pub fn script_statuses_for_url(&self, url_substring: &str, statuses: Vec<ContainerStatus>) {
        let mut state = self.state.lock().unwrap();
        state.url_scripts.push((
            url_substring.to_string(),
            statuses.into_iter().map(StatusStep::Status).collect(),
        ));
    }

    /// Make the next container creation fail
    pub fn fail_next_create(&self, error: PublishError) {
        self.state.lock().unwrap().create_error = Some(error);
    }

    /// Make every publish-confirm call fail
    pub fn fail_publish(&self, error: PublishError) {
        self.state.lock().unwrap().publish_error = Some(error);
    }

    /// Specs of every container created, in creation order
    pub fn created(&self) -> Vec<ContainerSpec> {
        self.state.lock().unwrap().created.clone()
    }

    /// Container ids passed to publish-confirm
    pub fn published(&self) -> Vec<String> {
        self.state.lock().unwrap().published.clone()
    }

    /// Media ids passed to delete
    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    /// How many times a container's status was polled
    pub fn status_calls(&self, container_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .status_calls
            .get(container_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl MediaGateway for MockGateway {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.create_error.take() {
            return Err(error.into());
        }
        state.created.push(spec.clone());
        let container_id = format!("container-{}", state.created.len());

        let url_script = spec_url(spec).and_then(|url| {
            state
                .url_scripts
                .iter()
                .find(|(substring, _)| url.contains(substring.as_str()))
                .map(|(_, steps)| steps.clone())
        });
        if let Some(steps) = url_script {
            state.scripts.insert(container_id.clone(), steps.into());
        }

        Ok(container_id)
    }

    async fn container_status(&self, container_id: &str) -> Result<ContainerStatus> {
        let mut state = self.state.lock().unwrap();
        *state
            .status_calls
            .entry(container_id.to_string())
            .or_insert(0) += 1;

        let step = match state.scripts.get_mut(container_id) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if queue.len() == 1 => queue.front().unwrap().clone(),
            _ => StatusStep::Status(ContainerStatus::Finished),
        };

        match step {
            StatusStep::Status(status) => Ok(status),
            StatusStep::Error(error) => Err(error.into()),
        }
    }

    async fn publish_container(&self, container_id: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.publish_error.clone() {
            return Err(error.into());
        }
        state.published.push(container_id.to_string());
        Ok(format!("igpost-{}", state.published.len()))
    }

    async fn delete_media(&self, media_id: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .deleted
            .push(media_id.to_string());
        Ok(())
    }
}

/// Mock publish sequence for pipeline tests
pub struct MockPublisher {
    configured: bool,
    error: Option<PublishError>,
    /// Requests whose first media URL contains this substring fail
    fail_matching: Option<String>,
    requests: Arc<Mutex<Vec<PublishRequest>>>,
}

impl MockPublisher {
    /// A publisher where every post succeeds
    pub fn success() -> Self {
        Self {
            configured: true,
            error: None,
            fail_matching: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A publisher where every post fails with the given error
    pub fn failure(error: PublishError) -> Self {
        Self {
            error: Some(error),
            ..Self::success()
        }
    }

    /// A publisher that fails only posts whose first media URL contains
    /// the given substring
    pub fn failing_when(substring: &str, error: PublishError) -> Self {
        Self {
            error: Some(error),
            fail_matching: Some(substring.to_string()),
            ..Self::success()
        }
    }

    /// A publisher with missing credentials
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::success()
        }
    }

    /// Requests received, in arrival order
    pub fn requests(&self) -> Vec<PublishRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaPublisher for MockPublisher {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn publish(&self, request: &PublishRequest) -> Result<String> {
        let count = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };

        if let Some(error) = &self.error {
            let fails = match &self.fail_matching {
                Some(substring) => request
                    .media_urls
                    .first()
                    .is_some_and(|url| url.contains(substring)),
                None => true,
            };
            if fails {
                return Err(error.clone().into());
            }
        }

        Ok(format!("igpost-{}", count))
    }
}
