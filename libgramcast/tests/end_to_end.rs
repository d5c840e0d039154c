//! End-to-end tests: real pipeline and publisher over a mock gateway
//!
//! These drive the whole path a daemon tick takes: due query -> claim ->
//! container protocol -> status bookkeeping, with only the remote platform
//! simulated.

use std::sync::Arc;
use std::time::Duration;

use libgramcast::db::Database;
use libgramcast::pipeline::Pipeline;
use libgramcast::platforms::instagram::InstagramPublisher;
use libgramcast::platforms::mock::MockGateway;
use libgramcast::platforms::{ContainerSpec, ContainerStatus, PollTiming};
use libgramcast::types::{PostStatus, PostType, ScheduledPost};

fn fast_timing() -> PollTiming {
    PollTiming {
        interval: Duration::from_millis(10),
        max_wait: Duration::from_millis(500),
        reel_max_wait: Duration::from_secs(1),
    }
}

async fn setup(gateway: &MockGateway) -> (Database, Pipeline) {
    let db = Database::new(":memory:").await.unwrap();
    let publisher = InstagramPublisher::with_gateway(Arc::new(gateway.clone()), fast_timing());
    let pipeline = Pipeline::new(db.clone(), Arc::new(publisher));
    (db, pipeline)
}

#[tokio::test]
async fn carousel_post_publishes_end_to_end() {
    let gateway = MockGateway::ready();
    let (db, pipeline) = setup(&gateway).await;

    let now = chrono::Utc::now().timestamp();
    let post = ScheduledPost::new(
        PostType::Feed,
        vec![
            "https://cdn.example.com/a.jpg".to_string(),
            "https://cdn.example.com/b.jpg".to_string(),
        ],
        "Two shots".to_string(),
        vec!["#pair".to_string()],
        now - 30,
    );
    db.create_post(&post).await.unwrap();

    let report = pipeline.run_once().await.unwrap();
    assert_eq!(report.published, 1);

    // two children, then one CAROUSEL parent referencing them in order
    let created = gateway.created();
    assert_eq!(created.len(), 3);
    assert_eq!(
        created[0],
        ContainerSpec::Image {
            url: "https://cdn.example.com/a.jpg".to_string(),
            caption: None,
            carousel_item: true,
        }
    );
    assert_eq!(
        created[1],
        ContainerSpec::Image {
            url: "https://cdn.example.com/b.jpg".to_string(),
            caption: None,
            carousel_item: true,
        }
    );
    assert_eq!(
        created[2],
        ContainerSpec::Carousel {
            children: vec!["container-1".to_string(), "container-2".to_string()],
            caption: "Two shots #pair".to_string(),
        }
    );
    assert_eq!(gateway.published(), vec!["container-3"]);

    let published = db.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(published.status, PostStatus::Published);
    assert!(published
        .instagram_post_id
        .as_deref()
        .is_some_and(|id| !id.is_empty()));
    assert!(published.published_at.is_some());
    assert_eq!(published.error, None);
}

#[tokio::test]
async fn reel_post_waits_for_transcoding() {
    let gateway = MockGateway::ready();
    gateway.script_statuses(
        "container-1",
        vec![
            ContainerStatus::InProgress,
            ContainerStatus::InProgress,
            ContainerStatus::Finished,
        ],
    );
    let (db, pipeline) = setup(&gateway).await;

    let now = chrono::Utc::now().timestamp();
    let post = ScheduledPost::new(
        PostType::Reel,
        vec!["https://cdn.example.com/v.mp4".to_string()],
        "A reel".to_string(),
        vec![],
        now - 30,
    );
    db.create_post(&post).await.unwrap();

    let report = pipeline.run_once().await.unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(gateway.status_calls("container-1"), 3);
    assert!(matches!(gateway.created()[0], ContainerSpec::Reel { .. }));

    let published = db.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(published.status, PostStatus::Published);
}

#[tokio::test]
async fn container_error_marks_post_failed() {
    let gateway = MockGateway::ready();
    gateway.script_statuses("container-1", vec![ContainerStatus::Error]);
    let (db, pipeline) = setup(&gateway).await;

    let now = chrono::Utc::now().timestamp();
    let post = ScheduledPost::new(
        PostType::Feed,
        vec!["https://cdn.example.com/a.jpg".to_string()],
        "Broken".to_string(),
        vec![],
        now - 30,
    );
    db.create_post(&post).await.unwrap();

    let report = pipeline.run_once().await.unwrap();
    assert_eq!(report.failed, 1);

    let failed = db.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(failed.status, PostStatus::Failed);
    assert_eq!(failed.attempts, 1);
    assert!(failed
        .error
        .as_deref()
        .is_some_and(|e| e.contains("processing failed")));
    assert_eq!(failed.instagram_post_id, None);
}

#[tokio::test]
async fn readiness_timeout_marks_post_failed_with_timeout_diagnostic() {
    let gateway = MockGateway::ready();
    gateway.script_statuses("container-1", vec![ContainerStatus::InProgress]);
    let (db, pipeline) = setup(&gateway).await;

    let now = chrono::Utc::now().timestamp();
    let post = ScheduledPost::new(
        PostType::Feed,
        vec!["https://cdn.example.com/a.jpg".to_string()],
        "Slow".to_string(),
        vec![],
        now - 30,
    );
    db.create_post(&post).await.unwrap();

    let report = pipeline.run_once().await.unwrap();
    assert_eq!(report.failed, 1);

    let failed = db.get_post(&post.id).await.unwrap().unwrap();
    let error = failed.error.unwrap();
    assert!(error.contains("did not become ready"));
    assert!(!error.contains("processing failed"));
}

#[tokio::test]
async fn mixed_batch_isolates_failures() {
    let gateway = MockGateway::ready();
    let (db, pipeline) = setup(&gateway).await;

    let now = chrono::Utc::now().timestamp();
    let failing = ScheduledPost::new(
        PostType::Feed,
        vec!["https://cdn.example.com/bad.jpg".to_string()],
        "fails".to_string(),
        vec![],
        now - 120,
    );
    let ok = ScheduledPost::new(
        PostType::Feed,
        vec!["https://cdn.example.com/good.jpg".to_string()],
        "works".to_string(),
        vec![],
        now - 60,
    );
    db.create_post(&failing).await.unwrap();
    db.create_post(&ok).await.unwrap();

    // the two posts run concurrently, so script the failure by source URL
    gateway.script_statuses_for_url("bad.jpg", vec![ContainerStatus::Error]);

    let report = pipeline.run_once().await.unwrap();
    assert_eq!(report.selected, 2);
    assert_eq!(report.published, 1);
    assert_eq!(report.failed, 1);

    assert_eq!(
        db.get_post(&failing.id).await.unwrap().unwrap().status,
        PostStatus::Failed
    );
    assert_eq!(
        db.get_post(&ok.id).await.unwrap().unwrap().status,
        PostStatus::Published
    );
}
