//! CLI integration tests for gram-queue
//!
//! Each test gets its own config file and database under a temp directory,
//! wired in through GRAMCAST_CONFIG.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct TestEnv {
    _dir: TempDir,
    config_path: String,
}

impl TestEnv {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("posts.db");
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            format!("[database]\npath = \"{}\"\n", db_path.display()),
        )
        .unwrap();

        Self {
            config_path: config_path.to_str().unwrap().to_string(),
            _dir: dir,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("gram-queue").unwrap();
        cmd.env("GRAMCAST_CONFIG", &self.config_path);
        cmd
    }

    fn add_post(&self, args: &[&str]) -> String {
        let output = self.cmd().arg("add").args(args).assert().success();
        let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
        let first_line = stdout.lines().next().unwrap();
        first_line
            .rsplit(' ')
            .next()
            .expect("add output should end with the post id")
            .to_string()
    }
}

#[test]
fn add_then_list_shows_pending_post() {
    let env = TestEnv::new();
    let id = env.add_post(&[
        "https://cdn.example.com/a.jpg",
        "--caption",
        "Hello",
        "--at",
        "2h",
    ]);

    env.cmd()
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(&id))
        .stdout(predicate::str::contains("pending"));
}

#[test]
fn add_rejects_invalid_post_type() {
    let env = TestEnv::new();
    env.cmd()
        .args(["add", "https://cdn.example.com/a.jpg", "--type", "story"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Invalid post type"));
}

#[test]
fn add_rejects_reel_with_image_url() {
    let env = TestEnv::new();
    env.cmd()
        .args(["add", "https://cdn.example.com/a.jpg", "--type", "reel"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("requires a video URL"));
}

#[test]
fn add_rejects_reel_with_multiple_urls() {
    let env = TestEnv::new();
    env.cmd()
        .args([
            "add",
            "https://cdn.example.com/a.mp4",
            "https://cdn.example.com/b.mp4",
            "--type",
            "reel",
        ])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("exactly one media URL"));
}

#[test]
fn add_rejects_unparseable_schedule() {
    let env = TestEnv::new();
    env.cmd()
        .args([
            "add",
            "https://cdn.example.com/a.jpg",
            "--at",
            "whenever you feel like it maybe",
        ])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn list_json_round_trips_post_fields() {
    let env = TestEnv::new();
    let id = env.add_post(&[
        "https://cdn.example.com/a.jpg",
        "https://cdn.example.com/b.mp4",
        "--caption",
        "Mixed",
        "--hashtag",
        "#x",
        "--at",
        "1h",
    ]);

    let output = env
        .cmd()
        .args(["list", "--format", "json"])
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let posts: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    let post = &posts.as_array().unwrap()[0];
    assert_eq!(post["id"], serde_json::json!(id));
    assert_eq!(post["post_type"], serde_json::json!("feed"));
    assert_eq!(post["status"], serde_json::json!("pending"));
    assert_eq!(post["media_urls"].as_array().unwrap().len(), 2);
    assert_eq!(post["hashtags"][0], serde_json::json!("#x"));
    assert_eq!(post["attempts"], serde_json::json!(0));
}

#[test]
fn list_rejects_unknown_format() {
    let env = TestEnv::new();
    env.cmd()
        .args(["list", "--format", "yaml"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Invalid format"));
}

#[test]
fn cancel_removes_pending_post() {
    let env = TestEnv::new();
    let id = env.add_post(&["https://cdn.example.com/a.jpg", "--at", "2h"]);

    env.cmd()
        .args(["cancel", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled"));

    env.cmd()
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No queued posts"));
}

#[test]
fn cancel_unknown_post_fails() {
    let env = TestEnv::new();
    env.cmd()
        .args(["cancel", "no-such-id"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn cancel_all_with_force() {
    let env = TestEnv::new();
    env.add_post(&["https://cdn.example.com/a.jpg", "--at", "2h"]);
    env.add_post(&["https://cdn.example.com/b.jpg", "--at", "3h"]);

    env.cmd()
        .args(["cancel", "--all", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled 2 post(s)"));
}

#[test]
fn now_makes_post_due() {
    let env = TestEnv::new();
    let id = env.add_post(&["https://cdn.example.com/a.jpg", "--at", "6h"]);

    env.cmd().args(["now", &id]).assert().success();

    let output = env
        .cmd()
        .args(["list", "--format", "json"])
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let posts: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let scheduled = posts[0]["scheduled_time"].as_i64().unwrap();
    assert!(scheduled <= chrono::Utc::now().timestamp());
}
