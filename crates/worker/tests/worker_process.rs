//! The `oneadif-worker` binary driven over real stdin/stdout pipes.

mod common;

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::post;
use axum::Router;
use common::job_spec;
use oneadif_core::protocol::{WorkerCommand, WorkerEvent};
use oneadif_core::JobState;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn spawn_worker(base_url: &str) -> Child {
    Command::new(env!("CARGO_BIN_EXE_oneadif-worker"))
        .env("ELOG_BASE_URL", base_url)
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("worker binary should start")
}

async fn send(stdin: &mut ChildStdin, command: &WorkerCommand) {
    let mut line = serde_json::to_string(command).unwrap();
    line.push('\n');
    stdin.write_all(line.as_bytes()).await.unwrap();
    stdin.flush().await.unwrap();
}

/// Login handler that reports arrival, then answers once released.
fn held_login(arrived: Arc<Notify>, release: Arc<Notify>) -> Router {
    Router::new().route(
        "/lotwuser/login",
        post(move || {
            let arrived = Arc::clone(&arrived);
            let release = Arc::clone(&release);
            async move {
                arrived.notify_one();
                release.notified().await;
                "Welcome"
            }
        }),
    )
}

async fn spawn_provider(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn states(child: &mut Child) -> Vec<JobState> {
    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();
    let mut states = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        if let WorkerEvent::State { state } = serde_json::from_str(&line).unwrap() {
            states.push(state);
        }
    }
    states
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_during_login_ends_cancelled_and_exits_cleanly() {
    let arrived = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let base = spawn_provider(held_login(Arc::clone(&arrived), Arc::clone(&release))).await;
    let mut child = spawn_worker(&base);
    let mut stdin = child.stdin.take().unwrap();

    send(&mut stdin, &WorkerCommand::Start { job: Box::new(job_spec()) }).await;
    tokio::time::timeout(Duration::from_secs(10), arrived.notified())
        .await
        .expect("worker should reach the provider");

    send(&mut stdin, &WorkerCommand::Cancel).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    release.notify_one();

    let states = tokio::time::timeout(Duration::from_secs(10), states(&mut child))
        .await
        .expect("worker should close stdout");
    assert_eq!(states, vec![JobState::Login, JobState::Cancelled]);

    let status = child.wait().await.unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn incomplete_credentials_fail_login_without_network() {
    let mut child = spawn_worker("http://127.0.0.1:9");
    let mut stdin = child.stdin.take().unwrap();

    let mut spec = job_spec();
    spec.credentials = json!({"login": "R7CL"});
    send(&mut stdin, &WorkerCommand::Start { job: Box::new(spec) }).await;

    let states = tokio::time::timeout(Duration::from_secs(10), states(&mut child))
        .await
        .expect("worker should close stdout");
    assert_eq!(states, vec![JobState::Login, JobState::LoginFailed]);
    assert!(child.wait().await.unwrap().success());
}

#[tokio::test]
async fn closed_stdin_before_start_is_a_failed_exit() {
    let mut child = spawn_worker("http://127.0.0.1:9");
    drop(child.stdin.take());

    let states = states(&mut child).await;
    let status = child.wait().await.unwrap();

    assert!(states.is_empty());
    assert_eq!(status.code(), Some(1));
}
