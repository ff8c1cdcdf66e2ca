mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{json, Value};
use wosrewards_job_queue::{
    async_trait, ExecutionOutcome, ExecutorError, JobExecutor, NoOpExecutor, QueueBackend, Worker,
    WorkerSettings,
};

use common::{get, post_json, test_app, TestApp};

fn settings(app: &TestApp) -> WorkerSettings {
    let mut settings = WorkerSettings::new(app.output.path());
    settings.poll_timeout = Duration::from_millis(50);
    settings.idle_delay = Duration::from_millis(10);
    settings.job_timeout = Duration::from_secs(5);
    settings
}

async fn wait_for_terminal(app: &TestApp, id: i64) -> Value {
    for _ in 0..200 {
        let (status, body) = get(&app.router, &format!("/api/jobs/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        if !matches!(body["status"].as_str(), Some("queued" | "running")) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {id} did not finish");
}

#[tokio::test]
async fn submitted_job_runs_to_done_and_artifact_is_served() {
    let app = test_app().await;
    let queue: Arc<dyn QueueBackend> = app.queue.clone();
    let worker =
        Worker::new(app.store.clone(), queue, Arc::new(NoOpExecutor), settings(&app)).start();

    let (status, body) =
        post_json(&app.router, "/api/jobs", json!({ "playerIds": ["111", "222"] })).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();

    let job = wait_for_terminal(&app, id).await;
    assert_eq!(job["status"], "done");
    assert_eq!(job["resultRef"], format!("job_{id}/task_status.csv"));
    assert!(job["finishedAt"].is_string());

    let url = job["resultUrl"].as_str().unwrap().to_owned();
    let (status, body) = get(&app.router, &url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String(NoOpExecutor::STATUS_HEADER.to_owned()));

    worker.stop().await.unwrap();
}

/// Outcome picked by the first player id.
struct ScriptedExecutor;

#[async_trait]
impl JobExecutor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(
        &self,
        inputs: &[String],
        output_dir: &Path,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        match inputs.first().map(String::as_str) {
            Some("blocked") => Ok(ExecutionOutcome::Blocked {
                message: "challenge detected".into(),
                artifact_path: None,
            }),
            Some("fail") => Err(ExecutorError::failed("browser crashed")),
            _ => {
                let artifact_path = output_dir.join("result.csv");
                tokio::fs::write(&artifact_path, "player_id,status\n111,claimed\n")
                    .await
                    .map_err(|e| ExecutorError::io("write result", e))?;
                Ok(ExecutionOutcome::Success { artifact_path })
            }
        }
    }
}

#[tokio::test]
async fn outcomes_are_recorded_per_job_in_order() {
    let app = test_app().await;
    let queue: Arc<dyn QueueBackend> = app.queue.clone();
    let worker =
        Worker::new(app.store.clone(), queue, Arc::new(ScriptedExecutor), settings(&app)).start();

    for first in ["fail", "blocked", "ok"] {
        post_json(&app.router, "/api/jobs", json!({ "playerIds": [first] })).await;
    }

    let failed = wait_for_terminal(&app, 1).await;
    assert_eq!(failed["status"], "error");
    assert_eq!(failed["resultRef"], "browser crashed");
    assert!(failed["resultUrl"].is_null());

    let blocked = wait_for_terminal(&app, 2).await;
    assert_eq!(blocked["status"], "blocked");
    assert_eq!(blocked["resultRef"], "challenge detected");
    assert!(blocked["resultUrl"].is_null());

    let done = wait_for_terminal(&app, 3).await;
    assert_eq!(done["status"], "done");
    assert_eq!(done["resultRef"], "job_3/result.csv");

    let finished_order: Vec<String> = [&failed, &blocked, &done]
        .iter()
        .map(|job| job["finishedAt"].as_str().unwrap().to_owned())
        .collect();
    let mut sorted = finished_order.clone();
    sorted.sort();
    assert_eq!(finished_order, sorted);

    worker.stop().await.unwrap();
}

#[tokio::test]
async fn artifact_service_does_not_escape_output_root() {
    let app = test_app().await;
    let (status, _) = get(&app.router, "/api/jobs_data/../Cargo.toml").await;
    assert!(status.is_client_error(), "{status}");
}
