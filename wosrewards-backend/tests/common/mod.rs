#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use wosrewards_backend::build_router;
use wosrewards_backend::state::AppState;
use wosrewards_db::{DbConnectionConfig, DbPool, SqlJobStore};
use wosrewards_job_queue::{Dispatcher, JobStore, MemoryQueue, QueueBackend};

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    pub store: Arc<dyn JobStore>,
    pub queue: Arc<MemoryQueue>,
    pub output: TempDir,
}

/// Router over a migrated in-memory database and an in-process queue.
pub async fn test_app() -> TestApp {
    let queue = Arc::new(MemoryQueue::new());
    test_app_with_queue(queue.clone(), queue).await
}

pub async fn test_app_with_queue(
    queue: Arc<MemoryQueue>,
    backend: Arc<dyn QueueBackend>,
) -> TestApp {
    let pool = wosrewards_db::create_pool(&DbConnectionConfig::new("sqlite::memory:"))
        .await
        .expect("create pool");
    wosrewards_migrations::sqlite_migrator()
        .run(&pool)
        .await
        .expect("run migrations");

    let store: Arc<dyn JobStore> = Arc::new(SqlJobStore::new(pool.clone()));
    let output = tempfile::tempdir().expect("output dir");
    let dispatcher = Dispatcher::new(store.clone(), backend);
    let state = AppState::new(pool.clone(), dispatcher, output.path());

    TestApp {
        router: build_router(Arc::new(state)),
        pool,
        store,
        queue,
        output,
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("oneshot");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(
        router,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        router,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn post_empty(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(
        router,
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}
