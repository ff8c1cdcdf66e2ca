use std::net::Ipv4Addr;
use std::sync::Arc;

use wosrewards_backend::build_router;
use wosrewards_backend::state::AppState;
use wosrewards_db::{DbConnectionConfig, SqlJobStore};
use wosrewards_job_queue::{connect_queue, Dispatcher, QueueSettings};

#[tokio::test]
async fn startup_with_config_binds_and_serves_health() {
    let spool = tempfile::tempdir().expect("spool dir");
    let output = tempfile::tempdir().expect("output dir");

    let mut cfg = wosrewards_config::Config::default();
    cfg.queue.spool_dir = spool.path().display().to_string();
    wosrewards_config::validate_config(&cfg).expect("default config is valid");

    let pool = wosrewards_db::create_pool(&DbConnectionConfig::new("sqlite::memory:"))
        .await
        .expect("create pool");
    wosrewards_migrations::sqlite_migrator()
        .run(&pool)
        .await
        .expect("run migrations");

    let queue = connect_queue(&QueueSettings::from_config(&cfg.queue))
        .await
        .expect("connect queue");
    assert_eq!(queue.name(), "local");
    let dispatcher = Dispatcher::new(Arc::new(SqlJobStore::new(pool.clone())), queue);
    let router = build_router(Arc::new(AppState::new(pool, dispatcher, output.path())));

    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local_addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let base = format!("http://{}:{}/api", addr.ip(), addr.port());
    let res = reqwest::get(format!("{base}/health")).await.expect("request");
    assert!(res.status().is_success());

    let res = reqwest::Client::new()
        .post(format!("{base}/jobs"))
        .json(&serde_json::json!({ "playerIds": ["111"] }))
        .send()
        .await
        .expect("submit");
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.expect("json body");
    assert_eq!(body["status"], "queued");
    assert_eq!(std::fs::read_dir(spool.path()).unwrap().count(), 2);

    handle.abort();
}
