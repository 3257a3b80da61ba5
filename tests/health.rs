mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::spawn_app;

#[tokio::test]
async fn health_endpoint_reports_db_and_listener() -> Result<()> {
    let app = spawn_app().await?;

    let (status, v) = app.send("GET", "/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK, "health endpoint did not return 200");

    assert_eq!(v["db_ok"], true, "expected db_ok: true, got: {}", v);
    assert_eq!(v["status"], "ok");
    assert!(v["event_listeners"].as_u64().unwrap_or(0) >= 1);

    Ok(())
}
