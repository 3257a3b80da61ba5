#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use access_hub::create_app;

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    // Dropping the dir deletes the database file.
    _dir: TempDir,
}

pub async fn migrated_pool() -> Result<(SqlitePool, TempDir)> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok((pool, dir))
}

pub async fn spawn_app() -> Result<TestApp> {
    let (pool, dir) = migrated_pool().await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok(TestApp { app, pool, _dir: dir })
}

impl TestApp {
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body from {} {}", method, uri))?
        };

        Ok((status, value))
    }

    /// Registers a user and returns (token, user id).
    pub async fn register(&self, name: &str, email: &str) -> Result<(String, String)> {
        let body = json!({ "name": name, "email": email, "password": "password123" });
        let (status, value) = self.send("POST", "/auth/register", None, Some(body)).await?;
        assert_eq!(status, StatusCode::CREATED, "register {} failed: {}", email, value);

        let token = value["token"].as_str().context("missing token")?.to_string();
        let user_id = value["user"]["id"].as_str().context("missing user id")?.to_string();
        Ok((token, user_id))
    }

    pub async fn grant(&self, admin_token: &str, user_id: &str, role: &str) -> Result<()> {
        let (status, value) = self
            .send("POST", &format!("/users/{}/roles", user_id), Some(admin_token), Some(json!({ "role": role })))
            .await?;
        assert_eq!(status, StatusCode::OK, "grant {} failed: {}", role, value);
        Ok(())
    }

    pub async fn move_to(&self, admin_token: &str, user_id: &str, department_id: &str) -> Result<()> {
        let (status, value) = self
            .send(
                "PUT",
                &format!("/users/{}/department", user_id),
                Some(admin_token),
                Some(json!({ "department_id": department_id })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "set department failed: {}", value);
        Ok(())
    }

    pub async fn create(&self, token: &str, uri: &str, body: Value) -> Result<Value> {
        let (status, value) = self.send("POST", uri, Some(token), Some(body)).await?;
        assert_eq!(status, StatusCode::CREATED, "POST {} failed: {}", uri, value);
        Ok(value)
    }
}

/// The activity listener runs on its own task; poll until it catches up.
pub async fn wait_for_count(pool: &SqlitePool, sql: &str, bind: &str, at_least: i64) -> Result<i64> {
    let mut count = 0;
    for _ in 0..50 {
        count = sqlx::query_scalar::<_, i64>(sql).bind(bind).fetch_one(pool).await?;
        if count >= at_least {
            break;
        }
        tokio::time::sleep(Duration::from_millis(40)).await;
    }
    Ok(count)
}

pub fn id_of(value: &Value) -> Result<String> {
    value["id"].as_str().map(str::to_string).context("missing id")
}
