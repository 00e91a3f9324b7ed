#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use task_track::auth::{AuthConfig, AuthMode, JwtConfig};
use task_track::app::AppConfig;
use task_track::{create_app, role_store, utils};

const BODY_LIMIT: usize = 10_485_760;

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    // Keeps the SQLite file alive for the duration of the test.
    _dir: TempDir,
}

pub fn test_jwt() -> JwtConfig {
    JwtConfig {
        secret: Arc::new(b"test-secret".to_vec()),
        exp_hours: 24,
    }
}

pub fn bearer_config() -> AppConfig {
    AppConfig {
        auth: AuthConfig {
            mode: AuthMode::Bearer(test_jwt()),
        },
        oauth: None,
    }
}

pub async fn setup() -> Result<TestApp> {
    setup_with_config(bearer_config()).await
}

pub async fn setup_with_config(config: AppConfig) -> Result<TestApp> {
    let dir = TempDir::new().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    let app = create_app(pool.clone(), config).await?;

    Ok(TestApp {
        app,
        pool,
        _dir: dir,
    })
}

/// Insert a user directly and optionally give it a role. Tests need a
/// bootstrap admin before the admin-gated user API is reachable.
pub async fn create_user_with_role(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    role: Option<&str>,
) -> Result<Uuid> {
    let user_id = Uuid::new_v4();
    let password_hash = utils::hash_password(password)?;

    sqlx::query(
        "INSERT INTO users (id, username, password_hash, full_name, email, is_active, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(username)
    .bind(password_hash)
    .bind(Option::<String>::None)
    .bind(Option::<String>::None)
    .bind(true)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    if let Some(role_name) = role {
        role_store::assign(pool, user_id, role_name).await?;
    }

    Ok(user_id)
}

pub async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    json_body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    let req = match json_body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
    };

    Ok((status, value))
}

pub async fn login(app: &Router, username: &str, password: &str) -> Result<String> {
    let (status, body) = request(
        app,
        "POST",
        "/users/login",
        None,
        Some(serde_json::json!({ "username": username, "password": password })),
    )
    .await?;

    if status != StatusCode::OK {
        anyhow::bail!("login failed for {}: {} - {}", username, status, body);
    }

    body.get("token")
        .and_then(|v| v.as_str())
        .map(String::from)
        .context("missing token in login response")
}
