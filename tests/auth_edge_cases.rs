use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use task_track::auth::JwtConfig;

mod common;
use common::{create_user_with_role, login, request, setup};

#[tokio::test]
async fn missing_and_malformed_credentials() -> Result<()> {
    let t = setup().await?;

    let (status, _) = request(&t.app, "GET", "/projects", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = request(&t.app, "GET", "/projects", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_invalid");

    Ok(())
}

#[tokio::test]
async fn expired_token_is_reported_as_expired() -> Result<()> {
    let t = setup().await?;
    let user_id = create_user_with_role(&t.pool, "expired", "password123", None).await?;

    // Same secret as the app under test, but an expiry in the past.
    let stale_jwt = JwtConfig {
        secret: Arc::new(b"test-secret".to_vec()),
        exp_hours: -1,
    };
    let token = stale_jwt.encode(user_id, &HashSet::new())?;

    let (status, body) = request(&t.app, "GET", "/users/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_expired");

    Ok(())
}

#[tokio::test]
async fn token_signed_with_wrong_secret_is_invalid() -> Result<()> {
    let t = setup().await?;
    let user_id = create_user_with_role(&t.pool, "spoofed", "password123", None).await?;

    let forged = JwtConfig {
        secret: Arc::new(b"attacker-secret".to_vec()),
        exp_hours: 24,
    };
    let token = forged.encode(user_id, &HashSet::new())?;

    let (status, body) = request(&t.app, "GET", "/users/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_invalid");

    Ok(())
}

#[tokio::test]
async fn deactivated_user_is_rejected_with_a_live_token() -> Result<()> {
    let t = setup().await?;

    create_user_with_role(&t.pool, "root", "password123", Some("admin")).await?;
    let victim_id = create_user_with_role(&t.pool, "victim", "password123", None).await?;

    let admin_token = login(&t.app, "root", "password123").await?;
    let victim_token = login(&t.app, "victim", "password123").await?;

    // token works before deactivation
    let (status, _) = request(&t.app, "GET", "/users/me", Some(&victim_token), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(
        &t.app,
        "PUT",
        &format!("/users/{victim_id}"),
        Some(&admin_token),
        Some(json!({ "is_active": false })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // the very next use of the outstanding token is rejected
    let (status, _) = request(&t.app, "GET", "/users/me", Some(&victim_token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // and logging in again also fails
    let (status, _) = request(
        &t.app,
        "POST",
        "/users/login",
        None,
        Some(json!({ "username": "victim", "password": "password123" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn role_revocation_applies_on_the_next_request() -> Result<()> {
    let t = setup().await?;

    create_user_with_role(&t.pool, "root", "password123", Some("admin")).await?;
    let deputy_id = create_user_with_role(&t.pool, "deputy", "password123", Some("admin")).await?;

    let root_token = login(&t.app, "root", "password123").await?;
    let deputy_token = login(&t.app, "deputy", "password123").await?;

    // deputy can perform admin-only operations
    let (status, _) = request(&t.app, "GET", "/users", Some(&deputy_token), None).await?;
    assert_eq!(status, StatusCode::OK);

    // root revokes deputy's admin role
    let (status, roles) = request(
        &t.app,
        "GET",
        &format!("/users/{deputy_id}/roles"),
        Some(&root_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let role_id = roles[0]["id"].as_str().unwrap().to_string();

    let (status, _) = request(
        &t.app,
        "DELETE",
        &format!("/users/{deputy_id}/roles/{role_id}"),
        Some(&root_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // the token still carries the stale admin claim, but the live role
    // store wins: the same credential is now denied
    let (status, _) = request(&t.app, "GET", "/users", Some(&deputy_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // non-admin surface still works for the demoted user
    let (status, _) = request(&t.app, "GET", "/users/me", Some(&deputy_token), None).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}
