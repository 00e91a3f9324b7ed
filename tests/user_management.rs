use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{create_user_with_role, login, request, setup};

#[tokio::test]
async fn user_management_is_admin_only() -> Result<()> {
    let t = setup().await?;

    create_user_with_role(&t.pool, "root", "password123", Some("admin")).await?;
    let peasant_id =
        create_user_with_role(&t.pool, "peasant", "password123", Some("task_creator")).await?;
    let peasant_token = login(&t.app, "peasant", "password123").await?;

    let (status, _) = request(&t.app, "GET", "/users", Some(&peasant_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = request(
        &t.app,
        "GET",
        &format!("/users/{peasant_id}"),
        Some(&peasant_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = request(
        &t.app,
        "POST",
        "/users",
        Some(&peasant_token),
        Some(json!({ "username": "x", "password": "password123", "role_name": "read_only_user" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // there is no self-service exception, but /users/me is open
    let (status, body) = request(&t.app, "GET", "/users/me", Some(&peasant_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "peasant");

    // any authenticated user may list the seeded roles
    let (status, body) = request(&t.app, "GET", "/users/roles", Some(&peasant_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["admin", "read_only_user", "task_creator"]);

    Ok(())
}

#[tokio::test]
async fn duplicate_username_conflicts_and_leaves_the_first_intact() -> Result<()> {
    let t = setup().await?;

    create_user_with_role(&t.pool, "root", "password123", Some("admin")).await?;
    let admin_token = login(&t.app, "root", "password123").await?;

    let (status, _) = request(
        &t.app,
        "POST",
        "/users",
        Some(&admin_token),
        Some(json!({ "username": "ada", "password": "password123", "role_name": "read_only_user" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = request(
        &t.app,
        "POST",
        "/users",
        Some(&admin_token),
        Some(json!({ "username": "ada", "password": "different-pass", "role_name": "read_only_user" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT, "expected 409, got: {body}");

    // the original user still logs in with the original password
    login(&t.app, "ada", "password123").await?;

    Ok(())
}

#[tokio::test]
async fn create_user_requires_a_seeded_role() -> Result<()> {
    let t = setup().await?;

    create_user_with_role(&t.pool, "root", "password123", Some("admin")).await?;
    let admin_token = login(&t.app, "root", "password123").await?;

    let (status, body) = request(
        &t.app,
        "POST",
        "/users",
        Some(&admin_token),
        Some(json!({ "username": "nobody", "password": "password123", "role_name": "superuser" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "expected 400, got: {body}");

    Ok(())
}

#[tokio::test]
async fn put_user_replaces_the_whole_role_set() -> Result<()> {
    let t = setup().await?;

    create_user_with_role(&t.pool, "root", "password123", Some("admin")).await?;
    let admin_token = login(&t.app, "root", "password123").await?;

    // start with two roles through the additive API
    let worker_id =
        create_user_with_role(&t.pool, "worker", "password123", Some("task_creator")).await?;
    let (status, _) = request(
        &t.app,
        "POST",
        &format!("/users/{worker_id}/roles"),
        Some(&admin_token),
        Some(json!({ "role_name": "read_only_user" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = request(
        &t.app,
        "GET",
        &format!("/users/{worker_id}/roles"),
        Some(&admin_token),
        None,
    )
    .await?;
    assert_eq!(body.as_array().unwrap().len(), 2);

    // PUT with a role name collapses to the single-slot policy
    let (status, body) = request(
        &t.app,
        "PUT",
        &format!("/users/{worker_id}"),
        Some(&admin_token),
        Some(json!({ "role_name": "read_only_user" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "expected 200, got: {body}");
    let roles = body["roles"].as_array().unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0]["name"], "read_only_user");

    Ok(())
}

#[tokio::test]
async fn additive_role_api_rejects_duplicates_and_unknown_targets() -> Result<()> {
    let t = setup().await?;

    create_user_with_role(&t.pool, "root", "password123", Some("admin")).await?;
    let admin_token = login(&t.app, "root", "password123").await?;
    let user_id = create_user_with_role(&t.pool, "worker", "password123", Some("read_only_user")).await?;

    // duplicate assignment
    let (status, _) = request(
        &t.app,
        "POST",
        &format!("/users/{user_id}/roles"),
        Some(&admin_token),
        Some(json!({ "role_name": "read_only_user" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // unknown role name
    let (status, _) = request(
        &t.app,
        "POST",
        &format!("/users/{user_id}/roles"),
        Some(&admin_token),
        Some(json!({ "role_name": "wizard" })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // revoking an assignment that does not exist
    let (status, _) = request(
        &t.app,
        "DELETE",
        &format!("/users/{user_id}/roles/00000000-0000-0000-0000-000000000000"),
        Some(&admin_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn deleting_a_user_nulls_task_ownership_and_keeps_tasks() -> Result<()> {
    let t = setup().await?;

    create_user_with_role(&t.pool, "root", "password123", Some("admin")).await?;
    let admin_token = login(&t.app, "root", "password123").await?;

    let (_, body) = request(
        &t.app,
        "POST",
        "/users",
        Some(&admin_token),
        Some(json!({ "username": "ghost", "password": "password123", "role_name": "task_creator" })),
    )
    .await?;
    let ghost_id = body["id"].as_str().unwrap().to_string();
    let ghost_token = login(&t.app, "ghost", "password123").await?;

    let (_, project) = request(
        &t.app,
        "POST",
        "/projects",
        Some(&admin_token),
        Some(json!({ "name": "Haunted" })),
    )
    .await?;
    let project_id = project["id"].as_str().unwrap();

    let (_, task) = request(
        &t.app,
        "POST",
        "/tasks",
        Some(&ghost_token),
        Some(json!({ "description": "orphan me", "project_id": project_id })),
    )
    .await?;
    let task_id = task["id"].as_str().unwrap().to_string();

    let (status, _) = request(
        &t.app,
        "DELETE",
        &format!("/users/{ghost_id}"),
        Some(&admin_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // the task survives with its owner cleared
    let (status, body) = request(
        &t.app,
        "GET",
        &format!("/tasks/{task_id}"),
        Some(&admin_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["owner_user_id"].is_null());

    Ok(())
}

#[tokio::test]
async fn deleting_a_project_cascades_to_its_tasks() -> Result<()> {
    let t = setup().await?;

    create_user_with_role(&t.pool, "root", "password123", Some("admin")).await?;
    let admin_token = login(&t.app, "root", "password123").await?;

    let (_, project) = request(
        &t.app,
        "POST",
        "/projects",
        Some(&admin_token),
        Some(json!({ "name": "Doomed" })),
    )
    .await?;
    let project_id = project["id"].as_str().unwrap();

    let (_, task) = request(
        &t.app,
        "POST",
        "/tasks",
        Some(&admin_token),
        Some(json!({ "description": "going down with the ship", "project_id": project_id })),
    )
    .await?;
    let task_id = task["id"].as_str().unwrap();

    let (status, _) = request(
        &t.app,
        "DELETE",
        &format!("/projects/{project_id}"),
        Some(&admin_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = request(
        &t.app,
        "GET",
        &format!("/tasks/{task_id}"),
        Some(&admin_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
