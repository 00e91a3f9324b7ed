use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{create_user_with_role, login, request, setup};

/// The full flow: an admin provisions users, a task_creator is denied
/// project creation but creates tasks, and task assignment is gated on
/// the assignee's `read_only_user` role.
#[tokio::test]
async fn full_api_flow() -> Result<()> {
    let t = setup().await?;

    create_user_with_role(&t.pool, "root", "password123", Some("admin")).await?;
    let admin_token = login(&t.app, "root", "password123").await?;

    // -- admin creates user A (task_creator)
    let (status, body) = request(
        &t.app,
        "POST",
        "/users",
        Some(&admin_token),
        Some(json!({
            "username": "alice",
            "password": "password123",
            "full_name": "Alice A",
            "role_name": "task_creator"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "user create failed: {body}");
    assert_eq!(body["roles"][0]["name"], "task_creator");

    // -- and user B, also task_creator (so B lacks read_only_user)
    let (status, body) = request(
        &t.app,
        "POST",
        "/users",
        Some(&admin_token),
        Some(json!({
            "username": "bob",
            "password": "password123",
            "role_name": "task_creator"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "user create failed: {body}");
    let bob_id = body["id"].as_str().unwrap().to_string();

    let alice_token = login(&t.app, "alice", "password123").await?;

    // -- A cannot create projects
    let (status, body) = request(
        &t.app,
        "POST",
        "/projects",
        Some(&alice_token),
        Some(json!({ "name": "Forbidden Project" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "expected 403, got: {body}");

    // -- admin creates project P
    let (status, body) = request(
        &t.app,
        "POST",
        "/projects",
        Some(&admin_token),
        Some(json!({
            "name": "Launch Planning",
            "description": "Prepare the launch.",
            "start_date": "2025-06-01",
            "end_date": "2025-09-30"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "project create failed: {body}");
    let project_id = body["id"].as_str().unwrap().to_string();

    // -- A creates task T on P; A becomes owner
    let (status, body) = request(
        &t.app,
        "POST",
        "/tasks",
        Some(&alice_token),
        Some(json!({
            "description": "Define launch checklist",
            "project_id": project_id
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "task create failed: {body}");
    assert_eq!(body["status"], "new");
    let task_id = body["id"].as_str().unwrap().to_string();

    let (status, me_body) = request(&t.app, "GET", "/users/me", Some(&alice_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["owner_user_id"], me_body["id"]);

    // -- assigning T to B fails: B lacks read_only_user
    let (status, body) = request(
        &t.app,
        "PUT",
        &format!("/tasks/{task_id}"),
        Some(&alice_token),
        Some(json!({ "assigned_to_user_id": bob_id })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "expected 403, got: {body}");
    assert_eq!(body["error"], "assignment_not_allowed");

    // -- admin grants B read_only_user, retry succeeds
    let (status, body) = request(
        &t.app,
        "POST",
        &format!("/users/{bob_id}/roles"),
        Some(&admin_token),
        Some(json!({ "role_name": "read_only_user" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "role grant failed: {body}");

    let (status, body) = request(
        &t.app,
        "PUT",
        &format!("/tasks/{task_id}"),
        Some(&alice_token),
        Some(json!({ "assigned_to_user_id": bob_id })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "assignment retry failed: {body}");
    assert_eq!(body["assigned_to_user_id"].as_str().unwrap(), bob_id);

    // -- B (assignee) completes the task; second complete is a no-op
    let bob_token = login(&t.app, "bob", "password123").await?;
    let (status, body) = request(
        &t.app,
        "POST",
        &format!("/tasks/{task_id}/complete"),
        Some(&bob_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "complete failed: {body}");
    assert_eq!(body["status"], "completed");

    let (status, body) = request(
        &t.app,
        "POST",
        &format!("/tasks/{task_id}/complete"),
        Some(&bob_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "second complete should be a no-op: {body}");
    assert_eq!(body["status"], "completed");

    // -- the task shows up under B's assigned view
    let (status, body) = request(&t.app, "GET", "/tasks/my", Some(&bob_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .any(|task| task["id"].as_str() == Some(task_id.as_str())));

    Ok(())
}

#[tokio::test]
async fn project_detail_includes_tasks() -> Result<()> {
    let t = setup().await?;

    create_user_with_role(&t.pool, "root", "password123", Some("admin")).await?;
    let token = login(&t.app, "root", "password123").await?;

    let (_, project) = request(
        &t.app,
        "POST",
        "/projects",
        Some(&token),
        Some(json!({ "name": "With Tasks" })),
    )
    .await?;
    let project_id = project["id"].as_str().unwrap();

    let (_, task) = request(
        &t.app,
        "POST",
        "/tasks",
        Some(&token),
        Some(json!({ "description": "embedded", "project_id": project_id })),
    )
    .await?;

    let (status, body) = request(
        &t.app,
        "GET",
        &format!("/projects/{project_id}"),
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], task["id"]);

    Ok(())
}
