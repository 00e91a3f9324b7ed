use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::authz::policy;
use crate::errors::{AppError, AppResult};
use crate::models::project::{
    DbProject, Project, ProjectCreateRequest, ProjectUpdateRequest, ProjectWithTasks,
};
use crate::models::task::{DbTask, Task};
use crate::utils::{parse_date, utc_now};

fn require_project_admin(auth: &AuthUser) -> AppResult<()> {
    if !policy::can_manage_projects(&auth.roles) {
        return Err(AppError::forbidden("administrator role required"));
    }
    Ok(())
}

fn check_date_order(start: Option<NaiveDate>, end: Option<NaiveDate>) -> AppResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(AppError::validation("start date cannot be after end date"));
        }
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    responses((status = 200, description = "List projects", body = [Project])),
    security(("bearerAuth" = []))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<Vec<Project>>> {
    let projects = sqlx::query_as::<_, DbProject>(
        "SELECT id, name, description, start_date, end_date, owner_user_id, created_at, updated_at FROM projects ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(projects.into_iter().map(Project::from).collect()))
}

#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    request_body = ProjectCreateRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 403, description = "Caller is not an administrator"),
        (status = 409, description = "Project name already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProjectCreateRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    require_project_admin(&auth)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::validation("project name is required"));
    }

    let start_date = payload
        .start_date
        .as_deref()
        .map(|raw| parse_date(raw, "start_date"))
        .transpose()?;
    let end_date = payload
        .end_date
        .as_deref()
        .map(|raw| parse_date(raw, "end_date"))
        .transpose()?;
    check_date_order(start_date, end_date)?;

    // Owner defaults to the authenticated caller.
    let owner_user_id = payload.owner_user_id.unwrap_or_else(|| auth.user_id());
    ensure_user_exists(&state.pool, owner_user_id).await?;

    let project_id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO projects (id, name, description, start_date, end_date, owner_user_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(start_date)
    .bind(end_date)
    .bind(owner_user_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    tracing::info!("project '{}' created by {}", payload.name, auth.user.username);

    let project = fetch_project(&state.pool, project_id).await?;
    Ok((StatusCode::CREATED, Json(project.into())))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Project detail with tasks", body = ProjectWithTasks)),
    security(("bearerAuth" = []))
)]
pub async fn get_project(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProjectWithTasks>> {
    let project = fetch_project(&state.pool, id).await?;
    let tasks = fetch_project_tasks(&state.pool, id).await?;

    Ok(Json(ProjectWithTasks::new(project.into(), tasks)))
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectUpdateRequest,
    responses(
        (status = 200, description = "Project updated", body = ProjectWithTasks),
        (status = 400, description = "Date validation failed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProjectUpdateRequest>,
) -> AppResult<Json<ProjectWithTasks>> {
    require_project_admin(&auth)?;

    let mut project = fetch_project(&state.pool, id).await?;

    if let Some(name) = payload.name {
        project.name = name;
    }
    if let Some(description) = payload.description {
        project.description = description;
    }
    if let Some(start_date) = payload.start_date {
        project.start_date = start_date
            .as_deref()
            .map(|raw| parse_date(raw, "start_date"))
            .transpose()?;
    }
    if let Some(end_date) = payload.end_date {
        project.end_date = end_date
            .as_deref()
            .map(|raw| parse_date(raw, "end_date"))
            .transpose()?;
    }

    // The ordering invariant holds on the final state, whichever side
    // the request touched.
    check_date_order(project.start_date, project.end_date)?;

    if let Some(owner_user_id) = payload.owner_user_id {
        ensure_user_exists(&state.pool, owner_user_id).await?;
        project.owner_user_id = Some(owner_user_id);
    }

    let now = utc_now();

    sqlx::query(
        "UPDATE projects SET name = ?, description = ?, start_date = ?, end_date = ?, owner_user_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.start_date)
    .bind(project.end_date)
    .bind(project.owner_user_id)
    .bind(now)
    .bind(project.id)
    .execute(&state.pool)
    .await?;

    project.updated_at = now;
    let tasks = fetch_project_tasks(&state.pool, id).await?;

    Ok(Json(ProjectWithTasks::new(project.into(), tasks)))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 204, description = "Project and its tasks deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_project_admin(&auth)?;

    let project = fetch_project(&state.pool, id).await?;

    // Tasks cascade through the schema.
    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project.id)
        .execute(&state.pool)
        .await?;

    tracing::info!("project '{}' deleted by {}", project.name, auth.user.username);

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_project(pool: &SqlitePool, project_id: Uuid) -> AppResult<DbProject> {
    sqlx::query_as::<_, DbProject>(
        "SELECT id, name, description, start_date, end_date, owner_user_id, created_at, updated_at FROM projects WHERE id = ?",
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("project not found"))
}

async fn fetch_project_tasks(pool: &SqlitePool, project_id: Uuid) -> AppResult<Vec<Task>> {
    let rows = sqlx::query_as::<_, DbTask>(
        "SELECT id, description, due_date, status, owner_user_id, assigned_to_user_id, project_id, created_at, updated_at \
         FROM tasks WHERE project_id = ? ORDER BY created_at DESC",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Task::try_from).collect()
}

async fn ensure_user_exists(pool: &SqlitePool, user_id: Uuid) -> AppResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    if !exists {
        return Err(AppError::not_found(format!("owner user {user_id} not found")));
    }

    Ok(())
}
