use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::authz::policy;
use crate::authz::roles::READ_ONLY_USER;
use crate::errors::{AppError, AppResult};
use crate::models::task::{DbTask, Task, TaskCreateRequest, TaskStatus, TaskUpdateRequest};
use crate::role_store;
use crate::utils::{parse_date, utc_now};

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub project_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    params(("project_id" = Option<Uuid>, Query, description = "Filter by project")),
    responses((status = 200, description = "List tasks", body = [Task])),
    security(("bearerAuth" = []))
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
    _auth: AuthUser,
) -> AppResult<Json<Vec<Task>>> {
    let rows = match query.project_id {
        Some(project_id) => {
            ensure_project_exists(&state.pool, project_id).await?;
            sqlx::query_as::<_, DbTask>(
                "SELECT id, description, due_date, status, owner_user_id, assigned_to_user_id, project_id, created_at, updated_at \
                 FROM tasks WHERE project_id = ? ORDER BY created_at DESC",
            )
            .bind(project_id)
            .fetch_all(&state.pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, DbTask>(
                "SELECT id, description, due_date, status, owner_user_id, assigned_to_user_id, project_id, created_at, updated_at \
                 FROM tasks ORDER BY created_at DESC",
            )
            .fetch_all(&state.pool)
            .await?
        }
    };

    let tasks: Vec<Task> = rows.into_iter().map(Task::try_from).collect::<Result<_, _>>()?;
    Ok(Json(tasks))
}

#[utoipa::path(
    post,
    path = "/tasks",
    tag = "Tasks",
    request_body = TaskCreateRequest,
    responses(
        (status = 201, description = "Task created, caller becomes owner", body = Task),
        (status = 400, description = "Missing description or invalid status"),
        (status = 403, description = "Assignee lacks the read_only_user role"),
        (status = 404, description = "Project or assignee not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<TaskCreateRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    if payload.description.trim().is_empty() {
        return Err(AppError::validation("description is required"));
    }

    let status = match payload.status.as_deref() {
        Some(raw) => TaskStatus::parse(raw)?,
        None => TaskStatus::default(),
    };

    let due_date = payload
        .due_date
        .as_deref()
        .map(|raw| parse_date(raw, "due_date"))
        .transpose()?;

    ensure_project_exists(&state.pool, payload.project_id).await?;

    if let Some(assignee_id) = payload.assigned_to_user_id {
        ensure_assignable(&state.pool, assignee_id).await?;
    }

    let task_id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO tasks (id, description, due_date, status, owner_user_id, assigned_to_user_id, project_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task_id)
    .bind(&payload.description)
    .bind(due_date)
    .bind(status.as_str())
    .bind(auth.user_id())
    .bind(payload.assigned_to_user_id)
    .bind(payload.project_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    tracing::info!("task {task_id} created by {}", auth.user.username);

    let task = fetch_task(&state.pool, task_id).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses((status = 200, description = "Task detail", body = Task)),
    security(("bearerAuth" = []))
)]
pub async fn get_task(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Task>> {
    let task = fetch_task(&state.pool, id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    put,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = TaskUpdateRequest,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 403, description = "Field-level permission denied")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TaskUpdateRequest>,
) -> AppResult<Json<Task>> {
    let mut task = fetch_task(&state.pool, id).await?;

    if payload.is_empty() {
        return Err(AppError::validation("no valid fields provided for update"));
    }

    if policy::status_only_caller(&auth.roles) {
        // Pure read-only callers hold a narrow, ownership-independent
        // grant: the status field, and nothing else in the same request.
        if !payload.touches_only_status() {
            return Err(AppError::forbidden(
                "read-only users may update only the status field",
            ));
        }

        let status = payload.status.as_deref().map(TaskStatus::parse).transpose()?;
        task.status = status.unwrap_or(task.status);
    } else {
        if !policy::can_modify_task(auth.user_id(), &auth.roles, &task) {
            return Err(AppError::forbidden("not authorized to update this task"));
        }

        if let Some(description) = payload.description {
            if description.trim().is_empty() {
                return Err(AppError::validation("description cannot be empty"));
            }
            task.description = description;
        }

        if let Some(due_date) = payload.due_date {
            task.due_date = due_date
                .as_deref()
                .map(|raw| parse_date(raw, "due_date"))
                .transpose()?;
        }

        if let Some(raw) = payload.status.as_deref() {
            task.status = TaskStatus::parse(raw)?;
        }

        if let Some(new_owner) = payload.owner_user_id {
            if !policy::can_change_task_owner(&auth.roles) {
                return Err(AppError::forbidden("not authorized to change task owner"));
            }
            if let Some(owner_id) = new_owner {
                ensure_user_exists(&state.pool, owner_id).await?;
            }
            task.owner_user_id = new_owner;
        }

        if let Some(assignment) = payload.assigned_to_user_id {
            match assignment {
                Some(assignee_id) => {
                    ensure_assignable(&state.pool, assignee_id).await?;
                    task.assigned_to_user_id = Some(assignee_id);
                }
                // Unassigning is open to whoever may update the task.
                None => task.assigned_to_user_id = None,
            }
        }

        if let Some(new_project) = payload.project_id {
            if !policy::can_change_task_project(&auth.roles) {
                return Err(AppError::forbidden("not authorized to change the task's project"));
            }
            let project_id =
                new_project.ok_or_else(|| AppError::validation("project id cannot be null"))?;
            ensure_project_exists(&state.pool, project_id).await?;
            task.project_id = project_id;
        }
    }

    let now = utc_now();

    sqlx::query(
        "UPDATE tasks SET description = ?, due_date = ?, status = ?, owner_user_id = ?, assigned_to_user_id = ?, project_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&task.description)
    .bind(task.due_date)
    .bind(task.status.as_str())
    .bind(task.owner_user_id)
    .bind(task.assigned_to_user_id)
    .bind(task.project_id)
    .bind(now)
    .bind(task.id)
    .execute(&state.pool)
    .await?;

    tracing::info!("task {} updated by {}", task.id, auth.user.username);

    let task = fetch_task(&state.pool, task.id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 403, description = "Caller is neither owner, admin nor task_creator")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let task = fetch_task(&state.pool, id).await?;

    if !policy::can_delete_task(auth.user_id(), &auth.roles, &task) {
        return Err(AppError::forbidden("not authorized to delete this task"));
    }

    sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task.id)
        .execute(&state.pool)
        .await?;

    tracing::info!("task {} deleted by {}", task.id, auth.user.username);

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/tasks/{id}/complete",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task completed (idempotent)", body = Task),
        (status = 403, description = "Caller may not complete this task")
    ),
    security(("bearerAuth" = []))
)]
pub async fn complete_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Task>> {
    let task = fetch_task(&state.pool, id).await?;

    if !policy::can_complete_task(auth.user_id(), &auth.roles, &task) {
        return Err(AppError::forbidden("not authorized to complete this task"));
    }

    // Completing an already-completed task is a no-op success.
    if task.status == TaskStatus::Completed {
        return Ok(Json(task));
    }

    sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
        .bind(TaskStatus::Completed.as_str())
        .bind(utc_now())
        .bind(task.id)
        .execute(&state.pool)
        .await?;

    tracing::info!("task {} completed by {}", task.id, auth.user.username);

    let task = fetch_task(&state.pool, task.id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    get,
    path = "/tasks/my",
    tag = "Tasks",
    responses((status = 200, description = "Tasks assigned to the caller", body = [Task])),
    security(("bearerAuth" = []))
)]
pub async fn my_assigned_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Task>>> {
    let rows = sqlx::query_as::<_, DbTask>(
        "SELECT id, description, due_date, status, owner_user_id, assigned_to_user_id, project_id, created_at, updated_at \
         FROM tasks WHERE assigned_to_user_id = ? \
         ORDER BY due_date IS NULL, due_date ASC, created_at DESC",
    )
    .bind(auth.user_id())
    .fetch_all(&state.pool)
    .await?;

    let tasks: Vec<Task> = rows.into_iter().map(Task::try_from).collect::<Result<_, _>>()?;
    Ok(Json(tasks))
}

#[utoipa::path(
    get,
    path = "/tasks/owned",
    tag = "Tasks",
    responses((status = 200, description = "Tasks owned by the caller", body = [Task])),
    security(("bearerAuth" = []))
)]
pub async fn my_owned_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Task>>> {
    let rows = sqlx::query_as::<_, DbTask>(
        "SELECT id, description, due_date, status, owner_user_id, assigned_to_user_id, project_id, created_at, updated_at \
         FROM tasks WHERE owner_user_id = ? ORDER BY created_at DESC",
    )
    .bind(auth.user_id())
    .fetch_all(&state.pool)
    .await?;

    let tasks: Vec<Task> = rows.into_iter().map(Task::try_from).collect::<Result<_, _>>()?;
    Ok(Json(tasks))
}

async fn fetch_task(pool: &SqlitePool, task_id: Uuid) -> AppResult<Task> {
    let row = sqlx::query_as::<_, DbTask>(
        "SELECT id, description, due_date, status, owner_user_id, assigned_to_user_id, project_id, created_at, updated_at \
         FROM tasks WHERE id = ?",
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("task not found"))?;

    row.try_into()
}

async fn ensure_project_exists(pool: &SqlitePool, project_id: Uuid) -> AppResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?)")
        .bind(project_id)
        .fetch_one(pool)
        .await?;

    if !exists {
        return Err(AppError::not_found(format!("project {project_id} not found")));
    }

    Ok(())
}

async fn ensure_user_exists(pool: &SqlitePool, user_id: Uuid) -> AppResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    if !exists {
        return Err(AppError::not_found(format!("user {user_id} not found")));
    }

    Ok(())
}

/// The assignable-role invariant: the target must exist and currently
/// hold `read_only_user`. A missing seed role is an operator problem and
/// surfaces as a configuration error, never as a denial.
async fn ensure_assignable(pool: &SqlitePool, assignee_id: Uuid) -> AppResult<()> {
    let username: Option<String> = sqlx::query_scalar("SELECT username FROM users WHERE id = ?")
        .bind(assignee_id)
        .fetch_optional(pool)
        .await?;

    let username =
        username.ok_or_else(|| AppError::not_found(format!("assigned user {assignee_id} not found")))?;

    role_store::require_seeded(pool, READ_ONLY_USER).await?;

    let assignee_roles = role_store::roles_of(pool, assignee_id).await?;
    if !policy::can_be_assigned(&assignee_roles) {
        return Err(AppError::assignment_not_allowed(format!(
            "user '{username}' cannot be assigned tasks, must have '{READ_ONLY_USER}' role"
        )));
    }

    Ok(())
}
