//! Role store backed by the `roles` / `user_roles` tables.
//!
//! Two role-management policies coexist by design: the additive
//! [`assign`]/[`revoke`] pair used by the role endpoints, and the
//! single-slot [`replace_role`] used by user-management updates.

use std::collections::HashSet;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::roles::{ADMIN, READ_ONLY_USER, TASK_CREATOR};
use crate::errors::{AppError, AppResult};
use crate::models::role::{DbRole, Role, UserRole};
use crate::utils::utc_now;

/// Inserts the seeded roles if absent. Called once at startup; roles are
/// reference data and are never created through the API.
pub async fn seed(pool: &SqlitePool) -> AppResult<()> {
    let defaults: [(&str, &str); 3] = [
        (ADMIN, "Administrator with full system access."),
        (TASK_CREATOR, "User who can create projects and tasks."),
        (READ_ONLY_USER, "User with read-only access, can mark tasks complete."),
    ];

    for (name, description) in defaults {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM roles WHERE name = ?)")
            .bind(name)
            .fetch_one(pool)
            .await?;

        if !exists {
            sqlx::query("INSERT INTO roles (id, name, description) VALUES (?, ?, ?)")
                .bind(Uuid::new_v4())
                .bind(name)
                .bind(description)
                .execute(pool)
                .await?;
            tracing::info!("seeded role '{name}'");
        }
    }

    Ok(())
}

/// The caller's live role-name set. Empty set when nothing is assigned.
pub async fn roles_of(pool: &SqlitePool, user_id: Uuid) -> AppResult<HashSet<String>> {
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT r.name FROM roles r INNER JOIN user_roles ur ON ur.role_id = r.id WHERE ur.user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(names.into_iter().collect())
}

pub async fn roles_of_detailed(pool: &SqlitePool, user_id: Uuid) -> AppResult<Vec<Role>> {
    let rows = sqlx::query_as::<_, DbRole>(
        "SELECT r.id, r.name, r.description FROM roles r \
         INNER JOIN user_roles ur ON ur.role_id = r.id WHERE ur.user_id = ? ORDER BY r.name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Role::from).collect())
}

pub async fn all(pool: &SqlitePool) -> AppResult<Vec<Role>> {
    let rows =
        sqlx::query_as::<_, DbRole>("SELECT id, name, description FROM roles ORDER BY name")
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(Role::from).collect())
}

pub async fn find_by_name(pool: &SqlitePool, name: &str) -> AppResult<Option<DbRole>> {
    let role =
        sqlx::query_as::<_, DbRole>("SELECT id, name, description FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;

    Ok(role)
}

/// Look up a role the deployment is required to have seeded. Its absence
/// is an operational defect, not a user error.
pub async fn require_seeded(pool: &SqlitePool, name: &str) -> AppResult<DbRole> {
    find_by_name(pool, name)
        .await?
        .ok_or_else(|| AppError::configuration(format!("seeded role '{name}' is missing")))
}

/// Additive assignment. The (user, role) pair is unique; assigning an
/// already-held role is a conflict, not a no-op.
pub async fn assign(pool: &SqlitePool, user_id: Uuid, role_name: &str) -> AppResult<UserRole> {
    let role = find_by_name(pool, role_name)
        .await?
        .ok_or_else(|| AppError::not_found(format!("role '{role_name}' not found")))?;

    let already: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = ? AND role_id = ?)",
    )
    .bind(user_id)
    .bind(role.id)
    .fetch_one(pool)
    .await?;

    if already {
        return Err(AppError::conflict(format!(
            "role '{role_name}' is already assigned to this user"
        )));
    }

    let assigned_at = utc_now();
    sqlx::query("INSERT INTO user_roles (user_id, role_id, assigned_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(role.id)
        .bind(assigned_at)
        .execute(pool)
        .await?;

    Ok(UserRole {
        user_id,
        role_id: role.id,
        assigned_at,
    })
}

pub async fn revoke(pool: &SqlitePool, user_id: Uuid, role_id: Uuid) -> AppResult<()> {
    let affected = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_id = ?")
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("role assignment not found"));
    }

    Ok(())
}

/// Single-slot semantics: atomically drop every existing assignment for
/// the user and install exactly one role.
pub async fn replace_role(pool: &SqlitePool, user_id: Uuid, role_name: &str) -> AppResult<()> {
    let role = find_by_name(pool, role_name)
        .await?
        .ok_or_else(|| AppError::not_found(format!("role '{role_name}' not found")))?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO user_roles (user_id, role_id, assigned_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(role.id)
        .bind(utc_now())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}
