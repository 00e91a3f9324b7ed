use std::collections::HashSet;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::roles::ADMIN;
use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, User};
use crate::role_store;

/// The resolved caller: user record plus live role set.
///
/// Handlers taking `AuthUser` get identity resolution for free; there is
/// no way to reach a permission check without it having run.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub roles: HashSet<String>,
}

impl AuthUser {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN)
    }
}

pub fn bearer_token(headers: &axum::http::HeaderMap) -> AppResult<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthorized("Authorization header missing"))
}

/// Resolve a credential all the way to an [`AuthUser`].
///
/// The subject id from the credential is never trusted on its own: the
/// user row is re-fetched (existence + active flag) and the role set is
/// re-queried, so a deactivation or role revocation is effective on the
/// next request without waiting for token expiry.
pub async fn resolve(state: &AppState, token: &str) -> AppResult<AuthUser> {
    let subject = state.auth.resolve_subject(&state.pool, token).await?;

    let user = fetch_user(&state.pool, subject)
        .await?
        .ok_or_else(|| AppError::unauthorized("user not found"))?;

    if !user.is_active {
        return Err(AppError::unauthorized("user account is inactive"));
    }

    let roles = role_store::roles_of(&state.pool, user.id).await?;

    Ok(AuthUser {
        user: user.into(),
        roles,
    })
}

async fn fetch_user(pool: &SqlitePool, user_id: Uuid) -> AppResult<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, password_hash, full_name, email, is_active, created_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?.to_string();
        resolve(state, &token).await
    }
}
