use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(value: DbUser) -> Self {
        User {
            id: value.id,
            username: value.username,
            full_name: value.full_name,
            email: value.email,
            is_active: value.is_active,
            created_at: value.created_at,
        }
    }
}

/// User payload enriched with the live role set, as returned by the
/// user-management and login endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserWithRoles {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub roles: Vec<Role>,
}

impl UserWithRoles {
    pub fn new(user: User, roles: Vec<Role>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            is_active: user.is_active,
            created_at: user.created_at,
            roles,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada")]
    pub username: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserWithRoles,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserCreateRequest {
    #[schema(example = "ada")]
    pub username: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
    #[schema(example = "Ada Lovelace")]
    pub full_name: Option<String>,
    #[schema(example = "ada@example.com")]
    pub email: Option<String>,
    /// Must name one of the seeded roles.
    #[schema(example = "task_creator")]
    pub role_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    #[serde(default, deserialize_with = "crate::models::double_option")]
    #[schema(value_type = Option<String>)]
    pub full_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    #[schema(value_type = Option<String>)]
    pub email: Option<Option<String>>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    /// Replaces the user's entire role set with this single role.
    pub role_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GoogleVerifyRequest {
    /// Google ID token obtained by the frontend.
    pub token: String,
}
