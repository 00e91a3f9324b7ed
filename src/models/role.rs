use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: Uuid,
    #[schema(example = "task_creator")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbRole {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl From<DbRole> for Role {
    fn from(db: DbRole) -> Self {
        Role {
            id: db.id,
            name: db.name,
            description: db.description,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    #[schema(example = "read_only_user")]
    pub role_name: String,
}
