use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::task::Task;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, example = "2025-06-01")]
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, example = "2025-09-30")]
    pub end_date: Option<NaiveDate>,
    pub owner_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProject {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub owner_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbProject> for Project {
    fn from(value: DbProject) -> Self {
        Project {
            id: value.id,
            name: value.name,
            description: value.description,
            start_date: value.start_date,
            end_date: value.end_date,
            owner_user_id: value.owner_user_id,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Project detail with its task list, as returned by GET /projects/{id}.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectWithTasks {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, example = "2025-06-01")]
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, example = "2025-09-30")]
    pub end_date: Option<NaiveDate>,
    pub owner_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
}

impl ProjectWithTasks {
    pub fn new(project: Project, tasks: Vec<Task>) -> Self {
        Self {
            id: project.id,
            name: project.name,
            description: project.description,
            start_date: project.start_date,
            end_date: project.end_date,
            owner_user_id: project.owner_user_id,
            created_at: project.created_at,
            updated_at: project.updated_at,
            tasks,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectCreateRequest {
    #[schema(example = "Launch Planning")]
    pub name: String,
    #[schema(example = "Prepare milestones for the product launch.")]
    pub description: Option<String>,
    /// Calendar date, `YYYY-MM-DD`; a trailing time component is ignored.
    #[schema(example = "2025-06-01")]
    pub start_date: Option<String>,
    #[schema(example = "2025-09-30")]
    pub end_date: Option<String>,
    /// Defaults to the authenticated caller.
    pub owner_user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectUpdateRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    #[schema(value_type = Option<String>, example = "2025-06-01")]
    pub start_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    #[schema(value_type = Option<String>, example = "2025-09-30")]
    pub end_date: Option<Option<String>>,
    pub owner_user_id: Option<Uuid>,
}
