use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

/// Fixed task lifecycle states. Stored as their wire names in the `status`
/// column; anything else is rejected before it reaches storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "new")]
    New,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "blocked")]
    Blocked,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "not started")]
    NotStarted,
}

pub const ALLOWED_TASK_STATUSES: [&str; 5] =
    ["new", "in-progress", "blocked", "completed", "not started"];

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "new",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Completed => "completed",
            TaskStatus::NotStarted => "not started",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "new" => Ok(TaskStatus::New),
            "in-progress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "completed" => Ok(TaskStatus::Completed),
            "not started" => Ok(TaskStatus::NotStarted),
            other => Err(AppError::validation(format!(
                "invalid status '{}', allowed: {}",
                other,
                ALLOWED_TASK_STATUSES.join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: Uuid,
    pub description: String,
    #[schema(value_type = Option<String>, example = "2025-07-15")]
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub owner_user_id: Option<Uuid>,
    pub assigned_to_user_id: Option<Uuid>,
    pub project_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTask {
    pub id: Uuid,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub owner_user_id: Option<Uuid>,
    pub assigned_to_user_id: Option<Uuid>,
    pub project_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbTask> for Task {
    type Error = AppError;

    fn try_from(value: DbTask) -> Result<Self, Self::Error> {
        let status = TaskStatus::parse(&value.status)
            .map_err(|_| AppError::internal(format!("task {} has unknown status '{}'", value.id, value.status)))?;

        Ok(Task {
            id: value.id,
            description: value.description,
            due_date: value.due_date,
            status,
            owner_user_id: value.owner_user_id,
            assigned_to_user_id: value.assigned_to_user_id,
            project_id: value.project_id,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskCreateRequest {
    #[schema(example = "Define launch checklist")]
    pub description: String,
    pub project_id: Uuid,
    #[schema(example = "new")]
    pub status: Option<String>,
    /// Calendar date, `YYYY-MM-DD`; a trailing time component is ignored.
    #[schema(example = "2025-07-15")]
    pub due_date: Option<String>,
    pub assigned_to_user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskUpdateRequest {
    pub description: Option<String>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    #[schema(value_type = Option<String>, example = "2025-07-15")]
    pub due_date: Option<Option<String>>,
    #[schema(example = "in-progress")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub owner_user_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub assigned_to_user_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub project_id: Option<Option<Uuid>>,
}

impl TaskUpdateRequest {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.due_date.is_none()
            && self.status.is_none()
            && self.owner_user_id.is_none()
            && self.assigned_to_user_id.is_none()
            && self.project_id.is_none()
    }

    /// True when the request touches the status field and nothing else.
    pub fn touches_only_status(&self) -> bool {
        self.status.is_some()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.owner_user_id.is_none()
            && self.assigned_to_user_id.is_none()
            && self.project_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_roundtrip() {
        for name in ALLOWED_TASK_STATUSES {
            assert_eq!(TaskStatus::parse(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn status_parse_rejects_unknown() {
        assert!(matches!(
            TaskStatus::parse("done"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn default_status_is_new() {
        assert_eq!(TaskStatus::default(), TaskStatus::New);
    }

    #[test]
    fn update_request_field_presence() {
        let req: TaskUpdateRequest = serde_json::from_str(r#"{"status": "blocked"}"#).unwrap();
        assert!(req.touches_only_status());

        let req: TaskUpdateRequest =
            serde_json::from_str(r#"{"status": "blocked", "description": "x"}"#).unwrap();
        assert!(!req.touches_only_status());

        let req: TaskUpdateRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert!(req.is_empty());
    }

    #[test]
    fn explicit_null_unassigns() {
        let req: TaskUpdateRequest =
            serde_json::from_str(r#"{"assigned_to_user_id": null}"#).unwrap();
        assert_eq!(req.assigned_to_user_id, Some(None));

        let req: TaskUpdateRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(req.assigned_to_user_id, None);
    }
}
