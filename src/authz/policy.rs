use std::collections::HashSet;

use uuid::Uuid;

use super::roles::{ADMIN, READ_ONLY_USER, TASK_CREATOR};
use crate::models::task::Task;

/// Project create/update/delete is admin-only; there is no owner-based
/// override. Reading projects needs only a resolved identity.
pub fn can_manage_projects(roles: &HashSet<String>) -> bool {
    roles.contains(ADMIN)
}

/// User management (CRUD and role assignment/revocation) is admin-only,
/// with no self-service exception.
pub fn can_manage_users(roles: &HashSet<String>) -> bool {
    roles.contains(ADMIN)
}

/// General task update gate: owner, assignee, admin or task_creator.
pub fn can_modify_task(caller_id: Uuid, roles: &HashSet<String>, task: &Task) -> bool {
    task.owner_user_id == Some(caller_id)
        || task.assigned_to_user_id == Some(caller_id)
        || roles.contains(ADMIN)
        || roles.contains(TASK_CREATOR)
}

pub fn can_delete_task(caller_id: Uuid, roles: &HashSet<String>, task: &Task) -> bool {
    task.owner_user_id == Some(caller_id) || roles.contains(ADMIN) || roles.contains(TASK_CREATOR)
}

pub fn can_complete_task(caller_id: Uuid, roles: &HashSet<String>, task: &Task) -> bool {
    task.owner_user_id == Some(caller_id)
        || task.assigned_to_user_id == Some(caller_id)
        || roles.contains(ADMIN)
        || roles.contains(TASK_CREATOR)
}

/// A caller holding `read_only_user` but neither `admin` nor
/// `task_creator` may update only the status field of a task, regardless
/// of ownership, and must not submit any other field in the same request.
pub fn status_only_caller(roles: &HashSet<String>) -> bool {
    roles.contains(READ_ONLY_USER) && !roles.contains(ADMIN) && !roles.contains(TASK_CREATOR)
}

/// Changing a task's owner, on top of the general update gate.
pub fn can_change_task_owner(roles: &HashSet<String>) -> bool {
    roles.contains(ADMIN)
}

/// Moving a task to another project, on top of the general update gate.
pub fn can_change_task_project(roles: &HashSet<String>) -> bool {
    roles.contains(ADMIN) || roles.contains(TASK_CREATOR)
}

/// Only users currently holding `read_only_user` may be assigned tasks.
/// Unassignment is not gated here; it is allowed to whoever may update.
pub fn can_be_assigned(assignee_roles: &HashSet<String>) -> bool {
    assignee_roles.contains(READ_ONLY_USER)
}
