use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::users::login,
        routes::users::logout,
        routes::users::google_verify_token,
        routes::users::me,
        routes::users::list_system_roles,
        routes::users::create_user,
        routes::users::list_users,
        routes::users::get_user,
        routes::users::update_user,
        routes::users::delete_user,
        routes::users::get_user_roles,
        routes::users::assign_role,
        routes::users::revoke_role,
        routes::projects::list_projects,
        routes::projects::create_project,
        routes::projects::get_project,
        routes::projects::update_project,
        routes::projects::delete_project,
        routes::tasks::list_tasks,
        routes::tasks::create_task,
        routes::tasks::get_task,
        routes::tasks::update_task,
        routes::tasks::delete_task,
        routes::tasks::complete_task,
        routes::tasks::my_assigned_tasks,
        routes::tasks::my_owned_tasks,
    ),
    components(
        schemas(
            models::user::User,
            models::user::UserWithRoles,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::UserCreateRequest,
            models::user::UserUpdateRequest,
            models::user::GoogleVerifyRequest,
            models::role::Role,
            models::role::UserRole,
            models::role::AssignRoleRequest,
            models::project::Project,
            models::project::ProjectWithTasks,
            models::project::ProjectCreateRequest,
            models::project::ProjectUpdateRequest,
            models::task::Task,
            models::task::TaskStatus,
            models::task::TaskCreateRequest,
            models::task::TaskUpdateRequest,
            routes::health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Users", description = "Authentication and user management"),
        (name = "Projects", description = "Project management"),
        (name = "Tasks", description = "Task management"),
        (name = "Health", description = "Liveness")
    )
)]
pub struct ApiDoc;

pub fn swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
