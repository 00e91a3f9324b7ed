use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::verifier::OAuthConfig;
use crate::auth::AuthConfig;
use crate::errors::AppError;
use crate::role_store;
use crate::routes::{health, projects, tasks, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub auth: Arc<AuthConfig>,
    pub oauth: Option<Arc<OAuthConfig>>,
}

/// Top-level configuration, assembled explicitly and handed to
/// [`create_app`]. `main` builds it from the environment; tests build it
/// directly (and can inject a stub identity verifier).
pub struct AppConfig {
    pub auth: AuthConfig,
    pub oauth: Option<OAuthConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            auth: AuthConfig::from_env()?,
            oauth: OAuthConfig::from_env()?,
        })
    }
}

pub async fn create_app(pool: SqlitePool, config: AppConfig) -> Result<Router, AppError> {
    // Roles are reference data; make sure the seed exists before the
    // first request can depend on it.
    role_store::seed(&pool).await?;

    let state = AppState {
        pool,
        auth: Arc::new(config.auth),
        oauth: config.oauth.map(Arc::new),
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let user_routes = Router::new()
        .route("/login", post(users::login))
        .route("/logout", post(users::logout))
        .route("/google/verify-token", post(users::google_verify_token))
        .route("/me", get(users::me))
        .route("/roles", get(users::list_system_roles))
        .route("/", post(users::create_user).get(users::list_users))
        .route("/:id", get(users::get_user).put(users::update_user).delete(users::delete_user))
        .route("/:id/roles", get(users::get_user_roles).post(users::assign_role))
        .route("/:id/roles/:role_id", delete(users::revoke_role));

    let project_routes = Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route(
            "/:id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        );

    let task_routes = Router::new()
        .route("/", get(tasks::list_tasks).post(tasks::create_task))
        .route("/my", get(tasks::my_assigned_tasks))
        .route("/owned", get(tasks::my_owned_tasks))
        .route(
            "/:id",
            get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task),
        )
        .route("/:id/complete", post(tasks::complete_task));

    let router = Router::new()
        .route("/health", get(health::health))
        .nest("/users", user_routes)
        .nest("/projects", project_routes)
        .nest("/tasks", task_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
