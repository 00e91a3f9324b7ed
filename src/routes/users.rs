use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::identity::bearer_token;
use crate::auth::AuthUser;
use crate::authz::policy;
use crate::authz::roles::READ_ONLY_USER;
use crate::errors::{AppError, AppResult};
use crate::models::role::{AssignRoleRequest, Role, UserRole};
use crate::models::user::{
    AuthResponse, DbUser, GoogleVerifyRequest, LoginRequest, User, UserCreateRequest,
    UserUpdateRequest, UserWithRoles,
};
use crate::role_store;
use crate::utils::{hash_password, utc_now, verify_password};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

fn require_admin(auth: &AuthUser) -> AppResult<()> {
    if !policy::can_manage_users(&auth.roles) {
        return Err(AppError::forbidden("administrator role required"));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/users/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or inactive account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_user = fetch_user_by_username(&state.pool, &payload.username)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid username or password"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthorized("invalid username or password"));
    }

    if !db_user.is_active {
        return Err(AppError::unauthorized("user account is inactive"));
    }

    issue_auth_response(&state, db_user).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/users/google/verify-token",
    tag = "Users",
    request_body = GoogleVerifyRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Token rejected by the identity provider"),
        (status = 403, description = "Email domain not allowed")
    )
)]
pub async fn google_verify_token(
    State(state): State<AppState>,
    Json(payload): Json<GoogleVerifyRequest>,
) -> AppResult<Json<AuthResponse>> {
    let oauth = state
        .oauth
        .as_ref()
        .ok_or_else(|| AppError::configuration("external identity provider is not configured"))?;

    let verified = oauth.verifier.verify(&payload.token).await?;

    let domain = verified.email.rsplit('@').next().unwrap_or_default();
    if !domain.eq_ignore_ascii_case(&oauth.allowed_domain) {
        return Err(AppError::forbidden(
            "login with this email domain is not allowed",
        ));
    }

    let db_user = match fetch_user_by_email(&state.pool, &verified.email).await? {
        Some(user) => user,
        None => provision_user(&state.pool, &verified.email, verified.full_name.as_deref()).await?,
    };

    if !db_user.is_active {
        return Err(AppError::unauthorized("user account is inactive"));
    }

    issue_auth_response(&state, db_user).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/users/logout",
    tag = "Users",
    responses((status = 200, description = "Logout acknowledged")),
    security(("bearerAuth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    _auth: AuthUser,
) -> AppResult<Json<MessageResponse>> {
    let token = bearer_token(&headers)?;
    state.auth.invalidate(&state.pool, token).await?;

    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/users/me",
    tag = "Users",
    responses((status = 200, description = "Current user with roles", body = UserWithRoles)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<UserWithRoles>> {
    let roles = role_store::roles_of_detailed(&state.pool, auth.user_id()).await?;
    Ok(Json(UserWithRoles::new(auth.user, roles)))
}

#[utoipa::path(
    get,
    path = "/users/roles",
    tag = "Users",
    responses((status = 200, description = "All seeded roles", body = [Role])),
    security(("bearerAuth" = []))
)]
pub async fn list_system_roles(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<Vec<Role>>> {
    let roles = role_store::all(&state.pool).await?;
    Ok(Json(roles))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = UserWithRoles),
        (status = 400, description = "Missing fields or unknown role"),
        (status = 409, description = "Username or email already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<UserWithRoles>)> {
    require_admin(&auth)?;

    if payload.username.trim().is_empty() {
        return Err(AppError::validation("username is required"));
    }

    let role = role_store::find_by_name(&state.pool, &payload.role_name)
        .await?
        .ok_or_else(|| AppError::validation(format!("role '{}' is not a valid role", payload.role_name)))?;

    ensure_username_available(&state.pool, &payload.username).await?;
    if let Some(email) = payload.email.as_deref() {
        ensure_email_available(&state.pool, email).await?;
    }

    let password_hash = hash_password(&payload.password)?;
    let user_id = Uuid::new_v4();
    let now = utc_now();

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO users (id, username, password_hash, full_name, email, is_active, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&payload.username)
    .bind(password_hash)
    .bind(&payload.full_name)
    .bind(&payload.email)
    .bind(true)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO user_roles (user_id, role_id, assigned_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(role.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("user '{}' created by {}", payload.username, auth.user.username);

    let user = fetch_user_by_id(&state.pool, user_id).await?;
    let roles = role_store::roles_of_detailed(&state.pool, user_id).await?;

    Ok((StatusCode::CREATED, Json(UserWithRoles::new(user.into(), roles))))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses((status = 200, description = "List users", body = [UserWithRoles])),
    security(("bearerAuth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<UserWithRoles>>> {
    require_admin(&auth)?;

    let db_users = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, password_hash, full_name, email, is_active, created_at FROM users ORDER BY username",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut users = Vec::with_capacity(db_users.len());
    for db_user in db_users {
        let roles = role_store::roles_of_detailed(&state.pool, db_user.id).await?;
        users.push(UserWithRoles::new(db_user.into(), roles));
    }

    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "User detail", body = UserWithRoles)),
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserWithRoles>> {
    require_admin(&auth)?;

    let user = fetch_user_by_id(&state.pool, id).await?;
    let roles = role_store::roles_of_detailed(&state.pool, id).await?;

    Ok(Json(UserWithRoles::new(user.into(), roles)))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses((status = 200, description = "User updated", body = UserWithRoles)),
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<Json<UserWithRoles>> {
    require_admin(&auth)?;

    let mut user = fetch_user_by_id(&state.pool, id).await?;

    if let Some(full_name) = payload.full_name {
        user.full_name = full_name;
    }
    if let Some(email) = payload.email {
        if let Some(new_email) = email.as_deref() {
            if user.email.as_deref() != Some(new_email) {
                ensure_email_available(&state.pool, new_email).await?;
            }
        }
        user.email = email;
    }
    if let Some(password) = payload.password.as_deref() {
        user.password_hash = hash_password(password)?;
    }
    if let Some(is_active) = payload.is_active {
        user.is_active = is_active;
    }

    sqlx::query(
        "UPDATE users SET full_name = ?, email = ?, password_hash = ?, is_active = ? WHERE id = ?",
    )
    .bind(&user.full_name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.is_active)
    .bind(user.id)
    .execute(&state.pool)
    .await?;

    // Single-role-slot semantics: the provided role replaces the whole set.
    if let Some(role_name) = payload.role_name.as_deref() {
        role_store::find_by_name(&state.pool, role_name)
            .await?
            .ok_or_else(|| AppError::validation(format!("role '{role_name}' is not a valid role")))?;
        role_store::replace_role(&state.pool, user.id, role_name).await?;
    }

    let roles = role_store::roles_of_detailed(&state.pool, user.id).await?;
    Ok(Json(UserWithRoles::new(user.into(), roles)))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 204, description = "User deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_admin(&auth)?;

    let user = fetch_user_by_id(&state.pool, id).await?;

    // Role assignments and sessions cascade; owned/assigned tasks fall
    // back to NULL through the schema.
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    tracing::info!("user '{}' deleted by {}", user.username, auth.user.username);

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/users/{id}/roles",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Roles assigned to the user", body = [Role])),
    security(("bearerAuth" = []))
)]
pub async fn get_user_roles(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Role>>> {
    require_admin(&auth)?;

    let _ = fetch_user_by_id(&state.pool, id).await?;
    let roles = role_store::roles_of_detailed(&state.pool, id).await?;

    Ok(Json(roles))
}

#[utoipa::path(
    post,
    path = "/users/{id}/roles",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = AssignRoleRequest,
    responses(
        (status = 201, description = "Role assigned", body = UserRole),
        (status = 404, description = "User or role not found"),
        (status = 409, description = "Role already assigned")
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRoleRequest>,
) -> AppResult<(StatusCode, Json<UserRole>)> {
    require_admin(&auth)?;

    let user = fetch_user_by_id(&state.pool, id).await?;
    let assignment = role_store::assign(&state.pool, user.id, &payload.role_name).await?;

    tracing::info!(
        "role '{}' assigned to '{}' by {}",
        payload.role_name,
        user.username,
        auth.user.username
    );

    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    delete,
    path = "/users/{id}/roles/{role_id}",
    tag = "Users",
    params(
        ("id" = Uuid, Path, description = "User id"),
        ("role_id" = Uuid, Path, description = "Role id")
    ),
    responses(
        (status = 204, description = "Role revoked"),
        (status = 404, description = "Assignment not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn revoke_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    require_admin(&auth)?;

    let user = fetch_user_by_id(&state.pool, id).await?;
    role_store::revoke(&state.pool, user.id, role_id).await?;

    tracing::info!("role {role_id} revoked from '{}' by {}", user.username, auth.user.username);

    Ok(StatusCode::NO_CONTENT)
}

async fn issue_auth_response(state: &AppState, db_user: DbUser) -> AppResult<AuthResponse> {
    let role_names = role_store::roles_of(&state.pool, db_user.id).await?;
    let token = state.auth.issue(&state.pool, db_user.id, &role_names).await?;

    let roles = role_store::roles_of_detailed(&state.pool, db_user.id).await?;
    let user: User = db_user.into();

    tracing::info!("user '{}' logged in", user.username);

    Ok(AuthResponse {
        token,
        user: UserWithRoles::new(user, roles),
    })
}

/// Create a user record for a verified external identity. The username
/// is derived from the email local part, with a numeric suffix when
/// taken; the default role is `read_only_user`.
async fn provision_user(
    pool: &SqlitePool,
    email: &str,
    full_name: Option<&str>,
) -> AppResult<DbUser> {
    let base = email.split('@').next().unwrap_or("user");
    let mut username = base.to_string();
    let mut counter = 1;
    while username_taken(pool, &username).await? {
        username = format!("{base}{counter}");
        counter += 1;
    }

    let default_role = role_store::require_seeded(pool, READ_ONLY_USER).await?;

    // Externally provisioned accounts never log in with a password; give
    // them an unguessable one.
    let mut random = [0u8; 32];
    use rand_core::RngCore;
    rand_core::OsRng.fill_bytes(&mut random);
    let password_hash = hash_password(&hex::encode(random))?;

    let user_id = Uuid::new_v4();
    let now = utc_now();

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO users (id, username, password_hash, full_name, email, is_active, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&username)
    .bind(password_hash)
    .bind(full_name)
    .bind(email)
    .bind(true)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO user_roles (user_id, role_id, assigned_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(default_role.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("auto-provisioned user '{username}' for {email}");

    fetch_user_by_id(pool, user_id).await
}

async fn username_taken(pool: &SqlitePool, username: &str) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(pool)
        .await?;

    Ok(count > 0)
}

async fn ensure_username_available(pool: &SqlitePool, username: &str) -> AppResult<()> {
    if username_taken(pool, username).await? {
        return Err(AppError::conflict(format!("username '{username}' already exists")));
    }

    Ok(())
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict(format!("email '{email}' already exists")));
    }

    Ok(())
}

async fn fetch_user_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    sqlx::query_as::<_, DbUser>(
        "SELECT id, username, password_hash, full_name, email, is_active, created_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))
}

async fn fetch_user_by_username(pool: &SqlitePool, username: &str) -> AppResult<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, password_hash, full_name, email, is_active, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

async fn fetch_user_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, password_hash, full_name, email, is_active, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}
