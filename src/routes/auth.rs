use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::principal_roles;
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::user::{AuthResponse, DbUser, LoginRequest, RegisterRequest, User};
use crate::utils::{hash_password, required_name, utc_now, verify_password};

const USER_COLUMNS: &str = "id, name, email, password_hash, department_id, created_at, updated_at, deleted_at";

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

/// Registers a user. The first account on an empty installation becomes admin.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Invalid name, email or password"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let name = required_name(&payload.name, "name")?;
    let email = normalize_email(&payload.email)?;
    ensure_email_available(&state.pool, &email).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(&name)
    .bind(&email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let bootstrap = sqlx::query(
        "INSERT INTO user_roles (user_id, role, created_at) \
         SELECT ?, 'admin', ? WHERE (SELECT COUNT(1) FROM users WHERE deleted_at IS NULL) = 1",
    )
    .bind(user_id.to_string())
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if bootstrap.rows_affected() > 0 {
        tracing::info!(user_id = %user_id, "first user registered, granted admin");
    }

    let db_user = fetch_user_by_id(&state.pool, user_id).await?;
    let roles = principal_roles(&state.pool, user_id).await?;
    let user = db_user.into_user(roles);
    let token = state.jwt.encode(user.id)?;

    log_activity_with_context(
        &state.event_bus,
        "registered",
        Some(user.id),
        &user,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = payload.email.trim().to_lowercase();
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE email = ? AND deleted_at IS NULL",
        USER_COLUMNS
    ))
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;
    let db_user = row_parsers::db_user_from_row(&row)?;

    let password_ok = verify_password(&payload.password, &db_user.password_hash)?;
    if !password_ok {
        tracing::info!(user_id = %db_user.id, "login rejected");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let token = state.jwt.encode(db_user.id)?;
    let roles = principal_roles(&state.pool, db_user.id).await?;
    let user = db_user.into_user(roles);

    log_activity_with_context(
        &state.event_bus,
        "login",
        Some(user.id),
        &user,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    let db_user = fetch_user_by_id(&state.pool, auth.user_id).await?;
    let roles = principal_roles(&state.pool, auth.user_id).await?;
    Ok(Json(db_user.into_user(roles)))
}

/// Tokens are stateless; logout only acknowledges the client dropping it.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged", body = MessageResponse)),
    security(("bearerAuth" = []))
)]
pub async fn logout(_auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::bad_request("email is not valid")),
    }
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ? AND deleted_at IS NULL")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

pub async fn fetch_user_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE id = ? AND deleted_at IS NULL",
        USER_COLUMNS
    ))
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))?;

    row_parsers::db_user_from_row(&row)
}
