use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{principal_roles, require, Actor, Capability, ResourceContext, Role};
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::models::user::{AssignRoleRequest, SetDepartmentRequest, User};
use crate::routes::auth::fetch_user_by_id;
use crate::routes::departments::fetch_department;
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses((status = 200, description = "List users with their roles", body = [User])),
    security(("bearerAuth" = []))
)]
pub async fn list_users(State(state): State<AppState>, actor: Actor) -> AppResult<Json<Vec<User>>> {
    require(state.policy.as_ref(), &actor, Capability::ManageUsers, &ResourceContext::new()).await?;

    let rows = sqlx::query(
        "SELECT id, name, email, password_hash, department_id, created_at, updated_at, deleted_at \
         FROM users WHERE deleted_at IS NULL ORDER BY name ASC",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut users = Vec::with_capacity(rows.len());
    for row in &rows {
        let db_user = row_parsers::db_user_from_row(row)?;
        let roles = principal_roles(&state.pool, db_user.id).await?;
        users.push(db_user.into_user(roles));
    }

    Ok(Json(users))
}

#[utoipa::path(
    post,
    path = "/users/{id}/roles",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = AssignRoleRequest,
    responses((status = 200, description = "Role granted", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn grant_role(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRoleRequest>,
) -> AppResult<Json<User>> {
    let ctx = ResourceContext::new().with_resource("user", id);
    require(state.policy.as_ref(), &actor, Capability::ManageUsers, &ctx).await?;

    let db_user = fetch_user_by_id(&state.pool, id).await?;
    let before = principal_roles(&state.pool, id).await?;

    sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role, created_at) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(payload.role.as_str())
        .bind(utc_now())
        .execute(&state.pool)
        .await?;

    let after = principal_roles(&state.pool, id).await?;
    let old = db_user.clone().into_user(before.clone());
    let user = db_user.into_user(after);

    if !before.contains(&payload.role) {
        tracing::info!(user_id = %id, role = %payload.role, granted_by = %actor.user_id, "role granted");
        log_activity_with_context(
            &state.event_bus,
            "role_granted",
            Some(actor.user_id),
            &user,
            Some(&old),
            Some(RequestContext::from_headers(&headers)),
        );
    }

    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/users/{id}/roles/{role}",
    tag = "Users",
    params(
        ("id" = Uuid, Path, description = "User id"),
        ("role" = String, Path, description = "Role name, e.g. validator")
    ),
    responses(
        (status = 200, description = "Role revoked", body = User),
        (status = 409, description = "Would remove the last admin")
    ),
    security(("bearerAuth" = []))
)]
pub async fn revoke_role(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Path((id, role)): Path<(Uuid, String)>,
) -> AppResult<Json<User>> {
    let ctx = ResourceContext::new().with_resource("user", id);
    require(state.policy.as_ref(), &actor, Capability::ManageUsers, &ctx).await?;

    let role = Role::parse(&role).ok_or_else(|| AppError::bad_request(format!("unknown role {role}")))?;
    let db_user = fetch_user_by_id(&state.pool, id).await?;
    let before = principal_roles(&state.pool, id).await?;

    if role == Role::Admin && before.contains(&Role::Admin) {
        let admins: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM user_roles r JOIN users u ON u.id = r.user_id \
             WHERE r.role = 'admin' AND u.deleted_at IS NULL",
        )
        .fetch_one(&state.pool)
        .await?;
        if admins <= 1 {
            return Err(AppError::conflict("cannot revoke the last admin"));
        }
    }

    sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role = ?")
        .bind(id.to_string())
        .bind(role.as_str())
        .execute(&state.pool)
        .await?;

    let after: BTreeSet<Role> = before.iter().copied().filter(|r| *r != role).collect();
    let old = db_user.clone().into_user(before.clone());
    let user = db_user.into_user(after);

    if before.contains(&role) {
        tracing::info!(user_id = %id, role = %role, revoked_by = %actor.user_id, "role revoked");
        log_activity_with_context(
            &state.event_bus,
            "role_revoked",
            Some(actor.user_id),
            &user,
            Some(&old),
            Some(RequestContext::from_headers(&headers)),
        );
    }

    Ok(Json(user))
}

/// Moves a user between departments. Group validations already submitted
/// keep the eligible set they were created with.
#[utoipa::path(
    put,
    path = "/users/{id}/department",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = SetDepartmentRequest,
    responses((status = 200, description = "Department updated", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn set_department(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetDepartmentRequest>,
) -> AppResult<Json<User>> {
    let ctx = ResourceContext::new().with_resource("user", id);
    require(state.policy.as_ref(), &actor, Capability::ManageUsers, &ctx).await?;

    let db_user = fetch_user_by_id(&state.pool, id).await?;
    if let Some(department_id) = payload.department_id {
        fetch_department(&state.pool, department_id).await?;
    }

    let now = utc_now();
    sqlx::query("UPDATE users SET department_id = ?, updated_at = ? WHERE id = ?")
        .bind(payload.department_id.map(|v| v.to_string()))
        .bind(now)
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    let roles = principal_roles(&state.pool, id).await?;
    let old = db_user.clone().into_user(roles.clone());
    let mut user = db_user.into_user(roles);
    user.department_id = payload.department_id;
    user.updated_at = now;

    log_activity_with_context(
        &state.event_bus,
        "department_changed",
        Some(actor.user_id),
        &user,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(user))
}
