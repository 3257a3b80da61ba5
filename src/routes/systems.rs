use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{can_resolve_validations, require, Actor, Capability, ResourceContext};
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::models::system::{
    System, SystemCreateRequest, SystemDetail, SystemValidator, SystemValidatorCreateRequest,
};
use crate::models::validation::ValidatorKind;
use crate::routes::departments::fetch_department;
use crate::utils::{non_blank, required_name, utc_now};

const SYSTEM_COLUMNS: &str = "id, name, description, created_at, updated_at, deleted_at";
const VALIDATOR_COLUMNS: &str = "id, system_id, kind, approver_id, department_id, created_at";

#[utoipa::path(
    get,
    path = "/systems",
    tag = "Systems",
    responses((status = 200, description = "List systems", body = [System])),
    security(("bearerAuth" = []))
)]
pub async fn list_systems(State(state): State<AppState>, _actor: Actor) -> AppResult<Json<Vec<System>>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM systems WHERE deleted_at IS NULL ORDER BY name ASC",
        SYSTEM_COLUMNS
    ))
    .fetch_all(&state.pool)
    .await?;

    let systems = rows
        .iter()
        .map(row_parsers::system_from_row)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(systems))
}

#[utoipa::path(
    post,
    path = "/systems",
    tag = "Systems",
    request_body = SystemCreateRequest,
    responses(
        (status = 201, description = "System created", body = System),
        (status = 409, description = "Name already taken")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_system(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Json(payload): Json<SystemCreateRequest>,
) -> AppResult<(StatusCode, Json<System>)> {
    require(state.policy.as_ref(), &actor, Capability::ManageCatalog, &ResourceContext::new()).await?;

    let name = required_name(&payload.name, "name")?;
    let taken: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM systems WHERE name = ? AND deleted_at IS NULL")
        .bind(&name)
        .fetch_one(&state.pool)
        .await?;
    if taken > 0 {
        return Err(AppError::conflict(format!("system {name} already exists")));
    }

    let now = utc_now();
    let system_id = Uuid::new_v4();

    sqlx::query("INSERT INTO systems (id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
        .bind(system_id.to_string())
        .bind(&name)
        .bind(non_blank(payload.description.as_deref()))
        .bind(now)
        .bind(now)
        .execute(&state.pool)
        .await?;

    let system = fetch_system(&state.pool, system_id).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(actor.user_id),
        &system,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(system)))
}

#[utoipa::path(
    get,
    path = "/systems/{id}",
    tag = "Systems",
    params(("id" = Uuid, Path, description = "System id")),
    responses((status = 200, description = "System with its validators", body = SystemDetail)),
    security(("bearerAuth" = []))
)]
pub async fn get_system(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SystemDetail>> {
    let system = fetch_system(&state.pool, id).await?;
    let validators = fetch_validators(&state.pool, id).await?;
    Ok(Json(SystemDetail { system, validators }))
}

/// Soft delete. Requests already referencing the system keep it.
#[utoipa::path(
    delete,
    path = "/systems/{id}",
    tag = "Systems",
    params(("id" = Uuid, Path, description = "System id")),
    responses((status = 204, description = "System soft deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_system(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let ctx = ResourceContext::new().with_resource("system", id);
    require(state.policy.as_ref(), &actor, Capability::ManageCatalog, &ctx).await?;

    let mut system = fetch_system(&state.pool, id).await?;
    let now = utc_now();

    sqlx::query("UPDATE systems SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    system.deleted_at = Some(now);
    system.updated_at = now;

    log_activity_with_context(
        &state.event_bus,
        "deleted",
        Some(actor.user_id),
        &system,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/systems/{id}/validators",
    tag = "Systems",
    params(("id" = Uuid, Path, description = "System id")),
    responses((status = 200, description = "Configured validators", body = [SystemValidator])),
    security(("bearerAuth" = []))
)]
pub async fn list_validators(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<SystemValidator>>> {
    fetch_system(&state.pool, id).await?;
    Ok(Json(fetch_validators(&state.pool, id).await?))
}

/// Adds an approver to a system. Applies to requests submitted afterwards.
#[utoipa::path(
    post,
    path = "/systems/{id}/validators",
    tag = "Systems",
    params(("id" = Uuid, Path, description = "System id")),
    request_body = SystemValidatorCreateRequest,
    responses(
        (status = 201, description = "Validator added", body = SystemValidator),
        (status = 400, description = "Kind and target do not match"),
        (status = 409, description = "Duplicate validator or approver without a resolving role")
    ),
    security(("bearerAuth" = []))
)]
pub async fn add_validator(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<SystemValidatorCreateRequest>,
) -> AppResult<(StatusCode, Json<SystemValidator>)> {
    let ctx = ResourceContext::new().with_resource("system", id);
    require(state.policy.as_ref(), &actor, Capability::ManageCatalog, &ctx).await?;

    fetch_system(&state.pool, id).await?;

    let (approver_id, department_id) = match (payload.kind, payload.approver_id, payload.department_id) {
        (ValidatorKind::Individual, Some(approver_id), None) => {
            ensure_user_active(&state.pool, approver_id).await?;
            if !can_resolve_validations(&state.pool, approver_id).await? {
                return Err(AppError::conflict("approver holds no role that may resolve validations"));
            }
            (Some(approver_id), None)
        }
        (ValidatorKind::Group, None, Some(department_id)) => {
            fetch_department(&state.pool, department_id).await?;
            (None, Some(department_id))
        }
        (ValidatorKind::Individual, _, _) => {
            return Err(AppError::bad_request("individual validators need approver_id and no department_id"))
        }
        (ValidatorKind::Group, _, _) => {
            return Err(AppError::bad_request("group validators need department_id and no approver_id"))
        }
    };

    let duplicate: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM system_validators WHERE system_id = ? AND kind = ? \
         AND approver_id IS ? AND department_id IS ?",
    )
    .bind(id.to_string())
    .bind(payload.kind.as_str())
    .bind(approver_id.map(|v| v.to_string()))
    .bind(department_id.map(|v| v.to_string()))
    .fetch_one(&state.pool)
    .await?;
    if duplicate > 0 {
        return Err(AppError::conflict("validator already configured for this system"));
    }

    let validator = SystemValidator {
        id: Uuid::new_v4(),
        system_id: id,
        kind: payload.kind,
        approver_id,
        department_id,
        created_at: utc_now(),
    };

    sqlx::query(
        "INSERT INTO system_validators (id, system_id, kind, approver_id, department_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(validator.id.to_string())
    .bind(id.to_string())
    .bind(validator.kind.as_str())
    .bind(validator.approver_id.map(|v| v.to_string()))
    .bind(validator.department_id.map(|v| v.to_string()))
    .bind(validator.created_at)
    .execute(&state.pool)
    .await?;

    tracing::info!(system_id = %id, validator_id = %validator.id, kind = validator.kind.as_str(), "validator configured");

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(actor.user_id),
        &validator,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(validator)))
}

/// Removes a configured approver. Existing validation records are untouched.
#[utoipa::path(
    delete,
    path = "/systems/{id}/validators/{validator_id}",
    tag = "Systems",
    params(
        ("id" = Uuid, Path, description = "System id"),
        ("validator_id" = Uuid, Path, description = "Validator id")
    ),
    responses((status = 204, description = "Validator removed")),
    security(("bearerAuth" = []))
)]
pub async fn remove_validator(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Path((id, validator_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let ctx = ResourceContext::new().with_resource("system", id);
    require(state.policy.as_ref(), &actor, Capability::ManageCatalog, &ctx).await?;

    let row = sqlx::query(&format!(
        "SELECT {} FROM system_validators WHERE id = ? AND system_id = ?",
        VALIDATOR_COLUMNS
    ))
    .bind(validator_id.to_string())
    .bind(id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("validator not found"))?;
    let validator = row_parsers::system_validator_from_row(&row)?;

    sqlx::query("DELETE FROM system_validators WHERE id = ?")
        .bind(validator_id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity_with_context(
        &state.event_bus,
        "deleted",
        Some(actor.user_id),
        &validator,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn fetch_system(pool: &SqlitePool, system_id: Uuid) -> AppResult<System> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM systems WHERE id = ? AND deleted_at IS NULL",
        SYSTEM_COLUMNS
    ))
    .bind(system_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("system not found"))?;

    row_parsers::system_from_row(&row)
}

async fn fetch_validators(pool: &SqlitePool, system_id: Uuid) -> AppResult<Vec<SystemValidator>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM system_validators WHERE system_id = ? ORDER BY created_at ASC",
        VALIDATOR_COLUMNS
    ))
    .bind(system_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_parsers::system_validator_from_row).collect()
}

async fn ensure_user_active(pool: &SqlitePool, user_id: Uuid) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE id = ? AND deleted_at IS NULL")
        .bind(user_id.to_string())
        .fetch_one(pool)
        .await?;

    if count == 0 {
        return Err(AppError::not_found("approver not found"));
    }
    Ok(())
}
