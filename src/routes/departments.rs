use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{require, Actor, Capability, ResourceContext};
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::models::department::{Department, DepartmentCreateRequest};
use crate::utils::{required_name, utc_now};

#[utoipa::path(
    get,
    path = "/departments",
    tag = "Departments",
    responses((status = 200, description = "List departments", body = [Department])),
    security(("bearerAuth" = []))
)]
pub async fn list_departments(State(state): State<AppState>, _actor: Actor) -> AppResult<Json<Vec<Department>>> {
    let rows = sqlx::query("SELECT id, name, created_at, updated_at FROM departments ORDER BY name ASC")
        .fetch_all(&state.pool)
        .await?;

    let departments = rows
        .iter()
        .map(row_parsers::department_from_row)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(departments))
}

#[utoipa::path(
    post,
    path = "/departments",
    tag = "Departments",
    request_body = DepartmentCreateRequest,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 409, description = "Name already taken")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_department(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Json(payload): Json<DepartmentCreateRequest>,
) -> AppResult<(StatusCode, Json<Department>)> {
    require(state.policy.as_ref(), &actor, Capability::ManageCatalog, &ResourceContext::new()).await?;

    let name = required_name(&payload.name, "name")?;
    let taken: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM departments WHERE name = ?")
        .bind(&name)
        .fetch_one(&state.pool)
        .await?;
    if taken > 0 {
        return Err(AppError::conflict(format!("department {name} already exists")));
    }

    let now = utc_now();
    let department_id = Uuid::new_v4();

    sqlx::query("INSERT INTO departments (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)")
        .bind(department_id.to_string())
        .bind(&name)
        .bind(now)
        .bind(now)
        .execute(&state.pool)
        .await?;

    let department = fetch_department(&state.pool, department_id).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(actor.user_id),
        &department,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(department)))
}

pub async fn fetch_department(pool: &SqlitePool, department_id: Uuid) -> AppResult<Department> {
    let row = sqlx::query("SELECT id, name, created_at, updated_at FROM departments WHERE id = ?")
        .bind(department_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("department not found"))?;

    row_parsers::department_from_row(&row)
}
