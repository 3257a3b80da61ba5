use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{require, Actor, Capability, ResourceContext};
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::models::employee::{Employee, EmployeeCreateRequest};
use crate::routes::departments::fetch_department;
use crate::utils::{non_blank, required_name, utc_now};

const EMPLOYEE_COLUMNS: &str = "id, full_name, email, department_id, created_at, updated_at";

/// Everyone for actors who see all requests, otherwise the actor's department.
#[utoipa::path(
    get,
    path = "/employees",
    tag = "Employees",
    responses((status = 200, description = "List employees", body = [Employee])),
    security(("bearerAuth" = []))
)]
pub async fn list_employees(State(state): State<AppState>, actor: Actor) -> AppResult<Json<Vec<Employee>>> {
    let rows = if actor.can(Capability::ViewAllRequests) {
        sqlx::query(&format!("SELECT {} FROM employees ORDER BY full_name ASC", EMPLOYEE_COLUMNS))
            .fetch_all(&state.pool)
            .await?
    } else if let Some(department_id) = actor.department_id {
        sqlx::query(&format!(
            "SELECT {} FROM employees WHERE department_id = ? ORDER BY full_name ASC",
            EMPLOYEE_COLUMNS
        ))
        .bind(department_id.to_string())
        .fetch_all(&state.pool)
        .await?
    } else {
        Vec::new()
    };

    let employees = rows
        .iter()
        .map(row_parsers::employee_from_row)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(employees))
}

#[utoipa::path(
    post,
    path = "/employees",
    tag = "Employees",
    request_body = EmployeeCreateRequest,
    responses((status = 201, description = "Employee created", body = Employee)),
    security(("bearerAuth" = []))
)]
pub async fn create_employee(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Json(payload): Json<EmployeeCreateRequest>,
) -> AppResult<(StatusCode, Json<Employee>)> {
    let mut ctx = ResourceContext::new();
    if let Some(department_id) = payload.department_id {
        ctx = ctx.with_department(department_id);
    }
    require(state.policy.as_ref(), &actor, Capability::ManageEmployees, &ctx).await?;

    let full_name = required_name(&payload.full_name, "full_name")?;
    let email = non_blank(payload.email.as_deref()).map(|e| e.to_lowercase());
    if let Some(department_id) = payload.department_id {
        fetch_department(&state.pool, department_id).await?;
    }

    let now = utc_now();
    let employee_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO employees (id, full_name, email, department_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(employee_id.to_string())
    .bind(&full_name)
    .bind(&email)
    .bind(payload.department_id.map(|id| id.to_string()))
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let employee = fetch_employee(&state.pool, employee_id).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(actor.user_id),
        &employee,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(employee)))
}

#[utoipa::path(
    get,
    path = "/employees/{id}",
    tag = "Employees",
    params(("id" = Uuid, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Employee detail", body = Employee),
        (status = 404, description = "Unknown employee")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_employee(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Employee>> {
    let employee = fetch_employee(&state.pool, id).await?;

    let visible = actor.can(Capability::ViewAllRequests)
        || (employee.department_id.is_some() && employee.department_id == actor.department_id);
    if !visible {
        return Err(AppError::forbidden("employee belongs to another department"));
    }

    Ok(Json(employee))
}

pub async fn fetch_employee(pool: &SqlitePool, employee_id: Uuid) -> AppResult<Employee> {
    let row = sqlx::query(&format!("SELECT {} FROM employees WHERE id = ?", EMPLOYEE_COLUMNS))
        .bind(employee_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("employee not found"))?;

    row_parsers::employee_from_row(&row)
}
