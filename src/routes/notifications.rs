use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::notification::{Notification, NotificationListQuery};
use crate::utils::utc_now;

const NOTIFICATION_COLUMNS: &str = "id, recipient_id, event_name, subject_id, message, created_at, read_at";

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "Notifications",
    params(("unread" = Option<bool>, Query, description = "Only unread notifications")),
    responses((status = 200, description = "Caller's notifications, newest first", body = [Notification])),
    security(("bearerAuth" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<NotificationListQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let mut sql = format!("SELECT {} FROM notifications WHERE recipient_id = ?", NOTIFICATION_COLUMNS);
    if query.unread.unwrap_or(false) {
        sql.push_str(" AND read_at IS NULL");
    }
    sql.push_str(" ORDER BY created_at DESC LIMIT 200");

    let rows = sqlx::query(&sql)
        .bind(auth.user_id.to_string())
        .fetch_all(&state.pool)
        .await?;

    let notifications = rows
        .iter()
        .map(row_parsers::notification_from_row)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(notifications))
}

/// Idempotent: marking an already read notification keeps its first read time.
#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "Notifications",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 404, description = "Unknown notification")
    ),
    security(("bearerAuth" = []))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Notification>> {
    sqlx::query("UPDATE notifications SET read_at = ? WHERE id = ? AND recipient_id = ? AND read_at IS NULL")
        .bind(utc_now())
        .bind(id.to_string())
        .bind(auth.user_id.to_string())
        .execute(&state.pool)
        .await?;

    let row = sqlx::query(&format!(
        "SELECT {} FROM notifications WHERE id = ? AND recipient_id = ?",
        NOTIFICATION_COLUMNS
    ))
    .bind(id.to_string())
    .bind(auth.user_id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("notification not found"))?;

    Ok(Json(row_parsers::notification_from_row(&row)?))
}
