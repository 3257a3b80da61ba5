use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sqlx::query_scalar;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::errors::AppResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub db_ok: bool,
    pub db_error: Option<String>,
    /// Subscribers on the activity bus; 0 means audit events are being dropped
    pub event_listeners: usize,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Health check", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let db_check = query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await;
    let event_listeners = state.event_bus.receiver_count();

    let (db_ok, db_error) = match db_check {
        Ok(_) => (true, None),
        Err(e) => {
            tracing::warn!(error = %e, "health check database probe failed");
            (false, Some(e.to_string()))
        }
    };

    let status = if db_ok && event_listeners > 0 { "ok" } else { "degraded" };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        db_ok,
        db_error,
        event_listeners,
    }))
}
