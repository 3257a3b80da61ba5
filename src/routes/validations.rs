use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Actor;
use crate::errors::AppResult;
use crate::events::RequestContext;
use crate::models::validation::{ResolveValidationRequest, ValidationRecord, ValidationResolution};

#[utoipa::path(
    get,
    path = "/validations/pending",
    tag = "Validations",
    responses((status = 200, description = "Pending validations the caller may resolve", body = [ValidationRecord])),
    security(("bearerAuth" = []))
)]
pub async fn list_pending(State(state): State<AppState>, actor: Actor) -> AppResult<Json<Vec<ValidationRecord>>> {
    let records = state.workflow.pending_for(&actor).await?;
    Ok(Json(records))
}

/// Approves or rejects one validation. For group validations the first
/// eligible member to answer wins; everyone else gets 409.
#[utoipa::path(
    post,
    path = "/validations/{id}/resolve",
    tag = "Validations",
    params(("id" = Uuid, Path, description = "Validation id")),
    request_body = ResolveValidationRequest,
    responses(
        (status = 200, description = "Validation resolved, request reconciled", body = ValidationResolution),
        (status = 403, description = "Caller is not an eligible approver"),
        (status = 404, description = "Unknown validation"),
        (status = 409, description = "Validation already resolved")
    ),
    security(("bearerAuth" = []))
)]
pub async fn resolve_validation(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveValidationRequest>,
) -> AppResult<Json<ValidationResolution>> {
    let resolution = state
        .workflow
        .resolve_validation(
            &actor,
            id,
            payload.decision,
            payload.comment,
            Some(RequestContext::from_headers(&headers)),
        )
        .await?;
    Ok(Json(resolution))
}
