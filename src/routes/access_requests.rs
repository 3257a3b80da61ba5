use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Actor;
use crate::errors::AppResult;
use crate::events::RequestContext;
use crate::models::access_request::{
    AccessRequest, AccessRequestCreateRequest, AccessRequestDetail, AccessRequestListQuery, RequestedSystem,
};

#[utoipa::path(
    get,
    path = "/access-requests",
    tag = "Access Requests",
    params(("status" = Option<String>, Query, description = "pending, validating, approved, rejected or finalized")),
    responses((status = 200, description = "Own requests, or all for HR/IT", body = [AccessRequest])),
    security(("bearerAuth" = []))
)]
pub async fn list_requests(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<AccessRequestListQuery>,
) -> AppResult<Json<Vec<AccessRequest>>> {
    let requests = state.workflow.list_requests(&actor, query.status).await?;
    Ok(Json(requests))
}

#[utoipa::path(
    post,
    path = "/access-requests",
    tag = "Access Requests",
    request_body = AccessRequestCreateRequest,
    responses(
        (status = 201, description = "Request submitted", body = AccessRequestDetail),
        (status = 400, description = "No systems requested"),
        (status = 404, description = "Unknown employee or system"),
        (status = 409, description = "No resolvable validator for a requested system")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_request(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Json(payload): Json<AccessRequestCreateRequest>,
) -> AppResult<(StatusCode, Json<AccessRequestDetail>)> {
    let detail = state
        .workflow
        .submit_request(&actor, payload, Some(RequestContext::from_headers(&headers)))
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

#[utoipa::path(
    get,
    path = "/access-requests/{id}",
    tag = "Access Requests",
    params(("id" = Uuid, Path, description = "Access request id")),
    responses(
        (status = 200, description = "Request with systems and validations", body = AccessRequestDetail),
        (status = 403, description = "Not the requester, an approver, or HR/IT")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AccessRequestDetail>> {
    let detail = state.workflow.load_detail(&actor, id).await?;
    Ok(Json(detail))
}

#[utoipa::path(
    delete,
    path = "/access-requests/{id}",
    tag = "Access Requests",
    params(("id" = Uuid, Path, description = "Access request id")),
    responses((status = 204, description = "Pending request deleted, or request soft deleted")),
    security(("bearerAuth" = []))
)]
pub async fn withdraw_request(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state
        .workflow
        .withdraw_request(&actor, id, Some(RequestContext::from_headers(&headers)))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/access-requests/{id}/systems/{system_id}/provision",
    tag = "Access Requests",
    params(
        ("id" = Uuid, Path, description = "Access request id"),
        ("system_id" = Uuid, Path, description = "Requested system id")
    ),
    responses(
        (status = 200, description = "System marked provisioned", body = RequestedSystem),
        (status = 409, description = "Request not approved, or already provisioned")
    ),
    security(("bearerAuth" = []))
)]
pub async fn provision_system(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Path((id, system_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<RequestedSystem>> {
    let entry = state
        .workflow
        .mark_provisioned(&actor, id, system_id, Some(RequestContext::from_headers(&headers)))
        .await?;
    Ok(Json(entry))
}

#[utoipa::path(
    post,
    path = "/access-requests/{id}/finalize",
    tag = "Access Requests",
    params(("id" = Uuid, Path, description = "Access request id")),
    responses(
        (status = 200, description = "Request finalized", body = AccessRequest),
        (status = 409, description = "Not approved or not fully provisioned")
    ),
    security(("bearerAuth" = []))
)]
pub async fn finalize_request(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AccessRequest>> {
    let request = state
        .workflow
        .finalize_request(&actor, id, Some(RequestContext::from_headers(&headers)))
        .await?;
    Ok(Json(request))
}
