//! Reimbursement handlers

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::Value;
use validator::Validate;

use core_kernel::{ReimbursementId, RequestId};
use domain_reimbursement::{Actor, ExpenseAmount, ReimbursementError, ReimbursementEvent, Role};

use crate::auth::AuthError;
use crate::dto::reimbursements::*;
use crate::{AppState, error::ApiError};

fn parse_id(raw: &str) -> Result<ReimbursementId, ApiError> {
    ReimbursementId::from_str(raw)
        .map_err(|_| ApiError::BadRequest(format!("Invalid reimbursement id: {}", raw)))
}

/// Roles the actor holds on the reimbursement; none means no access
async fn require_access(
    state: &AppState,
    id: ReimbursementId,
    actor: &Actor,
) -> Result<Vec<Role>, ApiError> {
    let roles = state.service.roles_for(id, actor).await?;
    if roles.is_empty() {
        return Err(AuthError::MissingPermission(format!("access to reimbursement {}", id)).into());
    }
    Ok(roles)
}

/// Creates the reimbursement of one of the caller's requests
pub async fn create_reimbursement(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<CreateReimbursementRequest>,
) -> Result<(StatusCode, Json<ReimbursementResponse>), ApiError> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let request_id = RequestId::from_str(&body.request_id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid request id: {}", body.request_id)))?;

    let request = state
        .service
        .requests()
        .get_request(request_id)
        .await
        .map_err(ReimbursementError::from)?;
    if request.user_id != actor.user_id {
        return Err(AuthError::MissingPermission(format!("request {}", request_id)).into());
    }

    let reimbursement = state.service.create(request_id).await?;
    Ok((StatusCode::CREATED, Json(ReimbursementResponse::from(&reimbursement))))
}

/// Lists the caller's own reimbursements
pub async fn list_reimbursements(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<ReimbursementResponse>>, ApiError> {
    let owned = state.service.list_for_user(actor.user_id).await?;
    Ok(Json(owned.iter().map(ReimbursementResponse::from).collect()))
}

/// Gets a reimbursement by ID
pub async fn get_reimbursement(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<ReimbursementResponse>, ApiError> {
    let id = parse_id(&id)?;
    require_access(&state, id, &actor).await?;

    let reimbursement = state.service.get(id).await?;
    Ok(Json(ReimbursementResponse::from(&reimbursement)))
}

/// Applies an update payload with the caller's editing role
pub async fn update_reimbursement(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<ReimbursementResponse>, ApiError> {
    let id = parse_id(&id)?;
    require_access(&state, id, &actor).await?;

    let reimbursement = state.service.apply_update_as(id, &actor, &payload).await?;
    Ok(Json(ReimbursementResponse::from(&reimbursement)))
}

/// Fires a lifecycle event if one of the caller's roles may fire it
pub async fn fire_event(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((id, event)): Path<(String, String)>,
) -> Result<Json<ReimbursementResponse>, ApiError> {
    let id = parse_id(&id)?;
    let event = ReimbursementEvent::from_str(&event).map_err(ApiError::BadRequest)?;
    require_access(&state, id, &actor).await?;

    let reimbursement = state.service.fire_as(id, &actor, event).await?;
    Ok(Json(ReimbursementResponse::from(&reimbursement)))
}

/// Lists the events that would currently succeed
pub async fn available_events(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<EventsResponse>, ApiError> {
    let id = parse_id(&id)?;
    require_access(&state, id, &actor).await?;

    let reimbursement = state.service.get(id).await?;
    Ok(Json(EventsResponse {
        state: reimbursement.state(),
        events: reimbursement.available_events(),
    }))
}

/// Reports whether the caller's roles may edit in the current state
pub async fn editable(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<EditableResponse>, ApiError> {
    let id = parse_id(&id)?;
    let roles = require_access(&state, id, &actor).await?;

    let mut per_role = Vec::with_capacity(roles.len());
    for role in roles {
        per_role.push(RoleEditable {
            role,
            editable: state.service.can_edit(id, role).await?,
        });
    }

    let reimbursement = state.service.get(id).await?;
    Ok(Json(EditableResponse {
        state: reimbursement.state(),
        editable: per_role.iter().any(|r| r.editable),
        roles: per_role,
    }))
}

/// Sums expense amounts of the reimbursed request, per currency
pub async fn expenses_sum(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Query(query): Query<ExpenseSumQuery>,
) -> Result<Json<ExpenseSumResponse>, ApiError> {
    let id = parse_id(&id)?;
    require_access(&state, id, &actor).await?;

    let kind = query.kind.unwrap_or(ExpenseAmount::Total);
    let sums = state.service.expenses_sum(id, kind).await?;
    Ok(Json(ExpenseSumResponse {
        kind,
        sums: sums.iter().map(MoneyResponse::from).collect(),
    }))
}
