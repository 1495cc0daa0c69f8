// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::ApiError,
    models::{RecordStatusRequest, RecordStatusResponse, ResetRequest},
    state::AppState,
    storage::MasterEntry,
};

#[utoipa::path(
    post,
    path = "/v1/attendance/init",
    tag = "Attendance",
    responses((status = 204, description = "Every register exists and the calendar covers this year"))
)]
pub async fn init_stores(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state
        .with_service(|service| service.ensure_stores())
        .await??;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/attendance",
    tag = "Attendance",
    responses(
        (status = 200, body = [MasterEntry]),
        (status = 409, description = "Register unreadable under the current key")
    )
)]
pub async fn list_attendance(
    State(state): State<AppState>,
) -> Result<Json<Vec<MasterEntry>>, ApiError> {
    let entries = state
        .with_service(|service| service.list_attendance())
        .await??;
    Ok(Json(entries))
}

/// Apply manual corrections for today. Every update runs the full register
/// pipeline; repeats are not suppressed.
#[utoipa::path(
    post,
    path = "/v1/attendance",
    request_body = RecordStatusRequest,
    tag = "Attendance",
    responses(
        (status = 200, body = RecordStatusResponse),
        (status = 400, description = "No updates supplied")
    )
)]
pub async fn record_status(
    State(state): State<AppState>,
    Json(request): Json<RecordStatusRequest>,
) -> Result<Json<RecordStatusResponse>, ApiError> {
    if request.updates.is_empty() {
        return Err(ApiError::bad_request("updates must not be empty"));
    }

    let reports = state
        .with_service(move |service| {
            request
                .updates
                .iter()
                .map(|update| service.record_status(&update.identity(), update.normalized_status()))
                .collect::<Vec<_>>()
        })
        .await?;
    Ok(Json(RecordStatusResponse { reports }))
}

#[utoipa::path(
    post,
    path = "/v1/attendance/reset",
    request_body = ResetRequest,
    tag = "Attendance",
    responses(
        (status = 204, description = "All registers wiped and recreated"),
        (status = 400, description = "Reset not confirmed")
    )
)]
pub async fn reset_ledger(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<StatusCode, ApiError> {
    if !request.confirm {
        return Err(ApiError::bad_request("reset requires confirm: true"));
    }
    state
        .with_service(|service| service.reset_ledger())
        .await??;
    Ok(StatusCode::NO_CONTENT)
}
