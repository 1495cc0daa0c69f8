// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};

use crate::{error::ApiError, models::ResetRequest, state::AppState};

/// Replace the storage key.
///
/// This is a wipe, not a rotation: registers written under the old key
/// can no longer be read. Follow with `POST /v1/attendance/reset`.
#[utoipa::path(
    post,
    path = "/v1/key/reset",
    request_body = ResetRequest,
    tag = "Keys",
    responses(
        (status = 204, description = "New key generated and in use"),
        (status = 400, description = "Reset not confirmed")
    )
)]
pub async fn reset_key(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<StatusCode, ApiError> {
    if !request.confirm {
        return Err(ApiError::bad_request("key reset requires confirm: true"));
    }
    state
        .with_service(|service| service.reset_key())
        .await??;
    Ok(StatusCode::NO_CONTENT)
}
