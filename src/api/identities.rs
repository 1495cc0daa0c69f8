// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    error::ApiError,
    models::{
        EnrollIdentityRequest, EnrollIdentityResponse, EnrollVectorsRequest,
        EnrollVectorsResponse, MarkTwinsRequest, RecognizeRequest, RecognizeResponse,
        TwinConflictResponse, TwinPairsResponse,
    },
    service::ServiceError,
    state::AppState,
    storage::Identity,
};

#[utoipa::path(
    post,
    path = "/v1/identities",
    request_body = EnrollIdentityRequest,
    tag = "Identities",
    responses((status = 201, body = EnrollIdentityResponse))
)]
pub async fn enroll_identity(
    State(state): State<AppState>,
    Json(request): Json<EnrollIdentityRequest>,
) -> Result<(StatusCode, Json<EnrollIdentityResponse>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }

    let identity = Identity::new(request.id, request.name.trim());
    let response = state
        .with_service(move |service| {
            let failures = service.enroll_identity(&identity);
            EnrollIdentityResponse { identity, failures }
        })
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Store biometric vectors for an identity.
///
/// Without `twin_of`, vectors resembling another identity are refused with
/// 409 and the lookalike; resubmit with `twin_of` to accept it.
#[utoipa::path(
    post,
    path = "/v1/identities/{id}/vectors",
    params(("id" = i64, Path, description = "Identity the vectors belong to")),
    request_body = EnrollVectorsRequest,
    tag = "Identities",
    responses(
        (status = 201, body = EnrollVectorsResponse),
        (status = 400, description = "An identity cannot be its own twin"),
        (status = 409, description = "Vectors resemble another identity", body = TwinConflictResponse),
        (status = 422, description = "No vectors, or vectors of mixed dimension")
    )
)]
pub async fn enroll_vectors(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<EnrollVectorsRequest>,
) -> Result<Response, ApiError> {
    if request.twin_of == Some(id) {
        return Err(ApiError::bad_request("an identity cannot be its own twin"));
    }
    let identity = Identity::new(id, request.name.trim());

    let result = state
        .with_service(move |service| {
            if request.twin_of.is_none() {
                if let Some(conflict) = service.check_twin_conflict(id, &request.vectors) {
                    return Ok(Err(conflict));
                }
            }
            service
                .commit_enrollment(
                    &identity,
                    request.vectors,
                    request.tag.as_deref(),
                    request.twin_of,
                )
                .map(Ok)
        })
        .await?
        .map_err(ApiError::from)?;

    Ok(match result {
        Ok(enrollment) => {
            (StatusCode::CREATED, Json(EnrollVectorsResponse { enrollment })).into_response()
        }
        Err(conflict) => {
            (StatusCode::CONFLICT, Json(TwinConflictResponse { conflict })).into_response()
        }
    })
}

#[utoipa::path(
    post,
    path = "/v1/twins",
    request_body = MarkTwinsRequest,
    tag = "Identities",
    responses(
        (status = 200, body = TwinPairsResponse),
        (status = 400, description = "An identity cannot be its own twin")
    )
)]
pub async fn mark_twins(
    State(state): State<AppState>,
    Json(request): Json<MarkTwinsRequest>,
) -> Result<Json<TwinPairsResponse>, ApiError> {
    if request.first == request.second {
        return Err(ApiError::bad_request("an identity cannot be its own twin"));
    }

    let response = state
        .with_service(move |service| {
            let recorded = service.mark_twins(request.first, request.second)?;
            Ok::<_, ServiceError>(TwinPairsResponse {
                recorded,
                twin_pairs: service.twin_pairs().to_vec(),
            })
        })
        .await??;
    Ok(Json(response))
}

/// Match detections against the gallery and mark today's attendance for
/// every recognized identity.
#[utoipa::path(
    post,
    path = "/v1/recognitions",
    request_body = RecognizeRequest,
    tag = "Recognition",
    responses((status = 200, body = RecognizeResponse))
)]
pub async fn recognize(
    State(state): State<AppState>,
    Json(request): Json<RecognizeRequest>,
) -> Result<Json<RecognizeResponse>, ApiError> {
    let recognitions = state
        .with_service(move |service| service.recognize(request.detections))
        .await?;
    Ok(Json(RecognizeResponse { recognitions }))
}
