// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        EnrollIdentityRequest, EnrollIdentityResponse, EnrollVectorsRequest,
        EnrollVectorsResponse, MarkTwinsRequest, RecognizeRequest, RecognizeResponse,
        RecordStatusRequest, RecordStatusResponse, ResetRequest, StatusUpdate,
        TwinConflictResponse, TwinPairsResponse,
    },
    recognition::{BoundingBox, Detection, MatchResult, TwinConflict, TwinPair},
    service::{EnrollmentReport, EventReport, MarkOutcome, Recognition},
    state::AppState,
    storage::{AttendanceStatus, Identity, MasterEntry, StoreFailure, StoreKind, YearlySummary},
};

pub mod attendance;
pub mod health;
pub mod identities;
pub mod keys;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/attendance/init", post(attendance::init_stores))
        .route(
            "/attendance",
            get(attendance::list_attendance).post(attendance::record_status),
        )
        .route("/attendance/reset", post(attendance::reset_ledger))
        .route("/identities", post(identities::enroll_identity))
        .route("/identities/{id}/vectors", post(identities::enroll_vectors))
        .route("/twins", post(identities::mark_twins))
        .route("/recognitions", post(identities::recognize))
        .route("/key/reset", post(keys::reset_key))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        attendance::init_stores,
        attendance::list_attendance,
        attendance::record_status,
        attendance::reset_ledger,
        identities::enroll_identity,
        identities::enroll_vectors,
        identities::mark_twins,
        identities::recognize,
        keys::reset_key
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            Identity,
            AttendanceStatus,
            StoreKind,
            StoreFailure,
            MasterEntry,
            YearlySummary,
            EventReport,
            MarkOutcome,
            Recognition,
            EnrollmentReport,
            MatchResult,
            TwinConflict,
            TwinPair,
            Detection,
            BoundingBox,
            StatusUpdate,
            RecordStatusRequest,
            RecordStatusResponse,
            ResetRequest,
            EnrollIdentityRequest,
            EnrollIdentityResponse,
            EnrollVectorsRequest,
            EnrollVectorsResponse,
            TwinConflictResponse,
            MarkTwinsRequest,
            TwinPairsResponse,
            RecognizeRequest,
            RecognizeResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and data directory checks"),
        (name = "Attendance", description = "Attendance registers"),
        (name = "Identities", description = "Enrollment and biometric vectors"),
        (name = "Recognition", description = "Match detections and mark attendance"),
        (name = "Keys", description = "Storage key management")
    )
)]
struct ApiDoc;
