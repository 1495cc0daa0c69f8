// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the REST API. Domain types that cross
//! the wire unchanged ([`Identity`], [`MasterEntry`], [`EventReport`], ...)
//! are used directly; this module only adds the envelopes around them.
//!
//! ## Model Categories
//!
//! - **Attendance**: bulk status corrections and resets
//! - **Identities**: enrollment, biometric vectors, twin pairs
//! - **Recognition**: detections in, match results and outcomes out

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::recognition::{Detection, TwinConflict, TwinPair};
use crate::service::{EnrollmentReport, EventReport, Recognition};
use crate::storage::{AttendanceStatus, Identity, StoreFailure};

// =============================================================================
// Attendance
// =============================================================================

/// One manual status correction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StatusUpdate {
    pub id: i64,
    pub name: String,
    /// `P` for present; any other value is recorded as absent.
    pub status: String,
}

impl StatusUpdate {
    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.name.clone())
    }

    pub fn normalized_status(&self) -> AttendanceStatus {
        AttendanceStatus::normalize(&self.status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct RecordStatusRequest {
    pub updates: Vec<StatusUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct RecordStatusResponse {
    pub reports: Vec<EventReport>,
}

/// Guard for destructive operations.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ResetRequest {
    /// Must be `true`.
    #[serde(default)]
    pub confirm: bool,
}

// =============================================================================
// Identities
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct EnrollIdentityRequest {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct EnrollIdentityResponse {
    pub identity: Identity,
    pub failures: Vec<StoreFailure>,
}

/// Vectors to store for one identity, replacing any enrolled earlier.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct EnrollVectorsRequest {
    pub name: String,
    pub vectors: Vec<Vec<f64>>,
    #[serde(default)]
    pub tag: Option<String>,
    /// Accept a lookalike by recording this identity as its twin.
    #[serde(default)]
    pub twin_of: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct EnrollVectorsResponse {
    pub enrollment: EnrollmentReport,
}

/// Returned with 409 when the vectors resemble another identity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct TwinConflictResponse {
    pub conflict: TwinConflict,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct MarkTwinsRequest {
    pub first: i64,
    pub second: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct TwinPairsResponse {
    /// Whether this request added a new pair.
    pub recorded: bool,
    pub twin_pairs: Vec<TwinPair>,
}

// =============================================================================
// Recognition
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct RecognizeRequest {
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct RecognizeResponse {
    pub recognitions: Vec<Recognition>,
}
