// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Biometric identity resolution.
//!
//! Feature vectors come from an external detector; this module only stores
//! them ([`gallery`]), compares them ([`matcher`]) and collects enrollment
//! samples from a frame source ([`capture`]).

pub mod capture;
pub mod gallery;
pub mod matcher;

pub use capture::{capture_samples, BoundingBox, CaptureReport, Detection, VectorSource};
pub use gallery::{BiometricRecord, Gallery, GalleryRepository, TwinPair};
pub use matcher::{
    IdentityMatcher, MatchError, MatchResult, MatchThresholds, TwinConflict, UNKNOWN_NAME,
};
