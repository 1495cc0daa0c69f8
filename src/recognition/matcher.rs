// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Nearest-neighbour identity matching over the biometric gallery.
//!
//! Distances are Euclidean. The closest sample wins; on equal distances the
//! earliest enrolled sample wins, so results are deterministic in insertion
//! order. Samples of a different dimension than the query never match.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::gallery::Gallery;

/// Display name reported for unresolved vectors.
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MatchError {
    #[error("no samples supplied")]
    EmptySampleSet,
    #[error("sample dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("twin threshold {twin} must be greater than match threshold {matching}")]
    InvalidThresholds { matching: f64, twin: f64 },
}

/// Distance cut-offs for matching and twin detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    /// Below this distance a vector is accepted as the gallery identity.
    pub match_threshold: f64,
    /// Looser cut-off used at enrollment to surface lookalikes.
    pub twin_threshold: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            match_threshold: 0.45,
            twin_threshold: 0.6,
        }
    }
}

impl MatchThresholds {
    pub fn new(match_threshold: f64, twin_threshold: f64) -> Result<Self, MatchError> {
        if twin_threshold <= match_threshold {
            return Err(MatchError::InvalidThresholds {
                matching: match_threshold,
                twin: twin_threshold,
            });
        }
        Ok(Self {
            match_threshold,
            twin_threshold,
        })
    }
}

/// Outcome of matching one vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MatchResult {
    pub identity_id: Option<i64>,
    pub name: String,
    /// `1 - distance` for a match, `0.0` otherwise.
    pub confidence: f64,
}

impl MatchResult {
    pub fn unknown() -> Self {
        Self {
            identity_id: None,
            name: UNKNOWN_NAME.to_string(),
            confidence: 0.0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.identity_id.is_some()
    }
}

/// Near-duplicate of an existing identity found at enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TwinConflict {
    pub identity_id: i64,
    pub name: String,
    pub tag: Option<String>,
    pub distance: f64,
}

pub fn euclidean_distance(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    Some(
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt(),
    )
}

/// Classifier over an in-memory gallery.
#[derive(Debug, Clone, Default)]
pub struct IdentityMatcher {
    gallery: Gallery,
    thresholds: MatchThresholds,
}

impl IdentityMatcher {
    pub fn new(gallery: Gallery, thresholds: MatchThresholds) -> Self {
        Self {
            gallery,
            thresholds,
        }
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn thresholds(&self) -> MatchThresholds {
        self.thresholds
    }

    /// Swap in a freshly loaded gallery.
    pub fn replace_gallery(&mut self, gallery: Gallery) {
        self.gallery = gallery;
    }

    /// Index and distance of the first closest sample, skipping `exclude`.
    fn nearest(&self, vector: &[f64], exclude: Option<i64>) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, record) in self.gallery.records.iter().enumerate() {
            if exclude == Some(record.identity_id) {
                continue;
            }
            let Some(distance) = euclidean_distance(&record.vector, vector) else {
                continue;
            };
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((idx, distance));
            }
        }
        best
    }

    /// Resolve a vector to an identity, or unknown.
    pub fn match_vector(&self, vector: &[f64]) -> MatchResult {
        match self.nearest(vector, None) {
            Some((idx, distance)) if distance < self.thresholds.match_threshold => {
                let record = &self.gallery.records[idx];
                MatchResult {
                    identity_id: Some(record.identity_id),
                    name: record.name.clone(),
                    confidence: 1.0 - distance,
                }
            }
            _ => MatchResult::unknown(),
        }
    }

    /// Closest sample within the twin threshold, if any.
    ///
    /// Reported for the caller to resolve; nothing is changed here.
    pub fn find_twin_conflict(&self, vector: &[f64]) -> Option<TwinConflict> {
        self.twin_conflict_excluding(vector, None)
    }

    /// As [`find_twin_conflict`](Self::find_twin_conflict), ignoring the
    /// samples of `identity_id` itself (re-enrollment).
    pub fn find_twin_conflict_for(&self, identity_id: i64, vector: &[f64]) -> Option<TwinConflict> {
        self.twin_conflict_excluding(vector, Some(identity_id))
    }

    fn twin_conflict_excluding(&self, vector: &[f64], exclude: Option<i64>) -> Option<TwinConflict> {
        let (idx, distance) = self.nearest(vector, exclude)?;
        if distance >= self.thresholds.twin_threshold {
            return None;
        }
        let record = &self.gallery.records[idx];
        Some(TwinConflict {
            identity_id: record.identity_id,
            name: record.name.clone(),
            tag: record.tag.clone(),
            distance,
        })
    }

    /// Replace every sample of `identity_id` with `vectors`.
    ///
    /// All vectors must share one dimension. Returns the number of stale
    /// samples removed.
    pub fn enroll_vectors(
        &mut self,
        identity_id: i64,
        vectors: Vec<Vec<f64>>,
        name: &str,
        tag: Option<&str>,
    ) -> Result<usize, MatchError> {
        let Some(first) = vectors.first() else {
            return Err(MatchError::EmptySampleSet);
        };
        let expected = first.len();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(MatchError::DimensionMismatch {
                expected,
                found: bad.len(),
            });
        }

        Ok(self.gallery.replace_identity(identity_id, vectors, name, tag))
    }

    /// Flag two identities as confusable. Matching is unaffected.
    pub fn mark_twins(&mut self, a: i64, b: i64) -> bool {
        self.gallery.add_twin_pair(a, b)
    }
}
