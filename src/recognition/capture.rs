// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enrollment sample capture.
//!
//! A [`VectorSource`] yields one frame at a time, each frame holding zero or
//! more detections. Only frames with exactly one detection contribute a
//! sample, so a second face in view never pollutes an enrollment.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Frames pulled per requested sample before capture gives up.
pub const ATTEMPTS_PER_SAMPLE: usize = 5;

/// Pixel box of a detection: `(top, right, bottom, left)` edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BoundingBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

/// One detected subject in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Detection {
    #[serde(default)]
    pub bounding_box: BoundingBox,
    pub vector: Vec<f64>,
}

impl Detection {
    pub fn new(vector: Vec<f64>) -> Self {
        Self {
            bounding_box: BoundingBox::default(),
            vector,
        }
    }
}

/// A feed of detection frames (camera, file replay, test fixture).
pub trait VectorSource {
    /// Next frame, or `None` when no frame could be read.
    fn next_frame(&mut self) -> Option<Vec<Detection>>;
}

impl<I> VectorSource for I
where
    I: Iterator<Item = Vec<Detection>>,
{
    fn next_frame(&mut self) -> Option<Vec<Detection>> {
        self.next()
    }
}

/// Result of a capture run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureReport {
    pub samples: Vec<Vec<f64>>,
    pub attempts: usize,
    /// Frames rejected for holding zero or several detections.
    pub rejected: usize,
}

impl CaptureReport {
    pub fn is_complete(&self, target: usize) -> bool {
        self.samples.len() >= target
    }
}

/// Pull frames until `target` samples are collected or the attempt budget
/// (`ATTEMPTS_PER_SAMPLE * target`) is spent.
pub fn capture_samples(source: &mut dyn VectorSource, target: usize) -> CaptureReport {
    let budget = target.saturating_mul(ATTEMPTS_PER_SAMPLE);
    let mut report = CaptureReport::default();

    while report.samples.len() < target && report.attempts < budget {
        report.attempts += 1;
        let Some(mut frame) = source.next_frame() else {
            tracing::debug!(attempt = report.attempts, "No frame available");
            continue;
        };

        if frame.len() == 1 {
            let detection = frame.remove(0);
            report.samples.push(detection.vector);
        } else {
            report.rejected += 1;
        }
    }

    if report.is_complete(target) {
        tracing::debug!(
            samples = report.samples.len(),
            attempts = report.attempts,
            "Capture complete"
        );
    } else {
        tracing::warn!(
            samples = report.samples.len(),
            target,
            attempts = report.attempts,
            "Capture budget exhausted before target"
        );
    }
    report
}
