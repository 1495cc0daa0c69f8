// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Attendance Ledger - Encrypted Attendance Register Service
//!
//! Records daily presence for an enrolled roster in four synchronized
//! registers (daily, master, yearly, calendar), all encrypted at rest under
//! one symmetric key, and resolves identities from biometric feature
//! vectors produced by an external detector.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `recognition` - Biometric gallery, matcher, and sample capture
//! - `service` - Attendance event pipeline and enrollment
//! - `storage` - Encrypted registers and key management

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod recognition;
pub mod service;
pub mod state;
pub mod storage;
