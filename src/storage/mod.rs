// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encrypted Storage Module
//!
//! Persistent storage for the attendance registers and the biometric
//! gallery. Every file is an AES-256-GCM blob under one symmetric key, with
//! an encrypted `.enc` backup refreshed after each write.
//!
//! ## Storage Layout
//!
//! ```text
//! data/
//!   attendance_daily.json      (+ .enc backup)
//!   attendance_master.json     (+ .enc backup)
//!   attendance_yearly.json     (+ .enc backup)
//!   attendance_calendar.json   (+ .enc backup)
//!   gallery.json               (+ .enc backup)
//!   scratch/                   # decrypted working copies, short-lived
//! secret.key                   # base64 AES-256 key
//! ```
//!
//! ## Important Notes
//!
//! - Readers accept plaintext files written by older deployments; writers
//!   always produce the encrypted form
//! - There is no file locking: exactly one process may own `data/`

pub mod keystore;
pub mod ledger;
pub mod paths;
pub mod secure_fs;
pub mod table;

pub use keystore::{KeyStore, StoreKey};
pub use ledger::{
    AttendanceStatus, CalendarRegister, DailyRegister, Identity, Ledger, MasterEntry,
    MasterRegister, StoreFailure, StoreKind, YearlyRegister, YearlySummary,
};
pub use paths::StoragePaths;
pub use secure_fs::{DecryptOutcome, ScratchFile, SecureStorage, StorageError, StorageResult};
pub use table::{reconcile, Column, ExtraColumns, Schema, Table};
