// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the encrypted register layout.

use std::path::{Path, PathBuf};

/// Default base directory for all persisted registers.
pub const DATA_ROOT: &str = "data";

/// Suffix appended to a store path to name its encrypted backup sibling.
pub const BACKUP_SUFFIX: &str = ".enc";

/// Storage path utilities for the register files.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all register data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Ledger Paths ==========

    /// Daily register: one column per marked date.
    pub fn daily(&self) -> PathBuf {
        self.root.join("attendance_daily.json")
    }

    /// Master register: one row per (identity, date).
    pub fn master(&self) -> PathBuf {
        self.root.join("attendance_master.json")
    }

    /// Yearly aggregate register.
    pub fn yearly(&self) -> PathBuf {
        self.root.join("attendance_yearly.json")
    }

    /// Calendar register: one column per day of the current year.
    pub fn calendar(&self) -> PathBuf {
        self.root.join("attendance_calendar.json")
    }

    /// All four ledger stores, in bootstrap order.
    pub fn ledger_files(&self) -> [PathBuf; 4] {
        [self.daily(), self.yearly(), self.master(), self.calendar()]
    }

    // ========== Biometric Gallery ==========

    /// Encrypted gallery of enrolled feature vectors.
    pub fn gallery(&self) -> PathBuf {
        self.root.join("gallery.json")
    }

    // ========== Transient Files ==========

    /// Directory holding decrypted scratch copies.
    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("scratch")
    }

    /// Path of a named scratch file.
    pub fn scratch_file(&self, name: &str) -> PathBuf {
        self.scratch_dir().join(format!("{name}.tmp"))
    }

    /// Encrypted backup sibling of a store (`<file>.enc`).
    pub fn backup_of(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }
}
