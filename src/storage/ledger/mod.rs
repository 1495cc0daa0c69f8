// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The four attendance registers.
//!
//! - `daily` - one column per marked date
//! - `master` - one row per (identity, date), the reporting system of record
//! - `yearly` - per-identity monthly and overall percentages
//! - `calendar` - one column per day of the current year
//!
//! Each register is a typed view over a [`Table`](super::Table) persisted
//! through [`SecureStorage`]; every mutation is one read-modify-write cycle.

pub mod calendar;
pub mod daily;
pub mod master;
pub mod yearly;

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::{SecureStorage, StorageResult};

pub use calendar::CalendarRegister;
pub use daily::DailyRegister;
pub use master::{MasterEntry, MasterRegister};
pub use yearly::{YearlyRegister, YearlySummary};

/// Date column / cell format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// An enrolled person tracked by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub id: i64,
    pub name: String,
}

impl Identity {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Attendance cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AttendanceStatus {
    #[serde(rename = "P")]
    Present,
    #[serde(rename = "A")]
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "P",
            AttendanceStatus::Absent => "A",
        }
    }

    /// `P` (any case, surrounding whitespace ignored) is present; anything else is absent.
    pub fn normalize(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("P") {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Absent
        }
    }

    pub fn from_cell(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::normalize(s),
            _ => AttendanceStatus::Absent,
        }
    }

    pub fn to_cell(self) -> Value {
        Value::String(self.as_str().to_string())
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which register an operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Daily,
    Master,
    Yearly,
    Calendar,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreKind::Daily => "daily",
            StoreKind::Master => "master",
            StoreKind::Yearly => "yearly",
            StoreKind::Calendar => "calendar",
        };
        f.write_str(name)
    }
}

/// A per-register failure that did not abort the surrounding operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StoreFailure {
    pub store: StoreKind,
    pub error: String,
}

impl StoreFailure {
    pub fn new(store: StoreKind, error: impl fmt::Display) -> Self {
        Self {
            store,
            error: error.to_string(),
        }
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Every date of `year`, in order.
pub fn dates_of_year(year: i32) -> Vec<NaiveDate> {
    let Some(start) = NaiveDate::from_ymd_opt(year, 1, 1) else {
        return Vec::new();
    };
    start
        .iter_days()
        .take_while(|d| d.year() == year)
        .collect()
}

/// Facade over the four registers.
pub struct Ledger<'a> {
    storage: &'a SecureStorage,
}

impl<'a> Ledger<'a> {
    pub fn new(storage: &'a SecureStorage) -> Self {
        Self { storage }
    }

    pub fn daily(&self) -> DailyRegister<'a> {
        DailyRegister::new(self.storage)
    }

    pub fn master(&self) -> MasterRegister<'a> {
        MasterRegister::new(self.storage)
    }

    pub fn yearly(&self) -> YearlyRegister<'a> {
        YearlyRegister::new(self.storage)
    }

    /// Calendar register for the year of `today`.
    pub fn calendar(&self, today: NaiveDate) -> CalendarRegister<'a> {
        CalendarRegister::new(self.storage, today.year())
    }

    /// Bootstrap every register that does not exist yet.
    pub fn ensure_all(&self, today: NaiveDate) -> StorageResult<()> {
        self.daily().ensure()?;
        self.yearly().ensure()?;
        self.master().ensure()?;
        self.calendar(today).ensure()?;
        Ok(())
    }

    /// Enroll `identity` in every register, joining on `joined`.
    ///
    /// The calendar is always the one for `today`'s year. Registers are
    /// handled independently; failures are collected rather than aborting
    /// the remaining registers.
    pub fn enroll(
        &self,
        identity: &Identity,
        joined: NaiveDate,
        today: NaiveDate,
    ) -> Vec<StoreFailure> {
        let results = [
            (StoreKind::Daily, self.daily().enroll(identity)),
            (StoreKind::Yearly, self.yearly().enroll(identity, joined)),
            (StoreKind::Master, self.master().enroll(identity)),
            (StoreKind::Calendar, self.calendar(today).enroll(identity)),
        ];

        results
            .into_iter()
            .filter_map(|(store, result)| match result {
                Ok(added) => {
                    if added {
                        tracing::debug!(%store, id = identity.id, "Enrolled identity");
                    }
                    None
                }
                Err(e) => Some(StoreFailure::new(store, e)),
            })
            .collect()
    }

    /// Delete all four registers and recreate them empty.
    pub fn reset_all(&self, today: NaiveDate) -> StorageResult<()> {
        for path in self.storage.paths().ledger_files() {
            self.storage.remove_store(&path)?;
        }
        tracing::warn!("All attendance registers reset");
        self.ensure_all(today)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use tempfile::TempDir;

    use crate::storage::{SecureStorage, StoragePaths, StoreKey};

    pub fn storage() -> (TempDir, SecureStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = SecureStorage::new(StoragePaths::new(temp.path()), StoreKey::generate());
        storage.initialize().unwrap();
        (temp, storage)
    }

    pub fn date(raw: &str) -> chrono::NaiveDate {
        super::parse_date(raw).unwrap()
    }
}
