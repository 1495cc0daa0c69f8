// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Master register: append log of (identity, date, status), upserted on
//! the (identity, date) key. This is the register reports read from.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use super::{format_date, parse_date, AttendanceStatus, Identity};
use crate::storage::table::{
    cell_as_i64, cell_as_text, Column, ExtraColumns, Schema, Table, ID_COLUMN, NAME_COLUMN,
};
use crate::storage::{SecureStorage, StorageResult};

const DATE_COLUMN: &str = "date";
const STATUS_COLUMN: &str = "status";

/// One master register row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MasterEntry {
    pub id: i64,
    pub name: String,
    /// `YYYY-MM-DD`
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// Repository for the master register.
pub struct MasterRegister<'a> {
    storage: &'a SecureStorage,
}

impl<'a> MasterRegister<'a> {
    pub fn new(storage: &'a SecureStorage) -> Self {
        Self { storage }
    }

    pub fn schema() -> Schema {
        Schema::new(
            vec![
                Column::new(ID_COLUMN, Value::Null),
                Column::new(NAME_COLUMN, json!("")),
                Column::new(DATE_COLUMN, json!("")),
                Column::new(STATUS_COLUMN, json!("")),
            ],
            ExtraColumns::Drop,
        )
    }

    pub fn ensure(&self) -> StorageResult<()> {
        let path = self.storage.paths().master();
        if !self.storage.exists(&path) {
            return self.storage.write_json(&path, &Self::schema().empty_table());
        }
        self.storage.ensure_backup(&path)
    }

    pub fn read(&self) -> StorageResult<Table> {
        self.storage
            .read_table(self.storage.paths().master(), &Self::schema())
    }

    /// The master register keys rows by date, so enrollment adds nothing.
    pub fn enroll(&self, _identity: &Identity) -> StorageResult<bool> {
        self.ensure()?;
        Ok(false)
    }

    /// Insert or overwrite the status for (`identity`, `date`).
    pub fn upsert(
        &self,
        identity: &Identity,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> StorageResult<()> {
        self.ensure()?;
        let day = format_date(date);
        self.storage
            .mutate_table(self.storage.paths().master(), &Self::schema(), |table| {
                match find_entry(table, identity.id, &day) {
                    Some(row) => {
                        table.set_cell(row, STATUS_COLUMN, status.to_cell());
                    }
                    None => {
                        table.push_row_with(|column| match column {
                            ID_COLUMN => json!(identity.id),
                            NAME_COLUMN => json!(identity.name),
                            DATE_COLUMN => json!(day),
                            _ => status.to_cell(),
                        });
                    }
                }
                Ok(())
            })
    }

    /// Every well-formed entry in register order.
    ///
    /// Rows with an unreadable id or date are skipped.
    pub fn list(&self) -> StorageResult<Vec<MasterEntry>> {
        let table = self.read()?;
        Ok((0..table.rows.len())
            .filter_map(|row| entry_at(&table, row))
            .collect())
    }

    pub fn get(&self, id: i64, date: NaiveDate) -> StorageResult<Option<MasterEntry>> {
        let table = self.read()?;
        Ok(find_entry(&table, id, &format_date(date)).and_then(|row| entry_at(&table, row)))
    }
}

fn find_entry(table: &Table, id: i64, day: &str) -> Option<usize> {
    (0..table.rows.len()).find(|&row| {
        table.cell(row, ID_COLUMN).and_then(cell_as_i64) == Some(id)
            && table.cell(row, DATE_COLUMN).map(cell_as_text).as_deref() == Some(day)
    })
}

fn entry_at(table: &Table, row: usize) -> Option<MasterEntry> {
    Some(MasterEntry {
        id: table.cell(row, ID_COLUMN).and_then(cell_as_i64)?,
        name: table.cell(row, NAME_COLUMN).map(cell_as_text).unwrap_or_default(),
        date: parse_date(&cell_as_text(table.cell(row, DATE_COLUMN)?))?,
        status: table
            .cell(row, STATUS_COLUMN)
            .map(AttendanceStatus::from_cell)
            .unwrap_or(AttendanceStatus::Absent),
    })
}
