// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Daily register: one row per identity, one column per marked date.
//!
//! A new date column defaults every existing row to `A`; a new identity row
//! defaults every existing date to `A`.

use chrono::NaiveDate;
use serde_json::{json, Value};

use super::{format_date, parse_date, AttendanceStatus, Identity};
use crate::storage::table::{Column, ExtraColumns, Schema, Table, ID_COLUMN, NAME_COLUMN};
use crate::storage::{SecureStorage, StorageResult};

/// Repository for the daily register.
pub struct DailyRegister<'a> {
    storage: &'a SecureStorage,
}

impl<'a> DailyRegister<'a> {
    pub fn new(storage: &'a SecureStorage) -> Self {
        Self { storage }
    }

    /// `id`, `name`, then whatever date columns have been marked.
    pub fn schema() -> Schema {
        Schema::new(
            vec![
                Column::new(ID_COLUMN, Value::Null),
                Column::new(NAME_COLUMN, json!("")),
            ],
            ExtraColumns::Keep,
        )
    }

    /// Create the register if absent; refresh the backup otherwise.
    pub fn ensure(&self) -> StorageResult<()> {
        let path = self.storage.paths().daily();
        if !self.storage.exists(&path) {
            return self.storage.write_json(&path, &Self::schema().empty_table());
        }
        self.storage.ensure_backup(&path)
    }

    pub fn read(&self) -> StorageResult<Table> {
        self.storage
            .read_table(self.storage.paths().daily(), &Self::schema())
    }

    /// Append a row for `identity`. Returns `false` if already present.
    pub fn enroll(&self, identity: &Identity) -> StorageResult<bool> {
        self.ensure()?;
        self.storage
            .mutate_table(self.storage.paths().daily(), &Self::schema(), |table| {
                if table.contains_id(identity.id) {
                    return Ok(false);
                }
                push_identity_row(table, identity);
                Ok(true)
            })
    }

    /// Set the cell for (`identity`, `date`), adding the date column and
    /// the identity row when they are new.
    pub fn set_status(
        &self,
        identity: &Identity,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> StorageResult<()> {
        self.ensure()?;
        let column = format_date(date);
        self.storage
            .mutate_table(self.storage.paths().daily(), &Self::schema(), |table| {
                table.add_column(&column, AttendanceStatus::Absent.to_cell());
                let row = match table.find_row(identity.id) {
                    Some(row) => row,
                    None => push_identity_row(table, identity),
                };
                table.set_cell(row, &column, status.to_cell());
                Ok(())
            })
    }

    /// Marked dates, in column order.
    pub fn dates(&self) -> StorageResult<Vec<NaiveDate>> {
        let table = self.read()?;
        Ok(date_columns(&table).into_iter().map(|(_, d)| d).collect())
    }

    /// Status per marked date for one identity; `None` if not enrolled.
    pub fn statuses_for(&self, id: i64) -> StorageResult<Option<Vec<(NaiveDate, AttendanceStatus)>>> {
        let table = self.read()?;
        let Some(row) = table.find_row(id) else {
            return Ok(None);
        };

        let statuses = date_columns(&table)
            .into_iter()
            .map(|(col, date)| {
                let status = table.rows[row]
                    .get(col)
                    .map(AttendanceStatus::from_cell)
                    .unwrap_or(AttendanceStatus::Absent);
                (date, status)
            })
            .collect();
        Ok(Some(statuses))
    }

    /// Status of one cell, if both row and column exist.
    pub fn status(&self, id: i64, date: NaiveDate) -> StorageResult<Option<AttendanceStatus>> {
        let table = self.read()?;
        Ok(table
            .find_row(id)
            .and_then(|row| table.cell(row, &format_date(date)))
            .map(AttendanceStatus::from_cell))
    }
}

fn push_identity_row(table: &mut Table, identity: &Identity) -> usize {
    table.push_row_with(|column| match column {
        ID_COLUMN => json!(identity.id),
        NAME_COLUMN => json!(identity.name),
        _ => AttendanceStatus::Absent.to_cell(),
    })
}

/// `(column index, date)` for every column whose name parses as a date.
fn date_columns(table: &Table) -> Vec<(usize, NaiveDate)> {
    table
        .columns
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| parse_date(name).map(|d| (idx, d)))
        .collect()
}
