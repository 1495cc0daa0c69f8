// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Calendar register: one row per identity, one column for every day of the
//! current year, pre-populated with `A`.
//!
//! Reconciliation against the year's full date list runs on every access,
//! so a register carried over from a previous year or left behind by a
//! partial run heals itself: missing days are added as `A`, out-of-year
//! columns are dropped, and duplicate (id, name) rows collapse to the first.

use chrono::{Datelike, NaiveDate};
use serde_json::{json, Value};

use super::{dates_of_year, format_date, AttendanceStatus, Identity};
use crate::storage::table::{Column, ExtraColumns, Schema, Table, ID_COLUMN, NAME_COLUMN};
use crate::storage::{SecureStorage, StorageResult};

/// Repository for the calendar register of one year.
pub struct CalendarRegister<'a> {
    storage: &'a SecureStorage,
    year: i32,
}

impl<'a> CalendarRegister<'a> {
    pub fn new(storage: &'a SecureStorage, year: i32) -> Self {
        Self { storage, year }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// `id`, `name`, then every date of the year.
    pub fn schema(&self) -> Schema {
        let mut columns = vec![
            Column::new(ID_COLUMN, Value::Null),
            Column::new(NAME_COLUMN, json!("")),
        ];
        columns.extend(
            dates_of_year(self.year)
                .into_iter()
                .map(|d| Column::new(format_date(d), AttendanceStatus::Absent.to_cell())),
        );
        Schema::new(columns, ExtraColumns::Drop)
    }

    /// Create the register, or reconcile an existing one against the year.
    pub fn ensure(&self) -> StorageResult<()> {
        let path = self.storage.paths().calendar();
        let schema = self.schema();
        if !self.storage.exists(&path) {
            return self.storage.write_json(&path, &schema.empty_table());
        }

        let removed = self
            .storage
            .mutate_table(&path, &schema, |table| Ok(table.dedup_by_identity()))?;
        if removed > 0 {
            tracing::info!(removed, year = self.year, "Removed duplicate calendar rows");
        }
        Ok(())
    }

    pub fn read(&self) -> StorageResult<Table> {
        self.storage
            .read_table(self.storage.paths().calendar(), &self.schema())
    }

    /// Append a row of `A` for `identity`. Returns `false` if already present.
    pub fn enroll(&self, identity: &Identity) -> StorageResult<bool> {
        self.ensure()?;
        self.storage
            .mutate_table(self.storage.paths().calendar(), &self.schema(), |table| {
                if table.contains_id(identity.id) {
                    return Ok(false);
                }
                push_identity_row(table, identity);
                Ok(true)
            })
    }

    /// Set the cell for (`identity`, `date`).
    ///
    /// Dates outside this register's year are ignored and reported as `false`.
    pub fn set_status(
        &self,
        identity: &Identity,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> StorageResult<bool> {
        if date.year() != self.year {
            tracing::debug!(%date, year = self.year, "Date outside calendar year, skipped");
            return Ok(false);
        }

        self.ensure()?;
        let column = format_date(date);
        self.storage
            .mutate_table(self.storage.paths().calendar(), &self.schema(), |table| {
                table.add_column(&column, AttendanceStatus::Absent.to_cell());
                let row = match table.find_row(identity.id) {
                    Some(row) => row,
                    None => push_identity_row(table, identity),
                };
                table.set_cell(row, &column, status.to_cell());
                Ok(true)
            })
    }

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ledger::test_support::{date, storage};

    #[test]
    fn ensure_prepopulates_every_day() {
        let (_temp, storage) = storage();

        let calendar = CalendarRegister::new(&storage, 2023);
        calendar.ensure().unwrap();
        assert_eq!(calendar.read().unwrap().columns.len(), 365 + 2);

        storage.remove_store(storage.paths().calendar()).unwrap();
        let leap = CalendarRegister::new(&storage, 2024);
        leap.ensure().unwrap();
        let table = leap.read().unwrap();
        assert_eq!(table.columns.len(), 366 + 2);
        assert_eq!(&table.columns[..3], ["id", "name", "2024-01-01"]);
    }

    #[test]
    fn ensure_heals_prior_year_and_duplicates() {
        let (_temp, storage) = storage();
        std::fs::write(
            storage.paths().calendar(),
            br#"{"columns":["id","name","2023-12-31","2024-01-02"],
                 "rows":[[1,"Ann","P","P"],[1,"Ann","A","A"],[2,"Bob","A","A"]]}"#,
        )
        .unwrap();

        let calendar = CalendarRegister::new(&storage, 2024);
        calendar.ensure().unwrap();

        let table = calendar.read().unwrap();
        assert_eq!(table.columns.len(), 366 + 2);
        assert!(!table.has_column("2023-12-31"));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(
            calendar.status(1, date("2024-01-02")).unwrap(),
            Some(AttendanceStatus::Present)
        );
        assert_eq!(
            calendar.status(1, date("2024-01-01")).unwrap(),
            Some(AttendanceStatus::Absent)
        );
    }

    #[test]
    fn enroll_is_idempotent() {
        let (_temp, storage) = storage();
        let calendar = CalendarRegister::new(&storage, 2024);
        let ann = Identity::new(1, "Ann");

        assert!(calendar.enroll(&ann).unwrap());
        assert!(!calendar.enroll(&ann).unwrap());
        assert_eq!(calendar.read().unwrap().rows.len(), 1);
    }

    #[test]
    fn set_status_writes_only_in_year_dates() {
        let (_temp, storage) = storage();
        let calendar = CalendarRegister::new(&storage, 2024);
        let ann = Identity::new(1, "Ann");
        calendar.enroll(&ann).unwrap();

        assert!(calendar
            .set_status(&ann, date("2024-03-01"), AttendanceStatus::Present)
            .unwrap());
        assert!(!calendar
            .set_status(&ann, date("2025-01-01"), AttendanceStatus::Present)
            .unwrap());

        assert_eq!(
            calendar.status(1, date("2024-03-01")).unwrap(),
            Some(AttendanceStatus::Present)
        );
        assert_eq!(calendar.read().unwrap().columns.len(), 366 + 2);
    }
}
