// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Yearly register: per-identity attendance percentages.
//!
//! Aggregates are recomputed in full from the daily register on every event.
//! Date columns before the identity's join date never count.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use super::{format_date, parse_date, AttendanceStatus, DailyRegister, Identity};
use crate::storage::table::{
    cell_as_i64, cell_as_text, Column, ExtraColumns, Schema, Table, ID_COLUMN, NAME_COLUMN,
};
use crate::storage::{SecureStorage, StorageResult};

const JOIN_DATE_COLUMN: &str = "join_date";
const TOTAL_PERCENT_COLUMN: &str = "total_percent";
const TOTAL_PRESENT_COLUMN: &str = "total_present";
const TOTAL_ABSENT_COLUMN: &str = "total_absent";

pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Aggregates for one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct YearlySummary {
    pub id: i64,
    pub name: String,
    pub join_date: Option<NaiveDate>,
    /// Percent present per calendar month, January first.
    pub monthly_percent: Vec<f64>,
    pub total_percent: f64,
    pub total_present: u32,
    pub total_absent: u32,
}

/// Counts derived from a run of daily statuses.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aggregate {
    pub monthly_present: [u32; 12],
    pub monthly_total: [u32; 12],
}

impl Aggregate {
    /// Bucket statuses by month, skipping dates before `join_date`.
    pub fn from_statuses(
        statuses: &[(NaiveDate, AttendanceStatus)],
        join_date: Option<NaiveDate>,
    ) -> Self {
        let mut agg = Self::default();
        for (date, status) in statuses {
            if join_date.is_some_and(|join| *date < join) {
                continue;
            }
            let month = date.month0() as usize;
            agg.monthly_total[month] += 1;
            if *status == AttendanceStatus::Present {
                agg.monthly_present[month] += 1;
            }
        }
        agg
    }

    pub fn total_present(&self) -> u32 {
        self.monthly_present.iter().sum()
    }

    pub fn total_days(&self) -> u32 {
        self.monthly_total.iter().sum()
    }

    pub fn monthly_percent(&self) -> [f64; 12] {
        std::array::from_fn(|m| percent(self.monthly_present[m], self.monthly_total[m]))
    }

    pub fn total_percent(&self) -> f64 {
        percent(self.total_present(), self.total_days())
    }
}

/// `present / total * 100` rounded to two decimals; `0.0` when `total` is zero.
pub fn percent(present: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (f64::from(present) / f64::from(total) * 100.0 * 100.0).round() / 100.0
}

/// Repository for the yearly register.
pub struct YearlyRegister<'a> {
    storage: &'a SecureStorage,
}

impl<'a> YearlyRegister<'a> {
    pub fn new(storage: &'a SecureStorage) -> Self {
        Self { storage }
    }

    pub fn schema() -> Schema {
        let mut columns = vec![
            Column::new(ID_COLUMN, Value::Null),
            Column::new(NAME_COLUMN, json!("")),
            Column::new(JOIN_DATE_COLUMN, Value::Null),
        ];
        columns.extend(MONTHS.iter().map(|m| Column::new(*m, json!(0.0))));
        columns.push(Column::new(TOTAL_PERCENT_COLUMN, json!(0.0)));
        columns.push(Column::new(TOTAL_PRESENT_COLUMN, json!(0)));
        columns.push(Column::new(TOTAL_ABSENT_COLUMN, json!(0)));
        Schema::new(columns, ExtraColumns::Drop)
    }

    pub fn ensure(&self) -> StorageResult<()> {
        let path = self.storage.paths().yearly();
        if !self.storage.exists(&path) {
            return self.storage.write_json(&path, &Self::schema().empty_table());
        }
        self.storage.ensure_backup(&path)
    }

    pub fn read(&self) -> StorageResult<Table> {
        self.storage
            .read_table(self.storage.paths().yearly(), &Self::schema())
    }

    /// Append a zeroed row with `join_date`. Returns `false` if already present.
    pub fn enroll(&self, identity: &Identity, join_date: NaiveDate) -> StorageResult<bool> {
        self.ensure()?;
        let schema = Self::schema();
        self.storage
            .mutate_table(self.storage.paths().yearly(), &schema, |table| {
                if table.contains_id(identity.id) {
                    return Ok(false);
                }
                table.push_row_with(|column| match column {
                    ID_COLUMN => json!(identity.id),
                    NAME_COLUMN => json!(identity.name),
                    JOIN_DATE_COLUMN => json!(format_date(join_date)),
                    other => schema
                        .columns
                        .iter()
                        .find(|c| c.name == other)
                        .map(|c| c.default.clone())
                        .unwrap_or(Value::Null),
                });
                Ok(true)
            })
    }

    /// Recompute one identity's aggregates from the daily register.
    ///
    /// Returns `None`, leaving every row unchanged, when the identity has no
    /// yearly row.
    pub fn recompute(&self, id: i64) -> StorageResult<Option<YearlySummary>> {
        let statuses = DailyRegister::new(self.storage)
            .statuses_for(id)?
            .unwrap_or_default();

        self.ensure()?;
        self.storage
            .mutate_table(self.storage.paths().yearly(), &Self::schema(), |table| {
                let Some(row) = table.find_row(id) else {
                    return Ok(None);
                };

                let join_date = table
                    .cell(row, JOIN_DATE_COLUMN)
                    .and_then(|v| parse_date(&cell_as_text(v)));
                let agg = Aggregate::from_statuses(&statuses, join_date);

                for (month, pct) in MONTHS.into_iter().zip(agg.monthly_percent()) {
                    table.set_cell(row, month, json!(pct));
                }
                let total_present = agg.total_present();
                let total_absent = agg.total_days() - total_present;
                table.set_cell(row, TOTAL_PERCENT_COLUMN, json!(agg.total_percent()));
                table.set_cell(row, TOTAL_PRESENT_COLUMN, json!(total_present));
                table.set_cell(row, TOTAL_ABSENT_COLUMN, json!(total_absent));

                Ok(summary_at(table, row))
            })
    }

    pub fn get(&self, id: i64) -> StorageResult<Option<YearlySummary>> {
        let table = self.read()?;
        Ok(table.find_row(id).and_then(|row| summary_at(&table, row)))
    }
}

fn summary_at(table: &Table, row: usize) -> Option<YearlySummary> {
    let number = |column: &str| table.cell(row, column).and_then(Value::as_f64).unwrap_or(0.0);
    let count = |column: &str| {
        table
            .cell(row, column)
            .and_then(cell_as_i64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };

    Some(YearlySummary {
        id: table.cell(row, ID_COLUMN).and_then(cell_as_i64)?,
        name: table.cell(row, NAME_COLUMN).map(cell_as_text).unwrap_or_default(),
        join_date: table
            .cell(row, JOIN_DATE_COLUMN)
            .and_then(|v| parse_date(&cell_as_text(v))),
        monthly_percent: MONTHS.iter().map(|m| number(*m)).collect(),
        total_percent: number(TOTAL_PERCENT_COLUMN),
        total_present: count(TOTAL_PRESENT_COLUMN),
        total_absent: count(TOTAL_ABSENT_COLUMN),
    })
}
