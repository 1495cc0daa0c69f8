// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Column-oriented register tables and schema reconciliation.
//!
//! Every ledger store is a rectangular table of JSON cells with named
//! columns. Tables are reconciled against a required [`Schema`] before every
//! read and write, so a store carrying an older or partial layout is healed
//! in place rather than rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity column name shared by every register.
pub const ID_COLUMN: &str = "id";
/// Display name column shared by every register.
pub const NAME_COLUMN: &str = "name";

/// A required column and the value used to fill it when missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub default: Value,
}

impl Column {
    pub fn new(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            default,
        }
    }
}

/// What to do with columns present in a table but absent from the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraColumns {
    /// Keep them after the required columns, in their existing order.
    Keep,
    /// Remove them.
    Drop,
}

/// Required layout of a register.
#[derive(Debug, Clone)]
pub struct Schema {
    pub columns: Vec<Column>,
    pub extra: ExtraColumns,
}

impl Schema {
    pub fn new(columns: Vec<Column>, extra: ExtraColumns) -> Self {
        Self { columns, extra }
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Empty table carrying exactly the required columns.
    pub fn empty_table(&self) -> Table {
        Table::with_columns(self.column_names())
    }
}

/// Rectangular table: `rows[r][c]` is the cell of column `columns[c]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn with_columns(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a column, filling every existing row with `default`.
    /// Returns `false` when the column already existed.
    pub fn add_column(&mut self, name: &str, default: Value) -> bool {
        if self.has_column(name) {
            return false;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(default.clone());
        }
        true
    }

    /// Index of the first row whose `id` cell equals `id`.
    pub fn find_row(&self, id: i64) -> Option<usize> {
        let col = self.column_index(ID_COLUMN)?;
        self.rows
            .iter()
            .position(|row| row.get(col).and_then(cell_as_i64) == Some(id))
    }

    pub fn contains_id(&self, id: i64) -> bool {
        self.find_row(id).is_some()
    }

    /// Distinct identity ids in row order.
    pub fn ids(&self) -> Vec<i64> {
        let Some(col) = self.column_index(ID_COLUMN) else {
            return Vec::new();
        };
        let mut ids = Vec::new();
        for id in self.rows.iter().filter_map(|row| row.get(col).and_then(cell_as_i64)) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)
    }

    /// Set a cell. Returns `false` when the row or column does not exist.
    pub fn set_cell(&mut self, row: usize, column: &str, value: Value) -> bool {
        let Some(col) = self.column_index(column) else {
            return false;
        };
        match self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// Append a row built from `fill(column_name)` for every column.
    pub fn push_row_with(&mut self, mut fill: impl FnMut(&str) -> Value) -> usize {
        let row = self.columns.iter().map(|c| fill(c)).collect();
        self.rows.push(row);
        self.rows.len() - 1
    }

    /// Drop later rows whose (`id`, `name`) pair was already seen.
    /// Returns how many rows were removed.
    pub fn dedup_by_identity(&mut self) -> usize {
        let (Some(id_col), Some(name_col)) =
            (self.column_index(ID_COLUMN), self.column_index(NAME_COLUMN))
        else {
            return 0;
        };

        let before = self.rows.len();
        let mut seen: Vec<(Value, Value)> = Vec::new();
        self.rows.retain(|row| {
            let key = (
                row.get(id_col).cloned().unwrap_or(Value::Null),
                row.get(name_col).cloned().unwrap_or(Value::Null),
            );
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });
        before - self.rows.len()
    }
}

/// Reconcile `table` against `schema`.
///
/// Missing required columns are added with their default, existing values
/// are preserved, required columns come first in schema order, and extra
/// columns are kept or dropped per [`Schema::extra`]. Short rows are padded
/// with `null` before reshaping.
pub fn reconcile(table: Table, schema: &Schema) -> Table {
    let Table { columns, rows } = table;

    let mut layout: Vec<(String, Option<usize>, Value)> = schema
        .columns
        .iter()
        .map(|c| {
            let existing = columns.iter().position(|name| name == &c.name);
            (c.name.clone(), existing, c.default.clone())
        })
        .collect();

    if schema.extra == ExtraColumns::Keep {
        for (idx, name) in columns.iter().enumerate() {
            if !layout.iter().any(|(n, _, _)| n == name) {
                layout.push((name.clone(), Some(idx), Value::Null));
            }
        }
    }

    let rows = rows
        .into_iter()
        .map(|row| {
            layout
                .iter()
                .map(|(_, source, default)| match source {
                    Some(idx) => row.get(*idx).cloned().unwrap_or(Value::Null),
                    None => default.clone(),
                })
                .collect()
        })
        .collect();

    Table {
        columns: layout.into_iter().map(|(name, _, _)| name).collect(),
        rows,
    }
}

/// Read an integer identity from a cell, accepting numeric strings.
pub fn cell_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a cell as trimmed text; non-strings render as JSON.
pub fn cell_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(extra: ExtraColumns) -> Schema {
        Schema::new(
            vec![
                Column::new(ID_COLUMN, Value::Null),
                Column::new(NAME_COLUMN, json!("")),
                Column::new("2024-01-01", json!("A")),
            ],
            extra,
        )
    }

    #[test]
    fn reconcile_adds_missing_columns_with_default() {
        let table = Table {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec![json!(1), json!("Ann")]],
        };

        let table = reconcile(table, &schema(ExtraColumns::Drop));
        assert_eq!(table.columns, vec!["id", "name", "2024-01-01"]);
        assert_eq!(table.rows[0], vec![json!(1), json!("Ann"), json!("A")]);
    }

    #[test]
    fn reconcile_preserves_values_and_reorders() {
        let table = Table {
            columns: vec!["2024-01-01".into(), "name".into(), "id".into()],
            rows: vec![vec![json!("P"), json!("Bob"), json!(2)]],
        };

        let table = reconcile(table, &schema(ExtraColumns::Drop));
        assert_eq!(table.rows[0], vec![json!(2), json!("Bob"), json!("P")]);
    }

    #[test]
    fn reconcile_keeps_or_drops_extra_columns() {
        let table = Table {
            columns: vec!["id".into(), "name".into(), "2023-12-31".into()],
            rows: vec![vec![json!(1), json!("Ann"), json!("P")]],
        };

        let kept = reconcile(table.clone(), &schema(ExtraColumns::Keep));
        assert_eq!(kept.columns, vec!["id", "name", "2024-01-01", "2023-12-31"]);
        assert_eq!(kept.rows[0][3], json!("P"));

        let dropped = reconcile(table, &schema(ExtraColumns::Drop));
        assert_eq!(dropped.columns, vec!["id", "name", "2024-01-01"]);
    }

    #[test]
    fn reconcile_pads_short_rows() {
        let table = Table {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec![json!(4)]],
        };
        let table = reconcile(table, &schema(ExtraColumns::Drop));
        assert_eq!(table.rows[0], vec![json!(4), Value::Null, json!("A")]);
    }

    #[test]
    fn add_column_backfills_rows() {
        let mut table = Table::with_columns(vec!["id".into(), "name".into()]);
        table.push_row_with(|c| if c == "id" { json!(1) } else { json!("Ann") });

        assert!(table.add_column("2024-03-01", json!("A")));
        assert!(!table.add_column("2024-03-01", json!("P")));
        assert_eq!(table.cell(0, "2024-03-01"), Some(&json!("A")));
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut table = Table {
            columns: vec!["id".into(), "name".into(), "d".into()],
            rows: vec![
                vec![json!(1), json!("Ann"), json!("P")],
                vec![json!(1), json!("Ann"), json!("A")],
                vec![json!(1), json!("Anne"), json!("A")],
            ],
        };

        assert_eq!(table.dedup_by_identity(), 1);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell(0, "d"), Some(&json!("P")));
    }

    #[test]
    fn find_row_accepts_numeric_strings() {
        let table = Table {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec![json!("12"), json!("Cy")], vec![json!(7.0), json!("Ann")]],
        };
        assert_eq!(table.find_row(12), Some(0));
        assert_eq!(table.find_row(7), Some(1));
        assert_eq!(table.find_row(3), None);
        assert_eq!(table.ids(), vec![12, 7]);
    }
}
