use std::fmt;

use anyhow::{Result, ensure};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::data::{Value, format_datetime, format_number};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Numeric,
    DateTime,
    Mixed,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnKind::Text => "text",
            ColumnKind::Numeric => "numeric",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Mixed => "mixed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Numeric(Vec<Option<f64>>),
    DateTime(Vec<Option<NaiveDateTime>>),
    Mixed(Vec<Option<Value>>),
}

impl ColumnData {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Text(_) => ColumnKind::Text,
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::DateTime(_) => ColumnKind::DateTime,
            ColumnData::Mixed(_) => ColumnKind::Mixed,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.len(),
            ColumnData::Numeric(v) => v.len(),
            ColumnData::DateTime(v) => v.len(),
            ColumnData::Mixed(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            ColumnData::Text(v) => v.get(row).is_none_or(|c| c.is_none()),
            ColumnData::Numeric(v) => v.get(row).is_none_or(|c| c.is_none()),
            ColumnData::DateTime(v) => v.get(row).is_none_or(|c| c.is_none()),
            ColumnData::Mixed(v) => v.get(row).is_none_or(|c| c.is_none()),
        }
    }

    pub fn value(&self, row: usize) -> Option<Value> {
        match self {
            ColumnData::Text(v) => v.get(row)?.clone().map(Value::Text),
            ColumnData::Numeric(v) => v.get(row)?.map(Value::Number),
            ColumnData::DateTime(v) => v.get(row)?.map(Value::DateTime),
            ColumnData::Mixed(v) => v.get(row)?.clone(),
        }
    }

    /// Stringified cell, `None` for null.
    pub fn display(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Text(v) => v.get(row)?.clone(),
            ColumnData::Numeric(v) => v.get(row)?.map(format_number),
            ColumnData::DateTime(v) => v.get(row)?.as_ref().map(format_datetime),
            ColumnData::Mixed(v) => v.get(row)?.as_ref().map(Value::as_display),
        }
    }

    pub fn non_null_count(&self) -> usize {
        (0..self.len()).filter(|row| !self.is_null(*row)).count()
    }

    pub fn values(&self) -> Vec<Option<Value>> {
        (0..self.len()).map(|row| self.value(row)).collect()
    }

    /// Keeps the rows whose index is `true` in `mask`.
    pub fn select(&self, mask: &[bool]) -> ColumnData {
        fn pick<T: Clone>(cells: &[T], mask: &[bool]) -> Vec<T> {
            cells
                .iter()
                .zip(mask)
                .filter(|(_, keep)| **keep)
                .map(|(cell, _)| cell.clone())
                .collect()
        }
        match self {
            ColumnData::Text(v) => ColumnData::Text(pick(v, mask)),
            ColumnData::Numeric(v) => ColumnData::Numeric(pick(v, mask)),
            ColumnData::DateTime(v) => ColumnData::DateTime(pick(v, mask)),
            ColumnData::Mixed(v) => ColumnData::Mixed(pick(v, mask)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into().trim().to_string(),
            data,
        }
    }

    pub fn text<S: AsRef<str>>(name: &str, cells: &[Option<S>]) -> Self {
        let cells = cells
            .iter()
            .map(|c| c.as_ref().map(|s| s.as_ref().to_string()))
            .collect();
        Self::new(name, ColumnData::Text(cells))
    }

    pub fn numeric(name: &str, cells: Vec<Option<f64>>) -> Self {
        Self::new(name, ColumnData::Numeric(cells))
    }

    pub fn mixed(name: &str, cells: Vec<Option<Value>>) -> Self {
        Self::new(name, ColumnData::Mixed(cells))
    }

    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map(Column::len).unwrap_or(0);
        for column in &columns {
            ensure!(
                column.len() == row_count,
                "Column '{}' has {} row(s) but the table has {}",
                column.name,
                column.len(),
                row_count
            );
        }
        Ok(Self { columns, row_count })
    }

    pub(crate) fn from_parts(columns: Vec<Column>, row_count: usize) -> Self {
        debug_assert!(columns.iter().all(|c| c.len() == row_count));
        Self { columns, row_count }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Returns a new table holding only the rows flagged in `mask`.
    pub fn filter_rows(&self, mask: &[bool]) -> Table {
        let row_count = mask.iter().take(self.row_count).filter(|k| **k).count();
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                data: c.data.select(mask),
            })
            .collect();
        Table::from_parts(columns, row_count)
    }

    /// Stringified rows, nulls rendered as empty strings.
    pub fn display_rows(&self, limit: usize) -> Vec<Vec<String>> {
        (0..self.row_count.min(limit))
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| c.data.display(row).unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_columns() {
        let result = Table::new(vec![
            Column::numeric("a", vec![Some(1.0), None]),
            Column::numeric("b", vec![Some(1.0)]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn trims_column_names() {
        let column = Column::numeric("  amount ", vec![Some(1.0)]);
        assert_eq!(column.name, "amount");
    }

    #[test]
    fn filter_rows_keeps_flagged_rows_only() {
        let table = Table::new(vec![
            Column::text("status", &[Some("done"), Some("open"), None]),
            Column::numeric("qty", vec![Some(1.0), Some(2.0), Some(3.0)]),
        ])
        .unwrap();
        let filtered = table.filter_rows(&[true, false, true]);
        assert_eq!(filtered.row_count(), 2);
        assert_eq!(
            filtered.display_rows(10),
            vec![
                vec!["done".to_string(), "1".to_string()],
                vec![String::new(), "3".to_string()],
            ]
        );
    }
}
