//! Table normalization: empty sweeps, infinity repair, and one semantic type per column.
//! The sweep runs before and after typing, so normalizing twice changes nothing.

use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    coerce,
    data::{Value, parse_day_first},
    frame::{Column, ColumnData, ColumnKind, Table},
};

pub const DAMAGE_RATIO_THRESHOLD: f64 = 0.5;
pub const DATE_SAMPLE_SIZE: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    pub non_null: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableProfile {
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
}

impl TableProfile {
    pub fn of(table: &Table) -> Self {
        Self {
            rows: table.row_count(),
            columns: table
                .columns()
                .iter()
                .map(|c| ColumnProfile {
                    name: c.name.clone(),
                    kind: c.kind(),
                    non_null: c.data.non_null_count(),
                })
                .collect(),
        }
    }
}

pub fn normalize(raw: Table) -> Table {
    let repaired = raw
        .into_columns()
        .into_iter()
        .map(|c| Column {
            name: c.name,
            data: repair_non_finite(c.data),
        })
        .collect::<Vec<_>>();
    let swept = drop_empty(repaired);
    let typed = swept
        .into_iter()
        .map(|c| {
            let data = settle_column(&c.name, c.data);
            Column { name: c.name, data }
        })
        .collect::<Vec<_>>();
    let columns = drop_empty(typed);
    let row_count = columns.first().map(Column::len).unwrap_or(0);
    Table::from_parts(columns, row_count)
}

fn repair_non_finite(data: ColumnData) -> ColumnData {
    match data {
        ColumnData::Numeric(cells) => ColumnData::Numeric(
            cells
                .into_iter()
                .map(|c| c.filter(|n| n.is_finite()))
                .collect(),
        ),
        ColumnData::Mixed(cells) => ColumnData::Mixed(
            cells
                .into_iter()
                .map(|c| match c {
                    Some(Value::Number(n)) if !n.is_finite() => None,
                    other => other,
                })
                .collect(),
        ),
        other => other,
    }
}

fn drop_empty(columns: Vec<Column>) -> Vec<Column> {
    let row_count = columns.first().map(Column::len).unwrap_or(0);
    let keep_rows = (0..row_count)
        .map(|row| columns.iter().any(|c| !c.data.is_null(row)))
        .collect::<Vec<_>>();
    let all_rows_kept = keep_rows.iter().all(|k| *k);
    columns
        .into_iter()
        .filter_map(|c| {
            let data = if all_rows_kept {
                c.data
            } else {
                c.data.select(&keep_rows)
            };
            (data.non_null_count() > 0).then_some(Column { name: c.name, data })
        })
        .collect()
}

fn settle_column(name: &str, data: ColumnData) -> ColumnData {
    let cells = match data {
        ColumnData::Numeric(_) | ColumnData::DateTime(_) => return data,
        ColumnData::Text(cells) => cells.into_iter().map(|c| c.map(Value::Text)).collect(),
        ColumnData::Mixed(cells) => {
            if let Some(datetimes) = uniform_datetimes(&cells) {
                return ColumnData::DateTime(datetimes);
            }
            cells
        }
    };

    let original = cells.iter().flatten().count();
    let numeric = coerce::coerce(&cells);
    let converted = numeric.iter().flatten().count();
    if original == 0 {
        debug!("Column '{name}': no values, kept as numeric");
        return ColumnData::Numeric(numeric);
    }
    let ratio = converted as f64 / original as f64;
    if ratio >= DAMAGE_RATIO_THRESHOLD {
        debug!("Column '{name}': numeric ({converted}/{original} values survived)");
        return ColumnData::Numeric(numeric);
    }

    let text = cells
        .into_iter()
        .map(|c| c.map(|v| v.as_display()))
        .collect::<Vec<_>>();
    match infer_datetime(&text) {
        Some(datetimes) => {
            debug!("Column '{name}': datetime");
            ColumnData::DateTime(datetimes)
        }
        None => {
            debug!("Column '{name}': text (numeric damage ratio {ratio:.2})");
            ColumnData::Text(text)
        }
    }
}

fn uniform_datetimes(cells: &[Option<Value>]) -> Option<Vec<Option<NaiveDateTime>>> {
    cells
        .iter()
        .map(|c| match c {
            None => Some(None),
            Some(Value::DateTime(dt)) => Some(Some(*dt)),
            Some(_) => None,
        })
        .collect()
}

/// Parses a text column as dates when more than half of a bounded sample parses.
pub fn infer_datetime(cells: &[Option<String>]) -> Option<Vec<Option<NaiveDateTime>>> {
    let sample = cells
        .iter()
        .flatten()
        .take(DATE_SAMPLE_SIZE)
        .collect::<Vec<_>>();
    if sample.is_empty() {
        return None;
    }
    let parsed = sample.iter().filter(|s| parse_day_first(s).is_some()).count();
    if parsed * 2 <= sample.len() {
        return None;
    }
    Some(
        cells
            .iter()
            .map(|c| c.as_deref().and_then(parse_day_first))
            .collect(),
    )
}
