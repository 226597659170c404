use anyhow::{Result, anyhow};
use log::debug;
use serde_json::{Map, Value as JsonValue};

use crate::{data::format_number, frame::Table};

/// Exact-match condition on the stringified cell of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCondition {
    pub column: String,
    pub value: String,
}

impl FilterCondition {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

pub fn parse_filters(filters: &[String]) -> Result<Vec<FilterCondition>> {
    filters.iter().map(|f| parse_filter(f)).collect()
}

fn parse_filter(filter: &str) -> Result<FilterCondition> {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Empty filter expression"));
    }
    let Some((left, right)) = trimmed.split_once('=') else {
        return Err(anyhow!(
            "Failed to parse filter expression '{trimmed}' (expected column=value)"
        ));
    };
    let column = left.trim();
    if column.is_empty() {
        return Err(anyhow!("Filter expression '{trimmed}' is missing a column"));
    }
    Ok(FilterCondition::new(column, unquote(right.trim())))
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Reads a `{column: value}` map. Entries whose value is null, an array, or an
/// object are ignored; anything that is not a map yields no filters.
pub fn filters_from_json(value: &JsonValue) -> Vec<FilterCondition> {
    let Some(object) = value.as_object() else {
        return Vec::new();
    };
    object
        .iter()
        .filter_map(|(column, raw)| {
            let value = match raw {
                JsonValue::String(s) => s.clone(),
                JsonValue::Number(n) => n
                    .as_i64()
                    .map(|i| i.to_string())
                    .or_else(|| n.as_f64().map(format_number))?,
                JsonValue::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some(FilterCondition::new(column.trim(), value))
        })
        .collect()
}

pub fn filters_to_json(filters: &[FilterCondition]) -> JsonValue {
    let map = filters
        .iter()
        .map(|f| (f.column.clone(), JsonValue::String(f.value.clone())))
        .collect::<Map<_, _>>();
    JsonValue::Object(map)
}

/// Conditions on missing columns are skipped; null cells never match.
pub fn apply_filters(table: &Table, filters: &[FilterCondition]) -> Table {
    let mut mask = vec![true; table.row_count()];
    let mut applied = 0usize;
    for condition in filters {
        let Some(column) = table.column(&condition.column) else {
            debug!(
                "Ignoring filter on missing column '{}'",
                condition.column
            );
            continue;
        };
        applied += 1;
        for (row, keep) in mask.iter_mut().enumerate() {
            if *keep {
                *keep = column.data.display(row).as_deref() == Some(condition.value.as_str());
            }
        }
    }
    if applied == 0 {
        return table.clone();
    }
    table.filter_rows(&mask)
}
