use std::{
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
};

use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::{debug, warn};
use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeSeq, SerializeStruct},
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    coerce,
    component::{ChartKind, ComponentKind, ComponentSpec, DashboardConfig, Operation},
    data::Metric,
    filter::{self, FilterCondition},
    frame::{Column, ColumnData, Table},
    spatial::{self, MapPayload},
};

pub const UNCATEGORIZED: &str = "Sin Categoría";
pub const OTHERS: &str = "Otros";
const PIE_MAX_SLICES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiPayload {
    pub value: Metric,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartRow {
    pub category: String,
    pub value: Metric,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPayload {
    pub category_field: String,
    pub rows: Vec<ChartRow>,
}

impl Serialize for ChartPayload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct Source<'a>(&'a ChartPayload);
        struct Record<'a>(&'a str, &'a ChartRow);

        impl Serialize for Record<'_> {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(self.0, &self.1.category)?;
                map.serialize_entry("value", &self.1.value)?;
                map.end()
            }
        }

        impl Serialize for Source<'_> {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let mut seq = serializer.serialize_seq(Some(self.0.rows.len()))?;
                for row in &self.0.rows {
                    seq.serialize_element(&Record(&self.0.category_field, row))?;
                }
                seq.end()
            }
        }

        let mut state = serializer.serialize_struct("ChartPayload", 2)?;
        state.serialize_field("dimensions", &[self.category_field.as_str(), "value"])?;
        state.serialize_field("source", &Source(self))?;
        state.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Kpi(KpiPayload),
    Chart(ChartPayload),
    Map(MapPayload),
    /// Renderable but empty, serialized as `[]`.
    Empty,
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Empty => true,
            Payload::Map(map) => map.is_empty(),
            Payload::Kpi(_) | Payload::Chart(_) => false,
        }
    }
}

impl Serialize for Payload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Payload::Kpi(kpi) => kpi.serialize(serializer),
            Payload::Chart(chart) => chart.serialize(serializer),
            Payload::Map(map) => map.serialize(serializer),
            Payload::Empty => serializer.serialize_seq(Some(0))?.end(),
        }
    }
}

pub fn render(table: &Table, spec: &ComponentSpec) -> Option<Payload> {
    render_at(table, spec, 0)
}

fn render_at(table: &Table, spec: &ComponentSpec, position: usize) -> Option<Payload> {
    match try_render(table, spec) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(
                "Error rendering component {}: {err:#}",
                spec.identifier(position)
            );
            None
        }
    }
}

fn try_render(table: &Table, spec: &ComponentSpec) -> Result<Option<Payload>> {
    let payload = match spec.kind {
        Some(ComponentKind::Kpi) => Payload::Kpi(render_kpi(table, spec)),
        Some(ComponentKind::Chart) => render_chart(table, spec)?,
        Some(ComponentKind::Map) => {
            let config = &spec.config;
            match (config.lat.as_deref(), config.lon.as_deref()) {
                (Some(lat), Some(lon)) => {
                    Payload::Map(spatial::resolve(table, lat, lon, config.label.as_deref()))
                }
                _ => Payload::Empty,
            }
        }
        None => return Ok(None),
    };
    Ok(Some(payload))
}

pub fn render_kpi(table: &Table, spec: &ComponentSpec) -> KpiPayload {
    let config = &spec.config;
    let column = config.column.as_deref().and_then(|name| table.column(name));
    let operation = config.operation.clone().unwrap_or(Operation::Count);
    let value = match &operation {
        Operation::Nunique => column.map_or(0, distinct_count) as f64,
        Operation::Count => match (&config.column, column) {
            (None, _) => table.row_count() as f64,
            (Some(_), Some(column)) => column.data.non_null_count() as f64,
            (Some(_), None) => 0.0,
        },
        Operation::Sum | Operation::Mean | Operation::Max | Operation::Min => column
            .map(|c| aggregate(&operation, &numeric_cells(c)))
            .unwrap_or(0.0),
        Operation::Other(label) => {
            debug!("Unsupported KPI operation '{label}'");
            0.0
        }
    };
    KpiPayload {
        value: Metric::sanitized(value),
        label: spec.title.clone().unwrap_or_default(),
    }
}

fn distinct_count(column: &Column) -> usize {
    (0..column.len())
        .filter_map(|row| column.data.display(row))
        .unique()
        .count()
}

fn numeric_cells(column: &Column) -> Vec<Option<f64>> {
    match &column.data {
        ColumnData::Numeric(cells) => cells.clone(),
        other => coerce::coerce(&other.values()),
    }
}

fn aggregate(operation: &Operation, cells: &[Option<f64>]) -> f64 {
    let present = cells.iter().flatten().copied();
    match operation {
        Operation::Sum => present.sum(),
        Operation::Mean => {
            let (sum, count) = present.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            if count == 0 { 0.0 } else { sum / count as f64 }
        }
        Operation::Max => present.reduce(f64::max).unwrap_or(0.0),
        Operation::Min => present.reduce(f64::min).unwrap_or(0.0),
        _ => 0.0,
    }
}

enum Aggregation<'a> {
    Count,
    Sum(&'a Column),
    Mean(&'a Column),
}

pub fn render_chart(table: &Table, spec: &ComponentSpec) -> Result<Payload> {
    let config = &spec.config;
    let Some(x_column) = config.x.as_deref().and_then(|name| table.column(name)) else {
        return Ok(Payload::Empty);
    };
    let y_column = config.y.as_deref().and_then(|name| table.column(name));
    let aggregation = match (&config.operation, y_column) {
        (Some(Operation::Count), _) | (None, None) => Aggregation::Count,
        (Some(Operation::Mean), Some(y)) => Aggregation::Mean(y),
        (_, Some(y)) => Aggregation::Sum(y),
        (Some(_), None) => return Ok(Payload::Empty),
    };

    let categories = (0..x_column.len())
        .map(|row| {
            x_column
                .data
                .display(row)
                .unwrap_or_else(|| UNCATEGORIZED.to_string())
        })
        .collect::<Vec<_>>();
    let mut groups = group(&categories, &aggregation)
        .with_context(|| format!("Grouping by '{}'", x_column.name))?;

    groups.sort_by(|a, b| b.value.total_cmp(&a.value));

    let rows = if spec.chart_type == Some(ChartKind::Pie) && groups.len() > PIE_MAX_SLICES {
        let tail = groups.split_off(PIE_MAX_SLICES - 1);
        groups.push(Group {
            category: OTHERS.to_string(),
            value: tail.iter().map(|g| g.value).sum(),
        });
        groups
    } else {
        groups.truncate(config.chart_limit());
        groups
    };

    Ok(Payload::Chart(ChartPayload {
        category_field: x_column.name.clone(),
        rows: rows
            .into_iter()
            .map(|g| ChartRow {
                category: g.category,
                value: Metric::sanitized(g.value),
            })
            .collect(),
    }))
}

struct Group {
    category: String,
    value: f64,
}

/// Groups in first-seen order.
fn group(categories: &[String], aggregation: &Aggregation<'_>) -> Result<Vec<Group>> {
    let measures = match aggregation {
        Aggregation::Count => None,
        Aggregation::Sum(y) | Aggregation::Mean(y) => {
            ensure!(
                y.len() == categories.len(),
                "Column '{}' has {} row(s), expected {}",
                y.name,
                y.len(),
                categories.len()
            );
            Some(numeric_cells(y))
        }
    };

    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<(String, f64, usize)> = Vec::new();
    for (row, category) in categories.iter().enumerate() {
        let slot = *index.entry(category.as_str()).or_insert_with(|| {
            totals.push((category.clone(), 0.0, 0));
            totals.len() - 1
        });
        let entry = &mut totals[slot];
        match &measures {
            None => entry.1 += 1.0,
            Some(values) => {
                if let Some(value) = values[row] {
                    entry.1 += value;
                    entry.2 += 1;
                }
            }
        }
    }

    let is_mean = matches!(aggregation, Aggregation::Mean(_));
    Ok(totals
        .into_iter()
        .map(|(category, total, count)| {
            let value = if is_mean {
                if count == 0 { 0.0 } else { total / count as f64 }
            } else {
                total
            };
            Group { category, value }
        })
        .collect())
}

/// A component that produced a payload, ready to be echoed to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedComponent {
    pub spec: ComponentSpec,
    pub payload: Payload,
}

impl RenderedComponent {
    pub fn to_json(&self) -> Result<JsonValue> {
        let data = serde_json::to_value(&self.payload).context("Serializing payload")?;
        let mut document = match &self.spec.raw {
            JsonValue::Object(object) => object.clone(),
            _ => serde_json::Map::new(),
        };
        document.insert("data".to_string(), data);
        Ok(JsonValue::Object(document))
    }
}

/// Renders every component, dropping those that panic, fail, or come out empty.
pub fn render_components(table: &Table, specs: &[ComponentSpec]) -> Vec<RenderedComponent> {
    specs
        .iter()
        .enumerate()
        .filter_map(|(position, spec)| {
            let outcome = catch_unwind(AssertUnwindSafe(|| render_at(table, spec, position)));
            match outcome {
                Ok(Some(payload)) if !payload.is_empty() => Some(RenderedComponent {
                    spec: spec.clone(),
                    payload,
                }),
                Ok(_) => {
                    debug!("Component {} produced no data", spec.identifier(position));
                    None
                }
                Err(_) => {
                    warn!(
                        "Component {} aborted while rendering",
                        spec.identifier(position)
                    );
                    None
                }
            }
        })
        .collect()
}

/// The response for one render request over a whole dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedDashboard {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub components: Vec<JsonValue>,
    pub active_filters: JsonValue,
}

/// Filters `table`, renders every component of `dashboard`, and wraps the result.
pub fn render_dashboard(
    table: &Table,
    dashboard: &DashboardConfig,
    filters: &[FilterCondition],
) -> Result<RenderedDashboard> {
    let filtered = filter::apply_filters(table, filters);
    debug!(
        "Rendering {} component(s) over {} of {} row(s)",
        dashboard.components.len(),
        filtered.row_count(),
        table.row_count()
    );
    let components = render_components(&filtered, &dashboard.components)
        .iter()
        .map(RenderedComponent::to_json)
        .collect::<Result<Vec<_>>>()?;
    Ok(RenderedDashboard {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        title: dashboard
            .title
            .clone()
            .unwrap_or_else(|| "Dashboard".to_string()),
        components,
        active_filters: filter::filters_to_json(filters),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let groups = group(&categories(&["b", "a", "b", "c"]), &Aggregation::Count).unwrap();
        let order = groups.iter().map(|g| g.category.as_str()).collect::<Vec<_>>();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert_eq!(groups[0].value, 2.0);
    }

    #[test]
    fn mean_of_all_null_group_is_zero() {
        let y = Column::numeric("y", vec![None, Some(4.0), Some(2.0)]);
        let groups = group(&categories(&["a", "b", "b"]), &Aggregation::Mean(&y)).unwrap();
        assert_eq!(groups[0].value, 0.0);
        assert_eq!(groups[1].value, 3.0);
    }

    #[test]
    fn mismatched_measure_length_is_an_error() {
        let y = Column::numeric("y", vec![Some(1.0)]);
        assert!(group(&categories(&["a", "b"]), &Aggregation::Sum(&y)).is_err());
    }

    #[test]
    fn aggregate_handles_empty_input() {
        assert_eq!(aggregate(&Operation::Sum, &[None, None]), 0.0);
        assert_eq!(aggregate(&Operation::Mean, &[]), 0.0);
        assert_eq!(aggregate(&Operation::Max, &[None]), 0.0);
        assert_eq!(aggregate(&Operation::Min, &[Some(3.0), None, Some(-1.0)]), -1.0);
    }

    #[test]
    fn empty_payload_serializes_as_empty_array() {
        assert_eq!(serde_json::to_string(&Payload::Empty).unwrap(), "[]");
    }
}
