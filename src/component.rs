use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde_json::{Map, Value as JsonValue};

pub const DEFAULT_CHART_LIMIT: usize = 20;
pub const MAX_CHART_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Kpi,
    Chart,
    Map,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Pie,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Sum,
    Mean,
    Max,
    Min,
    Count,
    Nunique,
    Other(String),
}

impl Operation {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "sum" => Operation::Sum,
            "mean" => Operation::Mean,
            "max" => Operation::Max,
            "min" => Operation::Min,
            "count" => Operation::Count,
            "nunique" => Operation::Nunique,
            _ => Operation::Other(label.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentConfig {
    pub operation: Option<Operation>,
    pub column: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub limit: Option<usize>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub label: Option<String>,
}

impl ComponentConfig {
    pub fn from_json(value: &JsonValue) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        Self {
            operation: string_field(object, "operation").map(|s| Operation::parse(&s)),
            column: string_field(object, "column"),
            x: string_field(object, "x"),
            y: string_field(object, "y"),
            limit: object.get("limit").and_then(parse_limit),
            lat: string_field(object, "lat"),
            lon: string_field(object, "lon"),
            label: string_field(object, "label"),
        }
    }

    /// Requested chart length, defaulted and clamped.
    pub fn chart_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_CHART_LIMIT)
            .min(MAX_CHART_LIMIT)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentSpec {
    pub id: Option<String>,
    pub kind: Option<ComponentKind>,
    pub chart_type: Option<ChartKind>,
    pub title: Option<String>,
    pub config: ComponentConfig,
    /// The document this spec was read from, echoed back next to its payload.
    pub raw: JsonValue,
}

impl ComponentSpec {
    pub fn from_json(value: &JsonValue) -> Self {
        let Some(object) = value.as_object() else {
            return Self {
                raw: value.clone(),
                ..Self::default()
            };
        };
        let kind = string_field(object, "type").and_then(|s| {
            match s.to_ascii_lowercase().as_str() {
                "kpi" => Some(ComponentKind::Kpi),
                "chart" => Some(ComponentKind::Chart),
                "map" => Some(ComponentKind::Map),
                _ => None,
            }
        });
        let chart_type = string_field(object, "chart_type").and_then(|s| {
            match s.to_ascii_lowercase().as_str() {
                "bar" => Some(ChartKind::Bar),
                "pie" => Some(ChartKind::Pie),
                _ => None,
            }
        });
        Self {
            id: string_field(object, "id"),
            kind,
            chart_type,
            title: object
                .get("title")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            config: object
                .get("config")
                .map(ComponentConfig::from_json)
                .unwrap_or_default(),
            raw: value.clone(),
        }
    }

    /// Name used in log lines: id, then title, then position.
    pub fn identifier(&self, position: usize) -> String {
        self.id
            .clone()
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| format!("#{position}"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardConfig {
    pub title: Option<String>,
    pub components: Vec<ComponentSpec>,
}

impl DashboardConfig {
    pub fn from_json(value: &JsonValue) -> Self {
        let title = value
            .get("title")
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        let components = value
            .get("components")
            .and_then(JsonValue::as_array)
            .map(|items| items.iter().map(ComponentSpec::from_json).collect())
            .unwrap_or_default();
        Self { title, components }
    }

    pub fn parse_str(input: &str) -> Result<Self> {
        let value: JsonValue =
            serde_json::from_str(input).context("Parsing dashboard JSON")?;
        Ok(Self::from_json(&value))
    }

    /// Reads a dashboard document; `.yml`/`.yaml` files are read as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Reading dashboard definition {path:?}"))?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));
        let value: JsonValue = if is_yaml {
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Parsing dashboard YAML {path:?}"))?
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("Parsing dashboard JSON {path:?}"))?
        };
        Ok(Self::from_json(&value))
    }
}

fn string_field(object: &Map<String, JsonValue>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_limit(value: &JsonValue) -> Option<usize> {
    match value {
        JsonValue::Number(n) => n.as_u64().map(|v| v as usize).or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as usize)
        }),
        JsonValue::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}
