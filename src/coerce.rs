use std::sync::OnceLock;

use regex::Regex;

use crate::data::Value;

const FORMAT_SAMPLE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    Us,
    European,
}

fn decoration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^0-9.,\-]").expect("static pattern is valid"))
}

/// Coerces a column of raw cells into numbers.
pub fn coerce(values: &[Option<Value>]) -> Vec<Option<f64>> {
    if values.iter().flatten().all(Value::is_number) {
        return values
            .iter()
            .map(|v| v.as_ref().and_then(Value::as_number))
            .collect();
    }
    let cleaned = values
        .iter()
        .map(|v| v.as_ref().and_then(|value| clean(&value.as_display())))
        .collect::<Vec<_>>();
    let format = detect_format(cleaned.iter().flatten().map(String::as_str));
    cleaned
        .iter()
        .map(|v| v.as_deref().and_then(|s| parse_cleaned(s, format)))
        .collect()
}

pub fn coerce_text<S: AsRef<str>>(values: &[Option<S>]) -> Vec<Option<f64>> {
    let values = values
        .iter()
        .map(|v| v.as_ref().map(|s| Value::Text(s.as_ref().to_string())))
        .collect::<Vec<_>>();
    coerce(&values)
}

/// Strips decoration from one stringified value. `"nan"` in any case is null.
pub fn clean(raw: &str) -> Option<String> {
    if raw.trim().eq_ignore_ascii_case("nan") {
        return None;
    }
    Some(decoration_pattern().replace_all(raw, "").into_owned())
}

/// Decides the notation from the first cleaned values of a column.
pub fn detect_format<'a, I>(cleaned: I) -> NumberFormat
where
    I: IntoIterator<Item = &'a str>,
{
    let mut dots = 0usize;
    let mut commas = 0usize;
    let mut last_dot: Option<usize> = None;
    let mut last_comma: Option<usize> = None;
    for sample in cleaned.into_iter().take(FORMAT_SAMPLE_SIZE) {
        dots += sample.matches('.').count();
        commas += sample.matches(',').count();
        if let Some(idx) = sample.rfind('.') {
            last_dot = Some(last_dot.map_or(idx, |current| current.max(idx)));
        }
        if let Some(idx) = sample.rfind(',') {
            last_comma = Some(last_comma.map_or(idx, |current| current.max(idx)));
        }
    }
    match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if dots > 0 && commas > 0 && comma > dot => NumberFormat::European,
        _ => NumberFormat::Us,
    }
}

fn parse_cleaned(cleaned: &str, format: NumberFormat) -> Option<f64> {
    let canonical = match format {
        NumberFormat::European => cleaned.replace('.', "").replace(',', "."),
        NumberFormat::Us => cleaned.replace(',', ""),
    };
    canonical.parse::<f64>().ok().filter(|n| n.is_finite())
}
