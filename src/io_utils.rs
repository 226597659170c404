//! Loading delimited files into a [`Table`] and writing JSON results.
//!
//! - **Delimiter resolution**: extension-based (`.tsv` → tab, otherwise
//!   comma) with manual override.
//! - **Encoding**: an explicit label is honoured; without one, input that is
//!   not valid UTF-8 is read as Windows-1252. A byte order mark is skipped.
//! - **Malformed rows**: records whose width differs from the header are
//!   skipped and counted, never fatal.
//! - **Typing**: null tokens become nulls, and a column whose every present
//!   field reads as a float is loaded as numeric; everything else is text and
//!   left for the normalizer.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use encoding_rs_io::DecodeReaderBytesBuilder;
use log::{debug, warn};
use serde::Serialize;

use crate::{
    data::is_null_token,
    frame::{Column, ColumnData, Table},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

/// `None` means "detect": UTF-8 with a Windows-1252 fallback.
pub fn resolve_encoding(label: Option<&str>) -> Result<Option<&'static Encoding>> {
    label
        .map(|value| {
            Encoding::for_label(value.trim().as_bytes())
                .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
        })
        .transpose()
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub encoding: &'static str,
    pub rows_loaded: usize,
    pub rows_skipped: usize,
}

pub fn load_table(
    path: &Path,
    delimiter: u8,
    encoding: Option<&'static Encoding>,
) -> Result<(Table, LoadReport)> {
    let bytes = if is_dash(path) {
        let mut buffer = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut buffer)
            .context("Reading table from stdin")?;
        buffer
    } else {
        std::fs::read(path).with_context(|| format!("Opening input file {path:?}"))?
    };
    read_table(&bytes, delimiter, encoding).with_context(|| format!("Loading table from {path:?}"))
}

pub fn read_table(
    bytes: &[u8],
    delimiter: u8,
    encoding: Option<&'static Encoding>,
) -> Result<(Table, LoadReport)> {
    let encoding = encoding.unwrap_or_else(|| detect_encoding(bytes));
    let decoder = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .bom_sniffing(true)
        .build(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(decoder);

    let raw_headers = reader
        .headers()
        .context("Reading header row")?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let headers = dedupe_headers(&raw_headers);
    let width = headers.len();

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    let mut rows_skipped = 0usize;
    for (row_idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) if record.len() == width => record,
            Ok(record) => {
                debug!(
                    "Skipping row {}: {} field(s), expected {width}",
                    row_idx + 2,
                    record.len()
                );
                rows_skipped += 1;
                continue;
            }
            Err(err) => {
                debug!("Skipping row {}: {err}", row_idx + 2);
                rows_skipped += 1;
                continue;
            }
        };
        for (column, field) in cells.iter_mut().zip(record.iter()) {
            column.push((!is_null_token(field)).then(|| field.to_string()));
        }
    }
    if rows_skipped > 0 {
        warn!("Skipped {rows_skipped} malformed row(s)");
    }

    let rows_loaded = cells.first().map(Vec::len).unwrap_or(0);
    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, column)| Column::new(name, type_cells(column)))
        .collect();
    let table = Table::new(columns)?;
    Ok((
        table,
        LoadReport {
            encoding: encoding.name(),
            rows_loaded,
            rows_skipped,
        },
    ))
}

fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if std::str::from_utf8(body).is_ok() {
        UTF_8
    } else {
        debug!("Input is not valid UTF-8, falling back to windows-1252");
        WINDOWS_1252
    }
}

/// Blank names become `Unnamed: N`; repeats get the first free `.1`, `.2`, ... suffix.
fn dedupe_headers(raw: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    raw.iter()
        .enumerate()
        .map(|(idx, name)| {
            let trimmed = name.trim();
            let base = if trimmed.is_empty() {
                format!("Unnamed: {idx}")
            } else {
                trimmed.to_string()
            };
            let mut unique = base.clone();
            if seen.contains(&unique) {
                let suffix = next_suffix.entry(base.clone()).or_insert(1);
                loop {
                    unique = format!("{base}.{suffix}");
                    *suffix += 1;
                    if !seen.contains(&unique) {
                        break;
                    }
                }
            }
            seen.insert(unique.clone());
            unique
        })
        .collect()
}

fn type_cells(cells: Vec<Option<String>>) -> ColumnData {
    let numeric = cells
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(text) => text.trim().parse::<f64>().ok().map(Some),
        })
        .collect::<Option<Vec<_>>>();
    match numeric {
        Some(values) => ColumnData::Numeric(values),
        None => ColumnData::Text(cells),
    }
}

/// Writes pretty JSON to `path`, or to stdout when `path` is absent or `-`.
pub fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let mut writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    };
    serde_json::to_writer_pretty(&mut writer, value).context("Writing JSON output")?;
    writeln!(writer).context("Writing JSON output")?;
    writer.flush().context("Flushing JSON output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_headers_names_blank_and_repeated_columns() {
        let raw = ["id", " ", "id", "id"].map(String::from);
        assert_eq!(
            dedupe_headers(&raw),
            vec!["id", "Unnamed: 1", "id.1", "id.2"]
        );
    }

    #[test]
    fn dedupe_headers_skips_suffixes_already_taken() {
        let raw = ["id", "id", "id.1"].map(String::from);
        assert_eq!(dedupe_headers(&raw), vec!["id", "id.1", "id.1.1"]);
        let raw = ["id.1", "id", "id"].map(String::from);
        assert_eq!(dedupe_headers(&raw), vec!["id.1", "id", "id.2"]);
    }

    #[test]
    fn type_cells_needs_every_present_field_to_parse() {
        let numeric = type_cells(vec![Some("1".into()), None, Some(" 2.5 ".into())]);
        assert_eq!(numeric, ColumnData::Numeric(vec![Some(1.0), None, Some(2.5)]));
        let text = type_cells(vec![Some("1".into()), Some("1,5".into())]);
        assert!(matches!(text, ColumnData::Text(_)));
    }

    #[test]
    fn latin1_input_falls_back_to_windows_1252() {
        let bytes = b"ciudad,total\nM\xe1laga,3\n";
        let (table, report) = read_table(bytes, b',', None).unwrap();
        assert_eq!(report.encoding, "windows-1252");
        assert_eq!(table.column("ciudad").unwrap().data.display(0).unwrap(), "Málaga");
    }
}
