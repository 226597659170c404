pub mod cli;
pub mod coerce;
pub mod component;
pub mod data;
pub mod filter;
pub mod frame;
pub mod io_utils;
pub mod normalize;
pub mod planner;
pub mod render;
pub mod report;
pub mod spatial;
pub mod summary;

use std::{env, fs, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};
use serde_json::Value as JsonValue;

use crate::{
    cli::{Cli, Commands, InputArgs},
    component::DashboardConfig,
    frame::{ColumnKind, Table},
    normalize::TableProfile,
    report::Align,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabular_insights", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Preview(args) => handle_preview(&args),
        Commands::Describe(args) => handle_describe(&args),
        Commands::Render(args) => handle_render(&args),
    }
}

/// Loads `input` and runs it through the normalizer.
pub fn prepare_table(input: &InputArgs) -> Result<Table> {
    let delimiter = io_utils::resolve_input_delimiter(&input.input, input.delimiter);
    let encoding = io_utils::resolve_encoding(input.input_encoding.as_deref())?;
    info!(
        "Loading '{}' with delimiter '{}'",
        input.input.display(),
        printable_delimiter(delimiter)
    );
    let (raw, report) = io_utils::load_table(&input.input, delimiter, encoding)?;
    debug!(
        "Read {} row(s) as {} ({} skipped)",
        report.rows_loaded, report.encoding, report.rows_skipped
    );
    let table = normalize::normalize(raw);
    info!(
        "Normalized table has {} row(s) across {} column(s)",
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let table = prepare_table(&args.input)?;
    let profile = TableProfile::of(&table);
    let headers = ["#", "name", "kind", "non_null"].map(String::from);
    let rows = profile
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            vec![
                (idx + 1).to_string(),
                column.name.clone(),
                column.kind.to_string(),
                column.non_null.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    report::print_grid(
        &headers,
        &rows,
        &[Align::Right, Align::Left, Align::Left, Align::Right],
    );
    if let Some(path) = &args.output {
        let yaml = serde_yaml::to_string(&profile).context("Serializing column profile")?;
        fs::write(path, yaml).with_context(|| format!("Writing column profile to {path:?}"))?;
        info!(
            "Profile for {} column(s) written to {:?}",
            profile.columns.len(),
            path
        );
    }
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let table = prepare_table(&args.input)?;
    let filters = filter::parse_filters(&args.filters)?;
    let table = filter::apply_filters(&table, &filters);
    let align = table
        .columns()
        .iter()
        .map(|column| match column.kind() {
            ColumnKind::Numeric => Align::Right,
            _ => Align::Left,
        })
        .collect::<Vec<_>>();
    let rows = table.display_rows(args.rows);
    report::print_grid(&table.headers(), &rows, &align);
    info!(
        "Displayed {} of {} row(s)",
        rows.len(),
        table.row_count()
    );
    Ok(())
}

fn handle_describe(args: &cli::DescribeArgs) -> Result<()> {
    let table = prepare_table(&args.input)?;
    let file_name = file_label(&args.input.input);
    let summary = summary::summarize(&file_name, &table);
    match args.instruction.as_deref() {
        Some(instruction) => {
            let prompt = planner::build_prompt(&planner::PlanRequest {
                file_name: &file_name,
                summary: &summary,
                instruction: Some(instruction),
            });
            println!("{}\n\n{}", prompt.system, prompt.user);
        }
        None => println!("{summary}"),
    }
    Ok(())
}

fn handle_render(args: &cli::RenderArgs) -> Result<()> {
    let table = prepare_table(&args.input)?;
    let mut dashboard = DashboardConfig::load(&args.dashboard)?;
    if dashboard.title.is_none() {
        dashboard.title = Some(format!("Dashboard: {}", file_label(&args.input.input)));
    }

    let mut filters = filter::parse_filters(&args.filters)?;
    if let Some(path) = &args.filter_file {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Reading filter file {path:?}"))?;
        let value: JsonValue = serde_json::from_str(&contents)
            .with_context(|| format!("Parsing filter file {path:?}"))?;
        filters.extend(filter::filters_from_json(&value));
    }
    debug!("Active filters: {filters:?}");

    let rendered = render::render_dashboard(&table, &dashboard, &filters)?;
    io_utils::write_json(args.output.as_deref(), &rendered)?;
    info!(
        "Rendered {} of {} component(s)",
        rendered.components.len(),
        dashboard.components.len()
    );
    Ok(())
}

fn file_label(path: &Path) -> String {
    if io_utils::is_dash(path) {
        return "stdin".to_string();
    }
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stdin".to_string())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
