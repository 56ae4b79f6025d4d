//! ---
//! tsf_section: "05-networking-external-interfaces"
//! tsf_subsection: "binary"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Operator CLI for inspecting TSF configuration."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde_json::{Map, Value as Json};
use tracing::info;
use tsf_adapters::{DataSet, RowView};
use tsf_session::extract_temporal_configuration;

#[derive(Debug, Args)]
pub struct SelectCommand {
    /// JSON configuration snapshot.
    #[arg(long = "snapshot", value_name = "FILE")]
    snapshot: PathBuf,

    /// Table to query.
    #[arg(long = "table", value_name = "NAME", default_value = "ActiveMeasurements")]
    table: String,

    /// Boolean row filter, e.g. `SignalType = 'FREQ' AND ID LIKE 'PPA:%'`.
    #[arg(long = "filter", value_name = "EXPR")]
    filter: String,

    /// Comma separated sort columns with optional ASC/DESC.
    #[arg(long = "sort", value_name = "COLUMNS")]
    sort: Option<String>,

    /// Keep at most this many rows.
    #[arg(long = "top", value_name = "N")]
    top: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ExtractTemporalCommand {
    /// JSON configuration snapshot.
    #[arg(long = "snapshot", value_name = "FILE")]
    snapshot: PathBuf,

    /// Write the reduced snapshot here instead of stdout.
    #[arg(long = "output", value_name = "FILE")]
    output: Option<PathBuf>,
}

fn load(path: &Path) -> Result<DataSet> {
    DataSet::from_path(path).with_context(|| format!("failed to load snapshot {}", path.display()))
}

fn row_to_json(row: &RowView<'_>) -> Result<Json> {
    let mut object = Map::new();
    for (column, value) in row.table().columns().iter().zip(row.row().values()) {
        object.insert(column.clone(), serde_json::to_value(value)?);
    }
    Ok(Json::Object(object))
}

/// Print the rows of a table that match a filter expression.
pub fn run_select(cmd: SelectCommand) -> Result<()> {
    let data_set = load(&cmd.snapshot)?;
    let table = data_set
        .table(&cmd.table)
        .ok_or_else(|| anyhow!("snapshot has no table named {}", cmd.table))?;
    let mut rows = table.select(&cmd.filter, cmd.sort.as_deref())?;
    if let Some(top) = cmd.top {
        rows.truncate(top);
    }
    let rows = rows.iter().map(row_to_json).collect::<Result<Vec<_>>>()?;
    info!(table = %table.name, matched = rows.len(), "filter evaluated");
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

/// Write the temporal subset of a snapshot.
pub fn run_extract(cmd: ExtractTemporalCommand) -> Result<()> {
    let data_set = load(&cmd.snapshot)?;
    let temporal = extract_temporal_configuration(&data_set)?;
    let json = temporal.to_json()?;
    match cmd.output {
        Some(path) => {
            fs::write(&path, json)
                .with_context(|| format!("unable to write {}", path.display()))?;
            info!(path = %path.display(), tables = temporal.tables().len(), "temporal configuration written");
        }
        None => println!("{}", json),
    }
    Ok(())
}
