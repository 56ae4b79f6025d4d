//! ---
//! tsf_section: "05-networking-external-interfaces"
//! tsf_subsection: "binary"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Operator CLI for inspecting TSF configuration."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use tracing::info;
use tsf_adapters::DataSet;
use tsf_common::AppConfig;
use tsf_session::ThresholdPolicy;

const DEFAULT_CANDIDATES: [&str; 2] = ["tsf.toml", "config/tsf.toml"];

#[derive(Debug, Args)]
pub struct ValidateConfigCommand {
    /// Configuration file; falls back to TSF_CONFIG, then ./tsf.toml and ./config/tsf.toml.
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also decode the configuration snapshot the file points at.
    #[arg(long = "check-snapshot", action = clap::ArgAction::SetTrue)]
    check_snapshot: bool,
}

/// Load, validate and summarise a configuration file.
pub fn run(cmd: ValidateConfigCommand) -> Result<()> {
    let loaded = match cmd.config {
        Some(path) => AppConfig::load_with_source(&[path])?,
        None => AppConfig::load_with_source(&DEFAULT_CANDIDATES)?,
    };
    let session = &loaded.config.session;
    let policy = ThresholdPolicy::from_config(session)?;

    let mut tables = None;
    if cmd.check_snapshot {
        if let Some(path) = session.configuration_snapshot.as_deref() {
            let snapshot = DataSet::from_path(path)
                .with_context(|| format!("invalid configuration snapshot {}", path.display()))?;
            tables = Some(
                snapshot
                    .tables()
                    .iter()
                    .map(|table| json!({ "name": table.name, "rows": table.len() }))
                    .collect::<Vec<_>>(),
            );
        }
    }

    info!(source = %loaded.source.display(), "configuration valid");
    let summary = json!({
        "source": loaded.source.display().to_string(),
        "session": session.name,
        "use_measurement_routing": session.use_measurement_routing,
        "measurement_warning_threshold": policy.warning(),
        "measurement_dumping_threshold": policy.dumping(),
        "default_sample_warning_threshold": policy.default_sample_warning(),
        "snapshot_tables": tables,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
