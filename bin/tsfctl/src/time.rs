//! ---
//! tsf_section: "05-networking-external-interfaces"
//! tsf_subsection: "binary"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Operator CLI for inspecting TSF configuration."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Args;
use tsf_adapters::parse_time_tag_at;

#[derive(Debug, Args)]
pub struct ParseTimeTagCommand {
    /// Time tag such as `2024-01-01 00:00:00`, `*`, `*-20s` or `*+5m`.
    #[arg(value_name = "TAG", allow_hyphen_values = true)]
    tag: String,

    /// Reference instant (RFC 3339) for relative tags; defaults to now.
    #[arg(long = "now", value_name = "RFC3339")]
    now: Option<String>,
}

pub fn run(cmd: ParseTimeTagCommand) -> Result<()> {
    let now = match cmd.now.as_deref() {
        Some(text) => DateTime::parse_from_rfc3339(text)
            .with_context(|| format!("invalid --now value {:?}", text))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    let resolved = parse_time_tag_at(&cmd.tag, now)?;
    println!("{}", resolved.to_rfc3339_opts(SecondsFormat::Millis, true));
    Ok(())
}
