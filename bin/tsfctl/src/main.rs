//! ---
//! tsf_section: "05-networking-external-interfaces"
//! tsf_subsection: "binary"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Operator CLI for inspecting TSF configuration."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tsf_common::{init_tracing, LoggingConfig, VersionInfo};

mod config;
mod snapshot;
mod time;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "TSF adapter configuration utility",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Load and validate a TOML configuration file")]
    ValidateConfig(config::ValidateConfigCommand),
    #[command(about = "Resolve an absolute or relative time tag to UTC")]
    ParseTimeTag(time::ParseTimeTagCommand),
    #[command(about = "Evaluate a FILTER expression against a configuration snapshot")]
    Select(snapshot::SelectCommand),
    #[command(about = "Reduce a configuration snapshot to temporal-capable adapters")]
    ExtractTemporal(snapshot::ExtractTemporalCommand),
}

fn main() -> Result<()> {
    let logging = LoggingConfig {
        file_output: false,
        ..LoggingConfig::default()
    };
    init_tracing("tsfctl", &logging)?;
    let cli = Cli::parse();
    if cli.version {
        println!("{}", VersionInfo::current().extended());
        return Ok(());
    }
    match cli.command {
        Some(Commands::ValidateConfig(cmd)) => config::run(cmd)?,
        Some(Commands::ParseTimeTag(cmd)) => time::run(cmd)?,
        Some(Commands::Select(cmd)) => snapshot::run_select(cmd)?,
        Some(Commands::ExtractTemporal(cmd)) => snapshot::run_extract(cmd)?,
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
        }
    }
    Ok(())
}
