//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Shared primitives and utilities for the adapter runtime."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Core shared primitives for the TSF adapter pipeline workspace.
//! This crate exposes configuration loading, the tracing bootstrap and
//! version metadata consumed by the session runtime and the operator tooling.

pub mod config;
pub mod logging;
pub mod version;

pub use config::{AppConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, SessionConfig};
pub use logging::{init_tracing, LogFormat};
pub use version::VersionInfo;
