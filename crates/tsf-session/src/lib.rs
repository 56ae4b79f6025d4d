//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Session orchestration, routing and flow control."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Session orchestration for the TSF adapter pipeline.
//!
//! [`IaonSession`] groups input, action and output collections, routes
//! produced measurements between them, reacts to consumers falling behind
//! and derives reduced configurations for temporal reprocessing.
#![warn(missing_docs)]

pub mod error;
pub mod metrics;
pub mod naming;
pub mod policy;
pub mod routing;
pub mod session;
pub mod temporal;

pub use error::{Result, SessionError};
pub use metrics::{new_registry, SessionMetrics, SharedRegistry};
pub use naming::DerivedNames;
pub use policy::{
    QueueAction, ThresholdPolicy, DEFAULT_MEASUREMENT_DUMPING_THRESHOLD,
    DEFAULT_MEASUREMENT_WARNING_THRESHOLD, DEFAULT_SAMPLE_WARNING_THRESHOLD,
};
pub use routing::{AdapterGraph, MeasurementRouter, RoutingSummary, RoutingTables};
pub use session::{IaonSession, RoutingMode, ALL_ADAPTERS};
pub use temporal::{
    build_temporal_support_table, extract_temporal_configuration,
    extract_temporal_configuration_cached, temporal_processing_support_exists,
    TEMPORAL_SUPPORT_TABLE,
};
