//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Adapter building blocks for the TSF pipeline.
//!
//! An [`Adapter`] is a single processing unit with a lifecycle and a measurement
//! filter. Adapters of one role are grouped into an [`AdapterCollection`], which
//! is itself an adapter and forwards member notifications upward.
#![warn(missing_docs)]

pub mod adapter;
pub mod collection;
pub mod dataset;
pub mod definitions;
pub mod error;
mod expression;
pub mod factory;
pub mod measurement;
pub mod notify;
pub mod roles;
pub mod settings;
pub mod signal;
pub mod time_tag;

pub use adapter::{Adapter, AdapterCore};
pub use collection::{AdapterCollection, AdapterRole};
pub use dataset::{DataRow, DataSet, DataTable, RowView, Value};
pub use definitions::{parse_input_measurement_keys, parse_output_measurements, FilterExpression};
pub use error::{AdapterError, MeasurementRole, Result};
pub use factory::{AdapterDefinition, AdapterFactory};
pub use measurement::{Measurement, MeasurementKey};
pub use notify::{
    format_count, AdapterEvent, EventSource, Handler, MessageLevel, Notification, Notifier,
    SubscriptionId,
};
pub use roles::{queue_for_processing, ActionAdapter, InputAdapter, MeasurementQueue, OutputAdapter};
pub use settings::Settings;
pub use signal::{AutoResetEvent, ManualResetEvent, SignalRegistry};
pub use time_tag::{parse_time_tag, parse_time_tag_at, TemporalConstraint};
