//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
use std::fmt;

use thiserror::Error;

/// Direction a measurement definition was parsed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementRole {
    /// `inputMeasurementKeys`
    Input,
    /// `outputMeasurements`
    Output,
}

impl fmt::Display for MeasurementRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementRole::Input => f.write_str("input"),
            MeasurementRole::Output => f.write_str("output"),
        }
    }
}

/// Errors raised by adapters, collections and their configuration parsers.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// An explicit measurement item matched no supported syntax.
    #[error("Could not parse {role} measurement definition \"{item}\" as a filter expression, measurement key, point tag or Guid")]
    UnresolvedMeasurement {
        /// Setting the item came from.
        role: MeasurementRole,
        /// Offending item text.
        item: String,
    },
    /// A signal ID was well formed but absent from the configuration.
    #[error("Measurement (targeted for {role}) with an ID of \"{item}\" is not defined or is not enabled")]
    UndefinedSignal {
        /// Setting the item came from.
        role: MeasurementRole,
        /// Offending signal ID text.
        item: String,
    },
    /// A filter expression could not be parsed or evaluated.
    #[error("Invalid filter expression \"{expression}\": {reason}")]
    InvalidFilterExpression {
        /// Expression text.
        expression: String,
        /// Parser or evaluator diagnostic.
        reason: String,
    },
    /// A table referenced by name is missing from the data set.
    #[error("Table \"{0}\" was not found in the configuration data set")]
    TableNotFound(String),
    /// A row did not match the column layout of its table.
    #[error("Row for table \"{table}\" has {actual} values but the table defines {expected} columns")]
    RowShape {
        /// Table name.
        table: String,
        /// Column count.
        expected: usize,
        /// Supplied value count.
        actual: usize,
    },
    /// A connection-string setting held a value of the wrong shape.
    #[error("Invalid value \"{value}\" for setting \"{key}\": {reason}")]
    InvalidSetting {
        /// Setting key.
        key: String,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A time tag matched neither the relative nor the absolute grammar.
    #[error("Invalid time tag \"{0}\"")]
    InvalidTimeTag(String),
    /// `start` waited past the initialization timeout.
    #[error("Failed to start adapter due to timeout waiting for initialization.")]
    InitializationTimeout,
    /// A subscriber returned an error while handling a notification.
    #[error("Exception in consumer handler for {event} event: {message}")]
    ConsumerHandler {
        /// Notification name.
        event: &'static str,
        /// Handler error text.
        message: String,
    },
    /// A member adapter failed a lifecycle step inside a collection.
    #[error("Failed to {operation} adapter {adapter}: {source}")]
    Lifecycle {
        /// Lifecycle step (`initialize`, `start`, `stop`).
        operation: &'static str,
        /// Member name.
        adapter: String,
        /// Underlying failure.
        #[source]
        source: Box<AdapterError>,
    },
    /// A collection row named a type the factory does not know.
    #[error("No adapter type named \"{0}\" is registered")]
    UnknownAdapterType(String),
    /// A collection was asked to load members without a usable configuration.
    #[error("{0}")]
    Configuration(String),
    /// The configuration snapshot could not be decoded.
    #[error("Failed to decode configuration snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
    /// Failure raised by an adapter implementation.
    #[error("{0}")]
    Custom(String),
}

impl AdapterError {
    /// Convenience constructor for adapter implementations.
    pub fn custom(message: impl Into<String>) -> Self {
        AdapterError::Custom(message.into())
    }

    pub(crate) fn lifecycle(operation: &'static str, adapter: &str, source: AdapterError) -> Self {
        AdapterError::Lifecycle {
            operation,
            adapter: adapter.to_owned(),
            source: Box::new(source),
        }
    }
}

/// Result alias used throughout the adapter crate.
pub type Result<T> = std::result::Result<T, AdapterError>;
