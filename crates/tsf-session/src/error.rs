//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Session orchestration, routing and flow control."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
use thiserror::Error;
use tsf_adapters::AdapterError;

/// Failures surfaced by the session orchestrator.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Dumping must sit strictly above warning.
    #[error("Measurement dumping threshold ({dumping}) must exceed the warning threshold ({warning})")]
    InvalidThresholds {
        /// Queue depth that triggers a warning.
        warning: u64,
        /// Queue depth that triggers evasive truncation.
        dumping: u64,
    },
    /// An adapter or collection failed a synchronous step.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    /// A background thread could not be spawned.
    #[error("Failed to spawn {task} thread: {source}")]
    Spawn {
        /// What the thread was for.
        task: &'static str,
        /// OS error.
        #[source]
        source: std::io::Error,
    },
    /// The session was used after disposal.
    #[error("Session has been disposed")]
    Disposed,
}

/// Result alias for the session crate.
pub type Result<T> = std::result::Result<T, SessionError>;
