//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Session orchestration, routing and flow control."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Threshold-driven flow control for consumer backlogs.
use std::fmt;

use tsf_common::SessionConfig;

use crate::error::{Result, SessionError};

/// Default queue depth that triggers an output backlog warning.
pub const DEFAULT_MEASUREMENT_WARNING_THRESHOLD: u64 = 100_000;
/// Default queue depth that triggers evasive truncation.
pub const DEFAULT_MEASUREMENT_DUMPING_THRESHOLD: u64 = 500_000;
/// Default seconds of unpublished action data tolerated.
pub const DEFAULT_SAMPLE_WARNING_THRESHOLD: u32 = 10;

/// What to do about an output adapter's queue depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAction {
    /// Below the warning threshold.
    Healthy,
    /// Above warning, at or below dumping.
    Warning {
        /// Close enough to the dumping threshold to escalate.
        critical: bool,
    },
    /// Above dumping: remove this many of the oldest measurements.
    Dump {
        /// Measurements to remove.
        count: u64,
    },
}

impl QueueAction {
    /// Represent the action as a static label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueAction::Healthy => "healthy",
            QueueAction::Warning { critical: false } => "unprocessed",
            QueueAction::Warning { critical: true } => "unprocessed_critical",
            QueueAction::Dump { .. } => "dump",
        }
    }
}

impl fmt::Display for QueueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Warning and dumping thresholds with the invariant `dumping > warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdPolicy {
    warning: u64,
    dumping: u64,
    default_sample_warning: u32,
}

impl ThresholdPolicy {
    /// Construct a policy, rejecting a dumping threshold at or below warning.
    pub fn new(warning: u64, dumping: u64, default_sample_warning: u32) -> Result<Self> {
        if dumping <= warning {
            return Err(SessionError::InvalidThresholds { warning, dumping });
        }
        Ok(Self {
            warning,
            dumping,
            default_sample_warning,
        })
    }

    /// Thresholds taken from the session configuration.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        Self::new(
            config.measurement_warning_threshold,
            config.measurement_dumping_threshold,
            config.default_sample_warning_threshold,
        )
    }

    pub fn warning(&self) -> u64 {
        self.warning
    }

    pub fn dumping(&self) -> u64 {
        self.dumping
    }

    pub fn default_sample_warning(&self) -> u32 {
        self.default_sample_warning
    }

    /// Classify an output queue depth.
    pub fn evaluate_queue(&self, depth: usize) -> QueueAction {
        let depth = depth as u64;
        if depth > self.dumping {
            QueueAction::Dump {
                count: self.dumping,
            }
        } else if depth > self.warning {
            QueueAction::Warning {
                critical: depth >= self.dumping - self.warning,
            }
        } else {
            QueueAction::Healthy
        }
    }

    /// Seconds of unpublished data an action adapter may hold before warning.
    ///
    /// Concentrating adapters (those reporting a lag time) get twice their lag,
    /// rounded up. Fast processing intervals quadruple the allowance.
    pub fn sample_threshold(&self, lag_time: Option<f64>, processing_interval: i64) -> u32 {
        let mut threshold = match lag_time {
            Some(lag) => (2.0 * lag.ceil()).max(0.0) as u32,
            None => self.default_sample_warning,
        };
        if (0..100).contains(&processing_interval) {
            threshold = threshold.saturating_mul(4);
        }
        threshold
    }

    /// Whether `seconds` of unpublished data warrants a warning.
    pub fn samples_exceed(&self, seconds: u32, lag_time: Option<f64>, processing_interval: i64) -> bool {
        seconds > self.sample_threshold(lag_time, processing_interval)
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            warning: DEFAULT_MEASUREMENT_WARNING_THRESHOLD,
            dumping: DEFAULT_MEASUREMENT_DUMPING_THRESHOLD,
            default_sample_warning: DEFAULT_SAMPLE_WARNING_THRESHOLD,
        }
    }
}
