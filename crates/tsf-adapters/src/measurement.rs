//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a measurement stream.
///
/// Equality, hashing and ordering only consider `source` and `point_id`; the
/// signal ID rides along and may be backfilled after the key was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementKey {
    source: String,
    point_id: u32,
    #[serde(default)]
    signal_id: Uuid,
}

impl MeasurementKey {
    /// Create a key with an unresolved (nil) signal ID.
    pub fn new(source: impl Into<String>, point_id: u32) -> Self {
        Self {
            source: source.into(),
            point_id,
            signal_id: Uuid::nil(),
        }
    }

    /// Attach a signal ID.
    pub fn with_signal_id(mut self, signal_id: Uuid) -> Self {
        self.signal_id = signal_id;
        self
    }

    /// Source (historian or device acronym) portion of the key.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Numeric point ID within the source.
    pub fn point_id(&self) -> u32 {
        self.point_id
    }

    /// Signal ID, nil when unresolved.
    pub fn signal_id(&self) -> Uuid {
        self.signal_id
    }

    /// Whether a signal ID has been assigned.
    pub fn has_signal_id(&self) -> bool {
        !self.signal_id.is_nil()
    }

    /// Backfill the signal ID if it is still unresolved. Returns `true` when assigned.
    pub fn resolve_signal_id(&mut self, signal_id: Uuid) -> bool {
        if self.has_signal_id() || signal_id.is_nil() {
            return false;
        }
        self.signal_id = signal_id;
        true
    }
}

impl PartialEq for MeasurementKey {
    fn eq(&self, other: &Self) -> bool {
        self.point_id == other.point_id && self.source == other.source
    }
}

impl Eq for MeasurementKey {}

impl Hash for MeasurementKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.point_id.hash(state);
    }
}

impl PartialOrd for MeasurementKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MeasurementKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.source
            .cmp(&other.source)
            .then(self.point_id.cmp(&other.point_id))
    }
}

impl fmt::Display for MeasurementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.point_id)
    }
}

/// Failure parsing the `SOURCE:ID` text form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{0}\" is not a valid SOURCE:ID measurement key")]
pub struct ParseKeyError(pub String);

impl FromStr for MeasurementKey {
    type Err = ParseKeyError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        let (source, point_id) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| ParseKeyError(text.to_owned()))?;
        let source = source.trim();
        if source.is_empty() {
            return Err(ParseKeyError(text.to_owned()));
        }
        let point_id = point_id
            .trim()
            .parse::<u32>()
            .map_err(|_| ParseKeyError(text.to_owned()))?;
        Ok(MeasurementKey::new(source, point_id))
    }
}

/// A single time-stamped value flowing through the pipeline.
///
/// `adder` and `multiplier` are calibration constants kept alongside the raw
/// value; consumers apply them through [`Measurement::adjusted_value`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    /// Stream identity.
    pub key: MeasurementKey,
    /// Signal ID of the stream.
    pub id: Uuid,
    /// Point tag, when known from configuration.
    #[serde(default)]
    pub tag_name: Option<String>,
    /// Additive calibration offset.
    pub adder: f64,
    /// Multiplicative calibration factor.
    pub multiplier: f64,
    /// Raw value.
    pub value: f64,
    /// Sample time.
    pub timestamp: DateTime<Utc>,
}

impl Measurement {
    /// A measurement definition without a sample, as produced by configuration
    /// parsing. The value is zero and the timestamp is the Unix epoch.
    pub fn template(key: MeasurementKey) -> Self {
        Self {
            id: key.signal_id(),
            key,
            tag_name: None,
            adder: 0.0,
            multiplier: 1.0,
            value: 0.0,
            timestamp: DateTime::<Utc>::default(),
        }
    }

    /// A sampled measurement with neutral calibration.
    pub fn new(key: MeasurementKey, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            timestamp,
            ..Self::template(key)
        }
    }

    /// Copy this definition with a new sample.
    pub fn with_sample(&self, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            timestamp,
            ..self.clone()
        }
    }

    /// Value after applying calibration.
    pub fn adjusted_value(&self) -> f64 {
        self.value * self.multiplier + self.adder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_signal_id() {
        let a = MeasurementKey::new("PPA", 7).with_signal_id(Uuid::new_v4());
        let b = MeasurementKey::new("PPA", 7);
        assert_eq!(a, b);
        assert_ne!(a, MeasurementKey::new("PPB", 7));
    }

    #[test]
    fn ordering_is_source_then_point() {
        let mut keys = vec![
            MeasurementKey::new("PPB", 1),
            MeasurementKey::new("PPA", 9),
            MeasurementKey::new("PPA", 2),
        ];
        keys.sort();
        let text: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(text, ["PPA:2", "PPA:9", "PPB:1"]);
    }

    #[test]
    fn parses_key_text() {
        let key: MeasurementKey = " PPA:42 ".parse().unwrap();
        assert_eq!(key.source(), "PPA");
        assert_eq!(key.point_id(), 42);
        assert!(!key.has_signal_id());
        assert!("PPA".parse::<MeasurementKey>().is_err());
        assert!(":4".parse::<MeasurementKey>().is_err());
        assert!("PPA:-1".parse::<MeasurementKey>().is_err());
    }

    #[test]
    fn signal_id_backfills_once() {
        let mut key = MeasurementKey::new("PPA", 1);
        let first = Uuid::new_v4();
        assert!(key.resolve_signal_id(first));
        assert!(!key.resolve_signal_id(Uuid::new_v4()));
        assert_eq!(key.signal_id(), first);
    }

    #[test]
    fn serialization_preserves_raw_value_and_calibration() {
        let mut measurement = Measurement::new(MeasurementKey::new("PPA", 3), 12.5, Utc::now());
        measurement.adder = 1.5;
        measurement.multiplier = 2.0;
        let json = serde_json::to_string(&measurement).unwrap();
        let decoded: Measurement = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.value, 12.5);
        assert_eq!(decoded.adder, 1.5);
        assert_eq!(decoded.multiplier, 2.0);
        assert_eq!(decoded.adjusted_value(), 26.5);
    }

    #[test]
    fn output_definitions_survive_serialization() {
        let outputs = crate::definitions::parse_output_measurements(None, "PPA:9,1.5,2").unwrap();
        let json = serde_json::to_string(&outputs).unwrap();
        let decoded: Vec<Measurement> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].key, MeasurementKey::new("PPA", 9));
        assert_eq!(decoded[0].value, 0.0);
        assert_eq!(decoded[0].adder, 1.5);
        assert_eq!(decoded[0].multiplier, 2.0);
        assert_eq!(decoded[0].timestamp, outputs[0].timestamp);
    }
}
