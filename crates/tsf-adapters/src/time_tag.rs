//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Time tags and temporal constraints.
//!
//! A time tag is either an absolute timestamp (`2000-12-30 23:59:59.033`) or
//! `*` meaning "now", optionally followed by a signed offset and a unit
//! (`*-20s`, `*+1.5h`, `*-1d`). Naive timestamps are read as UTC.
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::error::{AdapterError, Result};

static RELATIVE_TAG: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"^\*\s*(?P<offset>[+-]?\s*\d*\.?\d*)\s*(?P<unit>[a-z]*)$")
        .case_insensitive(true)
        .build()
        .expect("relative time tag pattern is valid")
});

const ABSOLUTE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

/// Parse a time tag relative to the current clock.
pub fn parse_time_tag(tag: &str) -> Result<DateTime<Utc>> {
    parse_time_tag_at(tag, Utc::now())
}

/// Parse a time tag relative to `now`.
pub fn parse_time_tag_at(tag: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(AdapterError::InvalidTimeTag(tag.to_owned()));
    }

    if tag.starts_with('*') {
        return parse_relative(tag, now);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(tag) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ABSOLUTE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(tag, format) {
            return Ok(parsed.and_utc());
        }
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(tag, format) {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(midnight.and_utc());
            }
        }
    }
    Err(AdapterError::InvalidTimeTag(tag.to_owned()))
}

fn parse_relative(tag: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let invalid = || AdapterError::InvalidTimeTag(tag.to_owned());
    let captures = RELATIVE_TAG.captures(tag).ok_or_else(invalid)?;
    let offset: String = captures["offset"].chars().filter(|c| !c.is_whitespace()).collect();
    let unit = captures["unit"].to_ascii_lowercase();

    if offset.is_empty() || offset == "+" || offset == "-" {
        return if unit.is_empty() { Ok(now) } else { Err(invalid()) };
    }
    let amount: f64 = offset.parse().map_err(|_| invalid())?;
    let unit_ms = match unit.chars().next() {
        Some('s') => 1_000.0,
        Some('m') => 60_000.0,
        Some('h') => 3_600_000.0,
        Some('d') => 86_400_000.0,
        _ => return Err(invalid()),
    };
    let offset = Duration::milliseconds((amount * unit_ms).round() as i64);
    now.checked_add_signed(offset).ok_or_else(invalid)
}

/// Window of time an adapter processes; open bounds mean live data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalConstraint {
    /// Inclusive start, `MIN_UTC` when open.
    pub start: DateTime<Utc>,
    /// Inclusive stop, `MAX_UTC` when open.
    pub stop: DateTime<Utc>,
    /// Opaque parameters handed through to temporal processing.
    pub parameters: Option<String>,
}

impl Default for TemporalConstraint {
    fn default() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            stop: DateTime::<Utc>::MAX_UTC,
            parameters: None,
        }
    }
}

impl TemporalConstraint {
    /// Build a constraint from optional tags; blank or missing tags leave the bound open.
    pub fn from_tags(
        start: Option<&str>,
        stop: Option<&str>,
        parameters: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let mut constraint = TemporalConstraint::default();
        if let Some(start) = start.filter(|tag| !tag.trim().is_empty()) {
            constraint.start = parse_time_tag_at(start, now)?;
        }
        if let Some(stop) = stop.filter(|tag| !tag.trim().is_empty()) {
            constraint.stop = parse_time_tag_at(stop, now)?;
        }
        constraint.parameters = parameters
            .filter(|params| !params.trim().is_empty())
            .map(str::to_owned);
        Ok(constraint)
    }

    /// Whether both bounds are open.
    pub fn is_open(&self) -> bool {
        self.start == DateTime::<Utc>::MIN_UTC && self.stop == DateTime::<Utc>::MAX_UTC
    }

    /// Whether `timestamp` falls inside the window.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.stop
    }
}
