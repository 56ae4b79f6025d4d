//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Connection-string settings.
//!
//! A connection string is a `;`-delimited list of `key=value` pairs. Values may
//! be wrapped in braces so they can carry nested `;` or `=` characters, e.g.
//! `outputMeasurements={PPA:1;PPA:2}`. Keys are case-insensitive.
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::{AdapterError, Result};

/// Parsed, case-insensitive connection-string settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    // lowercase key -> (key as written, value)
    entries: IndexMap<String, (String, String)>,
}

impl Settings {
    /// Parse a connection string. Blank input yields an empty map.
    pub fn parse(connection_string: &str) -> Self {
        let mut settings = Settings::default();
        for segment in split_top_level(connection_string, ';') {
            let Some((key, value)) = split_pair(segment) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            settings.insert(key, unwrap_braces(value));
        }
        settings
    }

    /// Look up a value by key, ignoring case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    /// Insert or replace a value, keeping the original position of an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.entries
            .insert(key.to_ascii_lowercase(), (key, value.into()));
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries
            .shift_remove(&key.to_ascii_lowercase())
            .map(|(_, value)| value)
    }

    /// Number of settings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no settings are defined.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(key, value)` pairs in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Parse a typed value, reporting malformed input as a configuration error.
    pub fn parse_value<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|err| AdapterError::InvalidSetting {
                    key: key.to_owned(),
                    value: raw.to_owned(),
                    reason: err.to_string(),
                }),
        }
    }

    /// Parse a boolean flag (`true/false`, `yes/no`, `on/off`, `1/0`).
    pub fn parse_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => parse_boolean(raw)
                .map(Some)
                .ok_or_else(|| AdapterError::InvalidSetting {
                    key: key.to_owned(),
                    value: raw.to_owned(),
                    reason: "expected a boolean".to_owned(),
                }),
        }
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (key, value)) in self.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            if value.contains(';') || value.contains('=') {
                write!(f, "{}={{{}}}", key, value)?;
            } else {
                write!(f, "{}={}", key, value)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" | "t" => Some(true),
        "false" | "no" | "n" | "off" | "0" | "f" | "" => Some(false),
        _ => None,
    }
}

/// Split on `delimiter` wherever it is not nested inside braces.
pub(crate) fn split_top_level(text: &str, delimiter: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (index, ch) in text.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if c == delimiter && depth == 0 => {
                parts.push(&text[start..index]);
                start = index + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn split_pair(segment: &str) -> Option<(&str, &str)> {
    let (key, value) = segment.split_once('=')?;
    Some((key.trim(), value.trim()))
}

fn unwrap_braces(value: &str) -> &str {
    match value.strip_prefix('{').and_then(|v| v.strip_suffix('}')) {
        Some(inner) => inner.trim(),
        None => value,
    }
}
