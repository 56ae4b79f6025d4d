//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Parsing of `inputMeasurementKeys` and `outputMeasurements` settings.
//!
//! A setting is either a `FILTER` expression evaluated against the
//! configuration snapshot, or a `;`-separated list of items. Each item is tried
//! as a `SOURCE:ID` key, then a signal ID (UUID), then a point tag.
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use uuid::Uuid;

use crate::dataset::{DataSet, RowView};
use crate::error::{AdapterError, MeasurementRole, Result};
use crate::measurement::{Measurement, MeasurementKey};

/// Table consulted for signal ID and point tag lookups.
pub const ACTIVE_MEASUREMENTS: &str = "ActiveMeasurements";

static FILTER_REGEX: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(
        r"^FILTER\s+(?:TOP\s+(?P<top>\d+)\s+)?(?P<table>\w+)\s+WHERE\s+(?P<expression>.+?)(?:\s+ORDER\s+BY\s+(?P<sort>.+))?$",
    )
    .case_insensitive(true)
    .dot_matches_new_line(true)
    .build()
    .expect("filter expression pattern is valid")
});

/// A parsed `FILTER [TOP n] <Table> WHERE <Expr> [ORDER BY <Field>]` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpression {
    /// Table the rows are selected from.
    pub table: String,
    /// Boolean row predicate.
    pub predicate: String,
    /// Optional sort clause.
    pub sort: Option<String>,
    /// Optional row limit.
    pub top: Option<usize>,
}

impl FilterExpression {
    /// Recognise the FILTER grammar; `None` when `text` is not a filter clause.
    pub fn parse(text: &str) -> Option<Self> {
        let captures = FILTER_REGEX.captures(text.trim())?;
        Some(Self {
            table: captures["table"].to_owned(),
            predicate: captures["expression"].trim().to_owned(),
            sort: captures.name("sort").map(|m| m.as_str().trim().to_owned()),
            top: captures
                .name("top")
                .and_then(|m| m.as_str().parse::<usize>().ok()),
        })
    }

    /// Evaluate against a data set.
    pub fn select<'a>(&self, data_source: &'a DataSet) -> Result<Vec<RowView<'a>>> {
        let table = data_source
            .table(&self.table)
            .ok_or_else(|| AdapterError::TableNotFound(self.table.clone()))?;
        let mut rows = table.select(&self.predicate, self.sort.as_deref())?;
        if let Some(top) = self.top {
            rows.truncate(top);
        }
        Ok(rows)
    }
}

/// Resolve an `inputMeasurementKeys` value. Blank input yields an empty list.
pub fn parse_input_measurement_keys(
    data_source: Option<&DataSet>,
    value: &str,
) -> Result<Vec<MeasurementKey>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Vec::new());
    }

    if let (Some(data_source), Some(filter)) = (data_source, FilterExpression::parse(value)) {
        return filter
            .select(data_source)?
            .iter()
            .map(|row| filtered_key(row, MeasurementRole::Input))
            .collect();
    }

    let mut keys = Vec::new();
    for item in split_items(value) {
        keys.push(resolve_key(data_source, item, MeasurementRole::Input)?.0);
    }
    Ok(keys)
}

/// Resolve an `outputMeasurements` value. Explicit items accept an optional
/// `,adder,multiplier` suffix; otherwise calibration comes from configuration.
pub fn parse_output_measurements(
    data_source: Option<&DataSet>,
    value: &str,
) -> Result<Vec<Measurement>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Vec::new());
    }

    if let (Some(data_source), Some(filter)) = (data_source, FilterExpression::parse(value)) {
        return filter
            .select(data_source)?
            .iter()
            .map(|row| {
                let key = filtered_key(row, MeasurementRole::Output)?;
                Ok(measurement_from_metadata(key, Some(row)))
            })
            .collect();
    }

    let mut measurements = Vec::new();
    for item in split_items(value) {
        let mut parts = item.split(',').map(str::trim);
        let head = parts.next().unwrap_or_default();
        let (key, row) = resolve_key(data_source, head, MeasurementRole::Output)?;
        let mut measurement = measurement_from_metadata(key, row.as_ref());

        if let Some(adder) = parts.next().filter(|p| !p.is_empty()) {
            measurement.adder = parse_calibration(item, adder)?;
        }
        if let Some(multiplier) = parts.next().filter(|p| !p.is_empty()) {
            measurement.multiplier = parse_calibration(item, multiplier)?;
        }
        if parts.next().is_some() {
            return Err(AdapterError::UnresolvedMeasurement {
                role: MeasurementRole::Output,
                item: item.to_owned(),
            });
        }
        measurements.push(measurement);
    }
    Ok(measurements)
}

fn split_items(value: &str) -> impl Iterator<Item = &str> {
    value.split(';').map(str::trim).filter(|item| !item.is_empty())
}

fn parse_calibration(item: &str, text: &str) -> Result<f64> {
    text.parse::<f64>()
        .map_err(|_| AdapterError::UnresolvedMeasurement {
            role: MeasurementRole::Output,
            item: item.to_owned(),
        })
}

fn resolve_key<'a>(
    data_source: Option<&'a DataSet>,
    item: &str,
    role: MeasurementRole,
) -> Result<(MeasurementKey, Option<RowView<'a>>)> {
    let measurements = data_source.and_then(|ds| ds.table(ACTIVE_MEASUREMENTS));

    if let Ok(mut key) = item.parse::<MeasurementKey>() {
        let row = measurements.and_then(|table| table.find("ID", &key.to_string()));
        if let Some(signal_id) = row.as_ref().and_then(|r| r.get("SignalID")).and_then(|v| v.as_uuid()) {
            key.resolve_signal_id(signal_id);
        }
        return Ok((key, row));
    }

    if let Ok(signal_id) = Uuid::parse_str(item) {
        return measurements
            .and_then(|table| table.find("SignalID", item))
            .and_then(|row| key_from_row(&row).map(|key| (key.with_signal_id(signal_id), Some(row))))
            .ok_or_else(|| AdapterError::UndefinedSignal {
                role,
                item: item.to_owned(),
            });
    }

    measurements
        .and_then(|table| table.find("ID", item).or_else(|| table.find("PointTag", item)))
        .and_then(|row| key_from_row(&row).map(|key| (key, Some(row))))
        .ok_or_else(|| AdapterError::UnresolvedMeasurement {
            role,
            item: item.to_owned(),
        })
}

fn key_from_row(row: &RowView<'_>) -> Option<MeasurementKey> {
    let mut key = row.text("ID")?.parse::<MeasurementKey>().ok()?;
    if let Some(signal_id) = row.get("SignalID").and_then(|v| v.as_uuid()) {
        key.resolve_signal_id(signal_id);
    }
    Some(key)
}

/// Rows selected by a FILTER must carry a parseable `ID`; anything else is a
/// configuration error naming the row.
fn filtered_key(row: &RowView<'_>, role: MeasurementRole) -> Result<MeasurementKey> {
    key_from_row(row).ok_or_else(|| AdapterError::UnresolvedMeasurement {
        role,
        item: row
            .text("ID")
            .map(|id| id.into_owned())
            .unwrap_or_default(),
    })
}

fn measurement_from_metadata(key: MeasurementKey, row: Option<&RowView<'_>>) -> Measurement {
    let mut measurement = Measurement::template(key);
    if let Some(row) = row {
        measurement.tag_name = row.text("PointTag").map(|tag| tag.into_owned());
        if let Some(adder) = row.get("Adder").and_then(|v| v.as_f64()) {
            measurement.adder = adder;
        }
        if let Some(multiplier) = row.get("Multiplier").and_then(|v| v.as_f64()) {
            measurement.multiplier = multiplier;
        }
    }
    measurement
}
