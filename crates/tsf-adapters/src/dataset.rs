//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! In-memory tabular configuration snapshot.
//!
//! Adapters resolve filter expressions and point tags against a [`DataSet`],
//! and collections load their members from one of its tables. Snapshots are
//! immutable once shared; publishing a change means building a new set.
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AdapterError, Result};
use crate::expression::{self, SortKey};

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Missing value.
    #[default]
    Null,
    /// Boolean cell.
    Bool(bool),
    /// Integral cell.
    Integer(i64),
    /// Floating-point cell.
    Float(f64),
    /// Text cell.
    Text(String),
}

impl Value {
    /// Whether the cell is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text rendering of a non-null cell.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Null => None,
            Value::Text(text) => Some(Cow::Borrowed(text)),
            other => Some(Cow::Owned(other.to_string())),
        }
    }

    /// Numeric view of the cell; text is parsed when possible.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            Value::Text(text) => text.trim().parse::<f64>().ok(),
            Value::Bool(_) | Value::Null => None,
        }
    }

    /// Unsigned 32-bit view, used for adapter IDs.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Integer(value) => u32::try_from(*value).ok(),
            Value::Float(value) if value.fract() == 0.0 && *value >= 0.0 => {
                u32::try_from(*value as i64).ok()
            }
            Value::Text(text) => text.trim().parse::<u32>().ok(),
            _ => None,
        }
    }

    /// Boolean view of the cell.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            Value::Integer(value) => Some(*value != 0),
            Value::Text(text) => crate::settings::parse_boolean(text),
            _ => None,
        }
    }

    /// UUID view of a text cell.
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Text(text) => Uuid::parse_str(text.trim()).ok(),
            _ => None,
        }
    }

    /// Ordering used by `ORDER BY` and relational operators: numeric when both
    /// sides are numeric, case-insensitive text otherwise. Nulls sort first.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            _ => match (self.numeric(), other.numeric()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => {
                    let a = self.as_text().unwrap_or_default().to_lowercase();
                    let b = other.as_text().unwrap_or_default().to_lowercase();
                    a.cmp(&b)
                }
            },
        }
    }

    // Text only counts as numeric when compared against a number.
    fn numeric(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub(crate) fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Text(_), Value::Integer(_) | Value::Float(_))
            | (Value::Integer(_) | Value::Float(_), Value::Text(_)) => {
                match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            (Value::Bool(_), Value::Text(_)) | (Value::Text(_), Value::Bool(_)) => {
                self.as_bool() == other.as_bool()
            }
            _ => self.compare(other) == Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Integer(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", value),
            Value::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Text(value.to_string())
    }
}

/// A positional row; values align with the owning table's columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRow {
    values: Vec<Value>,
}

impl DataRow {
    /// Raw values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// A named table with ordered columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedTable")]
pub struct DataTable {
    /// Table name, matched case-insensitively.
    pub name: String,
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<DataRow>,
}

/// Wire form of a [`DataTable`] before row widths are checked.
#[derive(Deserialize)]
struct UncheckedTable {
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<DataRow>,
}

impl TryFrom<UncheckedTable> for DataTable {
    type Error = AdapterError;

    fn try_from(raw: UncheckedTable) -> Result<Self> {
        if let Some(row) = raw.rows.iter().find(|row| row.values.len() != raw.columns.len()) {
            return Err(AdapterError::RowShape {
                table: raw.name,
                expected: raw.columns.len(),
                actual: row.values.len(),
            });
        }
        Ok(Self {
            name: raw.name,
            columns: raw.columns,
            rows: raw.rows,
        })
    }
}

impl DataTable {
    /// Create an empty table with the given columns.
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Copy of this table with the same columns and no rows.
    pub fn clone_schema(&self) -> Self {
        Self {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: Vec::new(),
        }
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Index of a column, ignoring case.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(column))
    }

    /// Append a row; the value count must match the column count.
    pub fn push_row<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.len() != self.columns.len() {
            return Err(AdapterError::RowShape {
                table: self.name.clone(),
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        self.rows.push(DataRow { values });
        Ok(())
    }

    /// Append a row taken from another table with the same layout.
    pub fn import_row(&mut self, row: &RowView<'_>) -> Result<()> {
        self.push_row(row.row.values.iter().cloned())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows with column-name access.
    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(move |row| RowView { table: self, row })
    }

    /// First row whose `column` text equals `value`, ignoring case.
    pub fn find(&self, column: &str, value: &str) -> Option<RowView<'_>> {
        let index = self.column_index(column)?;
        self.rows().find(|row| {
            row.row
                .values
                .get(index)
                .and_then(Value::as_text)
                .is_some_and(|text| text.trim().eq_ignore_ascii_case(value.trim()))
        })
    }

    /// Rows matching a boolean filter expression, optionally sorted.
    ///
    /// `sort` is a comma-separated column list, each optionally followed by
    /// `ASC` or `DESC`.
    pub fn select(&self, filter: &str, sort: Option<&str>) -> Result<Vec<RowView<'_>>> {
        let predicate = expression::parse(filter)?;
        predicate.validate_columns(self, filter)?;

        let mut selected = Vec::new();
        for row in self.rows() {
            if predicate.matches(&row) {
                selected.push(row);
            }
        }

        if let Some(sort) = sort.filter(|s| !s.trim().is_empty()) {
            let keys = SortKey::parse_list(sort)?;
            for key in &keys {
                if self.column_index(&key.column).is_none() {
                    return Err(AdapterError::InvalidFilterExpression {
                        expression: sort.to_owned(),
                        reason: format!("unknown sort column \"{}\"", key.column),
                    });
                }
            }
            selected.sort_by(|a, b| {
                keys.iter()
                    .map(|key| key.compare(a, b))
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }
        Ok(selected)
    }
}

/// Borrowed row with access by column name.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    table: &'a DataTable,
    row: &'a DataRow,
}

impl<'a> RowView<'a> {
    /// Cell by column name, ignoring case.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.table
            .column_index(column)
            .and_then(|index| self.row.values.get(index))
    }

    /// Non-empty text of a cell.
    pub fn text(&self, column: &str) -> Option<Cow<'a, str>> {
        self.get(column)
            .and_then(Value::as_text)
            .filter(|text| !text.trim().is_empty())
    }

    /// Table the row belongs to.
    pub fn table(&self) -> &'a DataTable {
        self.table
    }

    /// Underlying row.
    pub fn row(&self) -> &'a DataRow {
        self.row
    }
}

/// A set of named tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    #[serde(default)]
    tables: Vec<DataTable>,
}

impl DataSet {
    /// Empty data set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a JSON snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON snapshot from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            AdapterError::Configuration(format!(
                "unable to read configuration snapshot {}: {}",
                path.display(),
                err
            ))
        })?;
        Self::from_json(&contents)
    }

    /// Encode as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Table by name, ignoring case.
    pub fn table(&self, name: &str) -> Option<&DataTable> {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }

    /// Whether a table exists.
    pub fn contains_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    /// Add a table, replacing any table with the same name.
    pub fn add_table(&mut self, table: DataTable) {
        match self
            .tables
            .iter_mut()
            .find(|existing| existing.name.eq_ignore_ascii_case(&table.name))
        {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
    }

    /// Remove a table by name.
    pub fn remove_table(&mut self, name: &str) -> Option<DataTable> {
        let index = self
            .tables
            .iter()
            .position(|table| table.name.eq_ignore_ascii_case(name))?;
        Some(self.tables.remove(index))
    }

    /// Tables in insertion order.
    pub fn tables(&self) -> &[DataTable] {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurements() -> DataTable {
        let mut table = DataTable::new(
            "ActiveMeasurements",
            ["ID", "SignalID", "PointTag", "SignalType", "Adder", "Multiplier"],
        );
        table
            .push_row(vec![
                Value::from("PPA:3"),
                Value::from("7f4c6c1e-0000-4000-8000-000000000003"),
                Value::from("SUB1:FREQ"),
                Value::from("FREQ"),
                Value::from(0.0),
                Value::from(1.0),
            ])
            .unwrap();
        table
            .push_row(vec![
                Value::from("PPA:1"),
                Value::from("7f4c6c1e-0000-4000-8000-000000000001"),
                Value::from("SUB1:VPHM"),
                Value::from("VPHM"),
                Value::from(0.5),
                Value::from(2.0),
            ])
            .unwrap();
        table
            .push_row(vec![
                Value::from("PPB:2"),
                Value::from("7f4c6c1e-0000-4000-8000-000000000002"),
                Value::from("SUB2:FREQ"),
                Value::from("FREQ"),
                Value::Null,
                Value::Null,
            ])
            .unwrap();
        table
    }

    #[test]
    fn select_filters_and_sorts() {
        let table = measurements();
        let rows = table
            .select("SignalType = 'FREQ'", Some("PointTag DESC"))
            .unwrap();
        let tags: Vec<_> = rows.iter().map(|r| r.text("PointTag").unwrap()).collect();
        assert_eq!(tags, ["SUB2:FREQ", "SUB1:FREQ"]);
    }

    #[test]
    fn select_rejects_unknown_columns() {
        let table = measurements();
        assert!(table.select("Missing = 1", None).is_err());
        assert!(table.select("SignalType = 'FREQ'", Some("Missing")).is_err());
    }

    #[test]
    fn push_row_checks_shape() {
        let mut table = DataTable::new("T", ["A", "B"]);
        assert!(table.push_row(vec![Value::from(1i64)]).is_err());
    }

    #[test]
    fn tables_are_case_insensitive_and_replaceable() {
        let mut set = DataSet::new();
        set.add_table(measurements());
        assert!(set.contains_table("activemeasurements"));
        set.add_table(DataTable::new("ACTIVEMEASUREMENTS", ["ID"]));
        assert_eq!(set.tables().len(), 1);
        assert!(set.table("ActiveMeasurements").unwrap().is_empty());
    }

    #[test]
    fn short_snapshot_rows_are_rejected() {
        let json = r#"{"tables":[{"name":"ActiveMeasurements","columns":["ID","SignalID","PointTag"],"rows":[["PPA:1"]]}]}"#;
        let err = DataSet::from_json(json).unwrap_err();
        assert!(err.to_string().contains("ActiveMeasurements"), "{}", err);
    }

    #[test]
    fn json_snapshot_round_trip() {
        let mut set = DataSet::new();
        set.add_table(measurements());
        let decoded = DataSet::from_json(&set.to_json().unwrap()).unwrap();
        assert_eq!(decoded, set);
    }
}
