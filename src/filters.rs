//! Column-kind inference and row filtering.
//!
//! The form layer decides which widget to show per column from
//! [`ColumnKind`], turns the user's input into a [`FilterSpec`] and hands the
//! specs back here.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::ConfigError;
use crate::record::{Dataset, Value};

/// Name of the column treated as the record date
pub const DATE_COLUMN: &str = "fecha";

/// How a column's values should be filtered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Categorical,
    Numeric,
    Boolean,
    Temporal,
}

/// A user's selection for one column
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    /// Keep rows whose string form is one of these
    OneOf(Vec<String>),
    Numbers(Vec<f64>),
    Booleans(Vec<bool>),
    /// Inclusive on both ends
    DateRange { start: NaiveDate, end: NaiveDate },
}

impl ColumnKind {
    /// Infer the kind from a column's non-null values.
    ///
    /// Empty or mixed columns are categorical.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut kind: Option<ColumnKind> = None;

        for value in values {
            let this = match value {
                Value::Null => continue,
                Value::Bool(_) => ColumnKind::Boolean,
                Value::Int(_) | Value::Float(_) => ColumnKind::Numeric,
                Value::Timestamp(_) => ColumnKind::Temporal,
                Value::Text(_) => return ColumnKind::Categorical,
            };
            match kind {
                None => kind = Some(this),
                Some(seen) if seen == this => {}
                Some(_) => return ColumnKind::Categorical,
            }
        }

        kind.unwrap_or(ColumnKind::Categorical)
    }

    /// Whether `value` passes `spec` for a column of this kind.
    ///
    /// Nulls never match. A spec that does not fit the kind falls back to
    /// comparing string forms.
    pub fn matches(&self, value: &Value, spec: &FilterSpec) -> bool {
        if value.is_null() {
            return false;
        }

        match (self, spec) {
            (ColumnKind::Numeric, FilterSpec::Numbers(wanted)) => value
                .as_f64()
                .map(|v| wanted.iter().any(|w| *w == v))
                .unwrap_or(false),
            (ColumnKind::Boolean, FilterSpec::Booleans(wanted)) => match value {
                Value::Bool(b) => wanted.contains(b),
                _ => false,
            },
            (ColumnKind::Temporal, FilterSpec::DateRange { start, end }) => match value {
                Value::Timestamp(ts) => {
                    let date = ts.date();
                    date >= *start && date <= *end
                }
                _ => false,
            },
            (_, FilterSpec::OneOf(wanted)) => {
                let text = value.to_string();
                wanted.iter().any(|w| *w == text)
            }
            (_, FilterSpec::Numbers(wanted)) => wanted.iter().any(|w| w.to_string() == value.to_string()),
            (_, FilterSpec::Booleans(wanted)) => wanted.iter().any(|w| w.to_string() == value.to_string()),
            (_, FilterSpec::DateRange { .. }) => false,
        }
    }
}

/// Column summary for building filter widgets
#[derive(Debug, Clone, Serialize)]
pub struct ColumnDescription {
    pub name: String,
    pub kind: ColumnKind,
    /// Sorted distinct values for categorical and boolean columns
    pub options: Vec<String>,
}

/// Describe every column of the dataset
pub fn describe_columns(dataset: &Dataset) -> Vec<ColumnDescription> {
    dataset
        .columns
        .iter()
        .map(|name| {
            let kind = ColumnKind::infer(dataset.column_values(name));
            let options = match kind {
                ColumnKind::Categorical | ColumnKind::Boolean => {
                    let mut distinct: Vec<String> = dataset
                        .column_values(name)
                        .filter(|v| !v.is_null())
                        .map(|v| v.to_string())
                        .collect::<HashSet<_>>()
                        .into_iter()
                        .collect();
                    distinct.sort();
                    distinct
                }
                _ => Vec::new(),
            };
            ColumnDescription {
                name: name.clone(),
                kind,
                options,
            }
        })
        .collect()
}

/// Parse a comma separated list of numbers such as `"1, 2.5"`
pub fn parse_numeric_filter(column: &str, input: &str) -> Result<Vec<f64>, ConfigError> {
    input
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::UnreadableFilter {
                    column: column.to_string(),
                    value: part.trim().to_string(),
                })
        })
        .collect()
}

/// Keep the records that satisfy every filter
pub fn apply_filters(dataset: Dataset, filters: &[(String, FilterSpec)]) -> Result<Dataset, ConfigError> {
    let mut kinds = Vec::with_capacity(filters.len());
    for (column, spec) in filters {
        if !dataset.has_column(column) {
            return Err(ConfigError::UnknownColumn(column.clone()));
        }
        kinds.push((column, ColumnKind::infer(dataset.column_values(column)), spec));
    }

    let Dataset { columns, records } = dataset;
    let records = records
        .into_iter()
        .filter(|record| {
            kinds.iter().all(|(column, kind, spec)| {
                record
                    .get(column)
                    .map(|value| kind.matches(value, spec))
                    .unwrap_or(false)
            })
        })
        .collect();

    Ok(Dataset { columns, records })
}

/// Parse a date cell the way the date column is read: `YYYY-MM-DD`, with an
/// optional time part.
fn parse_date(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Timestamp(ts) => Some(*ts),
        Value::Text(text) => {
            let text = text.trim();
            let date_part = text.get(..10).unwrap_or(text);
            NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
        _ => None,
    }
}

/// Normalise the `fecha` column to timestamps, dropping rows whose date cannot
/// be read. Datasets without the column are returned unchanged.
pub fn normalize_date_column(dataset: Dataset) -> Dataset {
    if !dataset.has_column(DATE_COLUMN) {
        return dataset;
    }

    let Dataset { columns, records } = dataset;
    let before = records.len();
    let records: Vec<_> = records
        .into_iter()
        .filter_map(|mut record| {
            let parsed = record.get(DATE_COLUMN).and_then(parse_date)?;
            if let Some(cell) = record.get_mut(DATE_COLUMN) {
                *cell = Value::Timestamp(parsed);
            }
            Some(record)
        })
        .collect();

    if records.len() < before {
        log::debug!(
            "Dropped {} rows with unreadable '{}' values",
            before - records.len(),
            DATE_COLUMN
        );
    }

    Dataset { columns, records }
}

/// Earliest and latest date among the timestamps of `column`
pub fn date_bounds(dataset: &Dataset, column: &str) -> Option<(NaiveDate, NaiveDate)> {
    let dates = dataset.column_values(column).filter_map(|v| match v {
        Value::Timestamp(ts) => Some(ts.date()),
        _ => None,
    });
    dates.fold(None, |bounds, date| match bounds {
        None => Some((date, date)),
        Some((lo, hi)) => Some((lo.min(date), hi.max(date))),
    })
}
