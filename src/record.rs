use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;

/// A single scalar cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Timestamp(_) => 2,
            Value::Text(_) => 3,
            Value::Null => 4,
        }
    }

    /// Total ordering used for sorting: values of the same kind compare
    /// naturally, nulls sort last, mixed kinds fall back to kind rank.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a
                    .kind_rank()
                    .cmp(&b.kind_rank())
                    .then_with(|| a.to_string().cmp(&b.to_string())),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(ts) => {
                if ts.time() == chrono::NaiveTime::MIN {
                    write!(f, "{}", ts.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

/// One row of the source dataset.
///
/// `index` is the position of the row in the dataset as first loaded and never
/// changes, even after filtering or sorting. It names the downloaded image file.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub index: usize,
    pub fields: Vec<(String, Value)>,
    pub image_local_path: Option<PathBuf>,
}

impl Record {
    pub fn new(index: usize, fields: Vec<(String, Value)>) -> Self {
        Self {
            index,
            fields,
            image_local_path: None,
        }
    }

    /// Look up a column value; `None` if the record has no such column
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image_local_path.as_deref()
    }

    pub fn with_image_path(mut self, path: PathBuf) -> Self {
        self.image_local_path = Some(path);
        self
    }
}

/// Tabular input: ordered column names plus the records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    /// Build a dataset from rows of values aligned with `columns`
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                let fields = columns.iter().cloned().zip(row).collect();
                Record::new(index, fields)
            })
            .collect();
        Self { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Iterate the values of one column (missing cells read as `Null`)
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.records
            .iter()
            .map(move |record| record.get(column).unwrap_or(&Value::Null))
    }

    /// Stable ascending sort by one column, nulls last
    pub fn sort_by_column(&mut self, column: &str) {
        self.records.sort_by(|a, b| {
            let left = a.get(column).unwrap_or(&Value::Null);
            let right = b.get(column).unwrap_or(&Value::Null);
            left.sort_cmp(right)
        });
    }
}
