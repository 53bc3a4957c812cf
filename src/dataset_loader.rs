use std::path::Path;

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::record::{Dataset, Value};

/// Load a dataset from an Excel workbook or a JSON records file
pub fn load_dataset(file_path: &str) -> Result<Dataset> {
    let extension = Path::new(file_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("xlsx") | Some("xls") | Some("xlsm") => read_excel_dataset(file_path),
        Some("json") => {
            let text = std::fs::read_to_string(file_path)
                .with_context(|| format!("Failed to read JSON file: {}", file_path))?;
            parse_json_records(&text)
        }
        Some(ext) => Err(anyhow!("Unsupported dataset type: {}", ext)),
        None => Err(anyhow!("Unable to determine dataset type (no extension)")),
    }
}

/// Read the first worksheet; its first row holds the column names
pub fn read_excel_dataset(file_path: &str) -> Result<Dataset> {
    let mut workbook = open_workbook_auto(file_path)
        .with_context(|| format!("Failed to open Excel file: {}", file_path))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("Workbook has no sheets: {}", file_path))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Failed to read sheet '{}'", sheet_name))?;

    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell {
                Data::Empty => format!("column_{}", i + 1),
                other => other.to_string(),
            })
            .collect(),
        None => return Ok(Dataset::default()),
    };

    let values = rows
        .map(|row| {
            (0..columns.len())
                .map(|col| row.get(col).map(cell_to_value).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Ok(Dataset::from_rows(columns, values))
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => Value::Text(s.clone()),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(Value::Timestamp)
            .unwrap_or_else(|_| Value::Text(s.clone())),
        Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

/// Excel stores dates as days since 1899-12-30
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

/// Parse an array of JSON objects; column order follows first appearance
pub fn parse_json_records(text: &str) -> Result<Dataset> {
    let parsed: serde_json::Value =
        serde_json::from_str(text).context("Failed to parse JSON dataset")?;

    let rows = parsed
        .as_array()
        .ok_or_else(|| anyhow!("JSON dataset must be an array of objects"))?;

    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        let object = row
            .as_object()
            .ok_or_else(|| anyhow!("JSON dataset must be an array of objects"))?;
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let values = rows
        .iter()
        .filter_map(|row| row.as_object())
        .map(|object| {
            columns
                .iter()
                .map(|column| object.get(column).map(json_to_value).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Ok(Dataset::from_rows(columns, values))
}

fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float))
            .unwrap_or(Value::Null),
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_records() {
        let dataset = parse_json_records(
            r#"[{"tienda": "Norte", "visitas": 3, "foto": "http://a.com/1.png"},
                {"visitas": 2.5, "tienda": null, "activo": true}]"#,
        )
        .unwrap();

        assert_eq!(dataset.columns, vec!["tienda", "visitas", "foto", "activo"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.records[0].get("visitas"), Some(&Value::Int(3)));
        assert_eq!(dataset.records[1].get("visitas"), Some(&Value::Float(2.5)));
        assert_eq!(dataset.records[1].get("foto"), Some(&Value::Null));
        assert_eq!(dataset.records[1].index, 1);
    }

    #[test]
    fn test_parse_json_rejects_non_array() {
        assert!(parse_json_records(r#"{"a": 1}"#).is_err());
        assert!(parse_json_records(r#"[1, 2]"#).is_err());
    }

    #[test]
    fn test_excel_serial_dates() {
        let date = excel_serial_to_datetime(45292.0).unwrap();
        assert_eq!(date.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let with_time = excel_serial_to_datetime(45292.5).unwrap();
        assert_eq!(with_time.format("%H:%M").to_string(), "12:00");
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(load_dataset("report.csv").is_err());
        assert!(load_dataset("report").is_err());
        assert!(load_dataset("missing.json").is_err());
    }
}
