//! JSON and CSV writers for the aggregated result set

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::types::{ResultSet, StadiumRecord, STADIUM_FIELDS, TIMESTAMP_FIELD};

const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Write records as a pretty-printed (2-space) UTF-8 JSON array, replacing any existing file
pub fn write_json(path: &Path, records: &[Value]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn read_json(path: &Path) -> Result<ResultSet> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON array: {}", path.display()))
}

/// Integral floats inside the `i64` range; `as` would saturate anything beyond it
fn integral_f64(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64)
        .then(|| f as i64)
}

/// Nullable integer: integral numbers and numeric strings; anything else is `None`
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_f64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
        }
        _ => None,
    }
}

/// Render an ISO-8601 timestamp as `YYYY-MM-DD HH:MM:SS`; unparseable values are `None`
pub fn format_timestamp(value: &Value) -> Option<String> {
    let s = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.format(CSV_TIMESTAMP_FORMAT).to_string());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|dt| dt.format(CSV_TIMESTAMP_FORMAT).to_string())
}

fn text_field(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl StadiumRecord {
    /// Coerced view of a model record; missing or malformed values become `None`
    pub fn from_json(record: &Value) -> Self {
        let int = |key: &str| record.get(key).and_then(coerce_int);
        Self {
            image: text_field(record, "image"),
            stadium: text_field(record, "stadium"),
            team: text_field(record, "team"),
            location: text_field(record, "location"),
            first_mls_year_in_stadium: int("first_mls_year_in_stadium"),
            capacity: int("capacity"),
            opened: int("opened"),
            surface: text_field(record, "surface"),
            roof_type: text_field(record, "roof_type"),
            extracted_at: record.get(TIMESTAMP_FIELD).and_then(format_timestamp),
        }
    }
}

/// CSV columns: the stadium fields, plus `extracted_at` when any record carries it
pub fn csv_columns(records: &[Value]) -> Vec<&'static str> {
    let mut columns = STADIUM_FIELDS.to_vec();
    if records.iter().any(|r| r.get(TIMESTAMP_FIELD).is_some()) {
        columns.push(TIMESTAMP_FIELD);
    }
    columns
}

pub fn write_csv(path: &Path, records: &[Value]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let columns = csv_columns(records);
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(StadiumRecord::from_json(record).to_row(&columns))?;
    }
    writer.flush()?;
    Ok(records.len())
}

/// Read the JSON output back and write it as CSV
pub fn convert_json_to_csv(json_path: &Path, csv_path: &Path) -> Result<usize> {
    let records = read_json(json_path)?;
    write_csv(csv_path, &records)
}
