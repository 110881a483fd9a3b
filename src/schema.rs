//! Shape check for records returned by the model

use clap::ValueEnum;
use serde_json::Value;
use std::fmt;

use crate::types::{INTEGER_FIELDS, MIN_MLS_YEAR};

/// What to do with records that don't match the expected shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SchemaMode {
    /// Accept records unchecked
    Off,
    /// Log problems and keep the records
    #[default]
    Warn,
    /// Fail the batch (it is retried like a parse failure)
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaIssue {
    NotAnObject,
    MissingKey(String),
    UnexpectedKey(String),
    KeyOrder,
    NotInteger(String),
    YearTooEarly(i64),
    NotString(String),
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaIssue::NotAnObject => write!(f, "record is not an object"),
            SchemaIssue::MissingKey(k) => write!(f, "missing key `{}`", k),
            SchemaIssue::UnexpectedKey(k) => write!(f, "unexpected key `{}`", k),
            SchemaIssue::KeyOrder => write!(f, "keys are not in the expected order"),
            SchemaIssue::NotInteger(k) => write!(f, "`{}` is not an integer or null", k),
            SchemaIssue::YearTooEarly(y) => {
                write!(f, "first_mls_year_in_stadium {} is before {}", y, MIN_MLS_YEAR)
            }
            SchemaIssue::NotString(k) => write!(f, "`{}` is not a string or null", k),
        }
    }
}

/// List every way `record` deviates from `fields` (key set, key order, value types)
pub fn check_record(record: &Value, fields: &[&str]) -> Vec<SchemaIssue> {
    let Some(map) = record.as_object() else {
        return vec![SchemaIssue::NotAnObject];
    };

    let mut issues = Vec::new();

    for field in fields {
        if !map.contains_key(*field) {
            issues.push(SchemaIssue::MissingKey(field.to_string()));
        }
    }
    for key in map.keys() {
        if !fields.contains(&key.as_str()) {
            issues.push(SchemaIssue::UnexpectedKey(key.clone()));
        }
    }
    if issues.is_empty() && !map.keys().map(String::as_str).eq(fields.iter().copied()) {
        issues.push(SchemaIssue::KeyOrder);
    }

    for (key, value) in map {
        if value.is_null() || !fields.contains(&key.as_str()) {
            continue;
        }
        if INTEGER_FIELDS.contains(&key.as_str()) {
            match value.as_i64() {
                None => issues.push(SchemaIssue::NotInteger(key.clone())),
                Some(year) if key == "first_mls_year_in_stadium" && year < MIN_MLS_YEAR => {
                    issues.push(SchemaIssue::YearTooEarly(year))
                }
                Some(_) => {}
            }
        } else if !value.is_string() {
            issues.push(SchemaIssue::NotString(key.clone()));
        }
    }

    issues
}

/// Check a whole batch; returns a summary of every failing record
pub fn check_batch(records: &[Value], fields: &[&str]) -> Option<String> {
    let problems: Vec<String> = records
        .iter()
        .enumerate()
        .filter_map(|(i, record)| {
            let issues = check_record(record, fields);
            if issues.is_empty() {
                return None;
            }
            let issues: Vec<String> = issues.iter().map(ToString::to_string).collect();
            Some(format!("record {}: {}", i, issues.join(", ")))
        })
        .collect();

    if problems.is_empty() {
        None
    } else {
        Some(problems.join("; "))
    }
}
