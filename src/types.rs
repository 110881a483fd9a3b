//! Stadium row and record types shared by the extraction pipeline

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Output fields common to every variant, in output order
pub const STADIUM_FIELDS: &[&str] = &[
    "image",
    "stadium",
    "team",
    "location",
    "first_mls_year_in_stadium",
    "capacity",
    "opened",
    "surface",
    "roof_type",
];

/// Output fields for the timestamped variant
pub const TIMESTAMPED_FIELDS: &[&str] = &[
    "image",
    "stadium",
    "team",
    "location",
    "first_mls_year_in_stadium",
    "capacity",
    "opened",
    "surface",
    "roof_type",
    "extracted_at",
];

/// Fields coerced to nullable integers
pub const INTEGER_FIELDS: &[&str] = &["first_mls_year_in_stadium", "capacity", "opened"];

pub const TIMESTAMP_FIELD: &str = "extracted_at";

/// First season of Major League Soccer
pub const MIN_MLS_YEAR: i64 = 1996;

/// Pipeline variant (determines the prompt, the row payload and the output fields)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Variant {
    /// Joined row text only
    RawText,
    /// Row records with image URL and roof hint
    Hinted,
    /// Hinted records plus a run timestamp
    #[default]
    Timestamped,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::RawText => "raw-text",
            Variant::Hinted => "hinted",
            Variant::Timestamped => "timestamped",
        }
    }

    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Variant::RawText | Variant::Hinted => STADIUM_FIELDS,
            Variant::Timestamped => TIMESTAMPED_FIELDS,
        }
    }

    pub fn default_batch_size(&self) -> usize {
        match self {
            Variant::RawText => 5,
            Variant::Hinted | Variant::Timestamped => 10,
        }
    }

    pub fn uses_row_records(&self) -> bool {
        !matches!(self, Variant::RawText)
    }

    pub fn has_timestamp(&self) -> bool {
        matches!(self, Variant::Timestamped)
    }
}

/// One table row, parsed fresh from the stored HTML on every run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// Text of each `td` cell, in column order
    pub cells: Vec<String>,
    /// Text of the whole row, header cells included
    pub text: String,
    pub image: Option<String>,
    pub roof_hint: Option<String>,
}

impl RawRow {
    pub fn to_input(&self, extracted_at: Option<&str>) -> BatchInputRecord {
        BatchInputRecord {
            text: self.cells.join(" | "),
            image: self.image.clone(),
            roof_hint: self.roof_hint.clone(),
            extracted_at: extracted_at.map(str::to_string),
        }
    }
}

/// Per-row payload sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInputRecord {
    pub text: String,
    pub image: Option<String>,
    pub roof_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<String>,
}

/// Records returned by the model, in row order, exactly as parsed
pub type ResultSet = Vec<serde_json::Value>;

/// Coerced view of one output record, used for the CSV table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StadiumRecord {
    pub image: Option<String>,
    pub stadium: Option<String>,
    pub team: Option<String>,
    pub location: Option<String>,
    pub first_mls_year_in_stadium: Option<i64>,
    pub capacity: Option<i64>,
    pub opened: Option<i64>,
    pub surface: Option<String>,
    pub roof_type: Option<String>,
    pub extracted_at: Option<String>,
}

impl StadiumRecord {
    /// Cell values in `columns` order; nulls become empty cells
    pub fn to_row(&self, columns: &[&str]) -> Vec<String> {
        columns
            .iter()
            .map(|column| match *column {
                "image" => self.image.clone(),
                "stadium" => self.stadium.clone(),
                "team" => self.team.clone(),
                "location" => self.location.clone(),
                "first_mls_year_in_stadium" => {
                    self.first_mls_year_in_stadium.map(|v| v.to_string())
                }
                "capacity" => self.capacity.map(|v| v.to_string()),
                "opened" => self.opened.map(|v| v.to_string()),
                "surface" => self.surface.clone(),
                "roof_type" => self.roof_type.clone(),
                "extracted_at" => self.extracted_at.clone(),
                _ => None,
            })
            .map(Option::unwrap_or_default)
            .collect()
    }
}
