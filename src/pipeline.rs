use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use std::fs;

use crate::batch::{BatchExtractor, Sleeper};
use crate::config::{ExtractSettings, PipelinePaths};
use crate::llm::ChatCompletion;
use crate::output::{convert_json_to_csv, write_json};
use crate::rows::extract_rows;
use crate::types::ResultSet;
use crate::utils::osc8_file_link;

/// Stored page -> rows -> batched model calls -> JSON -> CSV
pub fn run_extract<C: ChatCompletion, S: Sleeper>(
    client: &C,
    sleeper: S,
    settings: &ExtractSettings,
    paths: &PipelinePaths,
    quiet: bool,
) -> Result<ResultSet> {
    let blob = fs::read_to_string(&paths.raw_html)
        .with_context(|| format!("Failed to read {}", paths.raw_html.display()))?;
    let rows = extract_rows(&blob, &settings.table_selector)?;
    if !quiet {
        println!("Found {} rows", rows.len());
    }

    let extracted_at = settings
        .variant
        .has_timestamp()
        .then(|| Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false));

    tracing::info!(
        variant = settings.variant.as_str(),
        batch_size = settings.batch_size,
        rows = rows.len(),
        "Starting extraction"
    );

    let extractor = BatchExtractor::new(client, sleeper, settings);
    let all_results = extractor.extract_all(&rows, extracted_at.as_deref(), quiet)?;

    write_json(&paths.json, &all_results)?;
    if !quiet {
        println!(
            "Extracted {} stadiums -> {}",
            all_results.len(),
            osc8_file_link(&paths.json, &paths.json.display().to_string())
        );
    }

    let written = convert_json_to_csv(&paths.json, &paths.csv)?;
    if !quiet {
        println!(
            "Wrote CSV with {} rows -> {}",
            written,
            osc8_file_link(&paths.csv, &paths.csv.display().to_string())
        );
    }

    Ok(all_results)
}
