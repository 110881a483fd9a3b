//! Batched extraction with bounded retry and a fixed inter-batch delay

use anyhow::Result;
use serde_json::Value;
use std::time::Duration;

use crate::config::ExtractSettings;
use crate::llm::{extract_json_array, ChatCompletion, ChatMessage, ExtractError};
use crate::prompt::build_messages;
use crate::schema::{check_batch, SchemaMode};
use crate::types::{RawRow, ResultSet};

/// Blocking pause between attempts and between batches
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Wait after failed attempt `attempt` (zero-based)
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Row index ranges of each batch: `ceil(len / batch_size)` contiguous chunks
pub fn batch_ranges(len: usize, batch_size: usize) -> Vec<(usize, usize)> {
    let batch_size = batch_size.max(1);
    (0..len)
        .step_by(batch_size)
        .map(|start| (start, (start + batch_size).min(len)))
        .collect()
}

pub struct BatchExtractor<'a, C: ChatCompletion, S: Sleeper> {
    client: &'a C,
    sleeper: S,
    settings: &'a ExtractSettings,
}

impl<'a, C: ChatCompletion, S: Sleeper> BatchExtractor<'a, C, S> {
    pub fn new(client: &'a C, sleeper: S, settings: &'a ExtractSettings) -> Self {
        Self {
            client,
            sleeper,
            settings,
        }
    }

    /// One request: call the model, slice out the JSON array, optionally check its shape
    fn attempt(&self, messages: &[ChatMessage]) -> Result<Vec<Value>, ExtractError> {
        let text = self.client.complete(messages)?;
        let records = extract_json_array(&text)?;

        if self.settings.schema_mode != SchemaMode::Off {
            if let Some(problems) = check_batch(&records, self.settings.variant.fields()) {
                if self.settings.schema_mode == SchemaMode::Strict {
                    return Err(ExtractError::Schema(problems));
                }
                tracing::warn!(%problems, "Model output does not match the record schema");
            }
        }

        Ok(records)
    }

    /// Send one batch, retrying up to `max_retries` attempts with `2^attempt` second waits.
    /// The last error is returned once attempts run out.
    pub fn call_with_retry(&self, messages: &[ChatMessage]) -> Result<Vec<Value>, ExtractError> {
        let max_retries = self.settings.max_retries.max(1);
        let mut attempt = 0;
        loop {
            match self.attempt(messages) {
                Ok(records) => return Ok(records),
                Err(e) if attempt + 1 >= max_retries => return Err(e),
                Err(e) => {
                    let wait = backoff(attempt);
                    tracing::warn!(error = %e, attempt, wait_secs = wait.as_secs(), "Batch failed, retrying");
                    self.sleeper.sleep(wait);
                    attempt += 1;
                }
            }
        }
    }

    /// Extract every row, one batch at a time, in row order
    pub fn extract_all(
        &self,
        rows: &[RawRow],
        extracted_at: Option<&str>,
        quiet: bool,
    ) -> Result<ResultSet> {
        let mut all_results = ResultSet::new();

        for (start, end) in batch_ranges(rows.len(), self.settings.batch_size) {
            if !quiet {
                println!("Processing rows {}-{}...", start + 1, end);
            }

            let messages = build_messages(self.settings.variant, &rows[start..end], extracted_at)?;
            let outcome = self.call_with_retry(&messages);

            self.sleeper.sleep(self.settings.delay);

            all_results.extend(outcome?);
        }

        Ok(all_results)
    }
}
