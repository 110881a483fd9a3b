use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::schema::SchemaMode;
use crate::types::Variant;

pub const SCRAPE_URL: &str = "https://en.wikipedia.org/wiki/List_of_Major_League_Soccer_stadiums";
pub const SCRAPE_USER_AGENT: &str = "Mozilla/5.0 (TextScraper/1.0)";
pub const SCRAPE_TIMEOUT_SECS: u64 = 20;

pub const RAW_HTML_FILE: &str = "data/mlsstadium.txt";
pub const JSON_FILE: &str = "data/mls_stadiums.json";
pub const CSV_FILE: &str = "data/mls_stadiums.csv";

pub const TABLE_SELECTOR: &str = "table.wikitable";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const MAX_TOKENS: u32 = 2000;
pub const TEMPERATURE: f32 = 0.0;

pub const DEFAULT_DELAY_SECS: u64 = 3;
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Chat-completion endpoint settings, loaded from the environment
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl LlmConfig {
    /// Load from `LLM_*` environment variables (a `.env` file is read first if present)
    pub fn from_env() -> Result<Self> {
        if let Some(e) = dotenv_problem(dotenv()) {
            tracing::warn!(error = %e, "Ignoring unreadable .env file");
        }

        let api_key = env::var("LLM_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .context("LLM_API_KEY or OPENAI_API_KEY environment variable must be set")?;

        Ok(Self {
            base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            timeout: Duration::from_secs(
                env::var("LLM_TIMEOUT_SECS")
                    .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
                    .parse()
                    .context("LLM_TIMEOUT_SECS must be a valid number")?,
            ),
        })
    }
}

/// A missing `.env` is normal; any other load failure is worth reporting
fn dotenv_problem<T>(result: dotenvy::Result<T>) -> Option<dotenvy::Error> {
    result.err().filter(|e| !e.not_found())
}

/// Batching, retry and validation knobs for one extraction run
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub variant: Variant,
    pub batch_size: usize,
    pub delay: Duration,
    pub max_retries: u32,
    pub schema_mode: SchemaMode,
    pub table_selector: String,
}

impl ExtractSettings {
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            variant,
            batch_size: variant.default_batch_size(),
            delay: Duration::from_secs(DEFAULT_DELAY_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            schema_mode: SchemaMode::default(),
            table_selector: TABLE_SELECTOR.to_string(),
        }
    }
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self::for_variant(Variant::default())
    }
}

/// Input and output files of a run
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    pub raw_html: PathBuf,
    pub json: PathBuf,
    pub csv: PathBuf,
}

impl Default for PipelinePaths {
    fn default() -> Self {
        Self {
            raw_html: PathBuf::from(RAW_HTML_FILE),
            json: PathBuf::from(JSON_FILE),
            csv: PathBuf::from(CSV_FILE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_follow_variant() {
        let settings = ExtractSettings::for_variant(Variant::RawText);
        assert_eq!(settings.batch_size, 5);
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.delay, Duration::from_secs(3));

        let settings = ExtractSettings::default();
        assert_eq!(settings.variant, Variant::Timestamped);
        assert_eq!(settings.batch_size, 10);
        assert_eq!(settings.table_selector, "table.wikitable");
    }

    #[test]
    fn test_dotenv_problem_ignores_missing_file() {
        let dir = std::env::temp_dir().join(format!("mls-stadiums-env-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("absent.env");
        assert!(dotenv_problem(dotenvy::from_path(&missing)).is_none());

        let malformed = dir.join("malformed.env");
        std::fs::write(&malformed, "this is not valid\n").unwrap();
        assert!(dotenv_problem(dotenvy::from_path(&malformed)).is_some());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
