use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod batch;
mod config;
mod llm;
mod output;
mod pipeline;
mod prompt;
mod rows;
mod schema;
mod scrape;
mod types;
mod utils;

use config::{
    ExtractSettings, LlmConfig, PipelinePaths, CSV_FILE, DEFAULT_DELAY_SECS, DEFAULT_MAX_RETRIES,
    JSON_FILE, RAW_HTML_FILE, SCRAPE_URL, TABLE_SELECTOR,
};
use schema::SchemaMode;
use scrape::ScrapeMode;
use types::Variant;

#[derive(Parser)]
#[command(name = "mls-stadiums")]
#[command(about = "Scrape the Wikipedia MLS stadium table and normalize it with an LLM")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the stadium page to a local file
    Scrape(ScrapeArgs),
    /// Extract stadium records from the stored page (writes JSON and CSV)
    Extract(ExtractArgs),
    /// Convert an extracted JSON file to CSV
    Csv {
        /// JSON file written by `extract`
        #[arg(short, long, default_value = JSON_FILE)]
        input: PathBuf,
        /// CSV file to write
        #[arg(short, long, default_value = CSV_FILE)]
        output: PathBuf,
    },
    /// Scrape, then extract
    Run {
        #[arg(long, default_value = SCRAPE_URL)]
        url: String,
        #[arg(long, value_enum, default_value_t = ScrapeMode::RawHtml)]
        mode: ScrapeMode,
        #[command(flatten)]
        extract: ExtractArgs,
    },
    /// Remove the stored page and generated JSON/CSV files
    Clean,
}

#[derive(Args)]
struct ScrapeArgs {
    /// Page to fetch
    #[arg(long, default_value = SCRAPE_URL)]
    url: String,
    /// Keep the raw HTML or flatten it to annotated text
    #[arg(long, value_enum, default_value_t = ScrapeMode::RawHtml)]
    mode: ScrapeMode,
    /// File to write
    #[arg(short, long, default_value = RAW_HTML_FILE)]
    output: PathBuf,
    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args)]
struct ExtractArgs {
    /// Prompt and payload variant
    #[arg(long, value_enum, default_value_t = Variant::Timestamped)]
    variant: Variant,
    /// Rows per model request (defaults to 5 for raw-text, 10 otherwise)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: Option<u64>,
    /// Pause after every batch, in seconds
    #[arg(long, default_value_t = DEFAULT_DELAY_SECS)]
    delay_secs: u64,
    /// Attempts per batch before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(1..))]
    max_retries: u32,
    /// How to treat records that don't match the expected keys and types
    #[arg(long, value_enum, default_value_t = SchemaMode::Warn)]
    schema: SchemaMode,
    /// CSS selector of the stadium table
    #[arg(long, default_value = TABLE_SELECTOR)]
    selector: String,
    /// Stored page to read
    #[arg(short, long, default_value = RAW_HTML_FILE)]
    input: PathBuf,
    /// JSON output file
    #[arg(long, default_value = JSON_FILE)]
    json: PathBuf,
    /// CSV output file
    #[arg(long, default_value = CSV_FILE)]
    csv: PathBuf,
    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

impl ExtractArgs {
    fn settings(&self) -> ExtractSettings {
        let mut settings = ExtractSettings::for_variant(self.variant);
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size as usize;
        }
        settings.delay = Duration::from_secs(self.delay_secs);
        settings.max_retries = self.max_retries;
        settings.schema_mode = self.schema;
        settings.table_selector = self.selector.clone();
        settings
    }

    fn paths(&self) -> PipelinePaths {
        PipelinePaths {
            raw_html: self.input.clone(),
            json: self.json.clone(),
            csv: self.csv.clone(),
        }
    }
}

fn run_extract(args: &ExtractArgs) -> Result<()> {
    let llm_config = LlmConfig::from_env()?;
    let client = llm::OpenAiClient::new(llm_config).context("Failed to create LLM client")?;
    pipeline::run_extract(
        &client,
        batch::ThreadSleeper,
        &args.settings(),
        &args.paths(),
        args.quiet,
    )?;
    Ok(())
}

fn run_csv(json_path: &Path, csv_path: &Path) -> Result<()> {
    let written = output::convert_json_to_csv(json_path, csv_path)?;
    println!(
        "Wrote CSV with {} rows -> {}",
        written,
        utils::osc8_file_link(csv_path, &csv_path.display().to_string())
    );
    Ok(())
}

fn run_clean() -> Result<()> {
    println!("Cleaning generated files...");

    let defaults = PipelinePaths::default();
    for path in [&defaults.raw_html, &defaults.json, &defaults.csv] {
        if path.exists() {
            fs::remove_file(path)?;
            println!("  Removed {}", path.display());
        }
    }

    println!("Clean complete!");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reqwest=warn,html5ever=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape(args) => scrape::run_scrape(&args.url, args.mode, &args.output, args.quiet),
        Commands::Extract(args) => run_extract(&args),
        Commands::Csv { input, output } => run_csv(&input, &output),
        Commands::Run { url, mode, extract } => {
            scrape::run_scrape(&url, mode, &extract.input, extract.quiet)?;
            run_extract(&extract)
        }
        Commands::Clean => run_clean(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_args_override_variant_defaults() {
        let cli = Cli::try_parse_from([
            "mls-stadiums",
            "extract",
            "--variant",
            "raw-text",
            "--delay-secs",
            "0",
            "--schema",
            "strict",
        ])
        .unwrap();
        let Commands::Extract(args) = cli.command else {
            panic!("expected extract command");
        };
        let settings = args.settings();
        assert_eq!(settings.variant, Variant::RawText);
        assert_eq!(settings.batch_size, 5);
        assert_eq!(settings.delay, Duration::ZERO);
        assert_eq!(settings.schema_mode, SchemaMode::Strict);
        assert_eq!(args.paths().json, PathBuf::from(JSON_FILE));
    }

    #[test]
    fn test_batch_size_must_be_positive() {
        assert!(Cli::try_parse_from(["mls-stadiums", "extract", "--batch-size", "0"]).is_err());
        let cli = Cli::try_parse_from(["mls-stadiums", "run", "--batch-size", "7"]).unwrap();
        let Commands::Run { extract, .. } = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(extract.settings().batch_size, 7);
    }
}
