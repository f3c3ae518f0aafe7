use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use food_ingest::logging;
use food_ingest::{
    IngestConfig, IngestError, IngestionPipeline, MemoryStore, OffClient, PageSource, PgStore,
    ProductStore, RateLimiter, RecordTransformer, RunOutcome, RunSummary,
};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser, Debug)]
#[command(name = "food-ingest", version)]
#[command(about = "Fetch and store food product data from OpenFoodFacts")]
#[command(after_help = "Examples:
  food-ingest \"coca cola\"
  food-ingest \"chocolate cookies\" --max-pages 5
  food-ingest \"organic milk\" --verbose")]
struct Cli {
    /// Search terms to find products (e.g. 'coca cola', 'chocolate')
    #[arg(value_parser = non_empty)]
    search_terms: String,

    /// Maximum number of pages to fetch (default: all pages)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_pages: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Fetch and transform without writing to the database
    #[arg(long)]
    dry_run: bool,

    /// File that receives a copy of every log line
    #[arg(long, default_value = logging::DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Log to stderr only
    #[arg(long)]
    no_log_file: bool,
}

fn non_empty(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        Err("search terms cannot be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_file = (!cli.no_log_file).then_some(cli.log_file.as_path());
    logging::init(cli.verbose, log_file);

    log::info!("Starting food-ingest for search: '{}'", cli.search_terms);

    match run(&cli).await {
        Ok(summary) if summary.is_success() => {
            log::info!("Food Facts database loaded!");
            ExitCode::SUCCESS
        }
        Ok(summary) => {
            match &summary.outcome {
                RunOutcome::Aborted { page, error } => {
                    log::error!("Stopped at page {}: {}", page, error)
                }
                RunOutcome::Completed => {
                    log::error!("{} products could not be saved", summary.failed)
                }
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("Application error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<RunSummary, IngestError> {
    let config = IngestConfig::from_env()?;
    let source = OffClient::new(config.fetch.clone(), RateLimiter::new(config.fetch.rate_limit))?;
    let transformer = RecordTransformer::new(config.normalizer());

    if cli.dry_run {
        log::info!("Dry run: products will not be persisted");
        return Ok(ingest(cli, source, transformer, MemoryStore::new()).await);
    }

    let store = PgStore::connect(config.require_database_url()?, config.pool_size)?;
    Ok(ingest(cli, source, transformer, store).await)
}

async fn ingest<P, S>(cli: &Cli, source: P, transformer: RecordTransformer, store: S) -> RunSummary
where
    P: PageSource,
    S: ProductStore,
{
    // log lines and a redrawn bar do not mix well
    let progress = if cli.verbose {
        ProgressBar::hidden()
    } else {
        progress_bar()
    };

    IngestionPipeline::new(source, transformer, store, &cli.search_terms)
        .with_max_pages(cli.max_pages)
        .with_progress(progress)
        .run()
        .await
}

fn progress_bar() -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} Saving products [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    ProgressBar::no_length().with_style(style)
}
