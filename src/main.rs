//! # Burmese News Corpus
//!
//! Scrapes articles from Burmese-language news sites and appends the cleaned
//! text to a UTF-8 corpus file for downstream NLP work.
//!
//! ## Usage
//!
//! ```sh
//! burmese_news_corpus                       # built-in sources, data/burmese_corpus.jsonl
//! burmese_news_corpus -c scraper.yaml       # sources and thresholds from a file
//! burmese_news_corpus -s bbc --seed-file urls.txt -o bbc.txt -f text
//! ```
//!
//! ## Architecture
//!
//! The application is a single sequential pipeline:
//! 1. **Discovery**: Collect article URLs from seeds, index pages or sitemaps
//! 2. **Fetching**: Download each page once, with a fixed delay between requests
//! 3. **Parsing**: Apply the site's extraction rule to get title, body and date
//! 4. **Normalizing**: Clean the text and reject pages that are not articles
//! 5. **Writing**: Append one record per article to the corpus file
//!
//! Failures on individual URLs are logged and skipped. The process exits with
//! a non-zero code only when it cannot start: bad configuration or an
//! unwritable output path.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod discovery;
mod fetcher;
mod models;
mod normalizer;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;

use cli::Cli;
use config::Config;
use pipeline::Pipeline;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("burmese_news_corpus starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = Config::resolve(&args).inspect_err(|e| {
        error!(error = %e, "Configuration rejected");
    })?;
    info!(
        output = %config.output_path.display(),
        format = ?config.output_format,
        delay_seconds = config.delay_seconds,
        sites = config.sites.len(),
        "Configuration ready"
    );

    // Early check: the corpus file must be appendable before any request.
    let pipeline = Pipeline::new(&config).await.inspect_err(|e| {
        error!(
            path = %config.output_path.display(),
            error = %e,
            "Cannot start pipeline (fix perms or choose a different output path)"
        );
    })?;

    let summary = pipeline.run(&config.sites).await;
    summary.report.log_summary(args.search.as_deref());

    for failure in &summary.failures {
        debug!(url = %failure.url, stage = %failure.stage, reason = %failure.reason, "Failed URL");
    }

    let elapsed = start_time.elapsed();
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        ?elapsed,
        "Execution complete"
    );

    Ok(())
}
