//! Command-line interface definitions.
//!
//! Every flag is optional: with no arguments the scraper runs the built-in
//! configuration (VOA and BBC index pages) and appends to
//! `data/burmese_corpus.jsonl`. Flags override values from `--config`.

use clap::Parser;
use std::path::PathBuf;

use crate::models::SourceSite;
use crate::outputs::corpus::OutputFormat;

/// Command-line arguments for the corpus scraper.
///
/// # Examples
///
/// ```sh
/// # Built-in sources and defaults
/// burmese_news_corpus
///
/// # One site, explicit article URLs, plain text output
/// burmese_news_corpus -s voa -u https://burmese.voanews.com/a/7512345.html \
///     -o corpus.txt --format text
///
/// # Everything from a config file, searching the new sentences afterwards
/// burmese_news_corpus -c scraper.yaml --search မြန်မာ
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "CORPUS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only scrape this site
    #[arg(short, long, value_enum)]
    pub site: Option<SourceSite>,

    /// Article URL to scrape instead of discovering links (repeatable)
    #[arg(short = 'u', long = "url", requires = "site")]
    pub urls: Vec<String>,

    /// File with one article URL per line (`#` starts a comment)
    #[arg(long, requires = "site")]
    pub seed_file: Option<PathBuf>,

    /// Corpus file to append to
    #[arg(short, long, env = "CORPUS_OUTPUT_PATH")]
    pub output_path: Option<PathBuf>,

    /// Record format of the corpus file
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Pause between consecutive requests, in seconds
    #[arg(short, long)]
    pub delay_seconds: Option<f64>,

    /// Minimum body length in characters after cleaning
    #[arg(long)]
    pub min_body_length: Option<usize>,

    /// User-Agent header sent with every request
    #[arg(long, env = "CORPUS_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Maximum article links taken from an index page or sitemap per site
    #[arg(long)]
    pub max_articles: Option<usize>,

    /// Show stored sentences containing this text after the run
    #[arg(long)]
    pub search: Option<String>,
}
