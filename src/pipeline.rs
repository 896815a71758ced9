//! The pipeline driver.
//!
//! URLs are processed strictly one after another. Each URL walks the state
//! machine
//!
//! ```text
//! Pending -> Fetched -> Parsed -> Normalized -> Written
//!    \          \          \           \
//!     +----------+----------+-----------+--> Failed(stage, reason)
//! ```
//!
//! A failure at any stage is logged and the driver moves on to the next URL;
//! per-URL problems never end the run. Consecutive outbound requests,
//! including index and sitemap requests, are separated by a fixed delay.

use itertools::Itertools;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::{Config, SiteConfig};
use crate::discovery::{extract_index_links, parse_sitemap};
use crate::fetcher::{FetchError, Fetcher};
use crate::models::Article;
use crate::normalizer::{NormalizeSettings, RejectedError, normalize};
use crate::outputs::corpus::{CorpusWriter, WriteError};
use crate::outputs::report::CorpusReport;
use crate::scrapers::{ExtractionRule, ParseError, parse};
use crate::utils::truncate_for_log;

/// Nested sitemaps are followed this many levels below the configured one.
const MAX_SITEMAP_DEPTH: usize = 1;

/// Errors that stop the run before any URL is processed.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Output(#[from] WriteError),
    #[error("cannot build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Pipeline stage a URL failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Parse,
    Normalize,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Normalize => "normalize",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

/// Why a single URL did not make it into the corpus.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("rejected: {0}")]
    Rejected(#[from] RejectedError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Fetch(_) => Stage::Fetch,
            StageError::Parse(_) => Stage::Parse,
            StageError::Rejected(_) => Stage::Normalize,
            StageError::Write(_) => Stage::Write,
        }
    }
}

/// Progress of one URL through the pipeline.
#[derive(Debug)]
pub enum UrlState {
    Pending,
    Fetched(String),
    Parsed(Article),
    Normalized(Article),
    Written(Article),
    Failed(StageError),
}

impl UrlState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UrlState::Written(_) | UrlState::Failed(_))
    }

    fn name(&self) -> &'static str {
        match self {
            UrlState::Pending => "pending",
            UrlState::Fetched(_) => "fetched",
            UrlState::Parsed(_) => "parsed",
            UrlState::Normalized(_) => "normalized",
            UrlState::Written(_) => "written",
            UrlState::Failed(_) => "failed",
        }
    }
}

/// A URL that ended in [`UrlState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub url: String,
    pub stage: Stage,
    pub reason: String,
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<Failure>,
    pub report: CorpusReport,
}

/// Fixed pause between consecutive requests.
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    requested: bool,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            requested: false,
        }
    }

    /// Call before every request; sleeps unless this is the first one.
    pub async fn wait(&mut self) {
        if self.requested && !self.delay.is_zero() {
            debug!(delay = ?self.delay, "Politeness delay");
            sleep(self.delay).await;
        }
        self.requested = true;
    }
}

/// Sequential fetch → parse → normalize → write driver.
pub struct Pipeline {
    fetcher: Fetcher,
    writer: CorpusWriter,
    settings: NormalizeSettings,
    pacer: Pacer,
    max_articles: usize,
    summary: RunSummary,
}

impl Pipeline {
    /// Build the HTTP client and open the corpus file.
    ///
    /// Fails if the output path cannot be written.
    pub async fn new(config: &Config) -> Result<Self, SetupError> {
        let fetcher = Fetcher::new(&config.user_agent, config.timeout())?;
        let writer = CorpusWriter::open(&config.output_path, config.output_format).await?;
        Ok(Self::with_parts(
            fetcher,
            writer,
            config.normalize_settings(),
            config.delay(),
            config.max_articles,
        ))
    }

    pub fn with_parts(
        fetcher: Fetcher,
        writer: CorpusWriter,
        settings: NormalizeSettings,
        delay: Duration,
        max_articles: usize,
    ) -> Self {
        Self {
            fetcher,
            writer,
            settings,
            pacer: Pacer::new(delay),
            max_articles,
            summary: RunSummary::default(),
        }
    }

    /// Discover and process every configured site, then report.
    #[instrument(level = "info", skip_all, fields(sites = sites.len()))]
    pub async fn run(mut self, sites: &[SiteConfig]) -> RunSummary {
        let started = Instant::now();
        for site in sites {
            let rule = site.rule();
            let urls = self.discover(site, &rule).await;
            info!(site = %site.site, count = urls.len(), "Processing articles");
            self.run_urls(&urls, &rule).await;
        }
        info!(
            succeeded = self.summary.succeeded,
            failed = self.summary.failed,
            output = %self.writer.path().display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Run finished"
        );
        self.summary
    }

    /// The URLs to process for `site`: its seeds, or links found on its
    /// index page and sitemap.
    #[instrument(level = "info", skip_all, fields(site = %site.site))]
    pub async fn discover(&mut self, site: &SiteConfig, rule: &ExtractionRule) -> Vec<String> {
        if !site.seeds.is_empty() {
            return site.seeds.iter().unique().cloned().collect();
        }

        let mut urls = Vec::new();
        if let Some(index_url) = &site.index_url {
            self.pacer.wait().await;
            let links = self
                .fetcher
                .fetch(index_url)
                .await
                .into_html()
                .map_err(|e| e.to_string())
                .and_then(|html| {
                    extract_index_links(&html, index_url, rule, self.max_articles)
                        .map_err(|e| e.to_string())
                });
            match links {
                Ok(links) => {
                    info!(%index_url, count = links.len(), "Indexed article URLs");
                    urls.extend(links);
                }
                Err(e) => error!(%index_url, error = %e, "Index page unusable; skipping"),
            }
        }
        if let Some(sitemap_url) = &site.sitemap_url {
            let prefix = &rule.selectors().link_prefix;
            self.collect_sitemap(sitemap_url, prefix, &mut urls).await;
        }

        urls.into_iter().unique().take(self.max_articles).collect()
    }

    async fn collect_sitemap(&mut self, sitemap_url: &str, prefix: &str, urls: &mut Vec<String>) {
        let mut queue = VecDeque::from([(sitemap_url.to_string(), 0usize)]);
        while let Some((url, depth)) = queue.pop_front() {
            if urls.len() >= self.max_articles {
                break;
            }
            self.pacer.wait().await;
            let entries = match self.fetcher.fetch(&url).await.into_html() {
                Ok(xml) => parse_sitemap(&xml).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            let entries = match entries {
                Ok(entries) => entries,
                Err(e) => {
                    error!(sitemap = %url, error = %e, "Sitemap unusable; skipping");
                    continue;
                }
            };
            let before = urls.len();
            urls.extend(
                entries
                    .pages
                    .into_iter()
                    .filter(|page| {
                        Url::parse(page)
                            .map(|u| u.path().starts_with(prefix))
                            .unwrap_or(false)
                    })
                    .take(self.max_articles.saturating_sub(before)),
            );
            info!(sitemap = %url, added = urls.len() - before, "Read sitemap");
            if depth < MAX_SITEMAP_DEPTH {
                queue.extend(entries.sitemaps.into_iter().map(|s| (s, depth + 1)));
            }
        }
    }

    /// Process `urls` in order with the given rule.
    pub async fn run_urls(&mut self, urls: &[String], rule: &ExtractionRule) {
        let total = urls.len();
        for (i, url) in urls.iter().enumerate() {
            info!(index = i + 1, total, %url, "Scraping");
            self.pacer.wait().await;
            match self.process(url, rule).await {
                UrlState::Written(article) => {
                    self.summary.succeeded += 1;
                    self.summary.report.record(&article);
                    info!(%url, chars = article.body.chars().count(), "Article written");
                }
                UrlState::Failed(e) => {
                    let stage = e.stage();
                    warn!(%url, %stage, error = %e, "URL failed; moving on");
                    self.summary.failed += 1;
                    self.summary.failures.push(Failure {
                        url: url.clone(),
                        stage,
                        reason: e.to_string(),
                    });
                }
                other => error!(%url, state = other.name(), "Stopped in a non-terminal state"),
            }
        }
    }

    /// Drive one URL to a terminal state.
    #[instrument(level = "debug", skip(self, rule))]
    pub async fn process(&mut self, url: &str, rule: &ExtractionRule) -> UrlState {
        let mut state = UrlState::Pending;
        while !state.is_terminal() {
            state = self.step(url, rule, state).await;
            debug!(state = state.name(), "Transition");
        }
        state
    }

    async fn step(&mut self, url: &str, rule: &ExtractionRule, state: UrlState) -> UrlState {
        match state {
            UrlState::Pending => match self.fetcher.fetch(url).await.into_html() {
                Ok(html) => UrlState::Fetched(html),
                Err(e) => UrlState::Failed(e.into()),
            },
            UrlState::Fetched(html) => match parse(&html, url, rule) {
                Ok(article) => UrlState::Parsed(article),
                Err(e) => UrlState::Failed(e.into()),
            },
            UrlState::Parsed(article) => match normalize(article, &self.settings) {
                Ok(article) => UrlState::Normalized(article),
                Err(e) => UrlState::Failed(e.into()),
            },
            UrlState::Normalized(article) => match self.write_with_retry(&article) {
                Ok(()) => UrlState::Written(article),
                Err(e) => UrlState::Failed(e.into()),
            },
            terminal => terminal,
        }
    }

    /// A write failure is retried once before giving up on the URL.
    fn write_with_retry(&mut self, article: &Article) -> Result<(), WriteError> {
        let writer = &mut self.writer;
        retry_once(
            || writer.write(article),
            |e| {
                warn!(
                    url = %article.url,
                    title = %truncate_for_log(&article.title, 60),
                    error = %e,
                    "Write failed; retrying once"
                );
            },
        )
    }
}

/// Run `attempt`, and run it a second time if the first call fails.
fn retry_once<T, E>(
    mut attempt: impl FnMut() -> Result<T, E>,
    on_failure: impl FnOnce(&E),
) -> Result<T, E> {
    attempt().or_else(|e| {
        on_failure(&e);
        attempt()
    })
}
