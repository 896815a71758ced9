//! Data models shared by every pipeline stage.
//!
//! - [`SourceSite`]: which news outlet a page belongs to
//! - [`Article`]: the record produced by the parser, cleaned by the normalizer
//!   and appended to the corpus by the writer
//! - [`FetchResult`]: the transient outcome of a single HTTP request

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fetcher::FetchError;

/// A supported Burmese-language news outlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceSite {
    /// BBC News Burmese (`bbc.com/burmese`).
    Bbc,
    /// Voice of America Burmese (`burmese.voanews.com`).
    Voa,
}

impl SourceSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceSite::Bbc => "bbc",
            SourceSite::Voa => "voa",
        }
    }
}

impl fmt::Display for SourceSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single news article.
///
/// Created by [`crate::scrapers::parse`], cleaned by
/// [`crate::normalizer::normalize`] and never modified after that. Only a
/// normalized article is handed to the corpus writer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Article {
    /// The page the article was scraped from.
    pub url: String,
    /// The article headline.
    pub title: String,
    /// The article text, one sentence per line once normalized.
    pub body: String,
    /// Publication timestamp, when the page carried a parseable one.
    pub published_at: Option<DateTime<Utc>>,
    /// The outlet the article belongs to.
    pub source_site: SourceSite,
}

/// Whether a fetch produced a page.
#[derive(Debug)]
pub enum FetchStatus {
    Success,
    Failure(FetchError),
}

/// Outcome of one request made by [`crate::fetcher::Fetcher`].
///
/// `payload` is only present when `status` is [`FetchStatus::Success`].
#[derive(Debug)]
pub struct FetchResult {
    pub url: String,
    pub status: FetchStatus,
    pub payload: Option<String>,
}

impl FetchResult {
    pub fn success(url: &str, html: String) -> Self {
        Self {
            url: url.to_string(),
            status: FetchStatus::Success,
            payload: Some(html),
        }
    }

    pub fn failure(url: &str, error: FetchError) -> Self {
        Self {
            url: url.to_string(),
            status: FetchStatus::Failure(error),
            payload: None,
        }
    }

    /// Collapse the result into the raw HTML or the reason it is missing.
    pub fn into_html(self) -> Result<String, FetchError> {
        match (self.status, self.payload) {
            (FetchStatus::Success, Some(html)) => Ok(html),
            (FetchStatus::Success, None) => Ok(String::new()),
            (FetchStatus::Failure(e), _) => Err(e),
        }
    }
}
