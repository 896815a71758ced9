//! Site-specific article extraction.
//!
//! Every supported outlet is described by an [`ExtractionRule`]: a tagged
//! variant keyed by site that carries the CSS selectors for the logical
//! fields of an article page. All pages go through the single [`parse`]
//! entry point, which dispatches on the variant for the few places where the
//! sites genuinely differ (which paragraphs count as article text).
//!
//! # Supported Sources
//!
//! | Source | Module | Index page |
//! |--------|--------|------------|
//! | VOA Burmese | [`voa`] | topic listing, links under `/a/` |
//! | BBC News Burmese | [`bbc`] | front page, links under `/burmese/articles/` |
//!
//! Selectors are data: any of them can be overridden from the config file
//! without touching the code in this module.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::models::{Article, SourceSite};

pub mod bbc;
pub mod voa;

/// A logical article field located by a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Body,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Title => f.write_str("title"),
            Field::Body => f.write_str("body"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    /// A required selector matched nothing (or, for the title, only blank text).
    #[error("missing field: {0}")]
    MissingField(Field),
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// CSS selectors for one site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Selectors {
    /// Headline element; the first match wins.
    pub title: String,
    /// Article text elements; every match contributes one line.
    pub body: String,
    /// Publication date element; the first match wins.
    pub date: String,
    /// Attribute of the date element holding a machine-readable timestamp.
    pub date_attr: String,
    /// Anchors on the index page that point at articles.
    pub index_links: String,
    /// Path prefix an index link must have to count as an article.
    pub link_prefix: String,
}

/// Partial [`Selectors`], as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorOverrides {
    pub title: Option<String>,
    pub body: Option<String>,
    pub date: Option<String>,
    pub date_attr: Option<String>,
    pub index_links: Option<String>,
    pub link_prefix: Option<String>,
}

/// Extraction configuration for a site, keyed by the site itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionRule {
    Voa(Selectors),
    Bbc(Selectors),
}

impl ExtractionRule {
    /// The built-in rule for `site`.
    pub fn for_site(site: SourceSite) -> Self {
        match site {
            SourceSite::Voa => ExtractionRule::Voa(voa::selectors()),
            SourceSite::Bbc => ExtractionRule::Bbc(bbc::selectors()),
        }
    }

    pub fn site(&self) -> SourceSite {
        match self {
            ExtractionRule::Voa(_) => SourceSite::Voa,
            ExtractionRule::Bbc(_) => SourceSite::Bbc,
        }
    }

    pub fn selectors(&self) -> &Selectors {
        match self {
            ExtractionRule::Voa(s) | ExtractionRule::Bbc(s) => s,
        }
    }

    /// Replace any selector the overrides specify, keeping the rest.
    pub fn with_overrides(mut self, overrides: &SelectorOverrides) -> Self {
        let s = match &mut self {
            ExtractionRule::Voa(s) | ExtractionRule::Bbc(s) => s,
        };
        let pairs = [
            (&mut s.title, &overrides.title),
            (&mut s.body, &overrides.body),
            (&mut s.date, &overrides.date),
            (&mut s.date_attr, &overrides.date_attr),
            (&mut s.index_links, &overrides.index_links),
            (&mut s.link_prefix, &overrides.link_prefix),
        ];
        for (slot, value) in pairs {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }
        self
    }

    /// Check that every selector compiles.
    pub fn validate(&self) -> Result<(), ParseError> {
        let s = self.selectors();
        for css in [&s.title, &s.body, &s.date, &s.index_links] {
            compile(css)?;
        }
        Ok(())
    }

    fn is_article_paragraph(&self, el: &ElementRef<'_>) -> bool {
        match self {
            ExtractionRule::Voa(_) => voa::is_article_paragraph(el),
            ExtractionRule::Bbc(_) => bbc::is_article_paragraph(el),
        }
    }
}

pub(crate) fn compile(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::InvalidSelector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// Concatenated text of an element with whitespace collapsed.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// True if `el` sits inside an element with one of `names` as tag name or
/// one of `classes` as class.
pub(crate) fn has_ancestor(el: &ElementRef<'_>, names: &[&str], classes: &[&str]) -> bool {
    el.ancestors().filter_map(ElementRef::wrap).any(|a| {
        let v = a.value();
        names.contains(&v.name()) || v.classes().any(|c| classes.contains(&c))
    })
}

/// Parse a timestamp as published by the supported sites.
///
/// Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Extract an [`Article`] from a page using the site's rule.
///
/// Missing title or body is an error; a missing or unparseable date is not
/// and leaves `published_at` empty. The body is returned as found, one line
/// per matched element; cleaning is the normalizer's job.
#[instrument(level = "debug", skip(html, rule), fields(site = %rule.site()))]
pub fn parse(html: &str, url: &str, rule: &ExtractionRule) -> Result<Article, ParseError> {
    let selectors = rule.selectors();
    let title_selector = compile(&selectors.title)?;
    let body_selector = compile(&selectors.body)?;
    let date_selector = compile(&selectors.date)?;

    let document = Html::parse_document(html);

    let title = document
        .select(&title_selector)
        .next()
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
        .ok_or(ParseError::MissingField(Field::Title))?;

    let paragraphs: Vec<String> = document
        .select(&body_selector)
        .filter(|el| rule.is_article_paragraph(el))
        .map(|el| element_text(&el))
        .collect();
    if paragraphs.is_empty() {
        return Err(ParseError::MissingField(Field::Body));
    }
    let body = paragraphs
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let published_at = document.select(&date_selector).next().and_then(|el| {
        el.value()
            .attr(&selectors.date_attr)
            .and_then(parse_timestamp)
            .or_else(|| parse_timestamp(&element_text(&el)))
    });
    if published_at.is_none() {
        debug!(%url, "No usable publication date");
    }

    Ok(Article {
        url: url.to_string(),
        title,
        body,
        published_at,
        source_site: rule.site(),
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::{BBC_ARTICLE, VOA_ARTICLE};
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_voa_article() {
        let rule = ExtractionRule::for_site(SourceSite::Voa);
        let article = parse(VOA_ARTICLE, "https://burmese.voanews.com/a/1.html", &rule).unwrap();

        assert_eq!(article.title, "မြန်မာ့ စီးပွားရေး အခြေအနေ");
        assert_eq!(
            article.body,
            "ရန်ကုန်မြို့တွင် ယနေ့ ဈေးနှုန်းများ မြင့်တက်လာခဲ့သည်။ ကုန်သည်များက စိုးရိမ်ကြောင်း ပြောသည်။\n\
             အစိုးရက အရေးပေါ် အစီအမံများ ချမှတ်မည်ဟု ကြေညာခဲ့သည်။"
        );
        assert_eq!(
            article.published_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap())
        );
        assert_eq!(article.source_site, SourceSite::Voa);
    }

    #[test]
    fn test_parse_bbc_article_skips_captions_and_related_links() {
        let rule = ExtractionRule::for_site(SourceSite::Bbc);
        let article = parse(BBC_ARTICLE, "https://www.bbc.com/burmese/articles/x", &rule).unwrap();

        assert_eq!(article.title, "မိုးရာသီ ရောက်ရှိလာပြီ");
        assert_eq!(
            article.body,
            "မြန်မာနိုင်ငံ အနှံ့ မိုးစတင် ရွာသွန်းနေပြီ ဖြစ်သည်။\nလယ်သမားများ စိုက်ပျိုးရေး စတင်ကြသည်။"
        );
        assert_eq!(
            article.published_at,
            Some(Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_missing_body_is_missing_field() {
        let html = r#"<html><body><h1 class="title">ခေါင်းစဉ်</h1><p>no wsw container</p></body></html>"#;
        let rule = ExtractionRule::for_site(SourceSite::Voa);
        assert_eq!(
            parse(html, "http://site/a", &rule),
            Err(ParseError::MissingField(Field::Body))
        );
    }

    #[test]
    fn test_parse_missing_or_blank_title_is_missing_field() {
        let rule = ExtractionRule::for_site(SourceSite::Voa);
        let no_title = r#"<div class="wsw"><p>စာ</p></div>"#;
        assert_eq!(
            parse(no_title, "http://site/a", &rule),
            Err(ParseError::MissingField(Field::Title))
        );

        let blank_title = r#"<h1 class="title">   </h1><div class="wsw"><p>စာ</p></div>"#;
        assert_eq!(
            parse(blank_title, "http://site/a", &rule),
            Err(ParseError::MissingField(Field::Title))
        );
    }

    #[test]
    fn test_parse_unparseable_date_keeps_article() {
        let html = r#"<h1 class="title">ခေါင်းစဉ်</h1>
            <time datetime="yesterday">မနေ့က</time>
            <div class="wsw"><p>စာကိုယ်</p></div>"#;
        let rule = ExtractionRule::for_site(SourceSite::Voa);
        let article = parse(html, "http://site/a", &rule).unwrap();
        assert_eq!(article.published_at, None);
        assert_eq!(article.body, "စာကိုယ်");
    }

    #[test]
    fn test_parse_whitespace_body_is_not_a_parse_error() {
        let html = r#"<h1 class="title">ခေါင်းစဉ်</h1><div class="wsw"><p>   </p></div>"#;
        let rule = ExtractionRule::for_site(SourceSite::Voa);
        let article = parse(html, "http://site/a", &rule).unwrap();
        assert_eq!(article.body, "");
    }

    #[test]
    fn test_parse_invalid_selector() {
        let rule = ExtractionRule::for_site(SourceSite::Bbc).with_overrides(&SelectorOverrides {
            body: Some("p[[".to_string()),
            ..Default::default()
        });
        assert!(matches!(
            parse(BBC_ARTICLE, "http://site/a", &rule),
            Err(ParseError::InvalidSelector { .. })
        ));
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_with_overrides_keeps_unset_selectors() {
        let rule = ExtractionRule::for_site(SourceSite::Voa).with_overrides(&SelectorOverrides {
            title: Some("h2".to_string()),
            ..Default::default()
        });
        assert_eq!(rule.selectors().title, "h2");
        assert_eq!(rule.selectors().body, voa::selectors().body);
        assert_eq!(rule.site(), SourceSite::Voa);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-02T03:04:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 03:04"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T03:04:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-01-02"),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("၁၅ ဇွန်"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
