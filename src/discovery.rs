//! Building the list of article URLs for a site.
//!
//! Three sources are supported, in this order of precedence for a site:
//! explicit seed URLs, an index (listing) page scraped with the site's
//! `index_links` selector, and an XML sitemap. Only the pure parsing lives
//! here; the requests are made by the pipeline so they share its pacing.

use itertools::Itertools;
use quick_xml::Reader;
use quick_xml::events::Event;
use scraper::Html;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::scrapers::{ExtractionRule, ParseError, compile};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    Selector(#[from] ParseError),
    #[error("malformed sitemap: {0}")]
    Sitemap(String),
}

/// `<loc>` entries of a sitemap, split by what they point at.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SitemapEntries {
    /// Pages listed under `<urlset>`.
    pub pages: Vec<String>,
    /// Child sitemaps listed under `<sitemapindex>`.
    pub sitemaps: Vec<String>,
}

/// Article links on an index page, resolved against `index_url`.
///
/// A link counts when it stays on the index page's host and its path starts
/// with the rule's `link_prefix`. Fragments are dropped, duplicates removed
/// keeping first-seen order, and at most `limit` links are returned.
pub fn extract_index_links(
    html: &str,
    index_url: &str,
    rule: &ExtractionRule,
    limit: usize,
) -> Result<Vec<String>, DiscoveryError> {
    let base = Url::parse(index_url).map_err(|source| DiscoveryError::InvalidUrl {
        url: index_url.to_string(),
        source,
    })?;
    let selectors = rule.selectors();
    let anchor = compile(&selectors.index_links)?;
    let document = Html::parse_document(html);

    let links: Vec<String> = document
        .select(&anchor)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|u| u.host_str() == base.host_str() && u.path().starts_with(&selectors.link_prefix))
        .map(|mut u| {
            u.set_fragment(None);
            u.to_string()
        })
        .unique()
        .take(limit)
        .collect();

    debug!(count = links.len(), %index_url, "Extracted index links");
    Ok(links)
}

/// Read every `<loc>` of a `<urlset>` or `<sitemapindex>` document.
pub fn parse_sitemap(xml: &str) -> Result<SitemapEntries, DiscoveryError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = SitemapEntries::default();
    let mut in_sitemap = false;
    let mut loc: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sitemap" => in_sitemap = true,
                b"loc" => loc = Some(String::new()),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"sitemap" => in_sitemap = false,
                b"loc" => {
                    if let Some(value) = loc.take() {
                        let value = value.trim().to_string();
                        if value.is_empty() {
                            continue;
                        }
                        if in_sitemap {
                            entries.sitemaps.push(value);
                        } else {
                            entries.pages.push(value);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let Some(buf) = loc.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(buf) = loc.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::GeneralRef(r)) => {
                if let Some(buf) = loc.as_mut() {
                    buf.push_str(&resolve_entity(&String::from_utf8_lossy(&r)));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DiscoveryError::Sitemap(format!(
                    "at byte {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
    }

    Ok(entries)
}

fn resolve_entity(name: &str) -> String {
    let resolved = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => name
            .strip_prefix("#x")
            .map(|hex| u32::from_str_radix(hex, 16).ok())
            .or_else(|| name.strip_prefix('#').map(|dec| dec.parse::<u32>().ok()))
            .flatten()
            .and_then(char::from_u32),
    };
    resolved.map_or_else(|| format!("&{name};"), String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceSite;
    use pretty_assertions::assert_eq;

    const VOA_INDEX: &str = r#"<html><body>
        <div class="media-block__content"><a href="/a/first/7001.html">ပထမ</a></div>
        <div class="media-block__content"><a href="/a/second/7002.html#comments">ဒုတိယ</a></div>
        <div class="media-block__content"><a href="/a/first/7001.html">ပထမ again</a></div>
        <div class="media-block__content"><a href="/z/4380">topic</a></div>
        <div class="media-block__content"><a href="https://other.example/a/x.html">elsewhere</a></div>
        <div class="sidebar"><a href="/a/sidebar/7003.html">sidebar</a></div>
    </body></html>"#;

    #[test]
    fn test_extract_index_links_filters_and_dedupes() {
        let rule = ExtractionRule::for_site(SourceSite::Voa);
        let links =
            extract_index_links(VOA_INDEX, "https://burmese.voanews.com/z/4380", &rule, 100)
                .unwrap();
        assert_eq!(
            links,
            vec![
                "https://burmese.voanews.com/a/first/7001.html".to_string(),
                "https://burmese.voanews.com/a/second/7002.html".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_index_links_respects_limit() {
        let rule = ExtractionRule::for_site(SourceSite::Voa);
        let links =
            extract_index_links(VOA_INDEX, "https://burmese.voanews.com/z/4380", &rule, 1).unwrap();
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_extract_index_links_bbc_prefix() {
        let html = r#"<a href="/burmese/articles/c1">a</a><a href="/burmese/topics/x">t</a>
            <a href="https://www.bbc.com/burmese/articles/c2">b</a>"#;
        let rule = ExtractionRule::for_site(SourceSite::Bbc);
        let links = extract_index_links(html, "https://www.bbc.com/burmese", &rule, 10).unwrap();
        assert_eq!(
            links,
            vec![
                "https://www.bbc.com/burmese/articles/c1".to_string(),
                "https://www.bbc.com/burmese/articles/c2".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_index_links_bad_base_url() {
        let rule = ExtractionRule::for_site(SourceSite::Voa);
        assert!(matches!(
            extract_index_links(VOA_INDEX, "not a url", &rule, 10),
            Err(DiscoveryError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_parse_sitemap_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://burmese.voanews.com/a/1.html</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc> https://burmese.voanews.com/a/2.html?x=1&amp;y=2 </loc></url>
  <url><loc></loc></url>
</urlset>"#;
        let entries = parse_sitemap(xml).unwrap();
        assert_eq!(
            entries.pages,
            vec![
                "https://burmese.voanews.com/a/1.html".to_string(),
                "https://burmese.voanews.com/a/2.html?x=1&y=2".to_string(),
            ]
        );
        assert!(entries.sitemaps.is_empty());
    }

    #[test]
    fn test_parse_sitemap_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://www.bbc.com/burmese/sitemap-1.xml</loc></sitemap>
</sitemapindex>"#;
        let entries = parse_sitemap(xml).unwrap();
        assert!(entries.pages.is_empty());
        assert_eq!(entries.sitemaps, vec!["https://www.bbc.com/burmese/sitemap-1.xml".to_string()]);
    }

    #[test]
    fn test_parse_sitemap_malformed() {
        assert!(matches!(
            parse_sitemap("<urlset><url><loc>x</url></urlset>"),
            Err(DiscoveryError::Sitemap(_))
        ));
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("amp"), "&");
        assert_eq!(resolve_entity("#x41"), "A");
        assert_eq!(resolve_entity("#4096"), "က");
        assert_eq!(resolve_entity("nope"), "&nope;");
    }
}
