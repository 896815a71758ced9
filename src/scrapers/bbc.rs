//! BBC News Burmese (`bbc.com/burmese`).
//!
//! The front page links to articles under `/burmese/articles/`. Article
//! pages render every block inside `<main>`; captions, related-content
//! blocks and navigation all use `<p>` as well and are skipped.

use scraper::ElementRef;

use super::{Selectors, has_ancestor};

pub const INDEX_URL: &str = "https://www.bbc.com/burmese";

pub fn selectors() -> Selectors {
    Selectors {
        title: "main h1".to_string(),
        body: "main p".to_string(),
        date: "time[datetime]".to_string(),
        date_attr: "datetime".to_string(),
        index_links: "a[href]".to_string(),
        link_prefix: "/burmese/articles/".to_string(),
    }
}

pub(super) fn is_article_paragraph(el: &ElementRef<'_>) -> bool {
    if has_ancestor(el, &["figure", "figcaption", "aside", "nav", "footer"], &[]) {
        return false;
    }
    !el.ancestors().filter_map(ElementRef::wrap).any(|a| {
        matches!(
            a.value().attr("data-component"),
            Some("links-block" | "topic-list" | "byline-block")
        )
    })
}
