//! VOA Burmese (`burmese.voanews.com`).
//!
//! Topic listings link to articles with relative URLs such as
//! `/a/some-slug/7512345.html`. Article text lives in `div.wsw`; photo
//! blocks and embedded media inside that container carry their own `<p>`
//! captions, which are not article text.

use scraper::ElementRef;

use super::{Selectors, has_ancestor};

/// Burmese news topic listing.
pub const INDEX_URL: &str = "https://burmese.voanews.com/z/4380";

pub fn selectors() -> Selectors {
    Selectors {
        title: "h1.title, h1.pg-title".to_string(),
        body: "div.wsw p".to_string(),
        date: "time[datetime]".to_string(),
        date_attr: "datetime".to_string(),
        index_links: "div.media-block__content a[href]".to_string(),
        link_prefix: "/a/".to_string(),
    }
}

pub(super) fn is_article_paragraph(el: &ElementRef<'_>) -> bool {
    !has_ancestor(
        el,
        &["figure", "figcaption", "aside"],
        &["media-pholder", "wsw__embed", "media-download"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn test_default_selectors_compile() {
        let s = selectors();
        for css in [&s.title, &s.body, &s.date, &s.index_links] {
            assert!(Selector::parse(css).is_ok(), "{css}");
        }
    }

    #[test]
    fn test_embed_paragraphs_are_skipped() {
        let doc = Html::parse_fragment(
            r#"<div class="wsw"><p id="keep">စာ</p><div class="wsw__embed"><p id="drop">embed</p></div></div>"#,
        );
        let p = Selector::parse("p").unwrap();
        let kept: Vec<_> = doc
            .select(&p)
            .filter(|el| is_article_paragraph(el))
            .filter_map(|el| el.value().id())
            .collect();
        assert_eq!(kept, vec!["keep"]);
    }
}
