//! Summary of what a run added to the corpus.
//!
//! Mirrors the quick corpus inspection done after scraping: totals, unique
//! sentences, the longest sentences, and a substring search.

use itertools::Itertools;
use tracing::info;

use crate::models::Article;
use crate::utils::truncate_for_log;

const LONGEST_SHOWN: usize = 10;
const SEARCH_SHOWN: usize = 20;

/// One stored sentence and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceRow {
    pub url: String,
    /// 1-based line within the article body.
    pub line: usize,
    pub text: String,
}

impl SentenceRow {
    pub fn chars(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Default)]
pub struct CorpusReport {
    articles: usize,
    total_chars: usize,
    rows: Vec<SentenceRow>,
}

impl CorpusReport {
    /// Account for one article that was written.
    pub fn record(&mut self, article: &Article) {
        self.articles += 1;
        self.total_chars += article.body.chars().count();
        let rows = article
            .body
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .map(|(i, text)| SentenceRow {
                url: article.url.clone(),
                line: i + 1,
                text: text.to_string(),
            });
        self.rows.extend(rows);
    }

    pub fn articles(&self) -> usize {
        self.articles
    }

    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    pub fn total_sentences(&self) -> usize {
        self.rows.len()
    }

    /// Sentences with duplicates removed, first occurrence kept.
    pub fn unique_sentences(&self) -> Vec<&SentenceRow> {
        self.rows.iter().unique_by(|r| r.text.clone()).collect()
    }

    /// The `n` longest unique sentences, longest first.
    pub fn longest(&self, n: usize) -> Vec<&SentenceRow> {
        self.unique_sentences()
            .into_iter()
            .sorted_by(|a, b| b.chars().cmp(&a.chars()))
            .take(n)
            .collect()
    }

    /// Unique sentences containing `needle`, at most `limit`.
    pub fn search(&self, needle: &str, limit: usize) -> Vec<&SentenceRow> {
        self.unique_sentences()
            .into_iter()
            .filter(|r| r.text.contains(needle))
            .take(limit)
            .collect()
    }

    /// Log the summary, plus search hits when a term is given.
    pub fn log_summary(&self, search: Option<&str>) {
        info!(
            articles = self.articles,
            total_chars = self.total_chars,
            total_sentences = self.total_sentences(),
            unique_sentences = self.unique_sentences().len(),
            "Corpus additions"
        );
        for row in self.longest(LONGEST_SHOWN) {
            info!(
                chars = row.chars(),
                url = %row.url,
                sentence = %truncate_for_log(&row.text, 120),
                "Long sentence"
            );
        }
        if let Some(term) = search {
            let hits = self.search(term, SEARCH_SHOWN);
            info!(%term, hits = hits.len(), "Sentence search");
            for row in hits {
                info!(
                    url = %row.url,
                    line = row.line,
                    chars = row.chars(),
                    sentence = %truncate_for_log(&row.text, 120),
                    "Search hit"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceSite;

    fn article(url: &str, body: &str) -> Article {
        Article {
            url: url.to_string(),
            title: "ခေါင်းစဉ်".to_string(),
            body: body.to_string(),
            published_at: None,
            source_site: SourceSite::Voa,
        }
    }

    fn report() -> CorpusReport {
        let mut report = CorpusReport::default();
        report.record(&article("http://site/a", "မြန်မာ စာ။\nတို။"));
        report.record(&article(
            "http://site/b",
            "မြန်မာ စာ။\nရှည်လျားသော မြန်မာ စာကြောင်း တစ်ကြောင်း။",
        ));
        report
    }

    #[test]
    fn test_totals() {
        let report = report();
        assert_eq!(report.articles(), 2);
        assert_eq!(report.total_sentences(), 4);
        assert_eq!(report.unique_sentences().len(), 3);
        assert_eq!(
            report.total_chars(),
            "မြန်မာ စာ။\nတို။".chars().count()
                + "မြန်မာ စာ။\nရှည်လျားသော မြန်မာ စာကြောင်း တစ်ကြောင်း။".chars().count()
        );
    }

    #[test]
    fn test_longest_first() {
        let report = report();
        let longest = report.longest(2);
        assert_eq!(longest[0].text, "ရှည်လျားသော မြန်မာ စာကြောင်း တစ်ကြောင်း။");
        assert_eq!(longest[0].url, "http://site/b");
        assert_eq!(longest[0].line, 2);
        assert_eq!(longest[1].text, "မြန်မာ စာ။");
    }

    #[test]
    fn test_search_deduplicates() {
        let report = report();
        let hits = report.search("မြန်မာ", 20);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "http://site/a");
        assert!(report.search("ဘီဘီစီ", 20).is_empty());
    }
}
