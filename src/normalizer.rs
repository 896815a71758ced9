//! Text cleaning and the content-quality gate.
//!
//! [`normalize`] turns a freshly parsed [`Article`] into the form stored in
//! the corpus: entities decoded, stray markup and URLs removed, boilerplate
//! phrases dropped, non-Burmese characters stripped, Unicode NFC, and the
//! body split into one sentence per line. Pages that end up too short or not
//! mostly Burmese are rejected. Normalizing an already normalized article
//! returns it unchanged.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;
use tracing::{debug, instrument};
use unicode_normalization::UnicodeNormalization;

use crate::models::Article;

/// Myanmar Unicode block.
const MYANMAR_BLOCK: std::ops::RangeInclusive<char> = '\u{1000}'..='\u{109F}';

/// Sentence terminators: section mark and little section mark.
const SENTENCE_ENDS: [char; 2] = ['။', '၊'];

const MAX_PASSES: usize = 16;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<>]*>").unwrap());
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"http\S+|www\.\S+").unwrap());
static NON_BURMESE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\x{1000}-\x{109F} ]+").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Error, PartialEq)]
pub enum RejectedError {
    #[error("body too short: {length} < {minimum} characters")]
    TooShort { length: usize, minimum: usize },
    #[error("title is empty after cleaning")]
    EmptyTitle,
    #[error("body is {ratio:.2} Burmese script, below {minimum:.2}")]
    NotBurmese { ratio: f64, minimum: f64 },
}

/// Normalizer thresholds and boilerplate denylist.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeSettings {
    /// Minimum body length in characters.
    pub min_body_length: usize,
    /// Minimum share of Myanmar-block characters among non-space characters.
    pub min_burmese_ratio: f64,
    /// Replace everything outside the Myanmar block with spaces.
    pub burmese_only: bool,
    pub sentence_min_chars: usize,
    pub sentence_max_chars: usize,
    /// Substrings removed wherever they appear, so entries should be whole
    /// phrases rather than words that also occur in prose.
    pub boilerplate: Vec<String>,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            min_body_length: 200,
            min_burmese_ratio: 0.5,
            burmese_only: true,
            sentence_min_chars: 5,
            sentence_max_chars: 4000,
            boilerplate: default_boilerplate(),
        }
    }
}

/// Navigation, sharing and promo phrases seen on the supported sites.
pub fn default_boilerplate() -> Vec<String> {
    [
        "ဖေ့စ်ဘွတ်ခ်မှာ မျှဝေပါ",
        "ဆက်စပ်သတင်းများ",
        "ဗွီအိုအေ မြန်မာပိုင်း ဖေ့စ်ဘုတ်",
        "ဘီဘီစီ မြန်မာပိုင်း ယူကျု့ချန်နယ်",
        "Share on Facebook",
        "Advertisement",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Clean an article and decide whether it is worth keeping.
#[instrument(level = "debug", skip_all, fields(url = %article.url))]
pub fn normalize(article: Article, settings: &NormalizeSettings) -> Result<Article, RejectedError> {
    let title = fixpoint(&article.title, |t| nfc(&collapse_ws(&strip_markup(t))));
    if title.is_empty() {
        return Err(RejectedError::EmptyTitle);
    }

    let stripped = fixpoint(&article.body, |t| clean_pass(t, settings, false));
    check_ratio(&stripped, settings)?;
    let cleaned = if settings.burmese_only {
        fixpoint(&stripped, |t| clean_pass(t, settings, true))
    } else {
        stripped
    };

    let sentences: Vec<&str> = split_sentences(&cleaned)
        .into_iter()
        .filter(|s| {
            let n = s.chars().count();
            n >= settings.sentence_min_chars && n <= settings.sentence_max_chars
        })
        .collect();
    let body = if sentences.is_empty() {
        cleaned.clone()
    } else {
        sentences.join("\n")
    };

    // Dropping short sentences can change the script mix of what is kept.
    check_ratio(&body, settings)?;
    let length = body.chars().count();
    if length < settings.min_body_length {
        return Err(RejectedError::TooShort {
            length,
            minimum: settings.min_body_length,
        });
    }
    debug!(chars = length, sentences = sentences.len(), "Normalized article");

    Ok(Article {
        title,
        body,
        ..article
    })
}

fn check_ratio(text: &str, settings: &NormalizeSettings) -> Result<(), RejectedError> {
    match burmese_ratio(text) {
        Some(ratio) if ratio < settings.min_burmese_ratio => Err(RejectedError::NotBurmese {
            ratio,
            minimum: settings.min_burmese_ratio,
        }),
        _ => Ok(()),
    }
}

/// Split after every `။` / `၊`, trimming and dropping empty pieces.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if SENTENCE_ENDS.contains(&c) {
            let end = i + c.len_utf8();
            out.push(text[start..end].trim());
            start = end;
        }
    }
    out.push(text[start..].trim());
    out.retain(|s| !s.is_empty());
    out
}

/// Share of Myanmar-block characters among non-whitespace characters, or
/// `None` for blank text.
pub fn burmese_ratio(text: &str) -> Option<f64> {
    let (burmese, total) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(b, t), c| {
            (b + usize::from(MYANMAR_BLOCK.contains(&c)), t + 1)
        });
    (total > 0).then(|| burmese as f64 / total as f64)
}

fn clean_pass(text: &str, settings: &NormalizeSettings, burmese_only: bool) -> String {
    let mut t = strip_markup(text);
    t = URL_RE.replace_all(&t, " ").into_owned();
    for phrase in &settings.boilerplate {
        if !phrase.trim().is_empty() {
            t = t.replace(phrase.as_str(), " ");
        }
    }
    if burmese_only {
        t = NON_BURMESE_RE.replace_all(&t, " ").into_owned();
    }
    nfc(&collapse_ws(&t))
}

fn strip_markup(text: &str) -> String {
    let decoded = decode_entities(text);
    TAG_RE.replace_all(&decoded, " ").into_owned()
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let decoded = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match name {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    "zwnj" => Some('\u{200C}'),
                    "zwj" => Some('\u{200D}'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn collapse_ws(text: &str) -> String {
    WS_RE.replace_all(text, " ").trim().to_string()
}

fn nfc(text: &str) -> String {
    text.nfc().collect()
}

fn fixpoint(text: &str, pass: impl Fn(&str) -> String) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_PASSES {
        let next = pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}
