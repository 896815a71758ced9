//! Everything the scraper produces on disk or in the logs.
//!
//! - [`corpus`]: the append-only corpus file and its record formats
//! - [`report`]: end-of-run statistics over the articles written
//!
//! # Output Structure
//!
//! ```text
//! data/
//! └── burmese_corpus.jsonl   # one Article per line (or .txt blocks)
//! ```

pub mod corpus;
pub mod report;
