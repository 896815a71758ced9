//! Append-only corpus file.
//!
//! Every [`CorpusWriter::write`] call opens the file in append mode, writes
//! one fully rendered record with a single `write_all`, flushes and syncs,
//! and drops the handle before returning. If any of that fails, the file is
//! cut back to its previous length, so a failed write leaves no fragment
//! behind and earlier records are never touched.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::models::Article;
use crate::utils::ensure_writable_dir;

/// On-disk record layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line.
    #[default]
    Jsonl,
    /// Title line, body lines, then a blank line.
    Text,
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("output path {} is not writable: {source}", .path.display())]
    Unwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Sole owner of write access to the corpus file.
#[derive(Debug)]
pub struct CorpusWriter {
    path: PathBuf,
    format: OutputFormat,
    written: usize,
}

impl CorpusWriter {
    /// Check that `path` can be appended to, creating parent directories.
    ///
    /// Fails with [`WriteError::Unwritable`] when the directory or the file
    /// cannot be opened; existing content is left as is.
    #[instrument(level = "info", skip_all, fields(format = ?format))]
    pub async fn open(path: impl AsRef<Path>, format: OutputFormat) -> Result<Self, WriteError> {
        let path = path.as_ref().to_path_buf();
        let unwritable = |source| WriteError::Unwritable {
            path: path.clone(),
            source,
        };
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        ensure_writable_dir(parent).await.map_err(unwritable)?;
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(unwritable)?;
        Ok(Self {
            path,
            format,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this writer.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Append one article.
    #[instrument(level = "debug", skip_all, fields(url = %article.url))]
    pub fn write(&mut self, article: &Article) -> Result<(), WriteError> {
        let record = render_record(article, self.format)?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        append_or_rollback(&mut file, record.as_bytes())?;
        self.written += 1;
        debug!(bytes = record.len(), "Appended record");
        Ok(())
    }
}

/// A file a record can be appended to and cut back from.
trait RecordFile: Write {
    fn current_len(&self) -> io::Result<u64>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl RecordFile for File {
    fn current_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Append `bytes` completely, or restore the file to its prior length.
fn append_or_rollback<F: RecordFile>(file: &mut F, bytes: &[u8]) -> io::Result<()> {
    let original_len = file.current_len()?;
    let result = file
        .write_all(bytes)
        .and_then(|()| file.flush())
        .and_then(|()| file.sync());
    if let Err(e) = result {
        if let Err(rollback) = file.truncate_to(original_len).and_then(|()| file.sync()) {
            warn!(error = %rollback, original_len, "Could not cut back a failed record");
        }
        return Err(e);
    }
    Ok(())
}

/// Render one article exactly as it is stored, trailing separator included.
pub fn render_record(article: &Article, format: OutputFormat) -> Result<String, WriteError> {
    match format {
        OutputFormat::Jsonl => {
            let mut line = serde_json::to_string(article)?;
            line.push('\n');
            Ok(line)
        }
        OutputFormat::Text => {
            let mut block = String::new();
            block.push_str(article.title.trim());
            block.push('\n');
            for line in article.body.lines().filter(|l| !l.trim().is_empty()) {
                block.push_str(line);
                block.push('\n');
            }
            block.push('\n');
            Ok(block)
        }
    }
}

/// Read the raw records of a corpus file, oldest first.
///
/// JSONL records are lines; text records are blank-line separated blocks
/// (returned without the separator).
pub fn read_records(path: impl AsRef<Path>, format: OutputFormat) -> Result<Vec<String>, WriteError> {
    let content = fs::read_to_string(path)?;
    let records = match format {
        OutputFormat::Jsonl => content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(String::from)
            .collect(),
        OutputFormat::Text => content
            .split("\n\n")
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(String::from)
            .collect(),
    };
    Ok(records)
}

/// Deserialize every record of a JSONL corpus.
pub fn read_articles(path: impl AsRef<Path>) -> Result<Vec<Article>, WriteError> {
    read_records(path, OutputFormat::Jsonl)?
        .iter()
        .map(|line| serde_json::from_str(line).map_err(WriteError::from))
        .collect()
}
