//! Newline-delimited JSON input sources.

use super::types::RawRecord;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// One input stream of raw records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// NDJSON file on disk.
    File(PathBuf),
    /// In-memory NDJSON content with a display name.
    Inline {
        /// Name used in logs and reports.
        name: String,
        /// NDJSON text.
        contents: String,
    },
}

impl InputSource {
    /// Source reading the file at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Source reading `contents` under `name`.
    pub fn inline(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self::Inline {
            name: name.into(),
            contents: contents.into(),
        }
    }

    /// Display name; the file path for files.
    pub fn name(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Inline { name, .. } => name.clone(),
        }
    }

    /// Path of a file source.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Inline { .. } => None,
        }
    }
}

/// One non-blank input line.
#[derive(Debug)]
pub enum SourceLine {
    /// Line decoded as a record.
    Record {
        /// 1-based line number.
        line: usize,
        /// Decoded record.
        record: RawRecord,
    },
    /// Line that is not a valid record.
    Malformed {
        /// 1-based line number.
        line: usize,
        /// Decoder message.
        error: String,
    },
}

/// Streaming line reader over an [`InputSource`]; blank lines are skipped.
pub struct SourceReader {
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    buffer: Vec<u8>,
    line_number: usize,
}

impl SourceReader {
    /// Open `source` for reading.
    pub async fn open(source: &InputSource) -> io::Result<Self> {
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = match source {
            InputSource::File(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
            InputSource::Inline { contents, .. } => {
                Box::new(io::Cursor::new(contents.clone().into_bytes()))
            }
        };
        Ok(Self {
            reader,
            buffer: Vec::new(),
            line_number: 0,
        })
    }

    /// Next non-blank line, or `None` at end of input.
    ///
    /// Lines that fail to decode (including invalid UTF-8) come back as
    /// [`SourceLine::Malformed`]; only I/O failures are errors.
    pub async fn next_line(&mut self) -> io::Result<Option<SourceLine>> {
        loop {
            self.buffer.clear();
            if self.reader.read_until(b'\n', &mut self.buffer).await? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let line = self.buffer.trim_ascii();
            let line = line.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            let parsed = match serde_json::from_slice::<RawRecord>(line) {
                Ok(record) => SourceLine::Record {
                    line: self.line_number,
                    record,
                },
                Err(err) => SourceLine::Malformed {
                    line: self.line_number,
                    error: err.to_string(),
                },
            };
            return Ok(Some(parsed));
        }
    }
}
