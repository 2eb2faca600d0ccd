//! Batch report serialization for JSON and JSONL output.
//!
//! JSON writes the whole [`BatchReport`] as one object. JSON Lines writes one
//! [`ResultRecord`](crate::types::ResultRecord) per line followed by a final
//! `{"summary": ...}` line, so a consumer can stream records.

use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::{PixbatchError, Result};
use crate::types::{BatchReport, BatchSummary};

/// Report format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single JSON object
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }

    /// Pick a format from a report path's extension, if it names one.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::parse)
    }
}

#[derive(Serialize)]
struct SummaryLine<'a> {
    summary: &'a BatchSummary,
}

/// Serializes batch reports to any writer.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
}

impl<W: Write> OutputWriter<W> {
    /// Create a new output writer.
    ///
    /// `pretty` only affects the JSON format; JSONL is always one object per
    /// line.
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
        }
    }

    /// Write a full report.
    pub fn write_report(&mut self, report: &BatchReport) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                if self.pretty {
                    serde_json::to_writer_pretty(&mut self.writer, report)
                        .map_err(io::Error::other)?;
                } else {
                    serde_json::to_writer(&mut self.writer, report).map_err(io::Error::other)?;
                }
                writeln!(self.writer)?;
            }
            OutputFormat::JsonLines => {
                for record in &report.results {
                    self.write_line(record)?;
                }
                self.write_line(&SummaryLine {
                    summary: &report.summary,
                })?;
            }
        }
        Ok(())
    }

    fn write_line<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        writeln!(self.writer)
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Consume the writer and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Write `report` to `path`, replacing any existing file.
pub fn write_report_file(
    path: &Path,
    report: &BatchReport,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    let file = File::create(path).map_err(|e| PixbatchError::access(path, e))?;
    let mut writer = OutputWriter::new(BufWriter::new(file), format, pretty);
    writer
        .write_report(report)
        .and_then(|_| writer.flush())
        .map_err(|e| PixbatchError::access(path, e))?;
    tracing::debug!("Wrote report to {:?}", path);
    Ok(())
}
