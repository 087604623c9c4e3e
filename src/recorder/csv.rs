//! Append-only CSV sample log.
//!
//! Every append is a complete open/write/close cycle so a crash between
//! samples never loses a finished row. The header is written whenever the
//! file is empty at open time, which makes header emission self-correcting
//! after a reset, whether or not the reset itself succeeded.

use crate::source::Sample;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Header row written at the top of every log file.
pub const CSV_HEADER: &str = "Presence Score,Presence Distance,Time (Microseconds)";

/// Fixed-point scale applied to score and distance.
pub const SCALE: f64 = 1000.0;

/// Encode a value as a three-decimal fixed-point integer.
pub fn scale(value: f64) -> i64 {
    (value * SCALE).round() as i64
}

/// Decode a fixed-point integer back to a float.
pub fn unscale(value: i64) -> f64 {
    value as f64 / SCALE
}

/// One row of the sample log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub score_scaled: i64,
    pub distance_scaled: i64,
    pub timestamp_us: i64,
}

impl LogRecord {
    pub fn from_sample(sample: &Sample) -> Self {
        Self {
            score_scaled: scale(sample.score),
            distance_scaled: scale(sample.distance),
            timestamp_us: sample.timestamp_us,
        }
    }

    pub fn score(&self) -> f64 {
        unscale(self.score_scaled)
    }

    pub fn distance(&self) -> f64 {
        unscale(self.distance_scaled)
    }

    /// Render as a CSV row without the trailing newline.
    pub fn to_row(&self) -> String {
        format!(
            "{},{},{}",
            self.score_scaled, self.distance_scaled, self.timestamp_us
        )
    }

    /// Parse a CSV row produced by [`LogRecord::to_row`].
    pub fn parse_row(line: &str) -> Result<Self, RecorderError> {
        let fields: Vec<&str> = line.trim_end().split(',').collect();
        if fields.len() != 3 {
            return Err(RecorderError::Parse(format!(
                "expected 3 fields, found {}: {line:?}",
                fields.len()
            )));
        }

        let field = |i: usize| -> Result<i64, RecorderError> {
            fields[i]
                .trim()
                .parse::<i64>()
                .map_err(|e| RecorderError::Parse(format!("field {} in {line:?}: {e}", i + 1)))
        };

        Ok(Self {
            score_scaled: field(0)?,
            distance_scaled: field(1)?,
            timestamp_us: field(2)?,
        })
    }
}

/// Writes samples to a CSV file, one row per sample.
#[derive(Debug, Clone)]
pub struct CsvRecorder {
    path: PathBuf,
}

impl CsvRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one sample, writing the header first if the file is empty.
    ///
    /// Returns the record that was written.
    pub fn append(&self, sample: &Sample) -> Result<LogRecord, RecorderError> {
        let record = LogRecord::from_sample(sample);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RecorderError::Open(format!("{}: {e}", self.path.display())))?;

        let is_empty = file
            .metadata()
            .map_err(|e| RecorderError::Open(format!("{}: {e}", self.path.display())))?
            .len()
            == 0;

        let mut chunk = String::with_capacity(CSV_HEADER.len() + 48);
        if is_empty {
            chunk.push_str(CSV_HEADER);
            chunk.push('\n');
        }
        chunk.push_str(&record.to_row());
        chunk.push('\n');

        file.write_all(chunk.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| RecorderError::Write(format!("{}: {e}", self.path.display())))?;

        Ok(record)
    }

    /// Discard all recorded history by deleting the file.
    ///
    /// A missing file already satisfies the reset and is not an error.
    pub fn reset(&self) -> Result<(), RecorderError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RecorderError::Deletion(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Read every record currently in the log.
    pub fn read_records(&self) -> Result<Vec<LogRecord>, RecorderError> {
        read_records(&self.path)
    }
}

/// Parse a sample log back into records, skipping the header line.
pub fn read_records(path: &Path) -> Result<Vec<LogRecord>, RecorderError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RecorderError::Open(format!("{}: {e}", path.display())))?;

    content
        .lines()
        .filter(|line| !line.trim().is_empty() && line.trim_end() != CSV_HEADER)
        .map(LogRecord::parse_row)
        .collect()
}

/// Errors raised by the recorder.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderError {
    /// The log could not be opened for appending
    Open(String),
    /// The row could not be written
    Write(String),
    /// The log could not be deleted during a reset
    Deletion(String),
    /// A row in an existing log is malformed
    Parse(String),
}

impl std::fmt::Display for RecorderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderError::Open(e) => write!(f, "Error opening file: {e}"),
            RecorderError::Write(e) => write!(f, "Error writing file: {e}"),
            RecorderError::Deletion(e) => write!(f, "Failed to delete the file: {e}"),
            RecorderError::Parse(e) => write!(f, "Malformed log row: {e}"),
        }
    }
}

impl std::error::Error for RecorderError {}
