//! Durable sample log.

pub mod csv;

pub use csv::{read_records, scale, unscale, CsvRecorder, LogRecord, RecorderError, CSV_HEADER};
