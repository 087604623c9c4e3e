//! Replay a recorded sample log as if it came from the detector.
//!
//! Useful for reproducing a session: the scaled values in the log are
//! decoded back into readings and handed out one per poll. The detector's
//! own classification is not logged, so it is reconstructed from the
//! distance column.

use super::{SampleSource, SensorReading, SourceError};
use crate::recorder::{read_records, LogRecord};
use std::collections::VecDeque;
use std::path::PathBuf;

pub struct ReplaySource {
    path: PathBuf,
    repeat: bool,
    loaded: Vec<LogRecord>,
    pending: VecDeque<LogRecord>,
    active: bool,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            repeat: false,
            loaded: Vec::new(),
            pending: VecDeque::new(),
            active: false,
        }
    }

    /// Start over from the first row once the log is exhausted.
    pub fn repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    /// Rows not yet replayed in the current pass.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl SampleSource for ReplaySource {
    fn activate(&mut self) -> Result<(), SourceError> {
        if self.active {
            return Err(SourceError::Activation("already active".to_string()));
        }
        self.loaded =
            read_records(&self.path).map_err(|e| SourceError::Activation(e.to_string()))?;
        self.pending = self.loaded.iter().copied().collect();
        self.active = true;
        Ok(())
    }

    fn next_sample(&mut self) -> Result<SensorReading, SourceError> {
        if !self.active {
            return Err(SourceError::Poll("replay is not active".to_string()));
        }
        if self.pending.is_empty() && self.repeat {
            self.pending = self.loaded.iter().copied().collect();
        }

        let record = self.pending.pop_front().ok_or(SourceError::Exhausted)?;
        Ok(SensorReading::new(
            record.score(),
            record.distance(),
            record.distance_scaled > 0,
        ))
    }

    fn deactivate(&mut self) -> Result<(), SourceError> {
        if !self.active {
            return Err(SourceError::Deactivation("replay is not active".to_string()));
        }
        self.active = false;
        Ok(())
    }

    fn destroy(&mut self) {
        self.loaded.clear();
        self.pending.clear();
    }

    fn describe(&self) -> String {
        format!("replay of {}", self.path.display())
    }
}
