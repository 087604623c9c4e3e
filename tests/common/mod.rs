//! Shared fakes for the integration tests.

#![allow(dead_code)]

use presence_bridge::{Notifier, SampleSource, SensorReading, SourceError};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Detector fake that replays a fixed script, then reports exhaustion.
pub struct ScriptedSource {
    script: VecDeque<Result<SensorReading, SourceError>>,
    pub polls: u64,
    pub activated: bool,
    pub deactivated: bool,
    pub destroyed: bool,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<SensorReading, SourceError>>) -> Self {
        Self {
            script: script.into(),
            polls: 0,
            activated: false,
            deactivated: false,
            destroyed: false,
        }
    }

    /// Script of successful readings only.
    pub fn readings(readings: &[(f64, f64)]) -> Self {
        Self::new(
            readings
                .iter()
                .map(|&(score, distance)| Ok(SensorReading::new(score, distance, distance > 0.0)))
                .collect(),
        )
    }
}

impl SampleSource for ScriptedSource {
    fn activate(&mut self) -> Result<(), SourceError> {
        self.activated = true;
        Ok(())
    }

    fn next_sample(&mut self) -> Result<SensorReading, SourceError> {
        self.polls += 1;
        self.script.pop_front().unwrap_or(Err(SourceError::Exhausted))
    }

    fn deactivate(&mut self) -> Result<(), SourceError> {
        self.deactivated = true;
        Ok(())
    }

    fn destroy(&mut self) {
        self.destroyed = true;
    }
}

/// Notifier fake that counts triggers and snapshots the log at each one.
pub struct RecordingNotifier {
    log_path: Option<PathBuf>,
    count: AtomicU64,
    pub snapshots: Mutex<Vec<Option<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            log_path: None,
            count: AtomicU64::new(0),
            snapshots: Mutex::new(Vec::new()),
        }
    }

    pub fn watching(log_path: PathBuf) -> Self {
        Self {
            log_path: Some(log_path),
            ..Self::new()
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn trigger(&self) -> bool {
        self.count.fetch_add(1, Ordering::SeqCst);
        if let Some(path) = &self.log_path {
            let content = std::fs::read_to_string(path).ok();
            self.snapshots.lock().unwrap().push(content);
        }
        true
    }
}

/// A loopback port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
