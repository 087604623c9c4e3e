//! Simulated presence detector.
//!
//! Produces a deterministic presence pattern so the bridge can be run and
//! exercised without radar hardware attached. Each cycle starts with an
//! object walking through the configured range, followed by an empty room.

use super::{SampleSource, SensorReading, SourceError};
use serde::{Deserialize, Serialize};

/// Shape of the simulated presence pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedConfig {
    /// Readings per cycle
    pub period: u64,
    /// Readings at the start of each cycle that contain a presence
    pub presence_len: u64,
    /// Start of the measured range in meters
    pub start_m: f64,
    /// Length of the measured range in meters
    pub length_m: f64,
    /// Score at or above which the detector reports a presence
    pub detection_threshold: f64,
    /// Fail the poll after this many readings
    pub fail_after: Option<u64>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            period: 30,
            presence_len: 10,
            start_m: 0.1,
            length_m: 0.7,
            detection_threshold: 2.0,
            fail_after: None,
        }
    }
}

/// A detector that never touches hardware.
pub struct SimulatedSource {
    config: SimulatedConfig,
    active: bool,
    produced: u64,
}

impl SimulatedSource {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            active: false,
            produced: 0,
        }
    }

    /// Number of readings produced so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    fn reading_at(&self, tick: u64) -> SensorReading {
        let period = self.config.period.max(1);
        let phase = tick % period;
        let presence_len = self.config.presence_len.min(period);

        if phase < presence_len {
            // Walk from the near edge of the range to the far edge.
            let progress = (phase as f64 + 0.5) / presence_len as f64;
            let distance = self.config.start_m + self.config.length_m * progress;
            let score = 1.0 + 2.0 * (std::f64::consts::PI * progress).sin();
            SensorReading::new(score, distance, score >= self.config.detection_threshold)
        } else {
            SensorReading::new(0.2, 0.0, false)
        }
    }
}

impl SampleSource for SimulatedSource {
    fn activate(&mut self) -> Result<(), SourceError> {
        if self.active {
            return Err(SourceError::Activation("already active".to_string()));
        }
        self.active = true;
        Ok(())
    }

    fn next_sample(&mut self) -> Result<SensorReading, SourceError> {
        if !self.active {
            return Err(SourceError::Poll("detector is not active".to_string()));
        }
        if let Some(limit) = self.config.fail_after {
            if self.produced >= limit {
                return Err(SourceError::Poll(format!(
                    "simulated failure after {limit} readings"
                )));
            }
        }

        let reading = self.reading_at(self.produced);
        self.produced += 1;
        Ok(reading)
    }

    fn deactivate(&mut self) -> Result<(), SourceError> {
        if !self.active {
            return Err(SourceError::Deactivation("detector is not active".to_string()));
        }
        self.active = false;
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "simulated detector ({:.2}-{:.2} m)",
            self.config.start_m,
            self.config.start_m + self.config.length_m
        )
    }
}
