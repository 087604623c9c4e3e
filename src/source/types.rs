//! Sample types exchanged between the presence detector and the control loop.
//!
//! A [`SensorReading`] is what the detector hands back; a [`Sample`] is that
//! reading stamped with the moment the loop consumed it.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A single presence detector result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Presence score reported by the detector
    pub score: f64,
    /// Distance to the detected presence, zero when nothing is in range
    pub distance: f64,
    /// The detector's own presence classification
    pub detected: bool,
}

impl SensorReading {
    pub fn new(score: f64, distance: f64, detected: bool) -> Self {
        Self {
            score,
            distance,
            detected,
        }
    }
}

/// A reading stamped with its consumption time.
///
/// Samples are immutable once built and are handed by value to every
/// consumer in the loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub score: f64,
    pub distance: f64,
    pub detected: bool,
    /// Microseconds since the Unix epoch, taken when the loop consumed the reading
    pub timestamp_us: i64,
}

impl Sample {
    /// Stamp a reading with the current wall-clock time.
    pub fn stamp(reading: SensorReading) -> Self {
        Self::at(reading, Utc::now().timestamp_micros())
    }

    /// Stamp a reading with an explicit timestamp.
    pub fn at(reading: SensorReading, timestamp_us: i64) -> Self {
        Self {
            score: reading.score,
            distance: reading.distance,
            detected: reading.detected,
            timestamp_us,
        }
    }

    /// Console label for the detector's classification.
    pub fn classification(&self) -> &'static str {
        if self.detected {
            "Motion"
        } else {
            "No motion"
        }
    }
}
