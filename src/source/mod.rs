//! Sample sources for the presence bridge.
//!
//! The presence detector itself is an external component. The control loop
//! only sees it through the [`SampleSource`] trait: activate it, pull one
//! reading at a time, deactivate it, then release it.

pub mod replay;
pub mod simulated;
pub mod types;

pub use replay::ReplaySource;
pub use simulated::{SimulatedConfig, SimulatedSource};
pub use types::{Sample, SensorReading};

/// Capability interface of a presence detector.
pub trait SampleSource {
    /// Bring the detector into a state where readings can be pulled.
    fn activate(&mut self) -> Result<(), SourceError>;

    /// Block until the next reading is available and return it.
    fn next_sample(&mut self) -> Result<SensorReading, SourceError>;

    /// Stop producing readings.
    fn deactivate(&mut self) -> Result<(), SourceError>;

    /// Release whatever the detector holds. Called once, after deactivation.
    fn destroy(&mut self) {}

    /// Short human-readable name used in log lines.
    fn describe(&self) -> String {
        "presence detector".to_string()
    }
}

/// Errors reported by a sample source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The detector could not be activated
    Activation(String),
    /// A single poll failed
    Poll(String),
    /// A finite source has no more readings
    Exhausted,
    /// The detector could not be deactivated cleanly
    Deactivation(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Activation(e) => write!(f, "Failed to activate detector: {e}"),
            SourceError::Poll(e) => write!(f, "Failed to get next result: {e}"),
            SourceError::Exhausted => write!(f, "Source has no more readings"),
            SourceError::Deactivation(e) => write!(f, "Failed to deactivate detector: {e}"),
        }
    }
}

impl std::error::Error for SourceError {}
