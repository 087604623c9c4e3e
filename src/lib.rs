//! Presence Bridge - radar presence sampling with camera triggering.
//!
//! This library polls a presence detector at a fixed rate, appends every
//! reading to a CSV log and fires a camera trigger over TCP whenever a
//! reading satisfies the trigger policy.
//!
//! # Guarantees
//!
//! - **Every sample is logged**: each row is written and closed before the
//!   next poll, so a crash loses at most the row being written
//! - **Triggers never stall sampling**: delivery is bounded by connect and
//!   read timeouts, or moved to a worker thread with a drop-oldest queue
//! - **Only poll failures end a session**: log and network faults are
//!   reported and counted, never fatal
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Presence Bridge                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │  Detector   │──▶│ ControlLoop │──▶│  Recorder   │        │
//! │  │  (source)   │   │ (batches)   │   │   (CSV)     │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │                           │                                 │
//! │                           ▼                                 │
//! │                    ┌─────────────┐   ┌─────────────┐        │
//! │                    │  Notifier   │──▶│   Camera    │        │
//! │                    │   (TCP)     │   │  listener   │        │
//! │                    └─────────────┘   └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use presence_bridge::{
//!     control::{run_session, CancelToken, ControlLoop, LoopConfig},
//!     notifier::{NotifierConfig, TriggerClient},
//!     recorder::CsvRecorder,
//!     source::{SimulatedConfig, SimulatedSource},
//!     stats::create_shared_stats,
//! };
//!
//! let stats = create_shared_stats();
//! let control = ControlLoop::new(
//!     LoopConfig::from_rate(10, 100),
//!     CsvRecorder::new("output.csv"),
//!     stats.clone(),
//!     CancelToken::new(),
//! );
//! let notifier = TriggerClient::new(NotifierConfig::default()).with_stats(stats);
//! let mut source = SimulatedSource::new(SimulatedConfig::default());
//!
//! let outcome = run_session(&mut source, &control, &notifier).expect("session failed");
//! println!("{} samples", outcome.samples());
//! ```

pub mod config;
pub mod control;
pub mod logging;
pub mod notifier;
pub mod recorder;
pub mod source;
pub mod stats;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use control::{run_session, CancelToken, ControlLoop, LoopConfig, LoopOutcome, TriggerPolicy};
pub use notifier::{DispatchMode, Notifier, NotifierConfig, TriggerClient, TriggerDispatcher};
pub use recorder::{CsvRecorder, LogRecord, RecorderError};
pub use source::{Sample, SampleSource, SensorReading, SourceError};
pub use stats::{SessionStats, SharedSessionStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
