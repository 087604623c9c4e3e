//! The sampling loop.
//!
//! Polls the detector at a fixed cadence, appends every sample to the log
//! and fires a trigger for samples that satisfy the policy. After
//! `batch_size` consecutive successful polls the log is reset and a new
//! batch starts; the loop only ends on a poll failure or a stop request.

use super::cancel::CancelToken;
use super::policy::TriggerPolicy;
use crate::notifier::Notifier;
use crate::recorder::CsvRecorder;
use crate::source::{Sample, SampleSource, SourceError};
use crate::stats::SharedSessionStats;
use std::time::Duration;

/// Consecutive append failures after which the problem is reported as an error.
pub const OPEN_FAILURE_ESCALATION: u32 = 10;

/// Pacing and batching parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopConfig {
    /// Polls per second
    pub update_rate_hz: u32,
    /// Successful polls per batch
    pub batch_size: u32,
    pub trigger_policy: TriggerPolicy,
}

impl LoopConfig {
    /// Build from a polling rate in Hz. A zero rate is rejected by [`validate`](Self::validate).
    pub fn from_rate(update_rate_hz: u32, batch_size: u32) -> Self {
        Self {
            update_rate_hz,
            batch_size,
            trigger_policy: TriggerPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TriggerPolicy) -> Self {
        self.trigger_policy = policy;
        self
    }

    /// Pause between polls, or zero when the rate is zero.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(1)
            .checked_div(self.update_rate_hz)
            .unwrap_or(Duration::ZERO)
    }

    pub fn validate(&self) -> Result<(), LoopError> {
        if self.batch_size == 0 {
            return Err(LoopError::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.update_rate_hz == 0 {
            return Err(LoopError::InvalidConfig(
                "update rate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from_rate(10, 100)
    }
}

/// How a loop run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    /// Stopped on request; `samples` may be zero if the stop came first
    Cancelled { samples: u64 },
    /// The detector failed a poll
    PollFailed {
        error: SourceError,
        /// Successful polls in the batch the failure interrupted
        batch_position: u32,
        samples: u64,
    },
}

impl LoopOutcome {
    /// Stopped on request after at least one successful poll.
    pub fn is_success(&self) -> bool {
        matches!(self, LoopOutcome::Cancelled { samples } if *samples > 0)
    }

    /// Successful polls over the whole run.
    pub fn samples(&self) -> u64 {
        match self {
            LoopOutcome::Cancelled { samples } | LoopOutcome::PollFailed { samples, .. } => {
                *samples
            }
        }
    }
}

/// Errors that stop a loop or session before or outside polling.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopError {
    /// Batch size or cadence is unusable
    InvalidConfig(String),
    /// The detector could not be activated
    Activation(SourceError),
    /// The detector could not be deactivated
    Deactivation(SourceError),
}

impl std::fmt::Display for LoopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopError::InvalidConfig(msg) => write!(f, "Invalid loop configuration: {msg}"),
            LoopError::Activation(e) => write!(f, "{e}"),
            LoopError::Deactivation(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LoopError {}

/// Drives one detector through poll, log and trigger.
pub struct ControlLoop {
    config: LoopConfig,
    recorder: CsvRecorder,
    stats: SharedSessionStats,
    cancel: CancelToken,
}

impl ControlLoop {
    pub fn new(
        config: LoopConfig,
        recorder: CsvRecorder,
        stats: SharedSessionStats,
        cancel: CancelToken,
    ) -> Self {
        Self {
            config,
            recorder,
            stats,
            cancel,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn recorder(&self) -> &CsvRecorder {
        &self.recorder
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Poll `source` until it fails or the loop is cancelled.
    ///
    /// The source must already be active.
    pub fn run<S, N>(&self, source: &mut S, notifier: &N) -> Result<LoopOutcome, LoopError>
    where
        S: SampleSource + ?Sized,
        N: Notifier + ?Sized,
    {
        self.config.validate()?;

        tracing::info!(
            batch_size = self.config.batch_size,
            interval = ?self.config.interval(),
            policy = %self.config.trigger_policy,
            "Sampling {}",
            source.describe()
        );

        let mut position: u32 = 0;
        let mut samples: u64 = 0;
        let mut open_failures: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Sampling stopped after {} samples", samples);
                return Ok(LoopOutcome::Cancelled { samples });
            }

            let reading = match source.next_sample() {
                Ok(reading) => reading,
                Err(error) => {
                    tracing::error!(batch_position = position, "{error}");
                    return Ok(LoopOutcome::PollFailed {
                        error,
                        batch_position: position,
                        samples,
                    });
                }
            };

            let sample = Sample::stamp(reading);
            samples += 1;
            self.stats.record_sample();

            self.record(&sample, &mut open_failures);
            if self.config.trigger_policy.matches(&sample) {
                self.stats.record_trigger_attempt();
                notifier.trigger();
            }

            let cancelled = self.cancel.wait(self.config.interval());

            position += 1;
            if position == self.config.batch_size {
                self.finish_batch();
                position = 0;
            }

            if cancelled {
                tracing::info!("Sampling stopped after {} samples", samples);
                return Ok(LoopOutcome::Cancelled { samples });
            }
        }
    }

    fn record(&self, sample: &Sample, open_failures: &mut u32) {
        match self.recorder.append(sample) {
            Ok(record) => {
                *open_failures = 0;
                self.stats.record_appended();
                tracing::info!(
                    "{} | Presence score: {}, Distance: {}, Time (Microseconds): {}",
                    sample.classification(),
                    record.score_scaled,
                    record.distance_scaled,
                    record.timestamp_us
                );
            }
            Err(e) => {
                *open_failures += 1;
                self.stats.record_skipped();
                if *open_failures == OPEN_FAILURE_ESCALATION {
                    tracing::error!(
                        "{e} ({} consecutive samples not logged)",
                        OPEN_FAILURE_ESCALATION
                    );
                } else {
                    tracing::warn!("{e}; sample not logged");
                }
            }
        }
    }

    fn finish_batch(&self) {
        self.stats.record_batch_completed();
        match self.recorder.reset() {
            Ok(()) => tracing::info!("Batch complete, log reset. Restarting the process..."),
            Err(e) => {
                self.stats.record_reset_failed();
                tracing::warn!("{e}; continuing with the existing log");
            }
        }
    }
}

/// Activate `source`, run the loop, then deactivate and release the source.
pub fn run_session<S, N>(
    source: &mut S,
    control: &ControlLoop,
    notifier: &N,
) -> Result<LoopOutcome, LoopError>
where
    S: SampleSource + ?Sized,
    N: Notifier + ?Sized,
{
    control.config.validate()?;

    if let Err(e) = source.activate() {
        source.destroy();
        return Err(LoopError::Activation(e));
    }

    let outcome = control.run(source, notifier);
    let deactivated = source.deactivate();
    source.destroy();

    let outcome = outcome?;
    deactivated.map_err(LoopError::Deactivation)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SensorReading;
    use crate::stats::create_shared_stats;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    struct Scripted {
        script: VecDeque<Result<SensorReading, SourceError>>,
    }

    impl SampleSource for Scripted {
        fn activate(&mut self) -> Result<(), SourceError> {
            Ok(())
        }

        fn next_sample(&mut self) -> Result<SensorReading, SourceError> {
            self.script.pop_front().unwrap_or(Err(SourceError::Exhausted))
        }

        fn deactivate(&mut self) -> Result<(), SourceError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counting(Cell<u32>);

    impl Notifier for Counting {
        fn trigger(&self) -> bool {
            self.0.set(self.0.get() + 1);
            true
        }
    }

    fn fast_config(batch_size: u32) -> LoopConfig {
        LoopConfig::from_rate(1000, batch_size)
    }

    #[test]
    fn test_validate() {
        assert!(LoopConfig::from_rate(10, 0).validate().is_err());
        assert!(matches!(
            LoopConfig::from_rate(0, 3).validate(),
            Err(LoopError::InvalidConfig(_))
        ));
        assert!(LoopConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_rate() {
        assert_eq!(LoopConfig::from_rate(10, 1).interval(), Duration::from_millis(100));
        assert_eq!(LoopConfig::from_rate(1000, 1).interval(), Duration::from_millis(1));
        // No rounding to whole milliseconds.
        assert_eq!(LoopConfig::from_rate(600, 1).interval(), Duration::from_nanos(1_666_666));
        assert_eq!(LoopConfig::from_rate(4000, 1).interval(), Duration::from_micros(250));
        assert_eq!(LoopConfig::from_rate(0, 1).interval(), Duration::ZERO);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_polling() {
        let dir = TempDir::new().unwrap();
        let control = ControlLoop::new(
            fast_config(0),
            CsvRecorder::new(dir.path().join("output.csv")),
            create_shared_stats(),
            CancelToken::new(),
        );
        let mut source = Scripted {
            script: VecDeque::from(vec![Ok(SensorReading::new(1.0, 1.0, true))]),
        };

        let result = control.run(&mut source, &Counting::default());
        assert!(matches!(result, Err(LoopError::InvalidConfig(_))));
        assert_eq!(source.script.len(), 1);
    }

    #[test]
    fn test_cancelled_before_first_poll() {
        let dir = TempDir::new().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let control = ControlLoop::new(
            fast_config(5),
            CsvRecorder::new(dir.path().join("output.csv")),
            create_shared_stats(),
            cancel,
        );
        let mut source = Scripted {
            script: VecDeque::new(),
        };

        let outcome = control.run(&mut source, &Counting::default()).unwrap();
        assert_eq!(outcome, LoopOutcome::Cancelled { samples: 0 });
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_append_failure_does_not_stop_loop() {
        let dir = TempDir::new().unwrap();
        let stats = create_shared_stats();
        let control = ControlLoop::new(
            fast_config(100),
            CsvRecorder::new(dir.path().join("missing").join("output.csv")),
            stats.clone(),
            CancelToken::new(),
        );
        let mut source = Scripted {
            script: VecDeque::from(vec![
                Ok(SensorReading::new(1.0, 0.1, true)),
                Ok(SensorReading::new(1.0, 0.1, true)),
            ]),
        };
        let notifier = Counting::default();

        let outcome = control.run(&mut source, &notifier).unwrap();
        assert_eq!(outcome.samples(), 2);
        assert_eq!(notifier.0.get(), 2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.records_skipped, 2);
        assert_eq!(snapshot.records_appended, 0);
    }

    #[test]
    fn test_failed_reset_does_not_stop_loop() {
        let dir = TempDir::new().unwrap();
        let stats = create_shared_stats();
        // Appends and resets both fail against a directory path.
        let control = ControlLoop::new(
            fast_config(1),
            CsvRecorder::new(dir.path()),
            stats.clone(),
            CancelToken::new(),
        );
        let mut source = Scripted {
            script: VecDeque::from(vec![
                Ok(SensorReading::new(0.5, 0.0, false)),
                Ok(SensorReading::new(0.5, 0.0, false)),
                Ok(SensorReading::new(0.5, 0.0, false)),
            ]),
        };

        let outcome = control.run(&mut source, &Counting::default()).unwrap();
        assert_eq!(outcome.samples(), 3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.batches_completed, 3);
        assert_eq!(snapshot.resets_failed, 3);
    }

    #[test]
    fn test_zero_rate_is_rejected_before_activation() {
        let dir = TempDir::new().unwrap();
        let control = ControlLoop::new(
            LoopConfig::from_rate(0, 3),
            CsvRecorder::new(dir.path().join("output.csv")),
            create_shared_stats(),
            CancelToken::new(),
        );
        let mut source = Scripted {
            script: VecDeque::from(vec![Ok(SensorReading::new(1.0, 1.0, true))]),
        };

        let result = run_session(&mut source, &control, &Counting::default());
        assert!(matches!(result, Err(LoopError::InvalidConfig(_))));
        assert_eq!(source.script.len(), 1);
    }

    #[test]
    fn test_run_session_reports_activation_failure() {
        struct Dead;
        impl SampleSource for Dead {
            fn activate(&mut self) -> Result<(), SourceError> {
                Err(SourceError::Activation("no radar".to_string()))
            }
            fn next_sample(&mut self) -> Result<SensorReading, SourceError> {
                unreachable!("never activated")
            }
            fn deactivate(&mut self) -> Result<(), SourceError> {
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        let control = ControlLoop::new(
            fast_config(3),
            CsvRecorder::new(dir.path().join("output.csv")),
            create_shared_stats(),
            CancelToken::new(),
        );

        let result = run_session(&mut Dead, &control, &Counting::default());
        assert!(matches!(result, Err(LoopError::Activation(_))));
    }
}
