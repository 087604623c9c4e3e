//! Session statistics for the presence bridge.
//!
//! Counts what the control loop and the notifier did during a session so an
//! operator can see, after the fact, how many samples were logged and how
//! many camera triggers actually went out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Live counters for one session.
#[derive(Debug)]
pub struct SessionStats {
    /// Successful polls of the sample source
    samples_polled: AtomicU64,
    /// Rows written to the sample log
    records_appended: AtomicU64,
    /// Samples whose row could not be written
    records_skipped: AtomicU64,
    /// Samples that satisfied the trigger policy
    triggers_attempted: AtomicU64,
    /// Triggers that reached the endpoint
    triggers_delivered: AtomicU64,
    /// Triggers that failed to connect, send or read
    triggers_failed: AtomicU64,
    /// Triggers discarded by a full dispatch queue
    triggers_dropped: AtomicU64,
    /// Batches that ran to completion and reset the log
    batches_completed: AtomicU64,
    /// Log resets that could not delete the file
    resets_failed: AtomicU64,
    session_id: String,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            samples_polled: AtomicU64::new(0),
            records_appended: AtomicU64::new(0),
            records_skipped: AtomicU64::new(0),
            triggers_attempted: AtomicU64::new(0),
            triggers_delivered: AtomicU64::new(0),
            triggers_failed: AtomicU64::new(0),
            triggers_dropped: AtomicU64::new(0),
            batches_completed: AtomicU64::new(0),
            resets_failed: AtomicU64::new(0),
            session_id: format!("SESS-{}", &Uuid::new_v4().to_string()[..8]),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats that are written to `path` on [`SessionStats::save`].
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);
        stats
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn record_sample(&self) {
        self.samples_polled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_appended(&self) {
        self.records_appended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trigger_attempt(&self) {
        self.triggers_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trigger_delivered(&self) {
        self.triggers_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trigger_failed(&self) {
        self.triggers_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trigger_dropped(&self) {
        self.triggers_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_triggers_dropped(&self, count: u64) {
        self.triggers_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_batch_completed(&self) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset_failed(&self) {
        self.resets_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            session_id: self.session_id.clone(),
            samples_polled: self.samples_polled.load(Ordering::Relaxed),
            records_appended: self.records_appended.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            triggers_attempted: self.triggers_attempted.load(Ordering::Relaxed),
            triggers_delivered: self.triggers_delivered.load(Ordering::Relaxed),
            triggers_failed: self.triggers_failed.load(Ordering::Relaxed),
            triggers_dropped: self.triggers_dropped.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            resets_failed: self.resets_failed.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Session Statistics ({}):\n\
             - Samples polled: {}\n\
             - Rows appended: {} ({} skipped)\n\
             - Batches completed: {} ({} failed resets)\n\
             - Triggers: {} attempted, {} delivered, {} failed, {} dropped\n\
             - Session duration: {} seconds",
            stats.session_id,
            stats.samples_polled,
            stats.records_appended,
            stats.records_skipped,
            stats.batches_completed,
            stats.resets_failed,
            stats.triggers_attempted,
            stats.triggers_delivered,
            stats.triggers_failed,
            stats.triggers_dropped,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let persisted = PersistedStats {
                stats: self.snapshot(),
                last_updated: Utc::now(),
            };
            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub session_id: String,
    pub samples_polled: u64,
    pub records_appended: u64,
    pub records_skipped: u64,
    pub triggers_attempted: u64,
    pub triggers_delivered: u64,
    pub triggers_failed: u64,
    pub triggers_dropped: u64,
    pub batches_completed: u64,
    pub resets_failed: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedStats {
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub last_updated: DateTime<Utc>,
}

/// Load the stats written by the last session, if any.
pub fn load_persisted(path: &std::path::Path) -> Result<Option<PersistedStats>, std::io::Error> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let persisted = serde_json::from_str(&content).map_err(std::io::Error::other)?;
    Ok(Some(persisted))
}

/// Thread-safe shared session stats.
pub type SharedSessionStats = Arc<SessionStats>;

/// Create new shared session stats.
pub fn create_shared_stats() -> SharedSessionStats {
    Arc::new(SessionStats::new())
}

/// Create new shared session stats with persistence.
pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedSessionStats {
    Arc::new(SessionStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_counting() {
        let stats = SessionStats::new();

        stats.record_sample();
        stats.record_sample();
        stats.record_appended();
        stats.record_trigger_attempt();
        stats.record_trigger_failed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.samples_polled, 2);
        assert_eq!(snapshot.records_appended, 1);
        assert_eq!(snapshot.triggers_attempted, 1);
        assert_eq!(snapshot.triggers_failed, 1);
        assert_eq!(snapshot.triggers_delivered, 0);
        assert!(snapshot.session_id.starts_with("SESS-"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("stats.json");
        let stats = SessionStats::with_persistence(path.clone());
        stats.record_batch_completed();
        stats.record_trigger_dropped();
        stats.save().unwrap();

        let loaded = load_persisted(&path).unwrap().unwrap();
        assert_eq!(loaded.stats.batches_completed, 1);
        assert_eq!(loaded.stats.triggers_dropped, 1);
        assert_eq!(loaded.stats.session_id, stats.session_id());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(load_persisted(&dir.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn test_summary_format() {
        let stats = SessionStats::new();
        let summary = stats.summary();

        assert!(summary.contains("Samples polled"));
        assert!(summary.contains("Triggers"));
        assert!(summary.contains(stats.session_id()));
    }
}
