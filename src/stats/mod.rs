//! Session statistics.
//!
//! Counters are shared between the control loop and the trigger dispatcher
//! and persisted at the end of a session so `status` can report them.

pub mod log;

pub use log::{
    create_shared_stats, create_shared_stats_with_persistence, load_persisted, PersistedStats,
    SessionStats, SharedSessionStats, StatsSnapshot,
};
