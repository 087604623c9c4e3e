//! Camera trigger notification.
//!
//! The control loop only needs "fire a trigger, don't wait long". Two
//! implementations provide that: [`TriggerClient`] talks to the endpoint
//! directly on the calling thread, [`TriggerDispatcher`] hands the request to
//! a worker thread through a bounded drop-oldest queue.

pub mod client;
pub mod dispatch;
pub mod listener;

pub use client::{
    NotifierConfig, NotifyError, TriggerClient, TriggerReply, DEFAULT_TRIGGER_PORT,
    DEFAULT_TRIGGER_TOKEN,
};
pub use dispatch::TriggerDispatcher;
pub use listener::{ListenerConfig, ListenerHandle};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fire-and-forget trigger sink.
///
/// The return value is informational only; the control loop never acts on it.
pub trait Notifier {
    fn trigger(&self) -> bool;
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn trigger(&self) -> bool {
        (**self).trigger()
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn trigger(&self) -> bool {
        (**self).trigger()
    }
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn trigger(&self) -> bool {
        (**self).trigger()
    }
}

/// Where trigger delivery runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DispatchMode {
    /// On the sampling thread, bounded by the connect and read timeouts
    Inline,
    /// On a worker thread fed by a bounded drop-oldest queue
    Background { queue_capacity: usize },
}

impl Default for DispatchMode {
    fn default() -> Self {
        DispatchMode::Background { queue_capacity: 16 }
    }
}

/// Build the notifier described by `mode`.
pub fn build_notifier(
    config: NotifierConfig,
    mode: DispatchMode,
    stats: crate::stats::SharedSessionStats,
) -> std::io::Result<Box<dyn Notifier>> {
    let client = TriggerClient::new(config).with_stats(stats.clone());
    match mode {
        DispatchMode::Inline => Ok(Box::new(client)),
        DispatchMode::Background { queue_capacity } => {
            let dispatcher = TriggerDispatcher::spawn(client, queue_capacity)?.with_stats(stats);
            Ok(Box::new(dispatcher))
        }
    }
}
