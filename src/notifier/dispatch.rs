//! Background trigger dispatch.
//!
//! Moves trigger delivery off the sampling thread. Requests go through a
//! bounded queue; when the queue is full the oldest pending request is
//! discarded, so an unreachable endpoint can never build an unbounded
//! backlog or stall the loop. On shutdown only the trigger already in
//! flight is delivered; anything still queued is discarded.

use super::Notifier;
use crate::stats::SharedSessionStats;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Sends triggers from a dedicated worker thread.
pub struct TriggerDispatcher {
    sender: Option<Sender<Instant>>,
    // Second handle on the queue, used only to evict the oldest request.
    evict: Receiver<Instant>,
    closing: Arc<AtomicBool>,
    // Yields the number of requests the worker skipped after `closing` was set.
    worker: Option<JoinHandle<u64>>,
    dropped: AtomicU64,
    stats: Option<SharedSessionStats>,
}

impl TriggerDispatcher {
    /// Start a worker that delivers queued triggers through `notifier`.
    pub fn spawn<N>(notifier: N, queue_capacity: usize) -> std::io::Result<Self>
    where
        N: Notifier + Send + 'static,
    {
        let (sender, receiver) = bounded::<Instant>(queue_capacity.max(1));
        let evict = receiver.clone();
        let closing = Arc::new(AtomicBool::new(false));

        let worker_closing = closing.clone();
        let worker = thread::Builder::new()
            .name("trigger-dispatch".to_string())
            .spawn(move || {
                let mut skipped = 0;
                for requested_at in receiver.iter() {
                    if worker_closing.load(Ordering::SeqCst) {
                        skipped += 1;
                        continue;
                    }
                    tracing::debug!(waited = ?requested_at.elapsed(), "dispatching trigger");
                    notifier.trigger();
                }
                tracing::debug!("trigger dispatcher stopped");
                skipped
            })?;

        Ok(Self {
            sender: Some(sender),
            evict,
            closing,
            worker: Some(worker),
            dropped: AtomicU64::new(0),
            stats: None,
        })
    }

    /// Count dropped requests into the session stats.
    pub fn with_stats(mut self, stats: SharedSessionStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Requests waiting for the worker.
    pub fn pending(&self) -> usize {
        self.evict.len()
    }

    /// Requests discarded because the queue was full or the dispatcher shut down.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting requests, discard queued ones and wait for the
    /// in-flight trigger, which is bounded by the notifier's own timeouts.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.closing.store(true, Ordering::SeqCst);
        self.sender.take();

        let mut discarded = self.evict.try_iter().count() as u64;
        match worker.join() {
            Ok(skipped) => discarded += skipped,
            Err(_) => tracing::error!("trigger dispatcher worker panicked"),
        }

        if discarded > 0 {
            self.dropped.fetch_add(discarded, Ordering::Relaxed);
            if let Some(stats) = &self.stats {
                stats.record_triggers_dropped(discarded);
            }
            tracing::info!("discarded {} queued triggers on shutdown", discarded);
        }
    }
}

impl Notifier for TriggerDispatcher {
    /// Queue a trigger; returns `false` only if the worker is gone.
    fn trigger(&self) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };

        let mut request = Instant::now();
        loop {
            match sender.try_send(request) {
                Ok(()) => return true,
                Err(TrySendError::Full(rejected)) => {
                    request = rejected;
                    if self.evict.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        if let Some(stats) = &self.stats {
                            stats.record_trigger_dropped();
                        }
                        tracing::warn!("trigger queue full, dropped oldest pending trigger");
                    }
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }
}

impl Drop for TriggerDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Notifier that blocks until its gate is opened.
    struct GatedNotifier {
        gate: Receiver<()>,
        delivered: Arc<AtomicU64>,
    }

    impl Notifier for GatedNotifier {
        fn trigger(&self) -> bool {
            let _ = self.gate.recv();
            self.delivered.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn wait_for_empty_queue(dispatcher: &TriggerDispatcher) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while dispatcher.pending() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_delivers_queued_triggers() {
        let (gate_tx, gate_rx) = bounded::<()>(0);
        drop(gate_tx);
        let delivered = Arc::new(AtomicU64::new(0));
        let dispatcher = TriggerDispatcher::spawn(
            GatedNotifier {
                gate: gate_rx,
                delivered: delivered.clone(),
            },
            8,
        )
        .unwrap();

        for _ in 0..5 {
            assert!(dispatcher.trigger());
        }
        wait_for_empty_queue(&dispatcher);
        dispatcher.shutdown();

        assert_eq!(delivered.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let delivered = Arc::new(AtomicU64::new(0));
        let stats = crate::stats::create_shared_stats();
        let dispatcher = TriggerDispatcher::spawn(
            GatedNotifier {
                gate: gate_rx,
                delivered: delivered.clone(),
            },
            2,
        )
        .unwrap()
        .with_stats(stats.clone());

        for _ in 0..10 {
            assert!(dispatcher.trigger());
        }
        assert!(dispatcher.pending() <= 2);

        let dropped = dispatcher.dropped();
        // The worker holds at most one request while the queue holds two.
        assert!(dropped >= 7, "dropped {dropped}");

        drop(gate_tx);
        dispatcher.shutdown();

        // Overflow and shutdown discards both land in the stats.
        let total_dropped = stats.snapshot().triggers_dropped;
        assert!(total_dropped >= dropped);
        assert_eq!(delivered.load(Ordering::SeqCst) + total_dropped, 10);
    }

    #[test]
    fn test_shutdown_discards_queued_triggers() {
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let delivered = Arc::new(AtomicU64::new(0));
        let stats = crate::stats::create_shared_stats();
        let dispatcher = TriggerDispatcher::spawn(
            GatedNotifier {
                gate: gate_rx,
                delivered: delivered.clone(),
            },
            16,
        )
        .unwrap()
        .with_stats(stats.clone());

        for _ in 0..6 {
            assert!(dispatcher.trigger());
        }
        // Let the worker pick up the first request and block on it.
        let deadline = Instant::now() + Duration::from_secs(5);
        while dispatcher.pending() > 5 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        // Open the gate only for the in-flight trigger.
        let opener = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            let _ = gate_tx.send(());
        });
        let start = Instant::now();
        dispatcher.shutdown();
        let elapsed = start.elapsed();
        opener.join().unwrap();

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(stats.snapshot().triggers_dropped, 5);
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    }
}
