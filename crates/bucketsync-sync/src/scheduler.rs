//! Event scheduler - turns raw watcher output into the settled event sequence
//!
//! The [`EventScheduler`] sits between the [`FileWatcher`](super::watcher::FileWatcher)
//! and the [`SyncLoop`](super::engine::SyncLoop). It receives raw signals,
//! feeds change events through a [`DebouncedChangeQueue`], and on every tick
//! of the poll interval forwards the settled ones, in order, to the loop.
//!
//! ## Flow
//!
//! ```text
//! FileWatcher ──→ raw mpsc ──→ EventScheduler ──→ settled mpsc ──→ SyncLoop
//!                                   │
//!                           DebouncedChangeQueue
//! ```
//!
//! Watcher errors bypass the queue and are forwarded immediately. When the
//! raw channel closes (the watcher was dropped) the queue is flushed and the
//! settled channel closes too, which the loop sees as the Closed signal.

use std::time::Duration;

use bucketsync_core::domain::{ChangeEvent, WatchSignal};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::watcher::{warn_if_lagging, DebouncedChangeQueue};

/// Capacity of the settled event channel feeding the sync loop
pub const SETTLED_CHANNEL_CAPACITY: usize = 256;

/// Debounces raw watcher signals and delivers them on a fixed tick
pub struct EventScheduler {
    raw_rx: mpsc::Receiver<WatchSignal>,
    settled_tx: mpsc::Sender<WatchSignal>,
    queue: DebouncedChangeQueue,
    poll_interval: Duration,
}

impl EventScheduler {
    /// Creates a new `EventScheduler`
    ///
    /// # Arguments
    /// * `raw_rx` - Receiver of raw signals from the watcher
    /// * `debounce_delay` - How long a path must be quiet before its event is delivered
    /// * `poll_interval` - How often settled events are delivered
    ///
    /// # Returns
    /// The scheduler and the receiver to hand to the sync loop.
    pub fn new(
        raw_rx: mpsc::Receiver<WatchSignal>,
        debounce_delay: Duration,
        poll_interval: Duration,
    ) -> (Self, mpsc::Receiver<WatchSignal>) {
        let (settled_tx, settled_rx) = mpsc::channel(SETTLED_CHANNEL_CAPACITY);

        debug!(
            debounce_ms = debounce_delay.as_millis() as u64,
            poll_ms = poll_interval.as_millis() as u64,
            "Creating event scheduler"
        );

        let scheduler = Self {
            raw_rx,
            settled_tx,
            queue: DebouncedChangeQueue::new(debounce_delay),
            poll_interval,
        };

        (scheduler, settled_rx)
    }

    /// Main loop of the scheduler
    ///
    /// Runs until the raw channel closes, the loop's receiver is dropped, or
    /// `shutdown` is cancelled. Consuming `self` drops the settled sender on
    /// return, closing the loop's channel.
    pub async fn run(mut self, shutdown: CancellationToken) {
        debug!("Event scheduler starting");

        let mut poll_timer = tokio::time::interval(self.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(
                        pending = self.queue.pending_count(),
                        "Shutdown requested, scheduler stopping"
                    );
                    break;
                }

                signal = self.raw_rx.recv() => {
                    match signal {
                        Some(WatchSignal::Event(change)) => {
                            self.queue.push(change);
                            warn_if_lagging(&self.queue);
                        }
                        Some(error @ WatchSignal::Error(_)) => {
                            if self.settled_tx.send(error).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            info!("Watcher channel closed, flushing pending changes");
                            let remaining = self.queue.drain();
                            self.forward(remaining).await;
                            break;
                        }
                    }
                }

                _ = poll_timer.tick() => {
                    let settled = self.queue.poll();
                    if !self.forward(settled).await {
                        break;
                    }
                }
            }
        }

        debug!("Event scheduler stopped");
    }

    /// Sends events to the loop in order; returns false once the loop is gone
    async fn forward(&self, events: Vec<ChangeEvent>) -> bool {
        for event in events {
            debug!(path = %event.path.display(), kind = %event.kind, "Delivering settled event");
            if self.settled_tx.send(WatchSignal::Event(event)).await.is_err() {
                debug!("Sync loop receiver dropped");
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use bucketsync_core::domain::ChangeKind;

    use super::*;

    fn setup(
        debounce_ms: u64,
    ) -> (
        mpsc::Sender<WatchSignal>,
        EventScheduler,
        mpsc::Receiver<WatchSignal>,
    ) {
        let (raw_tx, raw_rx) = mpsc::channel(16);
        let (scheduler, settled_rx) = EventScheduler::new(
            raw_rx,
            Duration::from_millis(debounce_ms),
            Duration::from_millis(10),
        );
        (raw_tx, scheduler, settled_rx)
    }

    fn event_path(signal: WatchSignal) -> PathBuf {
        match signal {
            WatchSignal::Event(e) => e.path,
            WatchSignal::Error(msg) => panic!("unexpected error signal: {msg}"),
        }
    }

    #[tokio::test]
    async fn test_forwards_settled_events_in_order() {
        let (raw_tx, scheduler, mut settled_rx) = setup(0);
        let handle = tokio::spawn(scheduler.run(CancellationToken::new()));

        raw_tx.send(WatchSignal::Event(ChangeEvent::created("/r/a.txt"))).await.unwrap();
        raw_tx.send(WatchSignal::Event(ChangeEvent::created("/r/b.txt"))).await.unwrap();
        drop(raw_tx);

        assert_eq!(event_path(settled_rx.recv().await.unwrap()), PathBuf::from("/r/a.txt"));
        assert_eq!(event_path(settled_rx.recv().await.unwrap()), PathBuf::from("/r/b.txt"));
        assert!(settled_rx.recv().await.is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_coalesces_burst_for_same_path() {
        let (raw_tx, scheduler, mut settled_rx) = setup(3_600_000);
        let handle = tokio::spawn(scheduler.run(CancellationToken::new()));

        raw_tx.send(WatchSignal::Event(ChangeEvent::created("/r/a.txt"))).await.unwrap();
        raw_tx.send(WatchSignal::Event(ChangeEvent::modified("/r/a.txt"))).await.unwrap();
        raw_tx.send(WatchSignal::Event(ChangeEvent::modified("/r/a.txt"))).await.unwrap();
        drop(raw_tx);

        match settled_rx.recv().await.unwrap() {
            WatchSignal::Event(e) => assert_eq!(e.kind, ChangeKind::Modified),
            other => panic!("unexpected signal: {other:?}"),
        }
        assert!(settled_rx.recv().await.is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_errors_bypass_debounce() {
        let (raw_tx, scheduler, mut settled_rx) = setup(3_600_000);
        let handle = tokio::spawn(scheduler.run(CancellationToken::new()));

        raw_tx.send(WatchSignal::Event(ChangeEvent::created("/r/a.txt"))).await.unwrap();
        raw_tx.send(WatchSignal::Error("inotify overflow".to_string())).await.unwrap();

        assert_eq!(
            settled_rx.recv().await.unwrap(),
            WatchSignal::Error("inotify overflow".to_string())
        );

        drop(raw_tx);
        assert_eq!(event_path(settled_rx.recv().await.unwrap()), PathBuf::from("/r/a.txt"));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_closes_settled_channel() {
        let (_raw_tx, scheduler, mut settled_rx) = setup(0);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(shutdown.clone()));

        shutdown.cancel();

        assert!(settled_rx.recv().await.is_none());
        handle.await.unwrap();
    }
}
