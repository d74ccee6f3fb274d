//! Periodic liveness counter on the host runtime.
//!
//! Independent of any dispatch; it only shares the host scheduler. Ticks
//! keep arriving while a worker computes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

const TICK_CHANNEL_CAPACITY: usize = 64;

/// Running liveness loop. Emits 0, 1, 2, … once per interval.
pub struct LivenessLoop {
    tx: broadcast::Sender<u64>,
    emitted: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl LivenessLoop {
    /// Start ticking. The first tick fires one interval from now.
    pub fn spawn(interval: Duration) -> Self {
        let (tx, _rx) = broadcast::channel(TICK_CHANNEL_CAPACITY);
        let emitted = Arc::new(AtomicU64::new(0));

        let handle = {
            let tx = tx.clone();
            let emitted = Arc::clone(&emitted);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                let mut counter: u64 = 0;
                loop {
                    ticker.tick().await;
                    info!(counter, "Main thread counter");
                    // Ok if nobody is subscribed.
                    let _ = tx.send(counter);
                    counter += 1;
                    emitted.store(counter, Ordering::Release);
                }
            })
        };

        Self {
            tx,
            emitted,
            handle,
        }
    }

    /// Receive every tick emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Number of ticks emitted so far.
    pub fn ticks(&self) -> u64 {
        self.emitted.load(Ordering::Acquire)
    }

    /// Stop the loop. Returns the last counter value emitted, if any.
    pub fn stop(self) -> Option<u64> {
        self.handle.abort();
        self.ticks().checked_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counter_increments_by_one_per_interval() {
        let start = Instant::now();
        let liveness = LivenessLoop::spawn(Duration::from_secs(1));
        let mut rx = liveness.subscribe();

        for expected in 0..5u64 {
            assert_eq!(rx.recv().await.unwrap(), expected);
        }
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(liveness.ticks(), 5);
        assert_eq!(liveness.stop(), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn no_tick_before_first_interval() {
        let liveness = LivenessLoop::spawn(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(liveness.ticks(), 0);
        assert_eq!(liveness.stop(), None);
    }
}
