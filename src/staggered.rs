//! Staggered squaring chain.
//!
//! Each step waits a little longer than the one before it. The growing delay
//! is an explicit accumulator passed into and returned from every call, so
//! no state outlives the chain.

use std::time::Duration;

use tracing::debug;

/// Delay accumulator threaded through a chain of calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaggeredDelay {
    /// Delay applied to the next call.
    pub next: Duration,
    /// Increment added after every call.
    pub step: Duration,
}

impl StaggeredDelay {
    pub fn new(first: Duration, step: Duration) -> Self {
        Self { next: first, step }
    }

    /// The accumulator after one more call.
    pub fn advanced(self) -> Self {
        Self {
            next: self.next.saturating_add(self.step),
            step: self.step,
        }
    }
}

impl Default for StaggeredDelay {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(1))
    }
}

/// Wait `delay.next`, then return `num²` (or `None` on overflow) along with
/// the advanced accumulator.
pub async fn square_later(num: u64, delay: StaggeredDelay) -> (Option<u64>, StaggeredDelay) {
    tokio::time::sleep(delay.next).await;
    let square = num.checked_mul(num);
    debug!(num, ?square, waited_ms = delay.next.as_millis() as u64, "Squared");
    (square, delay.advanced())
}

/// Square `seed` repeatedly, `depth` times, each step feeding the next.
/// Returns the squares produced; stops early on overflow.
pub async fn square_chain(seed: u64, depth: usize, mut delay: StaggeredDelay) -> Vec<u64> {
    let mut squares = Vec::with_capacity(depth);
    let mut current = seed;
    for _ in 0..depth {
        let (square, next_delay) = square_later(current, delay).await;
        delay = next_delay;
        match square {
            Some(square) => {
                squares.push(square);
                current = square;
            }
            None => break,
        }
    }
    squares
}
