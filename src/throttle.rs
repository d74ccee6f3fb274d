//! Run a function at most once per interval.

use std::time::Duration;

use tokio::time::Instant;

/// Call gate that accepts at most one call per `limit`. The first call is
/// always accepted; rejected calls are dropped, not deferred.
#[derive(Debug, Clone)]
pub struct Throttle {
    limit: Duration,
    last_call: Option<Instant>,
}

impl Throttle {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            last_call: None,
        }
    }

    /// Run `f(arg)` if the gate is open. Returns `None` when throttled.
    pub fn call<A, R>(&mut self, arg: A, f: impl FnOnce(A) -> R) -> Option<R> {
        let now = Instant::now();
        if self
            .last_call
            .is_some_and(|last| now.duration_since(last) < self.limit)
        {
            return None;
        }
        self.last_call = Some(now);
        Some(f(arg))
    }
}

/// Wrap `f` into a throttled closure.
pub fn throttled<A, R>(limit: Duration, mut f: impl FnMut(A) -> R) -> impl FnMut(A) -> Option<R> {
    let mut gate = Throttle::new(limit);
    move |arg| gate.call(arg, &mut f)
}
