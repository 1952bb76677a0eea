//! Bounded polling with optional backoff.
//!
//! Used wherever the pipeline has to wait for the page to reach some state
//! (document loaded, widget laid out) without a browser-side event to await.

use crate::Result;
use std::time::{Duration, Instant};

/// How long and how often to re-probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the second probe
    pub interval: Duration,
    /// Total time budget measured from the first probe
    pub deadline: Duration,
    /// Multiplier applied to the delay after each probe (1.0 => fixed interval)
    pub backoff: f64,
    /// Upper bound for the delay when backing off
    pub max_interval: Duration,
}

impl RetryPolicy {
    /// Fixed-interval polling.
    pub fn fixed(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline, backoff: 1.0, max_interval: interval }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        if self.backoff <= 1.0 {
            return current;
        }
        current.mul_f64(self.backoff).min(self.max_interval)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_millis(50), Duration::from_millis(3000))
    }
}

/// Outcome of [`poll_until`]: the last probed value, and whether it satisfied the condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Polled<T> {
    Ready(T),
    Exhausted(T),
}

impl<T> Polled<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Polled::Ready(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Polled::Ready(v) | Polled::Exhausted(v) => v,
        }
    }
}

/// Probe until `done` holds or the deadline passes.
///
/// The probe always runs at least once. Probe errors abort immediately.
pub fn poll_until<T, P, D>(policy: &RetryPolicy, mut probe: P, mut done: D) -> Result<Polled<T>>
where
    P: FnMut() -> Result<T>,
    D: FnMut(&T) -> bool,
{
    let start = Instant::now();
    let mut delay = policy.interval;
    let mut value = probe()?;
    loop {
        if done(&value) {
            return Ok(Polled::Ready(value));
        }
        let elapsed = start.elapsed();
        if elapsed >= policy.deadline {
            return Ok(Polled::Exhausted(value));
        }
        std::thread::sleep(delay.min(policy.deadline - elapsed));
        delay = policy.next_delay(delay);
        value = probe()?;
    }
}
