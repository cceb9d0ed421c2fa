//! Token bucket rate limiter with a burst of one.
//!
//! Permits are handed out at a steady `rate` per second. The bucket holds at
//! most one permit and starts empty, so the first caller waits up to one
//! interval unless the limiter has been idle. Reservations are taken under a
//! short mutex; waiting happens outside it.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Rate limiter errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// A rate of zero would never grant a permit, so it is rejected up front.
    #[error("rate must be at least one permit per second")]
    ZeroRate,

    #[error("permit acquisition canceled")]
    Canceled,
}

/// Thread-safe token bucket.
#[derive(Debug)]
pub struct RateLimiter {
    rate: u32,
    interval: Duration,
    /// Earliest instant the next permit may be granted
    next_permit: Mutex<Instant>,
}

impl RateLimiter {
    /// Create a limiter granting `rate` permits per second.
    ///
    /// Returns [`RateLimitError::ZeroRate`] for a rate of zero.
    pub fn new(rate: u32) -> Result<Self, RateLimitError> {
        if rate == 0 {
            return Err(RateLimitError::ZeroRate);
        }

        // Rates above 1e9/s would round to a zero interval and never wait
        let interval = (Duration::from_secs(1) / rate).max(Duration::from_nanos(1));
        Ok(Self {
            rate,
            interval,
            next_permit: Mutex::new(Instant::now() + interval),
        })
    }

    /// Permits per second
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Minimum spacing between two permits
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for one permit.
    ///
    /// Returns [`RateLimitError::Canceled`] if `cancel` fires first; the
    /// reserved slot is handed back when no later reservation depends on it.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), RateLimitError> {
        if cancel.is_cancelled() {
            return Err(RateLimitError::Canceled);
        }

        let at = self.reserve();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.release(at);
                debug!("Rate limiter wait canceled");
                Err(RateLimitError::Canceled)
            }
            _ = sleep_until(at) => Ok(()),
        }
    }

    /// Claim the next slot and return when it becomes available.
    fn reserve(&self) -> Instant {
        let mut next = self
            .next_permit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // An idle bucket refills to one permit, never more.
        let at = (*next).max(Instant::now());
        *next = at + self.interval;
        at
    }

    /// Give back a slot claimed by a canceled wait.
    fn release(&self, at: Instant) {
        let mut next = self
            .next_permit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if *next == at + self.interval {
            *next = at;
        }
    }
}
