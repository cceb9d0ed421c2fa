//! Process liveness flag shared by the health endpoint and the shutdown path.

use std::sync::atomic::{AtomicBool, Ordering};

/// Atomic health flag.
///
/// Starts unhealthy. The lifecycle marks it healthy once the listener is
/// bound and unhealthy as soon as shutdown begins. Every `/healthz` request
/// reads it; share it with `Arc`.
#[derive(Debug, Default)]
pub struct HealthState {
    healthy: AtomicBool,
}

impl HealthState {
    /// Create a new flag in the unhealthy state
    pub fn new() -> Self {
        Self::default()
    }

    /// Report healthy
    pub fn mark_healthy(&self) {
        self.healthy.store(true, Ordering::Release);
    }

    /// Report unhealthy
    pub fn mark_unhealthy(&self) {
        self.healthy.store(false, Ordering::Release);
    }

    /// Current value
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }
}
