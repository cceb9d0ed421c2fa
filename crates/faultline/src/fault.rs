//! Fault injection decisions.
//!
//! Each request is decided independently from a fresh random draw. Nothing
//! here sleeps or writes a response; the HTTP handlers apply the outcome.

use crate::health::HealthState;
use crate::random::{RandomSource, roll_percent};
use crate::types::{FaultConfig, Percent};
use std::time::Duration;

/// Outcome for the primary endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Path is not the root. No delay, no roll.
    NotFound,
    /// Sleep for `delay`, then answer 200
    Success { delay: Duration },
    /// Sleep for `delay`, then answer 500
    Failure { delay: Duration },
}

impl IndexOutcome {
    /// HTTP status code for this outcome
    pub fn status(&self) -> u16 {
        match self {
            IndexOutcome::NotFound => 404,
            IndexOutcome::Success { .. } => 200,
            IndexOutcome::Failure { .. } => 500,
        }
    }

    /// Delay to apply before responding
    pub fn delay(&self) -> Duration {
        match self {
            IndexOutcome::NotFound => Duration::ZERO,
            IndexOutcome::Success { delay } | IndexOutcome::Failure { delay } => *delay,
        }
    }
}

/// Decide the primary endpoint's response.
///
/// A draw below `config.fail` fails the request. Both success and failure
/// wait `config.delay` first.
pub fn index_outcome(path: &str, config: &FaultConfig, rng: &dyn RandomSource) -> IndexOutcome {
    if path != "/" {
        return IndexOutcome::NotFound;
    }

    let delay = config.delay;
    if roll_percent(rng) < config.fail.get() {
        IndexOutcome::Failure { delay }
    } else {
        IndexOutcome::Success { delay }
    }
}

/// Outcome for the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthOutcome {
    /// 204 No Content
    Healthy,
    /// 503 Service Unavailable
    Unhealthy,
}

impl HealthOutcome {
    /// HTTP status code for this outcome
    pub fn status(&self) -> u16 {
        match self {
            HealthOutcome::Healthy => 204,
            HealthOutcome::Unhealthy => 503,
        }
    }
}

/// Decide the health endpoint's response.
///
/// Healthy only when the draw is strictly greater than `health_fail` and the
/// shared state is healthy. The strict comparison means a draw of 0 always
/// reports unhealthy, even with `health_fail` at 0.
pub fn health_outcome(
    health_fail: Percent,
    state: &HealthState,
    rng: &dyn RandomSource,
) -> HealthOutcome {
    if roll_percent(rng) > health_fail.get() && state.is_healthy() {
        HealthOutcome::Healthy
    } else {
        HealthOutcome::Unhealthy
    }
}
