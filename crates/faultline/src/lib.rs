//! Core primitives for the Faultline traffic harness.
//!
//! Faultline exercises resiliency tooling with synthetic traffic. A server
//! answers HTTP requests with injected latency and failures, a worker issues
//! rate-limited requests against a target. This crate holds the pieces both
//! roles share and that carry real invariants:
//!
//! - **HealthState**: atomic liveness flag read by `/healthz` and flipped by
//!   the shutdown sequence
//! - **RateLimiter**: token bucket (burst of one) gating the worker's dispatch loop
//! - **Fault decisions**: pure functions mapping a failure percentage and a
//!   random draw to a response outcome
//! - **RandomSource**: injectable randomness for fault rolls and correlation ids
//!
//! # Example
//!
//! ```no_run
//! use faultline::{RateLimiter, SeededRandom, correlation_id};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = RateLimiter::new(10)?;
//! let cancel = CancellationToken::new();
//! let rng = SeededRandom::new(7);
//!
//! limiter.acquire(&cancel).await?;
//! let id = correlation_id(&rng);
//! assert_eq!(id.len(), 6);
//! # Ok(())
//! # }
//! ```

pub mod fault;
pub mod health;
pub mod random;
pub mod rate_limit;
pub mod types;

pub use fault::{HealthOutcome, IndexOutcome, health_outcome, index_outcome};
pub use health::HealthState;
pub use random::{RandomSource, SeededRandom, ThreadRandom, correlation_id, roll_percent};
pub use rate_limit::{RateLimitError, RateLimiter};
pub use types::{FaultConfig, Percent, PercentError};
