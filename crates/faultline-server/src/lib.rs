//! Faultline harness - server and worker roles
//!
//! A single binary that runs in one of two roles:
//!
//! - **Server**: answers `GET /` with an injected failure rate and delay,
//!   and reports health on `/healthz`.
//! - **Worker**: drives a target at a fixed request rate through a token
//!   bucket and exposes its own `/healthz`.
//!
//! # Components
//!
//! - **Handlers**: fault-injecting responders and role routers
//! - **Middleware**: `X-Request-Id` propagation and access logging
//! - **HttpServer**: listener lifecycle with health flip and bounded drain
//! - **RequestDispatcher**: the worker's rate-limited outbound loop
//! - **Harness**: wires the pieces for the selected role

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod handlers;
pub mod http_server;
pub mod middleware;
pub mod server;
pub mod types;

pub use cli::{Cli, Command};
pub use config::{Config, ConfigError};
pub use dispatcher::{OutboundCall, RequestDispatcher};
pub use http_server::{HttpServer, LifecycleState};
pub use middleware::{REQUEST_ID_HEADER, RequestId, RequestIdLayer};
pub use server::{BoundHarness, Harness, shutdown_signal};
pub use types::{Role, RoleKind, ServerConfig, WorkerConfig};
