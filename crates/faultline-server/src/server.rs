//! Role orchestration: wires handlers, middleware, lifecycle and dispatcher.

use crate::dispatcher::RequestDispatcher;
use crate::handlers::{AppState, server_router, worker_router};
use crate::http_server::{HttpServer, LifecycleState};
use crate::middleware::{RequestIdLayer, instrument};
use crate::types::Role;
use common::{Error, Result};
use faultline::{FaultConfig, HealthState, RandomSource, ThreadRandom};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, info, info_span};

/// A server or worker process
pub struct Harness {
    role: Role,
    bind_ip: IpAddr,
    rng: Arc<dyn RandomSource>,
    request_ids: RequestIdLayer,
}

impl Harness {
    /// Create a harness for `role`, listening on all interfaces
    pub fn new(role: Role) -> Self {
        Self {
            role,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            rng: Arc::new(ThreadRandom),
            request_ids: RequestIdLayer::new(),
        }
    }

    /// Listen on `ip` instead of all interfaces
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Use `rng` for fault rolls and correlation ids
    pub fn with_random_source(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    /// Use `layer` to assign request ids
    pub fn with_request_ids(mut self, layer: RequestIdLayer) -> Self {
        self.request_ids = layer;
        self
    }

    /// Bind the listener and prepare the role's tasks
    pub async fn bind(self) -> Result<BoundHarness> {
        let span = info_span!("faultline", name = self.role.name());
        self.bind_inner(span.clone()).instrument(span).await
    }

    /// Bind, then run until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        self.bind().await?.run(shutdown).await
    }

    /// Run until SIGINT, SIGTERM or `shutdown`, whichever comes first.
    ///
    /// The signal watcher runs beside the role and ends with it.
    pub async fn run_until_signal(self, shutdown: CancellationToken) -> Result<()> {
        let signals = shutdown_signal(shutdown.clone());
        let role = async {
            let result = self.run(shutdown.clone()).await;
            shutdown.cancel();
            result
        };

        let (result, ()) = tokio::join!(role, signals);
        result
    }

    async fn bind_inner(self, span: Span) -> Result<BoundHarness> {
        let port = self.role.listen_port();
        info!("Starting {} on port :{}", self.role.name(), port);

        let health = Arc::new(HealthState::new());

        let (router, dispatcher) = match &self.role {
            Role::Server(config) => {
                let state = AppState::new(
                    config.fault,
                    config.health_fail,
                    health.clone(),
                    self.rng.clone(),
                );
                (server_router(state), None)
            }
            Role::Worker(config) => {
                let state = AppState::new(
                    FaultConfig::default(),
                    config.health_fail,
                    health.clone(),
                    self.rng.clone(),
                );
                let dispatcher = RequestDispatcher::from_config(config, self.rng.clone())?;
                (worker_router(state), Some(dispatcher))
            }
        };

        let router = instrument(router, self.request_ids);
        let addr = SocketAddr::new(self.bind_ip, port);

        let server = HttpServer::bind(addr, router, health, self.role.drain_timeout())
            .await
            .inspect_err(|e| error!(error = %e, "Unable to start server"))?;

        Ok(BoundHarness {
            server,
            dispatcher,
            span,
        })
    }
}

/// A harness whose listener is bound
pub struct BoundHarness {
    server: HttpServer,
    dispatcher: Option<RequestDispatcher>,
    span: Span,
}

impl BoundHarness {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Shared health flag
    pub fn health(&self) -> Arc<HealthState> {
        self.server.health()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.server.subscribe()
    }

    /// Run the listener and, for workers, the dispatcher until `shutdown`
    /// fires. A fatal error in either task cancels the other.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let Self {
            server,
            dispatcher,
            span,
        } = self;

        let mut tasks = JoinSet::new();

        tasks.spawn(server.run(shutdown.clone()).instrument(span.clone()));

        if let Some(dispatcher) = dispatcher {
            let cancel = shutdown.clone();
            tasks.spawn(
                async move {
                    dispatcher.run(cancel).await;
                    Ok(())
                }
                .instrument(span.clone()),
            );
        }

        let mut result = Ok(());
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|e| Err(Error::other(e)));
            if let Err(e) = outcome {
                span.in_scope(|| error!(error = %e, "Fatal error, stopping"));
                shutdown.cancel();
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        result
    }
}

/// Wait for SIGINT (and SIGTERM on Unix), then cancel `token`.
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
        _ = token.cancelled() => return,
    }

    token.cancel();
}
