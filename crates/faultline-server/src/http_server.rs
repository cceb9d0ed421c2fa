//! HTTP listener lifecycle with health reporting and bounded drain.
//!
//! `Starting -> Serving -> Draining -> Stopped`. The health flag is set when
//! serving begins and cleared the moment shutdown is requested, before the
//! drain window opens. In-flight requests get `drain_timeout` to finish;
//! after that the server stops regardless.

use axum::Router;
use common::{Error, Result};
use faultline::HealthState;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Lifecycle phase of an [`HttpServer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Serving,
    Draining,
    Stopped,
}

/// HTTP server owning a bound listener
pub struct HttpServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
    health: Arc<HealthState>,
    drain_timeout: Duration,
    state_tx: watch::Sender<LifecycleState>,
}

impl HttpServer {
    /// Bind the listener. Failing to bind is fatal for the process.
    pub async fn bind(
        addr: SocketAddr,
        router: Router,
        health: Arc<HealthState>,
        drain_timeout: Duration,
    ) -> Result<Self> {
        let (state_tx, _) = watch::channel(LifecycleState::Starting);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::bind(addr, e))?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            router,
            health,
            drain_timeout,
            state_tx,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared health flag
    pub fn health(&self) -> Arc<HealthState> {
        self.health.clone()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    /// Serve until `shutdown` fires, then drain.
    ///
    /// Returns `Ok` when draining completes or the drain window elapses.
    /// An I/O failure of the server itself is returned as [`Error::Serve`].
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let Self {
            listener,
            local_addr,
            router,
            health,
            drain_timeout,
            state_tx,
        } = self;

        // Connections start closing only once health has dropped
        let drain = CancellationToken::new();
        let signal = drain.clone();
        let serve = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .into_future();
        tokio::pin!(serve);

        health.mark_healthy();
        state_tx.send_replace(LifecycleState::Serving);
        info!(addr = %local_addr, "Server is ready to handle requests");

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {}
            result = &mut serve => {
                // The accept loop only returns on its own when it fails.
                health.mark_unhealthy();
                state_tx.send_replace(LifecycleState::Stopped);
                let err = result.err().unwrap_or_else(|| {
                    std::io::Error::other("listener stopped without a shutdown request")
                });
                error!(error = %err, "Server stopped unexpectedly");
                return Err(Error::Serve(err));
            }
        }

        info!("Server is shutting down...");
        health.mark_unhealthy();
        state_tx.send_replace(LifecycleState::Draining);
        drain.cancel();

        // Connections still open when the window closes are abandoned.
        let result = match tokio::time::timeout(drain_timeout, serve).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(error = %e, "Unable to gracefully shutdown the server");
                Err(Error::Serve(e))
            }
            Err(_) => {
                warn!(
                    drain_timeout = ?drain_timeout,
                    "Drain window elapsed with requests in flight, forcing stop"
                );
                Ok(())
            }
        };

        state_tx.send_replace(LifecycleState::Stopped);
        info!("Server stopped");
        result
    }
}
