//! Rate-limited outbound request loop for the worker role.

use crate::handlers::REQUEST_DURATION_HEADER;
use crate::middleware::REQUEST_ID_HEADER;
use crate::types::WorkerConfig;
use common::{Error, Result};
use faultline::{Percent, RandomSource, RateLimiter, correlation_id, roll_percent};
use reqwest::{Method, Url};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Response received by an outbound call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResponse {
    /// HTTP status code
    pub status: u16,

    /// Peer's `X-Request-Duration`, if it sent one
    pub duration: Option<String>,
}

/// One dispatch iteration
#[derive(Debug, Clone)]
pub struct OutboundCall {
    /// Correlation id sent as `X-Request-Id`
    pub id: String,
    pub method: Method,
    pub url: Url,
    /// Response, or the transport error rendered as text
    pub outcome: std::result::Result<CallResponse, String>,
    pub elapsed: Duration,
}

impl OutboundCall {
    /// Status code, if a response arrived
    pub fn status(&self) -> Option<u16> {
        self.outcome.as_ref().ok().map(|r| r.status)
    }

    /// Write the outcome to the log
    pub fn log(&self) {
        match &self.outcome {
            Ok(response) => info!(
                id = %self.id,
                method = %self.method,
                url = %self.url,
                status = response.status,
                duration = response.duration.as_deref().unwrap_or_default(),
                elapsed = ?self.elapsed,
                "Request completed"
            ),
            Err(error) => warn!(
                id = %self.id,
                method = %self.method,
                url = %self.url,
                elapsed = ?self.elapsed,
                error = %error,
                "Request failed"
            ),
        }
    }
}

/// Issues one GET per rate-limiter permit until canceled
pub struct RequestDispatcher {
    client: reqwest::Client,
    target: Url,
    fail: Percent,
    limiter: RateLimiter,
    rng: Arc<dyn RandomSource>,
}

impl RequestDispatcher {
    /// Create a dispatcher
    pub fn new(
        target: Url,
        fail: Percent,
        limiter: RateLimiter,
        timeout: Duration,
        rng: Arc<dyn RandomSource>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::client)?;

        Ok(Self {
            client,
            target,
            fail,
            limiter,
            rng,
        })
    }

    /// Create a dispatcher from the worker configuration
    pub fn from_config(config: &WorkerConfig, rng: Arc<dyn RandomSource>) -> Result<Self> {
        let limiter = RateLimiter::new(config.rate).map_err(Error::config)?;
        Self::new(
            config.target.clone(),
            config.fail,
            limiter,
            config.client_timeout,
            rng,
        )
    }

    /// Target URL without any correlation suffix
    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Run until `cancel` fires.
    ///
    /// Transport errors are logged and the loop moves on to the next permit;
    /// nothing is retried. A call still in flight when `cancel` fires is
    /// abandoned, so shutdown never waits on the client timeout.
    pub async fn run(self, cancel: CancellationToken) {
        info!(url = %self.target, rate = self.limiter.rate(), "Dispatcher started");

        while self.limiter.acquire(&cancel).await.is_ok() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(url = %self.target, "Outbound call abandoned on shutdown");
                    break;
                }
                call = self.dispatch_once() => call.log(),
            }
        }

        info!("Dispatcher stopped");
    }

    /// Issue a single outbound call
    pub async fn dispatch_once(&self) -> OutboundCall {
        let id = correlation_id(self.rng.as_ref());
        let url = self.request_url(&id);
        let method = Method::GET;

        let start = Instant::now();
        let result = self
            .client
            .request(method.clone(), url.clone())
            .header(REQUEST_ID_HEADER, id.as_str())
            .send()
            .await;
        let elapsed = start.elapsed();

        let outcome = result
            .map(|response| CallResponse {
                status: response.status().as_u16(),
                duration: response
                    .headers()
                    .get(REQUEST_DURATION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned),
            })
            .map_err(|e| e.to_string());

        OutboundCall {
            id,
            method,
            url,
            outcome,
            elapsed,
        }
    }

    /// The target, with `id` appended as a path segment when the fail roll hits.
    ///
    /// The peer rolls its own failures independently; the suffix is only a
    /// client-side marker.
    fn request_url(&self, id: &str) -> Url {
        if roll_percent(self.rng.as_ref()) < self.fail.get() {
            if let Ok(url) = self.target.join(&format!("{id}/")) {
                return url;
            }
        }
        self.target.clone()
    }
}
