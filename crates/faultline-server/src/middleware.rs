//! Per-request middleware: correlation id propagation and access logging.
//!
//! [`instrument`] applies both in a fixed order. The request-id layer wraps
//! the access-log layer, which wraps the router, so the log line sees the
//! final id and the headers the handler resolved.

use crate::handlers::{REQUEST_DURATION_HEADER, RESPONSE_CODE_HEADER};
use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, Request},
    http::header::HeaderValue,
    response::Response,
};
use std::{
    fmt,
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service, ServiceBuilder};
use tracing::info;
use uuid::Uuid;

/// The header name for the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generator for request ids when the client sends none
pub type MakeRequestId = Arc<dyn Fn() -> String + Send + Sync>;

/// Wrap `router` with request-id propagation and access logging.
pub fn instrument(router: Router, request_ids: RequestIdLayer) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(request_ids)
            .layer(AccessLogLayer::new()),
    )
}

/// Request ID attached to a request's extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Borrow the id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Layer that reuses or generates an `X-Request-Id` and echoes it back
#[derive(Clone)]
pub struct RequestIdLayer {
    make_id: MakeRequestId,
}

impl RequestIdLayer {
    /// Generate UUID v4 ids
    pub fn new() -> Self {
        Self::with_generator(|| Uuid::new_v4().to_string())
    }

    /// Generate ids with `make_id`
    pub fn with_generator(make_id: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            make_id: Arc::new(make_id),
        }
    }
}

impl Default for RequestIdLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestIdLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestIdLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService {
            inner,
            make_id: self.make_id.clone(),
        }
    }
}

/// Service that extracts or generates a request ID for each request
#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
    make_id: MakeRequestId,
}

impl<S> Service<Request<Body>> for RequestIdService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        // Empty or non-text inbound ids count as absent
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| (self.make_id)());

        let header = HeaderValue::from_str(&request_id).ok();
        if let Some(value) = &header {
            request.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
        }
        request.extensions_mut().insert(RequestId(request_id));

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(request).await?;

            if let Some(value) = header {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }

            Ok(response)
        })
    }
}

/// Layer that logs one line per completed request
#[derive(Debug, Clone, Default)]
pub struct AccessLogLayer;

impl AccessLogLayer {
    /// Create a new access log layer
    pub const fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService { inner }
    }
}

/// Service that logs the request after the inner service responds
#[derive(Debug, Clone)]
pub struct AccessLogService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for AccessLogService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unknown".to_string());
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let method = request.method().clone();
        let path = request.uri().path().to_owned();

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(request).await?;

            let headers = response.headers();
            let code = headers
                .get(RESPONSE_CODE_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            let duration = headers
                .get(REQUEST_DURATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();

            info!(
                request_id = %request_id,
                remote_addr = %remote_addr,
                method = %method,
                path = %path,
                code,
                duration,
                "Request completed"
            );

            Ok(response)
        })
    }
}
