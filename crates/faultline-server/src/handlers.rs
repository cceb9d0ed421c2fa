//! Fault-injecting HTTP handlers and role routers.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::any,
};
use faultline::{
    FaultConfig, HealthOutcome, HealthState, IndexOutcome, Percent, RandomSource, health_outcome,
    index_outcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Status code the handler resolved, as a decimal string
pub const RESPONSE_CODE_HEADER: &str = "x-response-code";

/// Wall-clock time spent inside the handler
pub const REQUEST_DURATION_HEADER: &str = "x-request-duration";

/// State shared by every handler of a role
#[derive(Clone)]
pub struct AppState {
    /// Failure percentage and delay for `/`
    pub fault: FaultConfig,

    /// Health endpoint percentage
    pub health_fail: Percent,

    /// Liveness flag owned by the lifecycle
    pub health: Arc<HealthState>,

    /// Source for fault rolls
    pub rng: Arc<dyn RandomSource>,
}

impl AppState {
    /// Create handler state
    pub fn new(
        fault: FaultConfig,
        health_fail: Percent,
        health: Arc<HealthState>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            fault,
            health_fail,
            health,
            rng,
        }
    }
}

/// Router for the server role: `/healthz` plus the fault-injecting responder
/// for every other path.
pub fn server_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", any(healthz))
        .fallback(index)
        .with_state(state)
}

/// Router for the worker role: `/healthz`, and 404 everywhere else.
pub fn worker_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", any(healthz))
        .fallback(not_found)
        .with_state(state)
}

/// Primary endpoint
pub async fn index(State(state): State<AppState>, uri: Uri) -> Response {
    let start = Instant::now();
    let outcome = index_outcome(uri.path(), &state.fault, state.rng.as_ref());

    let delay = outcome.delay();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    match outcome {
        IndexOutcome::NotFound => observed(StatusCode::NOT_FOUND, start, "404 - Not Found"),
        IndexOutcome::Failure { .. } => observed(
            StatusCode::INTERNAL_SERVER_ERROR,
            start,
            "500 - Internal Server Error",
        ),
        IndexOutcome::Success { .. } => plain_text(observed(StatusCode::OK, start, "200 - OK")),
    }
}

/// Fallback for paths nobody serves
pub async fn not_found() -> Response {
    observed(StatusCode::NOT_FOUND, Instant::now(), "404 - Not Found")
}

/// Health endpoint
pub async fn healthz(State(state): State<AppState>) -> Response {
    let start = Instant::now();
    let status = match health_outcome(state.health_fail, &state.health, state.rng.as_ref()) {
        HealthOutcome::Healthy => StatusCode::NO_CONTENT,
        HealthOutcome::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    plain_text(observed(status, start, ""))
}

/// Render a handler duration for `X-Request-Duration`, e.g. `12.034ms`.
pub fn format_duration(duration: Duration) -> String {
    format!("{:.3}ms", duration.as_secs_f64() * 1000.0)
}

/// Build a response carrying the status and duration headers.
fn observed(status: StatusCode, start: Instant, body: &'static str) -> Response {
    let mut response = if body.is_empty() {
        (status, Body::empty()).into_response()
    } else {
        (status, body).into_response()
    };

    let headers = response.headers_mut();
    headers.insert(RESPONSE_CODE_HEADER, HeaderValue::from(status.as_u16()));
    if let Ok(value) = HeaderValue::from_str(&format_duration(start.elapsed())) {
        headers.insert(REQUEST_DURATION_HEADER, value);
    }
    response
}

fn plain_text(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}
