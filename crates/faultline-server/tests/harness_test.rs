//! End-to-end tests for both roles through the harness

use axum::Router;
use common::Error;
use faultline::{FaultConfig, Percent, RandomSource};
use faultline_server::types::target_url;
use faultline_server::{Harness, LifecycleState, Role, ServerConfig, WorkerConfig};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Always draws the same value
struct Fixed(u32);

impl RandomSource for Fixed {
    fn below(&self, upper: u32) -> u32 {
        self.0 % upper
    }
}

fn server_role(fail: u32) -> Role {
    Role::Server(ServerConfig {
        port: 0,
        fault: FaultConfig::new(Percent::new(fail).unwrap(), Duration::ZERO),
        health_fail: Percent::ZERO,
        drain_timeout: Duration::from_secs(1),
    })
}

/// Helper to start a peer that counts requests
async fn counting_peer() -> (u16, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().fallback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            "ok"
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (port, hits)
}

#[tokio::test]
async fn test_server_role_end_to_end() {
    let bound = Harness::new(server_role(100))
        .with_bind_ip(LOOPBACK)
        .with_random_source(Arc::new(Fixed(50)))
        .bind()
        .await
        .unwrap();
    let addr = bound.local_addr();
    let mut state = bound.subscribe();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(bound.run(shutdown.clone()));

    state
        .wait_for(|s| *s == LifecycleState::Serving)
        .await
        .unwrap();

    let response = reqwest::get(format!("http://{}/", addr)).await.unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "500 - Internal Server Error");

    let response = reqwest::get(format!("http://{}/healthz", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    shutdown.cancel();
    handle.await.unwrap().unwrap();
    assert_eq!(*state.borrow(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_worker_role_drives_target_until_shutdown() {
    let (target_port, hits) = counting_peer().await;

    let mut config = WorkerConfig::new(target_url("http://127.0.0.1", target_port).unwrap());
    config.health_port = 0;
    config.rate = 20;
    config.drain_timeout = Duration::from_secs(1);

    let bound = Harness::new(Role::Worker(config))
        .with_bind_ip(LOOPBACK)
        .with_random_source(Arc::new(Fixed(50)))
        .bind()
        .await
        .unwrap();
    let addr = bound.local_addr();
    let health = bound.health();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(bound.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(400)).await;

    let response = reqwest::get(format!("http://{}/healthz", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    // The worker listener only serves health
    let response = reqwest::get(format!("http://{}/", addr)).await.unwrap();
    assert_eq!(response.status(), 404);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("Worker did not stop")
        .unwrap()
        .unwrap();

    assert!(!health.is_healthy());
    assert!(hits.load(Ordering::SeqCst) >= 3, "Worker sent too few requests");
}

#[tokio::test]
async fn test_port_in_use_is_fatal() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let role = Role::Server(ServerConfig {
        port,
        ..ServerConfig::default()
    });
    let result = Harness::new(role)
        .with_bind_ip(LOOPBACK)
        .run(CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::Bind { .. })));
}

#[tokio::test]
async fn test_worker_rejects_zero_rate() {
    let mut config = WorkerConfig::new(target_url("http://127.0.0.1", 9).unwrap());
    config.health_port = 0;
    config.rate = 0;

    let result = Harness::new(Role::Worker(config))
        .with_bind_ip(LOOPBACK)
        .bind()
        .await;

    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_worker_exits_within_drain_window_with_call_in_flight() {
    let router = Router::new().fallback(|| async {
        tokio::time::sleep(Duration::from_secs(4)).await;
        "late"
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target_port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let mut config = WorkerConfig::new(target_url("http://127.0.0.1", target_port).unwrap());
    config.health_port = 0;
    config.rate = 10;
    config.client_timeout = Duration::from_secs(10);
    config.drain_timeout = Duration::from_millis(200);

    let bound = Harness::new(Role::Worker(config))
        .with_bind_ip(LOOPBACK)
        .with_random_source(Arc::new(Fixed(50)))
        .bind()
        .await
        .unwrap();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(bound.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(300)).await;
    let start = std::time::Instant::now();
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("Worker did not stop")
        .unwrap()
        .unwrap();

    let elapsed = start.elapsed();
    assert!(
        elapsed < Duration::from_millis(700),
        "Worker took {:?} to stop with a 200ms drain window",
        elapsed
    );
}

#[tokio::test]
async fn test_run_until_signal_stops_on_token() {
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(
        Harness::new(server_role(0))
            .with_bind_ip(LOOPBACK)
            .run_until_signal(shutdown.clone()),
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("Harness did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_run_until_signal_returns_when_role_fails() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let role = Role::Server(ServerConfig {
        port,
        ..ServerConfig::default()
    });
    let shutdown = CancellationToken::new();

    // The signal watcher must not keep the call alive after a fatal error
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        Harness::new(role)
            .with_bind_ip(LOOPBACK)
            .run_until_signal(shutdown.clone()),
    )
    .await
    .expect("Signal watcher outlived the role");

    assert!(matches!(result, Err(Error::Bind { .. })));
    assert!(shutdown.is_cancelled());
}
