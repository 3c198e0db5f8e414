//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shutdown_gate::config::{AppConfig, ShutdownConfig};
use shutdown_gate::http::{DrainOutcome, HttpServer};
use shutdown_gate::lifecycle::{Coordinator, ManualSignals, ShutdownEvents};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A coordinator driven by in-process signals instead of real ones.
pub fn coordinator(config: ShutdownConfig, signals: &ManualSignals, capture_panics: bool) -> Coordinator {
    Coordinator::builder(config)
        .signals(Arc::new(signals.clone()))
        .capture_panics(capture_panics)
        .build()
        .unwrap()
}

/// Start the bundled server on `addr`.
#[allow(dead_code)]
pub async fn start_server(
    addr: SocketAddr,
    coordinator: Coordinator,
) -> (JoinHandle<Result<DrainOutcome, std::io::Error>>, Arc<ShutdownEvents>) {
    let mut config = AppConfig::default();
    config.listener.bind_address = addr.to_string();

    let server = HttpServer::new(config, coordinator);
    let events = server.events();
    let listener = TcpListener::bind(addr).await.unwrap();
    let handle = tokio::spawn(server.run(listener));

    tokio::time::sleep(Duration::from_millis(100)).await;
    (handle, events)
}

/// Client without connection reuse so every request opens a new connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub async fn wait_until_draining(coordinator: &Coordinator) {
    for _ in 0..200 {
        if coordinator.is_draining() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("coordinator never started draining");
}
