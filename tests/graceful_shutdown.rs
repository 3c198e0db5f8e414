//! End-to-end drain behaviour over real TCP connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Extension;
use reqwest::StatusCode;
use shutdown_gate::config::{AppConfig, ShutdownConfig};
use shutdown_gate::http::{DrainOutcome, HttpServer, Renderer, StaticTemplates};
use shutdown_gate::lifecycle::{
    Coordinator, ListenerRef, ManualSignals, ServerContext, ShutdownEvents, Termination,
};
use tokio::sync::broadcast::error::TryRecvError;

mod common;

#[tokio::test]
async fn test_in_flight_request_completes_after_signal() {
    let addr: SocketAddr = "127.0.0.1:28481".parse().unwrap();
    let signals = ManualSignals::new();
    let coordinator = common::coordinator(ShutdownConfig::default(), &signals, false);
    let (handle, events) = common::start_server(addr, coordinator.clone()).await;
    let mut notices = events.subscribe();
    let client = common::client();

    // First request binds the coordinator to this server.
    let res = client.get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "ok");
    assert!(coordinator.is_bound());

    let slow = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .get(format!("http://{addr}/slow?timeout=500"))
                .send()
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(signals.raise(Termination::Terminate));
    common::wait_until_draining(&coordinator).await;

    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.listener.local_addr, addr);
    assert_eq!(notice.timeout_millis(), 10_000);

    let res = slow.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "completed");

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(outcome, DrainOutcome::Completed);

    // Listener is closed once draining finished.
    assert!(client.get(format!("http://{addr}/")).send().await.is_err());
}

#[tokio::test]
async fn test_drain_timeout_is_enforced() {
    let addr: SocketAddr = "127.0.0.1:28482".parse().unwrap();
    let signals = ManualSignals::new();
    let config = ShutdownConfig {
        timeout_ms: 200,
        ..ShutdownConfig::default()
    };
    let coordinator = common::coordinator(config, &signals, false);
    let (handle, _events) = common::start_server(addr, coordinator.clone()).await;
    let client = common::client();

    client.get(format!("http://{addr}/")).send().await.unwrap();

    let _slow = tokio::spawn({
        let client = client.clone();
        async move {
            let _ = client
                .get(format!("http://{addr}/slow?timeout=5000"))
                .send()
                .await;
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    signals.raise(Termination::Interrupt);

    let outcome = tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("deadline was not enforced")
        .unwrap()
        .unwrap();
    assert_eq!(outcome, DrainOutcome::TimedOut);
}

#[tokio::test]
async fn test_requests_during_drain_are_rejected() {
    let addr: SocketAddr = "127.0.0.1:28483".parse().unwrap();
    let signals = ManualSignals::new();
    let mut config = ShutdownConfig {
        template: Some("down".into()),
        ..ShutdownConfig::default()
    };
    config.shutdown_headers.insert("Retry-After".into(), "30".into());

    let templates: Arc<dyn Renderer> =
        Arc::new(StaticTemplates::new().with("down", "<h1>Back soon</h1>"));
    let coordinator = Coordinator::builder(config)
        .signals(Arc::new(signals.clone()))
        .capture_panics(false)
        .renderer(templates)
        .build()
        .unwrap();

    // A host that records the notice but keeps the listener open, so the
    // rejection path is reachable over new connections.
    let events = Arc::new(ShutdownEvents::new());
    let mut notices = events.subscribe();
    let server = HttpServer::new(AppConfig::default(), coordinator.clone());
    let app = server.router().layer(Extension(ServerContext {
        host: events.clone(),
        listener: ListenerRef { local_addr: addr },
    }));
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = common::client();
    let res = client.get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("retry-after").is_none());

    for _ in 0..10 {
        signals.raise(Termination::Terminate);
        signals.raise(Termination::Interrupt);
    }
    common::wait_until_draining(&coordinator).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    notices.recv().await.unwrap();
    assert!(matches!(notices.try_recv(), Err(TryRecvError::Empty)));

    let res = client
        .get(format!("http://{addr}/"))
        .header("accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.headers()["connection"], "close");
    assert_eq!(res.headers()["retry-after"], "30");
    assert_eq!(
        res.text().await.unwrap(),
        r#"{"message":"Server is shutting down."}"#
    );

    let res = client
        .get(format!("http://{addr}/slow?timeout=1"))
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.text().await.unwrap(), "<h1>Back soon</h1>");

    let rejected = futures_util::future::join_all((0..20).map(|_| {
        let client = client.clone();
        async move {
            client
                .get(format!("http://{addr}/"))
                .send()
                .await
                .map(|res| res.status())
        }
    }))
    .await;
    assert!(rejected
        .into_iter()
        .all(|status| status.unwrap() == StatusCode::SERVICE_UNAVAILABLE));
}
