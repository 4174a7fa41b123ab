//! Service runner lifecycle: start, serve, drain, stop.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::IntoResponse;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use rest_api::config::{AppConfig, ServiceConfig, TelemetryConfig};
use rest_api::handlers;
use rest_api::http::RequestContext;
use rest_api::lifecycle::{startup, RunnerState, ServiceRunner, ShutdownSignal};
use rest_api::observability::TelemetryHandles;
use rest_api::routing::{HandlerResult, RouteError, RouteTable, RouteTableBuilder};
use rest_api::ServiceError;

mod common;

/// Route table with a `GET /slow` handler that reports when it starts and
/// then sleeps for `delay`.
fn slow_routes(delay: Duration) -> (RouteTable, mpsc::Receiver<()>) {
    let (started_tx, started_rx) = mpsc::channel(4);
    let slow = move |_cx: RequestContext, _req: Request<Body>| {
        let started = started_tx.clone();
        async move {
            let _ = started.send(()).await;
            tokio::time::sleep(delay).await;
            HandlerResult::Ok("done".into_response())
        }
    };

    let mut builder = RouteTableBuilder::new();
    builder.register(Method::GET, "/slow", "Slow", slow).unwrap();
    (builder.build(), started_rx)
}

#[tokio::test]
async fn test_ping_then_graceful_stop() {
    let telemetry = common::telemetry();
    let routes = handlers::routes(&telemetry).unwrap();
    let (running, base) =
        common::start(routes, common::local_config(Duration::from_secs(2)), &telemetry).await;
    assert_eq!(running.state(), RunnerState::Serving);

    let response = reqwest::get(format!("{}/ping", base)).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"ping": "pong"}));

    let states = running.subscribe();
    let shutdown = running.shutdown_signal().clone();
    let started = Instant::now();
    assert!(shutdown.trigger());
    running.wait().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(*states.borrow(), RunnerState::Stopped);
}

#[tokio::test]
async fn test_double_trigger_is_single_shutdown() {
    let telemetry = common::telemetry();
    let (running, _base) = common::start(
        RouteTableBuilder::new().build(),
        common::local_config(Duration::from_secs(1)),
        &telemetry,
    )
    .await;

    let shutdown = running.shutdown_signal().clone();
    assert!(shutdown.trigger());
    assert!(!shutdown.trigger());
    running.wait().await.unwrap();
    assert!(!shutdown.trigger());
}

#[tokio::test]
async fn test_in_flight_request_completes_during_drain() {
    let telemetry = common::telemetry();
    let (routes, mut started) = slow_routes(Duration::from_millis(300));
    let (running, base) =
        common::start(routes, common::local_config(Duration::from_secs(3)), &telemetry).await;

    let client = tokio::spawn(async move { reqwest::get(format!("{}/slow", base)).await });
    started.recv().await.unwrap();

    running.shutdown_signal().trigger();
    running.wait().await.unwrap();

    let response = client.await.unwrap().unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "done");
}

#[tokio::test]
async fn test_blocked_handler_is_force_closed_at_deadline() {
    let telemetry = common::telemetry();
    let grace = Duration::from_millis(300);
    let (routes, mut started) = slow_routes(Duration::from_secs(30));
    let (running, base) = common::start(routes, common::local_config(grace), &telemetry).await;

    let client = tokio::spawn(async move { reqwest::get(format!("{}/slow", base)).await });
    started.recv().await.unwrap();

    let begin = Instant::now();
    running.shutdown_signal().trigger();
    let err = running.wait().await.unwrap_err();

    assert!(begin.elapsed() < grace + Duration::from_secs(1));
    match err {
        ServiceError::ShutdownTimeout { grace: reported, forced } => {
            assert_eq!(reported, grace);
            assert_eq!(forced, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!ServiceError::ShutdownTimeout { grace, forced: 1 }.is_fatal());

    // The client sees the connection go away rather than a response.
    assert!(client.await.unwrap().is_err());
}

#[tokio::test]
async fn test_new_connections_refused_after_stop() {
    let telemetry = common::telemetry();
    let (running, _base) = common::start(
        RouteTableBuilder::new().build(),
        common::local_config(Duration::from_secs(1)),
        &telemetry,
    )
    .await;
    let addr = running.local_addr();

    running.shutdown_signal().trigger();
    running.wait().await.unwrap();

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_address_in_use_is_bind_error() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let config = ServiceConfig {
        port,
        ..common::local_config(Duration::from_secs(1))
    };
    let runner = ServiceRunner::new(config, common::telemetry(), ShutdownSignal::new());
    let states = runner.subscribe();

    let err = runner.start(RouteTableBuilder::new().build()).await.err().unwrap();
    match &err {
        ServiceError::Bind { addr, source } => {
            assert_eq!(addr, &format!("127.0.0.1:{}", port));
            assert_eq!(source.kind(), std::io::ErrorKind::AddrInUse);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_fatal());
    assert_eq!(*states.borrow(), RunnerState::Failed);
}

#[tokio::test]
async fn test_run_reports_bind_error() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let config = AppConfig {
        service: ServiceConfig {
            port,
            ..common::local_config(Duration::from_secs(1))
        },
        telemetry: TelemetryConfig::default(),
    };
    let err = startup::run(config, ShutdownSignal::new()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Bind { .. }));
}

#[tokio::test]
async fn test_run_stops_cleanly_on_trigger() {
    let config = AppConfig {
        service: common::local_config(Duration::from_secs(1)),
        telemetry: TelemetryConfig::default(),
    };
    let shutdown = ShutdownSignal::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.trigger();
    });

    startup::run(config, shutdown).await.unwrap();
}

#[tokio::test]
async fn test_run_tears_down_after_in_flight_request() {
    let port = common::free_port();
    let config = AppConfig {
        service: ServiceConfig {
            port,
            ..common::local_config(Duration::from_secs(3))
        },
        telemetry: TelemetryConfig::default(),
    };

    let (started_tx, mut started_rx) = mpsc::channel(1);
    let finished_at = Arc::new(Mutex::new(None));
    let finished = Arc::clone(&finished_at);
    let slow = move |_cx: RequestContext, _req: Request<Body>| {
        let started = started_tx.clone();
        let finished = Arc::clone(&finished);
        async move {
            let _ = started.send(()).await;
            tokio::time::sleep(Duration::from_millis(300)).await;
            *finished.lock().unwrap() = Some(Instant::now());
            HandlerResult::Ok("done".into_response())
        }
    };
    let routes = move |_telemetry: &TelemetryHandles| -> Result<RouteTable, RouteError> {
        let mut builder = RouteTableBuilder::new();
        builder.register(Method::GET, "/slow", "Slow", slow)?;
        Ok(builder.build())
    };

    let shutdown = ShutdownSignal::new();
    let run = tokio::spawn(startup::run_with(config, shutdown.clone(), routes));

    let url = format!("http://127.0.0.1:{}/slow", port);
    let client = tokio::spawn(async move {
        loop {
            match reqwest::get(&url).await {
                Ok(response) => return response,
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
    });
    started_rx.recv().await.unwrap();

    shutdown.trigger();
    run.await.unwrap().unwrap();
    let returned_at = Instant::now();

    let handler_done = finished_at.lock().unwrap().expect("handler finished before teardown");
    assert!(handler_done <= returned_at);

    let response = client.await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "done");
}

#[tokio::test]
async fn test_run_triggered_during_startup_stops_cleanly() {
    let config = AppConfig {
        service: common::local_config(Duration::from_secs(1)),
        telemetry: TelemetryConfig::default(),
    };
    let shutdown = ShutdownSignal::new();
    shutdown.trigger();

    let begin = Instant::now();
    startup::run(config, shutdown).await.unwrap();
    assert!(begin.elapsed() < Duration::from_secs(1));
}
