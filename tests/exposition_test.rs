//! HTTP Exposition Integration Tests
//!
//! Starts the exposition endpoint on an ephemeral port and scrapes it with a
//! plain HTTP/1.1 request, verifying:
//! - One scrape per request, rendered as Prometheus gauges
//! - Queues absent from showq are absent from the output
//! - Connection failures yield an empty but successful response
//! - Unknown paths return 404
//! - Methods other than GET return 405 without scraping

use postfix_exporter::exposition::{serve, Exporter};
use postfix_exporter::showq::{
    Connector, MemoryConnector, ScrapeOptions, ShowqCollector, UnixSocketConnector,
};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

async fn start<C: Connector>(connector: C) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let exporter = Arc::new(Exporter::new(ShowqCollector::new(
        connector,
        ScrapeOptions::default(),
    )));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        serve(listener, exporter, "/metrics", async move {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    (addr, shutdown_tx)
}

/// Counts connection attempts made by the collector
#[derive(Clone, Default)]
struct CountingConnector {
    inner: MemoryConnector,
    connects: Arc<AtomicUsize>,
}

impl Connector for CountingConnector {
    type Stream = <MemoryConnector as Connector>::Stream;

    async fn connect(&self) -> io::Result<Self::Stream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.inner.connect().await
    }

    fn endpoint(&self) -> String {
        self.inner.endpoint()
    }
}

async fn get(addr: SocketAddr, path: &str) -> (u16, String) {
    request(addr, "GET", path).await
}

async fn request(addr: SocketAddr, method: &str, path: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        method, path
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let response = String::from_utf8(raw).unwrap();

    let status = response
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

#[tokio::test]
async fn test_metrics_endpoint_renders_queues() {
    let connector = MemoryConnector::from_tokens([
        "queue_name", "active", "message_size", "2048", "queue_id", "A1",
        "queue_name", "deferred", "message_size", "10", "queue_id", "D1",
        "queue_name", "deferred", "message_size", "20", "queue_id", "D2",
    ]);
    let (addr, shutdown) = start(connector).await;

    let (status, body) = get(addr, "/metrics").await;

    assert_eq!(status, 200);
    assert!(body.contains("# HELP postfix_queue_length Number of messages in the Postfix queue."));
    assert!(body.contains("postfix_queue_length{queue=\"active\"} 1"));
    assert!(body.contains("postfix_queue_length{queue=\"deferred\"} 2"));
    assert!(body.contains("postfix_queue_bytes{queue=\"deferred\"} 30"));
    assert!(!body.contains("queue=\"hold\""));

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_connect_failure_serves_empty_body() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, shutdown) = start(UnixSocketConnector::new(dir.path().join("showq"))).await;

    let (status, body) = get(addr, "/metrics").await;

    assert_eq!(status, 200);
    assert!(!body.contains("postfix_queue_length{"));

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let (addr, shutdown) = start(MemoryConnector::default()).await;

    let (status, _) = get(addr, "/").await;
    assert_eq!(status, 404);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_each_request_is_a_fresh_scrape() {
    let connector = MemoryConnector::from_tokens(["queue_name", "hold", "queue_id", "H1"]);
    let (addr, shutdown) = start(connector).await;

    let (_, first) = get(addr, "/metrics").await;
    let (_, second) = get(addr, "/metrics").await;

    // Counts are not accumulated across scrapes
    assert!(first.contains("postfix_queue_length{queue=\"hold\"} 1"));
    assert!(second.contains("postfix_queue_length{queue=\"hold\"} 1"));

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_head_is_rejected_without_scraping() {
    let connector = CountingConnector {
        inner: MemoryConnector::from_tokens(["queue_name", "active", "queue_id", "A1"]),
        ..CountingConnector::default()
    };
    let connects = Arc::clone(&connector.connects);
    let (addr, shutdown) = start(connector).await;

    let (status, _) = request(addr, "HEAD", "/metrics").await;
    assert_eq!(status, 405);
    let (status, _) = request(addr, "POST", "/metrics").await;
    assert_eq!(status, 405);
    assert_eq!(connects.load(Ordering::SeqCst), 0);

    let (status, body) = get(addr, "/metrics").await;
    assert_eq!(status, 200);
    assert!(body.contains("postfix_queue_length{queue=\"active\"} 1"));
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    let _ = shutdown.send(());
}
