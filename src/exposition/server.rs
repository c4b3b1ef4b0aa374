use super::render::{content_type, render_snapshot};
use crate::showq::{Connector, QueueSnapshot, ScrapeError, ShowqCollector};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Wires a [`ShowqCollector`] to the HTTP endpoint.
///
/// Scrapes are serialized: concurrent requests wait for the scrape in
/// flight and then run their own.
pub struct Exporter<C> {
    collector: ShowqCollector<C>,
    scrape_timeout: Option<Duration>,
    scrape_lock: Mutex<()>,
}

impl<C: Connector> Exporter<C> {
    pub fn new(collector: ShowqCollector<C>) -> Self {
        Exporter {
            collector,
            scrape_timeout: None,
            scrape_lock: Mutex::new(()),
        }
    }

    /// Abandon scrapes that run longer than `timeout`. `None` waits forever.
    pub fn with_scrape_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.scrape_timeout = timeout;
        self
    }

    /// The timeout covers waiting for a scrape already in flight.
    pub async fn scrape(&self) -> Result<QueueSnapshot, ScrapeError> {
        let scrape = async {
            let _guard = self.scrape_lock.lock().await;
            self.collector.scrape().await
        };

        match self.scrape_timeout {
            // Dropping the timed-out future closes its connection.
            Some(limit) => tokio::time::timeout(limit, scrape)
                .await
                .map_err(|_| ScrapeError::Timeout(limit))?,
            None => scrape.await,
        }
    }

    /// Scrape and render. A failed scrape renders as an empty body.
    pub async fn render(&self) -> Vec<u8> {
        let snapshot = match self.scrape().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "Showq scrape failed");
                return Vec::new();
            }
        };

        match render_snapshot(&snapshot) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Failed to render queue metrics");
                Vec::new()
            }
        }
    }
}

/// Accept HTTP connections until `shutdown` resolves.
pub async fn serve<C, F>(
    listener: TcpListener,
    exporter: Arc<Exporter<C>>,
    metrics_path: impl Into<Arc<str>>,
    shutdown: F,
) -> std::io::Result<()>
where
    C: Connector,
    F: Future<Output = ()>,
{
    let metrics_path: Arc<str> = metrics_path.into();
    let local_addr = listener.local_addr()?;
    info!(
        addr = %local_addr,
        path = %metrics_path,
        "Exposition endpoint ready"
    );

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down exposition endpoint");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    let exporter = Arc::clone(&exporter);
                    let metrics_path = Arc::clone(&metrics_path);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, peer_addr, exporter, metrics_path).await {
                            warn!("HTTP connection error from {}: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

async fn serve_connection<C: Connector>(
    stream: TcpStream,
    peer_addr: SocketAddr,
    exporter: Arc<Exporter<C>>,
    metrics_path: Arc<str>,
) -> Result<(), hyper::Error> {
    debug!("Scraper connected: {}", peer_addr);

    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<Incoming>| {
        let exporter = Arc::clone(&exporter);
        let metrics_path = Arc::clone(&metrics_path);
        async move { Ok::<_, hyper::Error>(handle_request(req, &exporter, &metrics_path).await) }
    });
    http1::Builder::new().serve_connection(io, service).await
}

async fn handle_request<C: Connector>(
    req: Request<Incoming>,
    exporter: &Exporter<C>,
    metrics_path: &str,
) -> Response<Full<Bytes>> {
    if req.uri().path() != metrics_path {
        return plain_response(StatusCode::NOT_FOUND, "not found");
    }
    // Only GET triggers a scrape
    if *req.method() != Method::GET {
        return plain_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }

    let body = exporter.render().await;
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type())
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| plain_response(StatusCode::INTERNAL_SERVER_ERROR, "bad response"))
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
