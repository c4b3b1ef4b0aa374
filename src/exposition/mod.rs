//! HTTP exposition of showq queue statistics
//!
//! Every `GET` on the metrics path runs exactly one showq scrape and renders
//! the result. Nothing is cached between requests.

mod render;
mod server;

pub use render::{
    content_type, render_snapshot, QUEUE_BYTES, QUEUE_LABEL, QUEUE_LENGTH, QUEUE_OLDEST_AGE,
};
pub use server::{serve, Exporter};

/// Error rendering a snapshot
#[derive(Debug)]
pub enum ExpositionError {
    Prometheus(prometheus::Error),
}

impl std::fmt::Display for ExpositionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpositionError::Prometheus(e) => write!(f, "Prometheus encoding error: {}", e),
        }
    }
}

impl std::error::Error for ExpositionError {}

impl From<prometheus::Error> for ExpositionError {
    fn from(e: prometheus::Error) -> Self {
        ExpositionError::Prometheus(e)
    }
}
