//! One scrape of the showq service: connect, decode, aggregate.

use super::aggregator::{aggregate_stream, FieldCarryover, QueueAggregator, QueueSnapshot};
use super::codec::{token_stream, DEFAULT_MAX_TOKEN_LEN};
use super::error::ScrapeError;
use super::transport::Connector;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Decoding and aggregation settings applied to every scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeOptions {
    /// Largest token accepted from the wire
    pub max_token_len: usize,
    /// Field lifetime across records
    pub carryover: FieldCarryover,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        ScrapeOptions {
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
            carryover: FieldCarryover::Reset,
        }
    }
}

/// Produces a fresh [`QueueSnapshot`] per call. Holds no state between
/// scrapes.
#[derive(Debug, Clone)]
pub struct ShowqCollector<C> {
    connector: C,
    options: ScrapeOptions,
}

impl<C: Connector> ShowqCollector<C> {
    pub fn new(connector: C, options: ScrapeOptions) -> Self {
        ShowqCollector { connector, options }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn options(&self) -> &ScrapeOptions {
        &self.options
    }

    /// Scrape using the current wall-clock time as the age reference.
    pub async fn scrape(&self) -> Result<QueueSnapshot, ScrapeError> {
        self.scrape_at(unix_now()).await
    }

    /// Scrape with ages measured against `now` (Unix seconds).
    pub async fn scrape_at(&self, now: i64) -> Result<QueueSnapshot, ScrapeError> {
        let started = Instant::now();

        let stream = self
            .connector
            .connect()
            .await
            .map_err(|source| ScrapeError::Connect {
                endpoint: self.connector.endpoint(),
                source,
            })?;

        // The stream moves into the token stream and is dropped with it.
        let tokens = token_stream(stream, self.options.max_token_len);
        let aggregator = QueueAggregator::new(now).with_carryover(self.options.carryover);
        let snapshot = aggregate_stream(tokens, aggregator).await;

        debug!(
            queues = snapshot.len(),
            records = snapshot.total_messages(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Showq scrape complete"
        );
        Ok(snapshot)
    }
}

/// Current Unix time in seconds. A clock before the epoch reads as zero.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
