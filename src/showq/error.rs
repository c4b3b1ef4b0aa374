//! Scrape errors
//!
//! Only failures that leave a scrape with no data at all are errors.
//! Malformed or truncated showq output degrades to fewer records instead.

use std::io;
use std::time::Duration;

#[derive(Debug)]
pub enum ScrapeError {
    /// The showq endpoint could not be reached
    Connect { endpoint: String, source: io::Error },
    /// The scrape did not finish within the configured deadline
    Timeout(Duration),
}

impl std::fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrapeError::Connect { endpoint, source } => {
                write!(f, "Could not connect to showq at {}: {}", endpoint, source)
            }
            ScrapeError::Timeout(limit) => {
                write!(f, "Scrape did not complete within {}ms", limit.as_millis())
            }
        }
    }
}

impl std::error::Error for ScrapeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScrapeError::Connect { source, .. } => Some(source),
            ScrapeError::Timeout(_) => None,
        }
    }
}
