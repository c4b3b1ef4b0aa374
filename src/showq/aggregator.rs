//! Queue aggregation over showq key/value tokens
//!
//! Tokens arrive as alternating key/value pairs. Fields accumulate in a
//! [`PendingRecord`] until a `queue_id` key closes the record, at which point
//! the record is folded into the [`QueueStats`] of its queue.
//!
//! Malformed input never fails a scrape: unparseable numbers count as zero,
//! and a truncated stream simply ends the scan with whatever was completed.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::io;
use tracing::{debug, warn};

/// Key carrying the queue a message sits in
pub const KEY_QUEUE_NAME: &[u8] = b"queue_name";
/// Key carrying the message size in bytes
pub const KEY_MESSAGE_SIZE: &[u8] = b"message_size";
/// Key carrying the arrival time as a Unix timestamp
pub const KEY_ARRIVAL_TIME: &[u8] = b"arrival_time";
/// Record delimiter; its value is never stored
pub const KEY_QUEUE_ID: &[u8] = b"queue_id";

/// What happens to pending fields once a record completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldCarryover {
    /// Start every record from defaults.
    #[default]
    Reset,
    /// Keep fields until a later token overwrites them. A record that omits
    /// a field inherits the previous record's value.
    Persist,
}

/// Fields seen so far for the message being assembled
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingRecord {
    pub queue_name: String,
    pub message_size: f64,
    pub arrival_time: i64,
}

/// Per-queue totals for one scrape
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueueStats {
    /// Completed records
    pub messages: u64,
    /// Sum of message sizes
    pub bytes: f64,
    /// Largest age seen, never below zero
    pub oldest_age_secs: i64,
}

impl QueueStats {
    fn record(&mut self, size: f64, age_secs: i64) {
        self.messages += 1;
        self.bytes += size;
        if age_secs > self.oldest_age_secs {
            self.oldest_age_secs = age_secs;
        }
    }
}

/// Finished aggregates for one scrape, keyed by queue name.
///
/// Only queues with at least one completed record are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    queues: BTreeMap<String, QueueStats>,
}

impl QueueSnapshot {
    pub fn get(&self, queue: &str) -> Option<&QueueStats> {
        self.queues.get(queue)
    }

    /// Queues in name order
    pub fn iter(&self) -> btree_map::Iter<'_, String, QueueStats> {
        self.queues.iter()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Completed records across all queues
    pub fn total_messages(&self) -> u64 {
        self.queues.values().map(|stats| stats.messages).sum()
    }
}

impl<'a> IntoIterator for &'a QueueSnapshot {
    type Item = (&'a String, &'a QueueStats);
    type IntoIter = btree_map::Iter<'a, String, QueueStats>;

    fn into_iter(self) -> Self::IntoIter {
        self.queues.iter()
    }
}

/// Folds key/value pairs into per-queue statistics.
///
/// `now` is the Unix time the scrape began; every age is measured against it.
#[derive(Debug, Clone)]
pub struct QueueAggregator {
    now: i64,
    carryover: FieldCarryover,
    pending: PendingRecord,
    queues: BTreeMap<String, QueueStats>,
}

impl QueueAggregator {
    pub fn new(now: i64) -> Self {
        QueueAggregator {
            now,
            carryover: FieldCarryover::default(),
            pending: PendingRecord::default(),
            queues: BTreeMap::new(),
        }
    }

    pub fn with_carryover(mut self, carryover: FieldCarryover) -> Self {
        self.carryover = carryover;
        self
    }

    #[cfg(test)]
    fn pending(&self) -> &PendingRecord {
        &self.pending
    }

    /// Apply one key/value pair. Unknown keys are ignored.
    ///
    /// Queue names are decoded lossily, so distinct invalid UTF-8 names
    /// fold into a single queue. Postfix queue names are ASCII; the merge
    /// is accepted.
    pub fn apply(&mut self, key: &[u8], value: &[u8]) {
        match key {
            KEY_QUEUE_NAME => {
                self.pending.queue_name = String::from_utf8_lossy(value).into_owned();
            }
            KEY_MESSAGE_SIZE => self.pending.message_size = parse_size(value),
            KEY_ARRIVAL_TIME => self.pending.arrival_time = parse_timestamp(value),
            KEY_QUEUE_ID => self.complete_record(),
            _ => {}
        }
    }

    fn complete_record(&mut self) {
        let age_secs = self.now.saturating_sub(self.pending.arrival_time);
        let size = self.pending.message_size;

        match self.queues.get_mut(self.pending.queue_name.as_str()) {
            Some(stats) => stats.record(size, age_secs),
            None => {
                let mut stats = QueueStats::default();
                stats.record(size, age_secs);
                self.queues.insert(self.pending.queue_name.clone(), stats);
            }
        }

        if self.carryover == FieldCarryover::Reset {
            self.pending = PendingRecord::default();
        }
    }

    pub fn finish(self) -> QueueSnapshot {
        QueueSnapshot {
            queues: self.queues,
        }
    }
}

/// Sizes must be finite and non-negative; anything else contributes zero.
fn parse_size(value: &[u8]) -> f64 {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|size| size.is_finite() && *size >= 0.0)
        .unwrap_or(0.0)
}

fn parse_timestamp(value: &[u8]) -> i64 {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0)
}

/// Aggregate an in-memory token sequence.
///
/// A trailing key without a value ends the scan.
pub fn aggregate_tokens<I>(tokens: I, aggregator: QueueAggregator) -> QueueSnapshot
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut aggregator = aggregator;
    let mut tokens = tokens.into_iter();

    while let Some(key) = tokens.next() {
        let Some(value) = tokens.next() else {
            debug!("Token stream ended between key and value");
            break;
        };
        aggregator.apply(key.as_ref(), value.as_ref());
    }

    aggregator.finish()
}

/// Aggregate a decoded token stream until it ends, is truncated, or errors.
///
/// Read and decode errors end the scan like end-of-stream does; the records
/// completed before the error are kept.
pub async fn aggregate_stream<S>(mut tokens: S, aggregator: QueueAggregator) -> QueueSnapshot
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    let mut aggregator = aggregator;

    loop {
        let Some(key) = next_token(&mut tokens).await else {
            break;
        };
        let Some(value) = next_token(&mut tokens).await else {
            debug!(
                key = %String::from_utf8_lossy(&key),
                "Token stream ended between key and value"
            );
            break;
        };
        aggregator.apply(&key, &value);
    }

    aggregator.finish()
}

async fn next_token<S>(tokens: &mut S) -> Option<Bytes>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    match tokens.next().await? {
        Ok(token) => Some(token),
        Err(e) => {
            warn!(error = %e, "Showq stream truncated");
            None
        }
    }
}
