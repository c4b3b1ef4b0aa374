//! Prometheus text rendering of a queue snapshot
//!
//! A new registry is built for every scrape, so queues that disappear from
//! the mail queue disappear from the output too.

use super::ExpositionError;
use crate::showq::QueueSnapshot;
use prometheus::{Encoder, GaugeVec, IntGaugeVec, Opts, Registry, TextEncoder};

/// Label carrying the queue name
pub const QUEUE_LABEL: &str = "queue";

pub const QUEUE_LENGTH: &str = "postfix_queue_length";
pub const QUEUE_BYTES: &str = "postfix_queue_bytes";
pub const QUEUE_OLDEST_AGE: &str = "postfix_queue_oldest_message_age_seconds";

/// Content type of the rendered body
pub fn content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

struct QueueGauges {
    registry: Registry,
    length: IntGaugeVec,
    bytes: GaugeVec,
    oldest_age: IntGaugeVec,
}

impl QueueGauges {
    fn new() -> Result<Self, ExpositionError> {
        let registry = Registry::new();
        let length = IntGaugeVec::new(
            Opts::new(QUEUE_LENGTH, "Number of messages in the Postfix queue."),
            &[QUEUE_LABEL],
        )?;
        let bytes = GaugeVec::new(
            Opts::new(QUEUE_BYTES, "Total size of messages in the queue in bytes."),
            &[QUEUE_LABEL],
        )?;
        let oldest_age = IntGaugeVec::new(
            Opts::new(
                QUEUE_OLDEST_AGE,
                "Age of the oldest message in the queue in seconds.",
            ),
            &[QUEUE_LABEL],
        )?;

        registry.register(Box::new(length.clone()))?;
        registry.register(Box::new(bytes.clone()))?;
        registry.register(Box::new(oldest_age.clone()))?;

        Ok(QueueGauges {
            registry,
            length,
            bytes,
            oldest_age,
        })
    }
}

/// Render one snapshot in the Prometheus text exposition format.
pub fn render_snapshot(snapshot: &QueueSnapshot) -> Result<Vec<u8>, ExpositionError> {
    let gauges = QueueGauges::new()?;

    for (queue, stats) in snapshot {
        let labels = [queue.as_str()];
        gauges
            .length
            .with_label_values(&labels)
            .set(i64::try_from(stats.messages).unwrap_or(i64::MAX));
        gauges.bytes.with_label_values(&labels).set(stats.bytes);
        gauges
            .oldest_age
            .with_label_values(&labels)
            .set(stats.oldest_age_secs);
    }

    let mut body = Vec::new();
    TextEncoder::new().encode(&gauges.registry.gather(), &mut body)?;
    Ok(body)
}
