//! Postfix showq protocol client
//!
//! The showq service answers every connection with a dump of the mail
//! queue: null-terminated key/value tokens, one group per message, each
//! group closed by a `queue_id` pair. This module turns that dump into
//! per-queue message counts, byte totals and oldest-message ages.
//!
//! - [`codec`]: splits the byte stream into tokens
//! - [`aggregator`]: folds tokens into per-queue statistics
//! - [`transport`]: opens the byte stream
//! - [`collector`]: runs one connect-decode-aggregate cycle

pub mod aggregator;
pub mod codec;
pub mod collector;
pub mod error;
pub mod transport;

pub use aggregator::{
    aggregate_stream, aggregate_tokens, FieldCarryover, PendingRecord, QueueAggregator,
    QueueSnapshot, QueueStats,
};
pub use codec::{token_stream, NulTokenCodec, TokenStream, DEFAULT_MAX_TOKEN_LEN};
pub use collector::{unix_now, ScrapeOptions, ShowqCollector};
pub use error::ScrapeError;
pub use transport::{Connector, MemoryConnector, UnixSocketConnector, DEFAULT_SHOWQ_PATH};
