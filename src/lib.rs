pub mod config;
pub mod exposition;
pub mod observability;
pub mod showq;

pub use config::{ConfigError, ExporterConfig};
pub use exposition::{render_snapshot, serve, Exporter};
pub use showq::{
    FieldCarryover, QueueAggregator, QueueSnapshot, QueueStats, ScrapeError, ShowqCollector,
    UnixSocketConnector,
};
