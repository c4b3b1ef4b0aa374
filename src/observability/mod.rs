//! Logging setup
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | RUST_LOG | info | `tracing` filter directives |
//! | POSTFIX_EXPORTER_LOG_JSON | false | Emit JSON lines instead of text |

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset or invalid
    pub default_directive: String,
    /// JSON output for log shippers
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            default_directive: "info".to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        LogConfig {
            json: std::env::var("POSTFIX_EXPORTER_LOG_JSON")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            ..Self::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_directive))
    }
}

/// Install the global subscriber. Call once, from `main`.
pub fn init_tracing(config: &LogConfig) {
    let builder = tracing_subscriber::fmt().with_env_filter(config.filter());
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
