//! Exporter configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file named
//! by `POSTFIX_EXPORTER_CONFIG`, then individual environment variables.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | POSTFIX_EXPORTER_CONFIG | unset | Path to a TOML config file |
//! | POSTFIX_EXPORTER_LISTEN | 0.0.0.0:9154 | HTTP listen address |
//! | POSTFIX_EXPORTER_METRICS_PATH | /metrics | Scrape path |
//! | POSTFIX_SHOWQ_PATH | /var/spool/postfix/public/showq | showq socket |
//! | POSTFIX_EXPORTER_SCRAPE_TIMEOUT_MS | unset | Per-scrape deadline |
//! | POSTFIX_SHOWQ_MAX_TOKEN_LEN | 65536 | Largest accepted token |
//! | POSTFIX_SHOWQ_CARRY_OVER_FIELDS | false | Keep fields across records |

use crate::showq::{FieldCarryover, ScrapeOptions, DEFAULT_MAX_TOKEN_LEN, DEFAULT_SHOWQ_PATH};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9154";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Names the TOML file to load
pub const CONFIG_FILE_ENV: &str = "POSTFIX_EXPORTER_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExporterConfig {
    /// HTTP listen address
    pub listen_addr: String,
    /// Path that triggers a scrape
    pub metrics_path: String,
    /// showq Unix socket
    pub showq_path: PathBuf,
    /// Per-scrape deadline; unset means no deadline
    pub scrape_timeout_ms: Option<u64>,
    /// Largest token accepted from showq
    pub max_token_len: usize,
    /// Keep pending fields across records instead of resetting them
    pub carry_over_fields: bool,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        ExporterConfig {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            showq_path: PathBuf::from(DEFAULT_SHOWQ_PATH),
            scrape_timeout_ms: None,
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
            carry_over_fields: false,
        }
    }
}

impl ExporterConfig {
    /// Load from the config file (if named) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("POSTFIX_EXPORTER_LISTEN") {
            self.listen_addr = addr;
        }
        if let Some(path) = lookup("POSTFIX_EXPORTER_METRICS_PATH") {
            self.metrics_path = path;
        }
        if let Some(path) = lookup("POSTFIX_SHOWQ_PATH") {
            self.showq_path = PathBuf::from(path);
        }
        if let Some(ms) = lookup("POSTFIX_EXPORTER_SCRAPE_TIMEOUT_MS") {
            self.scrape_timeout_ms = Some(parse_number("POSTFIX_EXPORTER_SCRAPE_TIMEOUT_MS", &ms)?);
        }
        if let Some(len) = lookup("POSTFIX_SHOWQ_MAX_TOKEN_LEN") {
            self.max_token_len = parse_number("POSTFIX_SHOWQ_MAX_TOKEN_LEN", &len)?;
        }
        if let Some(flag) = lookup("POSTFIX_SHOWQ_CARRY_OVER_FIELDS") {
            self.carry_over_fields = flag == "true" || flag == "1";
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_socket_addr()?;
        if !self.metrics_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "metrics_path must start with '/': {}",
                self.metrics_path
            )));
        }
        if self.max_token_len == 0 {
            return Err(ConfigError::Invalid("max_token_len must be positive".to_string()));
        }
        Ok(())
    }

    pub fn listen_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr.parse().map_err(|_| {
            ConfigError::Invalid(format!("listen_addr is not a socket address: {}", self.listen_addr))
        })
    }

    pub fn scrape_timeout(&self) -> Option<Duration> {
        self.scrape_timeout_ms.map(Duration::from_millis)
    }

    pub fn carryover(&self) -> FieldCarryover {
        if self.carry_over_fields {
            FieldCarryover::Persist
        } else {
            FieldCarryover::Reset
        }
    }

    pub fn scrape_options(&self) -> ScrapeOptions {
        ScrapeOptions {
            max_token_len: self.max_token_len,
            carryover: self.carryover(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} is not a number: {}", name, value)))
}

#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read
    Io { path: PathBuf, source: std::io::Error },
    /// Config file is not valid TOML for this schema
    Parse(toml::de::Error),
    /// A value is out of range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Cannot read config file {}: {}", path.display(), source)
            }
            ConfigError::Parse(e) => write!(f, "Invalid config file: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}
