//! Connections to the showq service
//!
//! A [`Connector`] opens one fresh byte stream per scrape. The stream is
//! owned by the scrape and closed when dropped, whichever way the scrape
//! ends.
//!
//! Implementations:
//! - `UnixSocketConnector`: the local Postfix `showq` socket
//! - `MemoryConnector`: a canned payload, for tests and benchmarks

use bytes::Bytes;
use std::future::Future;
use std::io;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;
use tokio::net::UnixStream;

/// Default location of the Postfix showq socket
pub const DEFAULT_SHOWQ_PATH: &str = "/var/spool/postfix/public/showq";

pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + Unpin + Send + 'static;

    /// Open a new stream. Called once per scrape, never retried.
    fn connect(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;

    /// Human-readable target, used in logs and errors
    fn endpoint(&self) -> String;
}

/// Dials a Unix domain socket.
#[derive(Debug, Clone)]
pub struct UnixSocketConnector {
    path: PathBuf,
}

impl UnixSocketConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        UnixSocketConnector { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for UnixSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_SHOWQ_PATH)
    }
}

impl Connector for UnixSocketConnector {
    type Stream = UnixStream;

    async fn connect(&self) -> io::Result<UnixStream> {
        UnixStream::connect(&self.path).await
    }

    fn endpoint(&self) -> String {
        self.path.display().to_string()
    }
}

/// Serves the same payload on every connect.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    payload: Bytes,
}

impl MemoryConnector {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        MemoryConnector {
            payload: payload.into(),
        }
    }

    /// Encode tokens as the showq service would send them.
    pub fn from_tokens<I>(tokens: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut payload = Vec::new();
        for token in tokens {
            payload.extend_from_slice(token.as_ref());
            payload.push(super::codec::TOKEN_TERMINATOR);
        }
        Self::new(payload)
    }
}

impl Connector for MemoryConnector {
    type Stream = Cursor<Bytes>;

    async fn connect(&self) -> io::Result<Cursor<Bytes>> {
        Ok(Cursor::new(self.payload.clone()))
    }

    fn endpoint(&self) -> String {
        format!("memory ({} bytes)", self.payload.len())
    }
}
