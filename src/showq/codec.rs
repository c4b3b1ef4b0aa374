//! Null-terminated token codec for the showq wire format
//!
//! The showq service writes a flat sequence of byte strings, each terminated
//! by a single `0x00`. This codec only splits tokens; it knows nothing about
//! which tokens are keys and which are values.
//!
//! Wrapping any `AsyncRead` in a [`TokenStream`] yields a lazy, finite token
//! sequence. The same codec drives the Unix socket in production and `&[u8]`
//! buffers in tests.

use bytes::{Buf, Bytes, BytesMut};
use std::io;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};
use tracing::{debug, warn};

/// Token terminator
pub const TOKEN_TERMINATOR: u8 = 0x00;

/// Largest token accepted before the stream is considered corrupt (64 KiB)
pub const DEFAULT_MAX_TOKEN_LEN: usize = 64 * 1024;

/// Lazy token sequence over an async byte source
pub type TokenStream<R> = FramedRead<R, NulTokenCodec>;

/// Splits a byte stream into null-terminated tokens.
#[derive(Debug, Clone)]
pub struct NulTokenCodec {
    max_token_len: usize,
    /// Bytes already scanned for a terminator without finding one.
    /// Lets the next call skip them when more data arrives.
    scanned: usize,
}

impl NulTokenCodec {
    pub fn new() -> Self {
        Self::with_max_token_len(DEFAULT_MAX_TOKEN_LEN)
    }

    /// A zero limit is clamped to one byte.
    pub fn with_max_token_len(max_token_len: usize) -> Self {
        NulTokenCodec {
            max_token_len: max_token_len.max(1),
            scanned: 0,
        }
    }

    pub fn max_token_len(&self) -> usize {
        self.max_token_len
    }

    fn token_too_long(&self, len: usize) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "showq token exceeds {} bytes (buffered {})",
                self.max_token_len, len
            ),
        )
    }
}

impl Default for NulTokenCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for NulTokenCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, io::Error> {
        let start = self.scanned.min(src.len());

        match memchr::memchr(TOKEN_TERMINATOR, &src[start..]) {
            Some(offset) => {
                let end = start + offset;
                self.scanned = 0;
                if end > self.max_token_len {
                    warn!(len = end, limit = self.max_token_len, "Oversized showq token");
                    return Err(self.token_too_long(end));
                }
                let token = src.split_to(end).freeze();
                src.advance(1);
                Ok(Some(token))
            }
            None => {
                if src.len() > self.max_token_len {
                    warn!(len = src.len(), limit = self.max_token_len, "Oversized showq token");
                    return Err(self.token_too_long(src.len()));
                }
                self.scanned = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, io::Error> {
        if let Some(token) = self.decode(src)? {
            return Ok(Some(token));
        }

        // A fragment without its terminator means the read was cut short.
        if !src.is_empty() {
            debug!(len = src.len(), "Dropping unterminated trailing fragment");
            src.clear();
        }
        self.scanned = 0;
        Ok(None)
    }
}

/// Wrap a byte source in a token stream with the given token limit.
pub fn token_stream<R: AsyncRead>(reader: R, max_token_len: usize) -> TokenStream<R> {
    FramedRead::new(reader, NulTokenCodec::with_max_token_len(max_token_len))
}
