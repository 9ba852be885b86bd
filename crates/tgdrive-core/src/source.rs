//! Byte sources: a lazy, finite, single-pass sequence of byte pieces.
//!
//! A fully-buffered download and a live network stream satisfy the same
//! interface, so the engine never cares which one it was handed.

use std::fmt;

use async_trait::async_trait;

use crate::{errors::Error, Result};

#[async_trait]
pub trait ByteStream: Send {
    /// Next piece of the payload; `None` at end of stream.
    async fn next_bytes(&mut self) -> Result<Option<Vec<u8>>>;
}

struct Buffered(Option<Vec<u8>>);

#[async_trait]
impl ByteStream for Buffered {
    async fn next_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.0.take())
    }
}

pub struct ByteSource {
    inner: Box<dyn ByteStream>,
}

impl ByteSource {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            inner: Box::new(Buffered(Some(data))),
        }
    }

    pub fn from_stream(stream: impl ByteStream + 'static) -> Self {
        Self {
            inner: Box::new(stream),
        }
    }

    pub async fn next_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        self.inner.next_bytes().await
    }

    /// Drain the source into one buffer.
    pub async fn read_to_end(mut self, size_hint: Option<u64>) -> Result<Vec<u8>> {
        let cap = size_hint.unwrap_or(0).min(64 * 1024 * 1024) as usize;
        let mut out = Vec::with_capacity(cap);
        while let Some(piece) = self.next_bytes().await? {
            out.extend_from_slice(&piece);
        }
        Ok(out)
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ByteSource { .. }")
    }
}

/// What a `SourceFetcher` hands back.
#[derive(Debug)]
pub struct ResolvedSource {
    pub source: ByteSource,
    /// Transport-level length (e.g. `Content-Length`), when the provider sent one.
    pub size: Option<u64>,
}

impl ResolvedSource {
    /// Settle the total size: transport length, otherwise buffer and measure.
    ///
    /// `declared` is the provider's own claim and may be wrong in either
    /// direction, so it is never trusted as the `Content-Range` total.
    pub async fn settle_size(self, declared: Option<u64>) -> Result<(ByteSource, u64)> {
        let (source, size) = match self.size {
            Some(size) => (self.source, size),
            None => {
                let data = self.source.read_to_end(declared).await?;
                let size = data.len() as u64;
                tracing::debug!(size, ?declared, "source size measured by buffering");
                (ByteSource::from_bytes(data), size)
            }
        };

        if size == 0 {
            return Err(Error::SourceUnavailable(
                "source returned no content".to_string(),
            ));
        }
        if let Some(d) = declared.filter(|&d| d != size) {
            tracing::warn!(declared = d, size, "declared size disagrees with the source");
        }
        Ok((source, size))
    }
}

/// Serves contiguous byte ranges out of a single-pass source.
///
/// Keeps only the bytes at or after the last requested offset, so a chunk the
/// backend only partially confirmed can be re-served without rewinding.
pub struct ChunkReader {
    source: ByteSource,
    window: Vec<u8>,
    window_start: u64,
    exhausted: bool,
}

impl ChunkReader {
    pub fn new(source: ByteSource) -> Self {
        Self {
            source,
            window: Vec::new(),
            window_start: 0,
            exhausted: false,
        }
    }

    /// Bytes `[start, start + len)` of the payload. Offsets may only move forward.
    pub async fn read_range(&mut self, start: u64, len: u64) -> Result<Vec<u8>> {
        if start < self.window_start {
            return Err(Error::Protocol(format!(
                "cannot rewind source to offset {start}, already past {}",
                self.window_start
            )));
        }

        loop {
            if self.window_start < start {
                let drop = ((start - self.window_start) as usize).min(self.window.len());
                self.window.drain(..drop);
                self.window_start += drop as u64;
            }

            let have = if self.window_start == start {
                self.window.len() as u64
            } else {
                0
            };
            if have >= len || self.exhausted {
                break;
            }

            match self.source.next_bytes().await? {
                Some(piece) => self.window.extend_from_slice(&piece),
                None => self.exhausted = true,
            }
        }

        if self.window_start != start || (self.window.len() as u64) < len {
            return Err(Error::SourceUnavailable(format!(
                "source ended after {} bytes, expected at least {}",
                self.window_start + self.window.len() as u64,
                start + len
            )));
        }

        Ok(self.window[..len as usize].to_vec())
    }

    /// Fail if the source still has bytes past `end`.
    pub async fn ensure_ends_at(&mut self, end: u64) -> Result<()> {
        loop {
            let held_until = self.window_start + self.window.len() as u64;
            if held_until > end {
                return Err(Error::SourceUnavailable(format!(
                    "source is longer than the expected {end} bytes"
                )));
            }
            if self.exhausted {
                return Ok(());
            }
            match self.source.next_bytes().await? {
                Some(piece) => self.window.extend_from_slice(&piece),
                None => self.exhausted = true,
            }
        }
    }
}
