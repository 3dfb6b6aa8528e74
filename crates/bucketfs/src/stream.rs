//! Streaming response bodies.

use bytes::{Buf, Bytes};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Error;

/// A readable, chunk-buffered HTTP response body.
///
/// `ByteStream` is what a range request returns: bytes arrive lazily from
/// the socket as they are consumed. Reads after the body is exhausted (or
/// after [`ByteStream::close`]) return `Ok(0)`. A read error poisons the
/// stream; the seekable file layer reacts by reopening the range at the
/// current offset.
#[derive(Debug)]
pub struct ByteStream {
    res: Option<reqwest::Response>,
    pending: Bytes,
}

impl ByteStream {
    pub(crate) fn new(res: reqwest::Response) -> Self {
        Self {
            res: Some(res),
            pending: Bytes::new(),
        }
    }

    /// Read up to `buf.len()` bytes. `Ok(0)` means the body is exhausted.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending.is_empty() && !self.fill().await? {
            return Ok(0);
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }

    /// Return the next chunk of the body, or `None` at the end.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        if self.pending.is_empty() && !self.fill().await? {
            return Ok(None);
        }
        Ok(Some(std::mem::take(&mut self.pending)))
    }

    /// Read the remainder of the body into memory.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Copy the remainder of the body into `w`, returning the byte count.
    pub async fn write_to<W>(&mut self, w: &mut W) -> Result<i64, Error>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written: i64 = 0;
        while let Some(chunk) = self.next_chunk().await? {
            written += chunk.len() as i64;
            w.write_all(&chunk).await?;
        }
        Ok(written)
    }

    /// Drop the connection; subsequent reads return `Ok(0)`.
    pub fn close(&mut self) {
        self.res = None;
        self.pending = Bytes::new();
    }

    /// Pull the next chunk off the wire into `pending`. Returns whether any
    /// bytes are now available.
    async fn fill(&mut self) -> Result<bool, Error> {
        loop {
            let Some(res) = &mut self.res else {
                return Ok(false);
            };
            match res.chunk().await {
                Ok(Some(chunk)) if chunk.is_empty() => {}
                Ok(Some(chunk)) => {
                    self.pending = chunk;
                    return Ok(true);
                }
                Ok(None) => {
                    self.res = None;
                    return Ok(false);
                }
                Err(err) => {
                    // A failed body cannot be re-polled.
                    self.res = None;
                    return Err(err.into());
                }
            }
        }
    }
}
