//! A positionful, seekable view of one object.

use std::io::SeekFrom;
use std::sync::Arc;

use bucketfs_auth::SigningKey;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use http::header::{CONTENT_LENGTH, ETAG, LAST_MODIFIED};
use reqwest::Method;
use tokio::io::AsyncWrite;
use tracing::debug;

use crate::error::Error;
use crate::http::Transport;
use crate::reader::Reader;
use crate::stream::ByteStream;
use crate::url::{object_target, valid_bucket};

/// An open object behaving like a file: a current offset and a lazily
/// opened body stream covering `[offset, size)`.
///
/// Invariants: `0 <= offset <= size`; an open body always begins exactly at
/// the offset current when it was opened, and is discarded by any seek to a
/// different position. `read` is not safe to call from two tasks at once;
/// use [`Reader::read_at`] (via [`ObjectFile::reader`]) for parallel reads.
#[derive(Debug)]
pub struct ObjectFile {
    reader: Reader,
    pos: i64,
    body: Option<ByteStream>,
}

impl ObjectFile {
    /// Open `path` in `bucket`.
    ///
    /// Eager opens issue the GET immediately and keep its body as the
    /// initial stream; lazy opens issue a HEAD and defer the GET to the
    /// first `read`.
    pub(crate) async fn open(
        key: Arc<SigningKey>,
        http: Transport,
        bucket: &str,
        path: &str,
        eager: bool,
    ) -> Result<Self, Error> {
        if !eager {
            let reader = Reader::stat(key, http, bucket, path).await?;
            return Ok(Self::from_reader(reader));
        }
        if !valid_bucket(bucket) {
            return Err(Error::InvalidBucket(bucket.to_owned()));
        }
        let target = object_target(&key, bucket, path, "");
        let mut headers = HeaderMap::new();
        key.sign_request("GET", &target.path, &target.query, &target.host, &mut headers, b"")?;
        let req = http
            .request(Method::GET, &target.url())
            .headers(headers)
            .build()?;
        let res = http.send_retry(req).await?;
        if !res.status().is_success() {
            return Err(Error::from_response("GET", bucket, path, res).await);
        }

        let size = res
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let etag = res
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let last_modified = res
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let reader = Reader {
            key,
            http,
            bucket: bucket.to_owned(),
            path: path.to_owned(),
            size,
            etag,
            last_modified,
        };
        Ok(Self {
            reader,
            pos: 0,
            body: Some(ByteStream::new(res)),
        })
    }

    /// Wrap an existing reader as a file positioned at zero.
    #[must_use]
    pub fn from_reader(reader: Reader) -> Self {
        Self {
            reader,
            pos: 0,
            body: None,
        }
    }

    /// The underlying metadata handle, usable for parallel `read_at`.
    #[must_use]
    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    /// Object size in bytes.
    #[must_use]
    pub fn size(&self) -> i64 {
        self.reader.size
    }

    /// The final path segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.reader.name()
    }

    /// The object's key within its bucket.
    #[must_use]
    pub fn path(&self) -> &str {
        self.reader.path()
    }

    /// The object's quoted ETag.
    #[must_use]
    pub fn etag(&self) -> &str {
        &self.reader.etag
    }

    /// Last modification time, when known.
    #[must_use]
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.reader.last_modified
    }

    /// Current read offset.
    #[must_use]
    pub fn position(&self) -> i64 {
        self.pos
    }

    /// Read at the current offset, advancing it.
    ///
    /// The first read (or the first after a seek) opens a range request
    /// covering the rest of the object. If an open body dies mid-read
    /// (S3 resets connections it considers too slow), it is discarded and
    /// the range is reopened once from the current offset.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(body) = &mut self.body {
            match body.read(buf).await {
                Ok(0) => return Ok(0),
                Ok(n) => {
                    self.pos += n as i64;
                    return Ok(n);
                }
                Err(err) => {
                    debug!(
                        path = %self.reader.path, offset = self.pos, error = %err,
                        "body stream failed, reopening range"
                    );
                    self.body = None;
                }
            }
        }
        if self.pos >= self.reader.size {
            return Ok(0);
        }
        let mut body = self
            .reader
            .range_reader(self.pos, self.reader.size - self.pos)
            .await?;
        let n = body.read(buf).await?;
        self.body = Some(body);
        self.pos += n as i64;
        Ok(n)
    }

    /// Read the remainder of the object from the current offset.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Move the read offset.
    ///
    /// Offsets outside `[0, size]` are rejected. Moving the offset discards
    /// any open body stream.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<i64, Error> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => i64::try_from(offset).unwrap_or(i64::MAX),
            SeekFrom::Current(delta) => self.pos + delta,
            SeekFrom::End(delta) => self.reader.size + delta,
        };
        if new_pos < 0 || new_pos > self.reader.size {
            return Err(Error::InvalidSeek(new_pos));
        }
        if new_pos != self.pos && self.body.is_some() {
            self.body = None;
        }
        self.pos = new_pos;
        Ok(self.pos)
    }

    /// Fill `buf` from an absolute offset without touching the file
    /// position. Safe to call concurrently through [`ObjectFile::reader`].
    pub async fn read_at(&self, buf: &mut [u8], offset: i64) -> Result<usize, Error> {
        self.reader.read_at(buf, offset).await
    }

    /// Stream the whole object (regardless of offset) into `w`.
    pub async fn write_to<W>(&self, w: &mut W) -> Result<i64, Error>
    where
        W: AsyncWrite + Unpin,
    {
        self.reader.write_to(w).await
    }

    /// Drop any open body and reset the offset to zero.
    pub fn close(&mut self) {
        if let Some(body) = &mut self.body {
            body.close();
        }
        self.body = None;
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_file(size: i64) -> ObjectFile {
        let key = Arc::new(
            SigningKey::derive("", "fake-access-key", "fake-secret-key", "us-east-1", "s3")
                .expect("s3 is a supported service"),
        );
        ObjectFile::from_reader(Reader::new(
            key,
            Transport::default(),
            "test-bucket",
            "dir/file.bin",
            "\"etag\"",
            size,
        ))
    }

    #[test]
    fn test_should_seek_within_bounds() {
        let mut file = test_file(100);
        assert_eq!(file.seek(SeekFrom::Start(10)).unwrap(), 10);
        assert_eq!(file.seek(SeekFrom::Current(5)).unwrap(), 15);
        assert_eq!(file.seek(SeekFrom::End(-1)).unwrap(), 99);
        assert_eq!(file.seek(SeekFrom::End(0)).unwrap(), 100);
    }

    #[test]
    fn test_should_reject_out_of_bounds_seeks() {
        let mut file = test_file(100);
        assert!(matches!(
            file.seek(SeekFrom::Current(-1)),
            Err(Error::InvalidSeek(-1))
        ));
        assert!(matches!(
            file.seek(SeekFrom::End(1)),
            Err(Error::InvalidSeek(101))
        ));
        // Position unchanged after a rejected seek.
        assert_eq!(file.position(), 0);
    }

    #[test]
    fn test_should_reset_position_on_close() {
        let mut file = test_file(10);
        file.seek(SeekFrom::Start(7)).unwrap();
        file.close();
        assert_eq!(file.position(), 0);
    }

    #[test]
    fn test_should_expose_metadata() {
        let file = test_file(42);
        assert_eq!(file.size(), 42);
        assert_eq!(file.name(), "file.bin");
        assert_eq!(file.path(), "dir/file.bin");
        assert_eq!(file.etag(), "\"etag\"");
    }
}
