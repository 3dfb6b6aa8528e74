//! Multipart uploads: initiate / upload-part / copy-part / complete / abort,
//! plus a parallel pump from a random-access source.
//!
//! The lifecycle is encoded in types instead of runtime state flags:
//! [`Uploader`] (configuration) becomes a [`MultipartUpload`] via
//! [`Uploader::start`], which [`MultipartUpload::complete`] consumes into a
//! [`CompletedUpload`] and [`MultipartUpload::abort`] consumes into nothing.
//! Upload-before-start and double-complete are thereby unrepresentable, and
//! retrying after an abort necessarily begins from a fresh uploader with
//! empty part state.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use bucketfs_auth::SigningKey;
use bucketfs_model::{
    CompleteOutcome, CompletedPart, CopyPartResult, InitiateResult, complete_multipart_xml,
    from_xml,
};
use bytes::Bytes;
use futures::StreamExt;
use http::HeaderMap;
use http::header::{CONTENT_TYPE, ETAG, HeaderValue};
use reqwest::Method;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::Error;
use crate::http::Transport;
use crate::reader::Reader;
use crate::url::{object_target, valid_bucket};

/// Minimum size of every part except the final one, per the S3 protocol.
pub const MIN_PART_SIZE: i64 = 5 * 1024 * 1024;

/// Maximum number of parts in one multipart upload, per the S3 protocol.
pub const MAX_PARTS: i64 = 10_000;

/// Upper bound on concurrent part uploads in [`MultipartUpload::upload_from`].
const MAX_PARALLEL: i64 = 40;

/// Assumed per-connection throughput (Mbps) when sizing the worker pool;
/// S3 guidance puts one connection at roughly 85-90 MB/s.
const MBPS_PER_CONNECTION: i64 = 800;

/// Configuration for a multipart upload that has not started yet.
#[derive(Debug)]
pub struct Uploader {
    key: Arc<SigningKey>,
    http: Transport,
    bucket: String,
    object: String,
    content_type: Option<String>,
    mbps: Option<i64>,
}

impl Uploader {
    pub(crate) fn new(
        key: Arc<SigningKey>,
        http: Transport,
        bucket: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            key,
            http,
            bucket: bucket.into(),
            object: object.into(),
            content_type: None,
            mbps: None,
        }
    }

    /// Content-Type for the assembled object.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Expected link speed in Mbps; tunes [`MultipartUpload::upload_from`]
    /// parallelism (e.g. 25000 on a 25 Gbps link).
    #[must_use]
    pub fn with_target_mbps(mut self, mbps: i64) -> Self {
        self.mbps = Some(mbps);
        self
    }

    /// Initiate the multipart upload (`POST ?uploads=`).
    ///
    /// The server's echoed bucket and key are checked against what was
    /// requested.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBucket`] / [`Error::Invalid`] for bad identifiers,
    /// [`Error::Protocol`] when the echo does not match, plus the usual
    /// response mappings.
    pub async fn start(self) -> Result<MultipartUpload, Error> {
        if !valid_bucket(&self.bucket) {
            return Err(Error::InvalidBucket(self.bucket.clone()));
        }
        if self.object.is_empty() {
            return Err(Error::invalid("start upload", "empty object key"));
        }
        let target = object_target(&self.key, &self.bucket, &self.object, "uploads=");
        let mut headers = HeaderMap::new();
        if let Some(ct) = &self.content_type {
            headers.insert(
                CONTENT_TYPE,
                ct.parse()
                    .map_err(|_| Error::invalid("start upload", format!("content type {ct:?}")))?,
            );
        }
        self.key.sign_request(
            "POST",
            &target.path,
            &target.query,
            &target.host,
            &mut headers,
            b"",
        )?;
        let req = self
            .http
            .request(Method::POST, &target.url())
            .headers(headers)
            .build()?;
        let res = self.http.send(req).await?;
        if !res.status().is_success() {
            return Err(Error::from_response("initiate upload", &self.bucket, &self.object, res).await);
        }
        let body = res.bytes().await?;
        let init: InitiateResult = from_xml(&body)?;
        if init.bucket != self.bucket {
            return Err(Error::Protocol(format!(
                "initiate echoed bucket {:?}, requested {:?}",
                init.bucket, self.bucket
            )));
        }
        if init.key != self.object {
            return Err(Error::Protocol(format!(
                "initiate echoed key {:?}, requested {:?}",
                init.key, self.object
            )));
        }
        debug!(bucket = %self.bucket, object = %self.object, upload_id = %init.upload_id, "multipart upload started");
        Ok(MultipartUpload {
            shared: Arc::new(UploadShared {
                key: self.key,
                http: self.http,
                bucket: self.bucket,
                object: self.object,
                upload_id: init.upload_id,
                next_part: AtomicI64::new(0),
                ledger: Mutex::new(PartLedger::default()),
            }),
            mbps: self.mbps,
            copies: JoinSet::new(),
        })
    }
}

/// State shared between the upload handle and background copy tasks.
#[derive(Debug)]
struct UploadShared {
    key: Arc<SigningKey>,
    http: Transport,
    bucket: String,
    object: String,
    upload_id: String,
    next_part: AtomicI64,
    ledger: Mutex<PartLedger>,
}

/// Parts recorded so far, the highest part number seen, and the first error
/// from a background copy.
#[derive(Debug, Default)]
struct PartLedger {
    parts: Vec<PartRecord>,
    max_part: i64,
    async_err: Option<Error>,
}

#[derive(Debug, Clone)]
struct PartRecord {
    number: i64,
    etag: String,
    size: i64,
}

/// A running multipart upload.
///
/// Parts may be uploaded from many tasks concurrently through a shared
/// reference; completion and abort consume the handle.
#[derive(Debug)]
pub struct MultipartUpload {
    shared: Arc<UploadShared>,
    mbps: Option<i64>,
    copies: JoinSet<()>,
}

/// The outcome of a completed multipart upload.
#[derive(Debug)]
pub struct CompletedUpload {
    /// ETag of the assembled object.
    pub etag: String,
    /// Total bytes across all parts.
    pub size: i64,
}

impl MultipartUpload {
    /// The server-assigned upload id.
    #[must_use]
    pub fn upload_id(&self) -> &str {
        &self.shared.upload_id
    }

    /// Atomically claim the next part number (1-based).
    ///
    /// Useful when intrinsically unordered producers upload parts greedily.
    #[must_use]
    pub fn next_part(&self) -> i64 {
        self.shared.next_part.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// How many parts have been recorded so far.
    ///
    /// Racing callers only ever observe a completed count, but mind logical
    /// races against in-flight uploads.
    #[must_use]
    pub fn completed_parts(&self) -> usize {
        self.shared.ledger.lock().unwrap_or_else(|e| e.into_inner()).parts.len()
    }

    /// Upload `contents` as part `number`.
    ///
    /// Every part except the final one handed to
    /// [`MultipartUpload::complete`] must be at least [`MIN_PART_SIZE`]
    /// bytes. The bytes handle is used for the request body and released as
    /// soon as the PUT finishes; nothing is copied or retained.
    ///
    /// # Errors
    ///
    /// [`Error::PartTooSmall`] below the floor, [`Error::Invalid`] for an
    /// out-of-range part number, plus response mappings.
    pub async fn upload(&self, number: i64, contents: Bytes) -> Result<(), Error> {
        let len = i64::try_from(contents.len()).unwrap_or(i64::MAX);
        if len < MIN_PART_SIZE {
            return Err(Error::PartTooSmall {
                size: len,
                min: MIN_PART_SIZE,
            });
        }
        self.shared.put_part(number, contents).await
    }

    /// Server-side copy of `source[start, end)` into part `number`.
    ///
    /// `start == end == 0` copies the whole object. The copy runs on a
    /// background task; its result is observed by
    /// [`MultipartUpload::complete`] (or discarded by
    /// [`MultipartUpload::abort`]). The source's ETag rides along as
    /// `x-amz-copy-source-if-match`.
    ///
    /// # Errors
    ///
    /// Validation failures surface immediately; copy failures surface from
    /// `complete`.
    pub fn copy_from(
        &mut self,
        number: i64,
        source: &Reader,
        start: i64,
        end: i64,
    ) -> Result<(), Error> {
        check_part_number(number)?;
        let mut size = source.size;
        if start != 0 || end != 0 {
            if start < 0 || end < 0 {
                return Err(Error::invalid("copy part", "start and end must not be negative"));
            }
            if end > source.size {
                return Err(Error::invalid(
                    "copy part",
                    format!("end {end} greater than source size {}", source.size),
                ));
            }
            size = end - start;
        }
        if size < MIN_PART_SIZE {
            return Err(Error::PartTooSmall {
                size,
                min: MIN_PART_SIZE,
            });
        }

        // Record the part number before the task launches so a concurrent
        // `complete` tail upload lands above it.
        {
            let mut ledger = self.shared.lock();
            ledger.max_part = ledger.max_part.max(number);
        }

        let shared = Arc::clone(&self.shared);
        let source = source.clone();
        self.copies.spawn(async move {
            if let Err(err) = shared.copy_part(number, &source, start, end).await {
                warn!(part = number, error = %err, "background copy part failed");
                let mut ledger = shared.lock();
                if ledger.async_err.is_none() {
                    ledger.async_err = Some(err);
                }
            }
        });
        Ok(())
    }

    /// Upload the optional final short part, wait for background copies,
    /// and ask the server to assemble the object.
    ///
    /// `tail` (when non-empty) becomes the highest-numbered part and is the
    /// only part allowed below [`MIN_PART_SIZE`]. Parts are sent in the
    /// completion manifest sorted ascending by number. A `200 OK` carrying
    /// an `<Error>` body is a failure.
    ///
    /// # Errors
    ///
    /// The first background copy error, if any, preempts completion; the
    /// upload never reports success when any part failed.
    pub async fn complete(mut self, tail: Bytes) -> Result<CompletedUpload, Error> {
        if !tail.is_empty() {
            // Safe to read max_part here: callers must not race complete
            // with upload/copy_from.
            let number = self.shared.lock().max_part + 1;
            self.shared.put_part(number, tail).await?;
        }
        while let Some(joined) = self.copies.join_next().await {
            if joined.is_err() {
                return Err(Error::Protocol("background copy task panicked".to_owned()));
            }
        }

        let (parts, size) = {
            let mut ledger = self.shared.lock();
            if let Some(err) = ledger.async_err.take() {
                return Err(err);
            }
            ledger.parts.sort_by_key(|p| p.number);
            let size = ledger.parts.iter().map(|p| p.size).sum();
            let parts: Vec<CompletedPart> = ledger
                .parts
                .iter()
                .map(|p| CompletedPart {
                    part_number: p.number,
                    etag: p.etag.clone(),
                })
                .collect();
            (parts, size)
        };
        let body = complete_multipart_xml(&parts)?;

        let shared = &self.shared;
        let query = format!("uploadId={}", query_component(&shared.upload_id));
        let target = object_target(&shared.key, &shared.bucket, &shared.object, &query);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
        shared.key.sign_request(
            "POST",
            &target.path,
            &target.query,
            &target.host,
            &mut headers,
            &body,
        )?;
        let req = shared
            .http
            .request(Method::POST, &target.url())
            .headers(headers)
            .body(body)
            .build()?;
        let res = shared.http.send(req).await?;
        if !res.status().is_success() {
            return Err(
                Error::from_response("complete upload", &shared.bucket, &shared.object, res).await,
            );
        }
        let body = res.bytes().await?;
        match bucketfs_model::parse_complete_response(&body)? {
            CompleteOutcome::Completed(result) => {
                debug!(
                    bucket = %shared.bucket, object = %shared.object,
                    etag = %result.etag, size, "multipart upload completed"
                );
                Ok(CompletedUpload {
                    etag: result.etag,
                    size,
                })
            }
            CompleteOutcome::Failed(err) => Err(Error::Remote {
                op: "complete upload",
                status: 200,
                message: format!("{}: {}", err.code, err.message),
            }),
        }
    }

    /// Abort the upload (`DELETE ?uploadId=`), discarding uploaded parts.
    ///
    /// Waits for background copies to settle first so the server does not
    /// resurrect parts after the abort. Starting over afterwards means
    /// building a fresh [`Uploader`].
    pub async fn abort(mut self) -> Result<(), Error> {
        while self.copies.join_next().await.is_some() {}

        let shared = &self.shared;
        let query = format!("uploadId={}", query_component(&shared.upload_id));
        let target = object_target(&shared.key, &shared.bucket, &shared.object, &query);
        let mut headers = HeaderMap::new();
        shared.key.sign_request(
            "DELETE",
            &target.path,
            &target.query,
            &target.host,
            &mut headers,
            b"",
        )?;
        let req = shared
            .http
            .request(Method::DELETE, &target.url())
            .headers(headers)
            .build()?;
        let res = shared.http.send(req).await?;
        if res.status().as_u16() != 204 {
            return Err(
                Error::from_response("abort upload", &shared.bucket, &shared.object, res).await,
            );
        }
        debug!(bucket = %shared.bucket, object = %shared.object, "multipart upload aborted");
        Ok(())
    }

    /// Upload `size` bytes from a random-access source with a parallel
    /// worker pool, then complete.
    ///
    /// The part size starts at [`MIN_PART_SIZE`] and doubles until the part
    /// count fits under [`MAX_PARTS`]. Workers claim consecutive parts;
    /// the sub-part remainder goes to [`MultipartUpload::complete`] as the
    /// tail. The first failure cancels the remaining work.
    pub async fn upload_from<R>(self, source: &R, size: i64) -> Result<CompletedUpload, Error>
    where
        R: ReadAt + ?Sized,
    {
        let part_size = calculate_part_size(size);
        let nonfinal = size / part_size;
        let end_parts = nonfinal * part_size;
        let parallel = ideal_parallel(self.mbps, nonfinal);

        {
            let upload = &self;
            let mut results = futures::stream::iter((0..nonfinal).map(|index| {
                let offset = index * part_size;
                async move {
                    let mut buf = vec![0u8; usize::try_from(part_size).unwrap_or(usize::MAX)];
                    let n = source.read_at(&mut buf, offset).await?;
                    if i64::try_from(n).unwrap_or(0) < part_size {
                        return Err(Error::UnexpectedEof);
                    }
                    // 1-based part numbers.
                    upload.upload(index + 1, Bytes::from(buf)).await
                }
            }))
            .buffer_unordered(parallel);
            while let Some(result) = results.next().await {
                result?;
            }
        }

        let tail_size = usize::try_from(size - end_parts).unwrap_or(0);
        let tail = if tail_size > 0 {
            let mut buf = vec![0u8; tail_size];
            let n = source.read_at(&mut buf, end_parts).await?;
            if n < tail_size {
                return Err(Error::UnexpectedEof);
            }
            Bytes::from(buf)
        } else {
            Bytes::new()
        };
        self.complete(tail).await
    }
}

impl UploadShared {
    fn lock(&self) -> std::sync::MutexGuard<'_, PartLedger> {
        self.ledger.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// PUT one part and record its ETag.
    async fn put_part(&self, number: i64, contents: Bytes) -> Result<(), Error> {
        check_part_number(number)?;
        let query = format!(
            "partNumber={number}&uploadId={}",
            query_component(&self.upload_id)
        );
        let target = object_target(&self.key, &self.bucket, &self.object, &query);
        let mut headers = HeaderMap::new();
        self.key.sign_request(
            "PUT",
            &target.path,
            &target.query,
            &target.host,
            &mut headers,
            &contents,
        )?;
        let size = i64::try_from(contents.len()).unwrap_or(i64::MAX);
        let req = self
            .http
            .request(Method::PUT, &target.url())
            .headers(headers)
            .body(contents)
            .build()?;
        let res = self.http.send_retry(req).await?;
        if !res.status().is_success() {
            return Err(Error::from_response("upload part", &self.bucket, &self.object, res).await);
        }
        let etag = res
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        if etag.is_empty() {
            return Err(Error::Protocol("upload part response missing ETag".to_owned()));
        }
        debug!(part = number, size, %etag, "part uploaded");

        let mut ledger = self.lock();
        ledger.max_part = ledger.max_part.max(number);
        ledger.parts.push(PartRecord {
            number,
            etag,
            size,
        });
        Ok(())
    }

    /// Server-side copy-part; runs on a background task.
    async fn copy_part(
        &self,
        number: i64,
        source: &Reader,
        start: i64,
        end: i64,
    ) -> Result<(), Error> {
        let query = format!(
            "partNumber={number}&uploadId={}",
            query_component(&self.upload_id)
        );
        let target = object_target(&self.key, &self.bucket, &self.object, &query);
        let mut headers = HeaderMap::new();
        let copy_source = format!("/{}/{}", source.bucket(), source.path());
        headers.insert(
            "x-amz-copy-source",
            copy_source
                .parse()
                .map_err(|_| Error::invalid("copy part", format!("source {copy_source:?}")))?,
        );
        headers.insert(
            "x-amz-copy-source-if-match",
            source
                .etag
                .parse()
                .map_err(|_| Error::invalid("copy part", format!("etag {:?}", source.etag)))?,
        );
        let mut size = source.size;
        if start != 0 || end != 0 {
            size = end - start;
            let range = format!("bytes={start}-{}", end - 1);
            headers.insert(
                "x-amz-copy-source-range",
                range
                    .parse()
                    .map_err(|_| Error::invalid("copy part", format!("range {range:?}")))?,
            );
        }
        self.key.sign_request(
            "PUT",
            &target.path,
            &target.query,
            &target.host,
            &mut headers,
            b"",
        )?;
        let req = self
            .http
            .request(Method::PUT, &target.url())
            .headers(headers)
            .build()?;
        let res = self.http.send_retry(req).await?;
        if !res.status().is_success() {
            return Err(Error::from_response("copy part", &self.bucket, &self.object, res).await);
        }
        let body = res.bytes().await?;
        let copied: CopyPartResult = from_xml(&body)?;
        if copied.etag.is_empty() {
            return Err(Error::Protocol("copy part response missing ETag".to_owned()));
        }
        debug!(part = number, size, etag = %copied.etag, "part copied");

        let mut ledger = self.lock();
        ledger.parts.push(PartRecord {
            number,
            etag: copied.etag,
            size,
        });
        Ok(())
    }
}

/// A random-access byte source for [`MultipartUpload::upload_from`].
///
/// A read may return fewer bytes than requested only at the end of the
/// source.
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`.
    async fn read_at(&self, buf: &mut [u8], offset: i64) -> Result<usize, Error>;
}

#[async_trait]
impl ReadAt for Bytes {
    async fn read_at(&self, buf: &mut [u8], offset: i64) -> Result<usize, Error> {
        let Ok(offset) = usize::try_from(offset) else {
            return Err(Error::invalid("read_at", format!("offset {offset}")));
        };
        if offset >= self.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.len() - offset);
        buf[..n].copy_from_slice(&self[offset..offset + n]);
        Ok(n)
    }
}

#[async_trait]
impl ReadAt for Reader {
    async fn read_at(&self, buf: &mut [u8], offset: i64) -> Result<usize, Error> {
        Reader::read_at(self, buf, offset).await
    }
}

/// Part size for a total: the minimum, doubled until the count fits.
fn calculate_part_size(total: i64) -> i64 {
    let mut part_size = MIN_PART_SIZE;
    if total > 0 {
        while total / part_size > MAX_PARTS {
            part_size *= 2;
        }
    }
    part_size
}

/// Worker-pool size for `parts` non-final parts on an optional Mbps budget.
fn ideal_parallel(mbps: Option<i64>, parts: i64) -> usize {
    let mut res = match mbps {
        Some(mbps) => mbps / MBPS_PER_CONNECTION,
        None => MAX_PARALLEL,
    };
    if parts > 0 && parts < res {
        return usize::try_from(parts).unwrap_or(1);
    }
    if res <= 0 {
        res = 1;
    }
    usize::try_from(res.min(MAX_PARALLEL)).unwrap_or(1)
}

fn check_part_number(number: i64) -> Result<(), Error> {
    if !(1..=MAX_PARTS).contains(&number) {
        return Err(Error::invalid(
            "upload part",
            format!("part number {number} outside 1..={MAX_PARTS}"),
        ));
    }
    Ok(())
}

/// Upload ids are opaque and may contain query-hostile characters.
fn query_component(s: &str) -> String {
    crate::url::query_escape(s)
}
