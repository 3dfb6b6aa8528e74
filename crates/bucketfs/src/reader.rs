//! Random-access reads of a single object.

use std::sync::Arc;

use bucketfs_auth::SigningKey;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use http::header::{CONTENT_LENGTH, ETAG, IF_MATCH, LAST_MODIFIED, RANGE};
use reqwest::Method;
use tokio::io::AsyncWrite;
use tracing::debug;

use crate::error::Error;
use crate::http::Transport;
use crate::stream::ByteStream;
use crate::url::{bucket_target, object_target, valid_bucket};

/// A handle to one object: identity plus the metadata needed for consistent
/// range reads.
///
/// The ETag is the exact quoted value the server returned; non-empty, it is
/// sent back verbatim as `If-Match` on every range request so a concurrent
/// overwrite surfaces as [`Error::EtagChanged`] instead of torn reads.
#[derive(Debug, Clone)]
pub struct Reader {
    pub(crate) key: Arc<SigningKey>,
    pub(crate) http: Transport,
    pub(crate) bucket: String,
    pub(crate) path: String,
    /// Object size in bytes; never negative.
    pub size: i64,
    /// Quoted entity tag, or empty to skip the `If-Match` precondition.
    pub etag: String,
    /// Last modification time reported by the server.
    pub last_modified: Option<DateTime<Utc>>,
}

impl Reader {
    /// Construct a reader from already-known metadata (e.g. a listing entry).
    #[must_use]
    pub fn new(
        key: Arc<SigningKey>,
        http: Transport,
        bucket: impl Into<String>,
        path: impl Into<String>,
        etag: impl Into<String>,
        size: i64,
    ) -> Self {
        Self {
            key,
            http,
            bucket: bucket.into(),
            path: path.into(),
            size,
            etag: etag.into(),
            last_modified: None,
        }
    }

    /// HEAD the object and build a reader from the response metadata.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBucket`] for a bad bucket name, [`Error::NotFound`]
    /// on 404, [`Error::Permission`] on 403.
    pub async fn stat(
        key: Arc<SigningKey>,
        http: Transport,
        bucket: &str,
        path: &str,
    ) -> Result<Self, Error> {
        if !valid_bucket(bucket) {
            return Err(Error::InvalidBucket(bucket.to_owned()));
        }
        let target = object_target(&key, bucket, path, "");
        let mut headers = HeaderMap::new();
        key.sign_request("HEAD", &target.path, &target.query, &target.host, &mut headers, b"")?;
        let req = http
            .request(Method::HEAD, &target.url())
            .headers(headers)
            .build()?;
        let res = http.send_retry(req).await?;
        if !res.status().is_success() {
            return Err(Error::from_response("HEAD", bucket, path, res).await);
        }

        let size = header_i64(res.headers(), CONTENT_LENGTH.as_str()).unwrap_or(0);
        let etag = header_str(res.headers(), ETAG.as_str());
        let last_modified = res
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Ok(Self {
            key,
            http,
            bucket: bucket.to_owned(),
            path: path.to_owned(),
            size,
            etag,
            last_modified,
        })
    }

    /// The object's key within its bucket.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The object's bucket.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The final path segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Open a streaming read of `[start, start+width)`, or `[start, end)`
    /// when `width <= 0`.
    ///
    /// When the reader carries an ETag, the request is conditional on it.
    ///
    /// # Errors
    ///
    /// [`Error::EtagChanged`] on 412, [`Error::RangeNotSatisfiable`] on 416,
    /// plus the usual not-found/permission mappings.
    pub async fn range_reader(&self, start: i64, width: i64) -> Result<ByteStream, Error> {
        if !valid_bucket(&self.bucket) {
            return Err(Error::InvalidBucket(self.bucket.clone()));
        }
        let range = if width > 0 {
            format!("bytes={start}-{}", start + width - 1)
        } else {
            format!("bytes={start}-")
        };
        debug!(bucket = %self.bucket, path = %self.path, %range, "range GET");

        let target = object_target(&self.key, &self.bucket, &self.path, "");
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, range.parse().map_err(|_| Error::InvalidSeek(start))?);
        if !self.etag.is_empty() {
            headers.insert(
                IF_MATCH,
                self.etag
                    .parse()
                    .map_err(|_| Error::Protocol(format!("etag {:?} not header-safe", self.etag)))?,
            );
        }
        self.key.sign_request(
            "GET",
            &target.path,
            &target.query,
            &target.host,
            &mut headers,
            b"",
        )?;
        let req = self
            .http
            .request(Method::GET, &target.url())
            .headers(headers)
            .build()?;
        let res = self.http.send_retry(req).await?;
        if !res.status().is_success() {
            return Err(Error::from_response("GET", &self.bucket, &self.path, res).await);
        }
        Ok(ByteStream::new(res))
    }

    /// Fill `buf` from `offset`, returning the bytes read. The count is
    /// short only when the object ends inside the requested window.
    pub async fn read_at(&self, buf: &mut [u8], offset: i64) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut body = self
            .range_reader(offset, i64::try_from(buf.len()).unwrap_or(i64::MAX))
            .await?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = body.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Stream the whole object into `w`, returning the bytes written.
    pub async fn write_to<W>(&self, w: &mut W) -> Result<i64, Error>
    where
        W: AsyncWrite + Unpin,
    {
        let mut body = self.range_reader(0, self.size).await?;
        body.write_to(w).await
    }
}

/// Resolve the region a bucket lives in.
///
/// With a custom endpoint configured there is nothing to probe: the key's
/// own region is authoritative. Against AWS this issues one HEAD to the
/// global endpoint and reads the `x-amz-bucket-region` header, which is
/// present even on 301/403 responses.
pub async fn bucket_region(
    key: &Arc<SigningKey>,
    http: &Transport,
    bucket: &str,
) -> Result<String, Error> {
    if !valid_bucket(bucket) {
        return Err(Error::InvalidBucket(bucket.to_owned()));
    }
    if key.base_uri().is_some() {
        return Ok(key.region().to_owned());
    }
    let host = format!("{bucket}.s3.amazonaws.com");
    let mut headers = HeaderMap::new();
    key.sign_request("HEAD", "/", "", &host, &mut headers, b"")?;
    let req = http
        .request(Method::HEAD, &format!("https://{host}/"))
        .headers(headers)
        .build()?;
    let res = http.send_retry(req).await?;
    match header_opt(res.headers(), "x-amz-bucket-region") {
        Some(region) => Ok(region),
        None => Err(Error::Remote {
            op: "bucket region",
            status: res.status().as_u16(),
            message: "response missing x-amz-bucket-region".to_owned(),
        }),
    }
}

/// Produce a presigned GET URL for `path`, valid for `expires_secs` seconds.
///
/// # Errors
///
/// [`Error::InvalidBucket`] for a bad bucket name.
pub fn presigned_url(
    key: &SigningKey,
    bucket: &str,
    path: &str,
    expires_secs: u64,
) -> Result<String, Error> {
    if !valid_bucket(bucket) {
        return Err(Error::InvalidBucket(bucket.to_owned()));
    }
    let target = object_target(key, bucket, path, "");
    let query = key.presign("GET", &target.host, &target.path, expires_secs);
    Ok(format!("{}?{query}", target.url()))
}

/// The signed URL of the bucket root with the given raw query, used by
/// listings.
pub(crate) fn signed_bucket_request(
    key: &SigningKey,
    http: &Transport,
    bucket: &str,
    query: &str,
) -> Result<reqwest::Request, Error> {
    let target = bucket_target(key, bucket, query);
    let mut headers = HeaderMap::new();
    key.sign_request("GET", &target.path, &target.query, &target.host, &mut headers, b"")?;
    Ok(http
        .request(Method::GET, &target.url())
        .headers(headers)
        .build()?)
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

fn header_opt(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
