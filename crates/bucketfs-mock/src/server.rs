//! The mock server: state, dispatch, and the S3 handlers.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::xml;

/// Default page size for listings without `max-keys`.
const DEFAULT_MAX_KEYS: usize = 1000;

/// One recorded request.
#[derive(Debug, Clone)]
pub struct RequestLog {
    /// HTTP method.
    pub method: String,
    /// Percent-decoded request path.
    pub path: String,
    /// Raw query string (no leading `?`).
    pub query: String,
}

/// Forced failure modes, applied to every request while set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorSimulation {
    /// Respond `404 NoSuchKey` to everything.
    pub not_found_errors: bool,
    /// Respond `403 AccessDenied` to everything.
    pub permission_errors: bool,
    /// Respond `500 InternalError` to everything (clients will retry).
    pub internal_errors: bool,
}

#[derive(Debug, Clone)]
struct StoredObject {
    content: Bytes,
    etag: String,
    content_type: String,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MultipartState {
    key: String,
    parts: BTreeMap<i64, StoredPart>,
}

#[derive(Debug, Clone)]
struct StoredPart {
    etag: String,
    content: Bytes,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    uploads: HashMap<String, MultipartState>,
    requests: Vec<RequestLog>,
    errors: ErrorSimulation,
}

struct Shared {
    bucket: String,
    region: String,
    addr: SocketAddr,
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An in-process S3 server for one bucket.
///
/// Listens on a random localhost port; point the client's signing key at
/// [`MockServer::url`] as its base URI. The server task is aborted when the
/// value drops.
pub struct MockServer {
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Bind a listener and start serving `bucket` in `region`.
    ///
    /// # Errors
    ///
    /// Fails only if no local port can be bound.
    pub async fn start(bucket: &str, region: &str) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shared = Arc::new(Shared {
            bucket: bucket.to_owned(),
            region: region.to_owned(),
            addr,
            state: Mutex::new(State::default()),
        });

        let accept_state = Arc::clone(&shared);
        let handle = tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!(error = %err, "mock accept failed");
                        continue;
                    }
                };
                let conn_state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let state = Arc::clone(&conn_state);
                        async move { handle_request(state, req).await }
                    });
                    let builder = HttpConnBuilder::new(TokioExecutor::new());
                    let conn = builder.serve_connection(TokioIo::new(stream), service);
                    if let Err(err) = conn.await {
                        debug!(%peer, error = %err, "mock connection error");
                    }
                });
            }
        });

        Ok(Self { shared, handle })
    }

    /// Base URL of the server, e.g. `http://127.0.0.1:39313`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.shared.addr)
    }

    /// The bucket this server holds.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.shared.bucket
    }

    /// Insert an object directly, returning its ETag.
    pub fn put_object(&self, key: &str, content: &[u8]) -> String {
        let object = StoredObject {
            content: Bytes::copy_from_slice(content),
            etag: content_etag(content),
            content_type: "application/octet-stream".to_owned(),
            last_modified: Utc::now(),
        };
        let etag = object.etag.clone();
        self.shared.lock().objects.insert(key.to_owned(), object);
        etag
    }

    /// Fetch an object's bytes directly.
    #[must_use]
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.shared.lock().objects.get(key).map(|o| o.content.clone())
    }

    /// Keys currently stored, filtered by prefix, in order.
    #[must_use]
    pub fn keys(&self, prefix: &str) -> Vec<String> {
        self.shared
            .lock()
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of multipart uploads still in progress.
    #[must_use]
    pub fn pending_uploads(&self) -> usize {
        self.shared.lock().uploads.len()
    }

    /// All requests seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RequestLog> {
        self.shared.lock().requests.clone()
    }

    /// How many logged requests match a method and a query substring.
    #[must_use]
    pub fn count_requests(&self, method: &str, query_contains: &str) -> usize {
        self.shared
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.query.contains(query_contains))
            .count()
    }

    /// Forget all logged requests.
    pub fn clear_requests(&self) {
        self.shared.lock().requests.clear();
    }

    /// Force (or clear) simulated failures.
    pub fn set_errors(&self, errors: ErrorSimulation) {
        self.shared.lock().errors = errors;
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

type MockResponse = Response<Full<Bytes>>;

async fn handle_request(
    shared: Arc<Shared>,
    req: Request<Incoming>,
) -> Result<MockResponse, Infallible> {
    let method = req.method().clone();
    let path = percent_decode_str(req.uri().path())
        .decode_utf8_lossy()
        .into_owned();
    let query_raw = req.uri().query().unwrap_or("").to_owned();
    let query = parse_query(&query_raw);
    let headers = req.headers().clone();
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(error = %err, "mock failed to read request body");
            Bytes::new()
        }
    };
    debug!(%method, %path, query = %query_raw, body_len = body.len(), "mock request");

    {
        let mut state = shared.lock();
        state.requests.push(RequestLog {
            method: method.to_string(),
            path: path.clone(),
            query: query_raw.clone(),
        });
        if state.errors.internal_errors {
            return Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalError",
                "simulated internal error",
                &path,
            ));
        }
        if state.errors.permission_errors {
            return Ok(error_response(
                StatusCode::FORBIDDEN,
                "AccessDenied",
                "simulated access denial",
                &path,
            ));
        }
        if state.errors.not_found_errors {
            return Ok(error_response(
                StatusCode::NOT_FOUND,
                "NoSuchKey",
                "simulated missing key",
                &path,
            ));
        }
    }

    // Path-style addressing only: /{bucket}[/key...].
    let trimmed = path.trim_start_matches('/');
    let (bucket, key) = match trimmed.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (trimmed, ""),
    };
    if bucket != shared.bucket {
        return Ok(error_response(
            StatusCode::NOT_FOUND,
            "NoSuchBucket",
            "The specified bucket does not exist",
            &path,
        ));
    }

    let response = match method {
        Method::HEAD if key.is_empty() => bucket_head(&shared),
        Method::GET if key.is_empty() => list_objects(&shared, &query),
        Method::POST if query.contains_key("uploads") => initiate_upload(&shared, key),
        Method::POST if query.contains_key("uploadId") => {
            complete_upload(&shared, key, &query, &body)
        }
        Method::PUT if query.contains_key("uploadId") => {
            if headers.contains_key("x-amz-copy-source") {
                copy_part(&shared, &query, &headers)
            } else {
                upload_part(&shared, &query, body)
            }
        }
        Method::DELETE if query.contains_key("uploadId") => abort_upload(&shared, &query),
        Method::GET => get_object(&shared, key, &headers),
        Method::HEAD => head_object(&shared, key),
        Method::PUT => put_object(&shared, key, &headers, body),
        Method::DELETE => delete_object(&shared, key),
        _ => error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "MethodNotAllowed",
            "The specified method is not allowed against this resource",
            &path,
        ),
    };
    Ok(response)
}

// ---------------------------------------------------------------------------
// Object handlers
// ---------------------------------------------------------------------------

fn bucket_head(shared: &Arc<Shared>) -> MockResponse {
    Response::builder()
        .status(StatusCode::OK)
        .header("x-amz-bucket-region", &shared.region)
        .body(Full::new(Bytes::new()))
        .expect("static response")
}

fn get_object(shared: &Arc<Shared>, key: &str, headers: &http::HeaderMap) -> MockResponse {
    let state = shared.lock();
    let Some(object) = state.objects.get(key) else {
        return no_such_key(key);
    };
    if let Some(expected) = header_str(headers, "if-match") {
        if expected != object.etag {
            return error_response(
                StatusCode::PRECONDITION_FAILED,
                "PreconditionFailed",
                "At least one of the preconditions you specified did not hold",
                key,
            );
        }
    }
    let len = object.content.len();
    if let Some(range) = header_str(headers, "range") {
        return match parse_range(&range, len) {
            Some((start, end)) => {
                let slice = object.content.slice(start..=end);
                let slice_len = slice.len();
                object_response(StatusCode::PARTIAL_CONTENT, object, slice, slice_len)
            }
            None if len == 0 && range == "bytes=0-" => {
                // An open-ended range of an empty object reads as empty.
                object_response(StatusCode::OK, object, Bytes::new(), 0)
            }
            None => error_response(
                StatusCode::RANGE_NOT_SATISFIABLE,
                "InvalidRange",
                "The requested range cannot be satisfied",
                key,
            ),
        };
    }
    object_response(StatusCode::OK, object, object.content.clone(), len)
}

fn head_object(shared: &Arc<Shared>, key: &str) -> MockResponse {
    let state = shared.lock();
    let Some(object) = state.objects.get(key) else {
        return no_such_key(key);
    };
    // Headers only; content-length reports the object size.
    object_response(StatusCode::OK, object, Bytes::new(), object.content.len())
}

fn put_object(
    shared: &Arc<Shared>,
    key: &str,
    headers: &http::HeaderMap,
    body: Bytes,
) -> MockResponse {
    let etag = content_etag(&body);
    let object = StoredObject {
        content: body,
        etag: etag.clone(),
        content_type: header_str(headers, "content-type")
            .unwrap_or_else(|| "application/octet-stream".to_owned()),
        last_modified: Utc::now(),
    };
    shared.lock().objects.insert(key.to_owned(), object);
    Response::builder()
        .status(StatusCode::OK)
        .header("etag", &etag)
        .body(Full::new(Bytes::new()))
        .expect("static response")
}

fn delete_object(shared: &Arc<Shared>, key: &str) -> MockResponse {
    // S3 reports 204 whether or not the key existed.
    shared.lock().objects.remove(key);
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .expect("static response")
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// An element of the merged listing stream: an object key or a grouped
/// common prefix, both ordered by their string form.
enum ListItem {
    Object(String),
    CommonPrefix(String),
}

impl ListItem {
    fn as_str(&self) -> &str {
        match self {
            Self::Object(key) | Self::CommonPrefix(key) => key,
        }
    }
}

fn list_objects(shared: &Arc<Shared>, query: &HashMap<String, String>) -> MockResponse {
    let prefix = query.get("prefix").cloned().unwrap_or_default();
    let delimiter = query.get("delimiter").cloned().unwrap_or_default();
    let start_after = query.get("start-after").cloned().unwrap_or_default();
    let token = query.get("continuation-token").cloned().unwrap_or_default();
    let max_keys = query
        .get("max-keys")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_KEYS)
        .max(1);

    let state = shared.lock();
    let mut items: Vec<ListItem> = Vec::new();
    let mut last_prefix: Option<String> = None;
    for key in state.objects.keys() {
        if !key.starts_with(&prefix) {
            continue;
        }
        // start-after is deliberately inclusive of the named key; clients
        // are expected to drop the echo themselves.
        if !start_after.is_empty() && key.as_str() < start_after.as_str() {
            continue;
        }
        if !token.is_empty() {
            // The continuation token is the last item of the previous page;
            // skip everything at or before it, including the remainder of
            // an already-emitted common prefix group.
            if key.as_str() <= token.as_str() {
                continue;
            }
            if token.ends_with('/') && key.starts_with(&token) {
                continue;
            }
        }
        if !delimiter.is_empty() {
            let rest = &key[prefix.len()..];
            if let Some(i) = rest.find(&delimiter) {
                let group = format!("{prefix}{}", &rest[..=i]);
                if last_prefix.as_deref() != Some(group.as_str()) {
                    last_prefix = Some(group.clone());
                    items.push(ListItem::CommonPrefix(group));
                }
                continue;
            }
        }
        items.push(ListItem::Object(key.clone()));
    }

    let is_truncated = items.len() > max_keys;
    items.truncate(max_keys);
    let next_token = if is_truncated {
        items.last().map(|item| item.as_str().to_owned())
    } else {
        None
    };

    let mut contents = Vec::new();
    let mut common_prefixes = Vec::new();
    for item in &items {
        match item {
            ListItem::Object(key) => {
                let object = &state.objects[key];
                contents.push(xml::ListObject {
                    key: key.clone(),
                    etag: object.etag.clone(),
                    size: i64::try_from(object.content.len()).unwrap_or(i64::MAX),
                    last_modified: object.last_modified,
                });
            }
            ListItem::CommonPrefix(group) => common_prefixes.push(group.clone()),
        }
    }
    xml_response(
        StatusCode::OK,
        xml::list_result(
            &shared.bucket,
            &prefix,
            is_truncated,
            next_token.as_deref(),
            &contents,
            &common_prefixes,
        ),
    )
}

// ---------------------------------------------------------------------------
// Multipart handlers
// ---------------------------------------------------------------------------

fn initiate_upload(shared: &Arc<Shared>, key: &str) -> MockResponse {
    let upload_id = uuid::Uuid::new_v4().simple().to_string();
    let mut state = shared.lock();
    state.uploads.insert(
        upload_id.clone(),
        MultipartState {
            key: key.to_owned(),
            parts: BTreeMap::new(),
        },
    );
    xml_response(
        StatusCode::OK,
        xml::initiate_result(&shared.bucket, key, &upload_id),
    )
}

fn upload_part(
    shared: &Arc<Shared>,
    query: &HashMap<String, String>,
    body: Bytes,
) -> MockResponse {
    let upload_id = query.get("uploadId").cloned().unwrap_or_default();
    let Some(number) = query.get("partNumber").and_then(|v| v.parse::<i64>().ok()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "InvalidArgument",
            "partNumber is required",
            &upload_id,
        );
    };
    let etag = content_etag(&body);
    let mut state = shared.lock();
    let Some(upload) = state.uploads.get_mut(&upload_id) else {
        return no_such_upload(&upload_id);
    };
    upload.parts.insert(
        number,
        StoredPart {
            etag: etag.clone(),
            content: body,
        },
    );
    Response::builder()
        .status(StatusCode::OK)
        .header("etag", &etag)
        .body(Full::new(Bytes::new()))
        .expect("static response")
}

fn copy_part(
    shared: &Arc<Shared>,
    query: &HashMap<String, String>,
    headers: &http::HeaderMap,
) -> MockResponse {
    let upload_id = query.get("uploadId").cloned().unwrap_or_default();
    let Some(number) = query.get("partNumber").and_then(|v| v.parse::<i64>().ok()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "InvalidArgument",
            "partNumber is required",
            &upload_id,
        );
    };
    let source = header_str(headers, "x-amz-copy-source").unwrap_or_default();
    let source_key = source
        .trim_start_matches('/')
        .split_once('/')
        .map(|(_, key)| key.to_owned())
        .unwrap_or_default();

    let mut state = shared.lock();
    let Some(object) = state.objects.get(&source_key).cloned() else {
        return no_such_key(&source_key);
    };
    if let Some(expected) = header_str(headers, "x-amz-copy-source-if-match") {
        if expected != object.etag {
            return error_response(
                StatusCode::PRECONDITION_FAILED,
                "PreconditionFailed",
                "At least one of the preconditions you specified did not hold",
                &source_key,
            );
        }
    }
    let slice = match header_str(headers, "x-amz-copy-source-range") {
        Some(range) => match parse_range(&range, object.content.len()) {
            Some((start, end)) => object.content.slice(start..=end),
            None => {
                return error_response(
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    "InvalidRange",
                    "The requested range cannot be satisfied",
                    &source_key,
                );
            }
        },
        None => object.content.clone(),
    };
    let etag = content_etag(&slice);
    let Some(upload) = state.uploads.get_mut(&upload_id) else {
        return no_such_upload(&upload_id);
    };
    upload.parts.insert(
        number,
        StoredPart {
            etag: etag.clone(),
            content: slice,
        },
    );
    xml_response(StatusCode::OK, xml::copy_part_result(&etag, Utc::now()))
}

fn complete_upload(
    shared: &Arc<Shared>,
    _key: &str,
    query: &HashMap<String, String>,
    body: &Bytes,
) -> MockResponse {
    let upload_id = query.get("uploadId").cloned().unwrap_or_default();
    let Ok(manifest) = bucketfs_model::parse_complete_request(body) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "MalformedXML",
            "The XML you provided was not well-formed",
            &upload_id,
        );
    };
    if manifest.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "InvalidRequest",
            "You must specify at least one part",
            &upload_id,
        );
    }
    if manifest.windows(2).any(|pair| pair[0] >= pair[1]) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "InvalidPartOrder",
            "The list of parts was not in ascending order",
            &upload_id,
        );
    }

    let mut state = shared.lock();
    let Some(upload) = state.uploads.get(&upload_id) else {
        return no_such_upload(&upload_id);
    };
    let mut content = Vec::new();
    for number in &manifest {
        let Some(part) = upload.parts.get(number) else {
            // A late failure: S3 reports this inside a 200.
            return xml_response(
                StatusCode::OK,
                xml::error_body(
                    "InvalidPart",
                    "One or more of the specified parts could not be found",
                    &upload_id,
                ),
            );
        };
        content.extend_from_slice(&part.content);
    }
    let etag = format!("\"{:x}-{}\"", md5::compute(&content), manifest.len());
    let object_key = upload.key.clone();
    state.uploads.remove(&upload_id);
    state.objects.insert(
        object_key.clone(),
        StoredObject {
            content: Bytes::from(content),
            etag: etag.clone(),
            content_type: "application/octet-stream".to_owned(),
            last_modified: Utc::now(),
        },
    );
    xml_response(
        StatusCode::OK,
        xml::complete_result(&shared.addr.to_string(), &shared.bucket, &object_key, &etag),
    )
}

fn abort_upload(shared: &Arc<Shared>, query: &HashMap<String, String>) -> MockResponse {
    let upload_id = query.get("uploadId").cloned().unwrap_or_default();
    let mut state = shared.lock();
    if state.uploads.remove(&upload_id).is_none() {
        return no_such_upload(&upload_id);
    }
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .expect("static response")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `advertised_len` is what `content-length` reports: the body length for
/// GETs, the full object size for HEADs (whose body is empty on the wire).
fn object_response(
    status: StatusCode,
    object: &StoredObject,
    body: Bytes,
    advertised_len: usize,
) -> MockResponse {
    Response::builder()
        .status(status)
        .header("etag", &object.etag)
        .header("content-type", &object.content_type)
        .header("content-length", advertised_len)
        .header(
            "last-modified",
            object
                .last_modified
                .format("%a, %d %b %Y %H:%M:%S GMT")
                .to_string(),
        )
        .body(Full::new(body))
        .expect("static response")
}

fn xml_response(status: StatusCode, body: Vec<u8>) -> MockResponse {
    Response::builder()
        .status(status)
        .header("content-type", "application/xml")
        .body(Full::new(Bytes::from(body)))
        .expect("static response")
}

fn error_response(status: StatusCode, code: &str, message: &str, resource: &str) -> MockResponse {
    xml_response(status, xml::error_body(code, message, resource))
}

fn no_such_key(key: &str) -> MockResponse {
    error_response(
        StatusCode::NOT_FOUND,
        "NoSuchKey",
        "The specified key does not exist",
        key,
    )
}

fn no_such_upload(upload_id: &str) -> MockResponse {
    error_response(
        StatusCode::NOT_FOUND,
        "NoSuchUpload",
        "The specified multipart upload does not exist",
        upload_id,
    )
}

fn content_etag(content: &[u8]) -> String {
    format!("\"{:x}\"", md5::compute(content))
}

fn header_str(headers: &http::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
}

/// Parse `bytes=a-b` / `bytes=a-` against a body of `len` bytes into an
/// inclusive `(start, end)`.
fn parse_range(header: &str, len: usize) -> Option<(usize, usize)> {
    let spec = header.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: usize = start.parse().ok()?;
    if start >= len {
        return None;
    }
    let end: usize = if end.is_empty() {
        len - 1
    } else {
        end.parse::<usize>().ok()?.min(len - 1)
    };
    (start <= end).then_some((start, end))
}

/// Decode `a=1&b=two` into a map; bare keys map to the empty string.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (
                percent_decode_str(k).decode_utf8_lossy().into_owned(),
                percent_decode_str(v).decode_utf8_lossy().into_owned(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_ranges() {
        assert_eq!(parse_range("bytes=0-9", 100), Some((0, 9)));
        assert_eq!(parse_range("bytes=10-", 100), Some((10, 99)));
        assert_eq!(parse_range("bytes=90-150", 100), Some((90, 99)));
        assert_eq!(parse_range("bytes=100-110", 100), None);
        assert_eq!(parse_range("bytes=0-", 0), None);
        assert_eq!(parse_range("items=0-1", 100), None);
    }

    #[test]
    fn test_should_parse_query_strings() {
        let q = parse_query("list-type=2&prefix=a%2Fb&uploads=");
        assert_eq!(q.get("list-type").map(String::as_str), Some("2"));
        assert_eq!(q.get("prefix").map(String::as_str), Some("a/b"));
        assert_eq!(q.get("uploads").map(String::as_str), Some(""));
    }

    #[test]
    fn test_should_hash_content_etags() {
        let etag = content_etag(b"hello");
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(etag, content_etag(b"hello"));
        assert_ne!(etag, content_etag(b"world"));
    }
}
