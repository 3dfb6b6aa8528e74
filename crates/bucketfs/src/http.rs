//! The HTTP transport: a shared client plus bounded retry of idempotent
//! requests.

use std::io;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{Client, Method, Request, Response};
use tracing::warn;

use crate::error::Error;

/// Maximum attempts per idempotent request (1 initial + 2 retries).
const MAX_ATTEMPTS: u32 = 3;

/// First backoff; doubles per retry up to [`MAX_BACKOFF`].
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Backoff ceiling.
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Tuning for the underlying HTTP client.
///
/// The defaults match what this client needs against S3-compatible stores:
/// a generous read timeout so an idle body does not hang forever, a small
/// idle pool, and no response compression (object bytes are opaque).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Timeout between reads of the response; bounds stuck bodies.
    pub read_timeout: Duration,
    /// Idle connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// How long an idle connection is kept.
    pub pool_idle_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            pool_max_idle_per_host: 5,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl TransportConfig {
    /// Build a [`Transport`] from this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the TLS backend cannot be initialized.
    pub fn build(&self) -> Result<Transport, Error> {
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(self.pool_idle_timeout)
            .build()?;
        Ok(Transport { client })
    }
}

/// A cheaply-cloneable handle to the shared HTTP client.
///
/// There is no process-global client baked into the API; constructors take a
/// `Transport` explicitly, and [`Transport::default`] lazily builds one
/// shared instance with the default tuning for callers that do not care.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
}

impl Transport {
    /// Wrap an existing `reqwest` client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a request for `url` with the given method.
    pub(crate) fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client.request(method, url)
    }

    /// Send a request once, without retry. Used where the request is not
    /// idempotent from the caller's point of view even when the method is.
    pub(crate) async fn send(&self, req: Request) -> Result<Response, Error> {
        Ok(self.client.execute(req).await?)
    }

    /// Send a request, retrying transient failures of idempotent methods.
    ///
    /// Retries (bounded, with exponential backoff capped at one second) are
    /// attempted only for `GET`, `HEAD`, `PUT` and `DELETE`, and only on
    /// 500/502/503/504 responses or reset-style transport errors. `POST` is
    /// never retried. Non-retryable responses are returned unchanged.
    pub(crate) async fn send_retry(&self, req: Request) -> Result<Response, Error> {
        let idempotent = matches!(
            *req.method(),
            Method::GET | Method::HEAD | Method::PUT | Method::DELETE
        );
        let mut req = req;
        let mut attempt = 1;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            let backup = if idempotent && attempt < MAX_ATTEMPTS {
                req.try_clone()
            } else {
                None
            };
            let method = req.method().clone();
            let url = req.url().clone();
            match self.client.execute(req).await {
                Ok(res) if retryable_status(res.status().as_u16()) => match backup {
                    Some(again) => {
                        warn!(
                            %method, %url, status = res.status().as_u16(), attempt,
                            "transient server error, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        req = again;
                        attempt += 1;
                    }
                    None => return Ok(res),
                },
                Ok(res) => return Ok(res),
                Err(err) if is_reset_error(&err) => match backup {
                    Some(again) => {
                        warn!(%method, %url, error = %err, attempt, "connection error, retrying");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        req = again;
                        attempt += 1;
                    }
                    None => return Err(err.into()),
                },
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl Default for Transport {
    /// The lazily-built shared default transport.
    fn default() -> Self {
        static DEFAULT: OnceLock<Transport> = OnceLock::new();
        DEFAULT
            .get_or_init(|| {
                TransportConfig::default()
                    .build()
                    .expect("default TLS backend is always available")
            })
            .clone()
    }
}

/// Server statuses worth retrying.
fn retryable_status(status: u16) -> bool {
    matches!(status, 500 | 502 | 503 | 504)
}

/// Whether a transport error looks like a connection reset or truncated
/// body, the failure modes S3 exhibits when a client reads too slowly.
fn is_reset_error(err: &reqwest::Error) -> bool {
    if err.is_connect() {
        return true;
    }
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            );
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_mark_5xx_statuses_retryable() {
        for status in [500, 502, 503, 504] {
            assert!(retryable_status(status), "status {status}");
        }
        for status in [200, 204, 400, 403, 404, 412, 416, 501] {
            assert!(!retryable_status(status), "status {status}");
        }
    }

    #[test]
    fn test_should_detect_reset_io_errors() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::UnexpectedEof,
        ] {
            let io_err = io::Error::new(kind, "boom");
            assert!(matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ));
        }
    }

    #[test]
    fn test_should_build_default_transport() {
        let a = Transport::default();
        let b = Transport::default();
        // Both handles share the lazily-built client.
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }
}
