//! The client error taxonomy.
//!
//! Every failure surfaces as one [`Error`], with predicates for the cases
//! callers branch on. Transient HTTP failures (5xx, connection resets) are
//! retried inside the transport and only the final exhausted failure is
//! returned. Cancellation has no variant: dropping an operation's future
//! cancels it, and timeouts surface through [`Error::Http`].

use bucketfs_model::extract_message;
use thiserror::Error;

/// Errors returned by the bucketfs client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A path, pattern, or argument failed validation. Never retried.
    #[error("{op}: invalid argument: {detail}")]
    Invalid {
        /// The operation that rejected the argument.
        op: &'static str,
        /// The offending value or a short description.
        detail: String,
    },

    /// A bucket name failed validation.
    #[error("invalid bucket name {0:?}")]
    InvalidBucket(String),

    /// The server reported 404 / `NoSuchKey` / `NoSuchBucket`.
    #[error("s3://{bucket}/{path}: not found")]
    NotFound {
        /// Bucket the operation targeted.
        bucket: String,
        /// Key or prefix the operation targeted.
        path: String,
    },

    /// The server reported 403 / `AccessDenied`.
    #[error("s3://{bucket}/{path}: permission denied")]
    Permission {
        /// Bucket the operation targeted.
        bucket: String,
        /// Key or prefix the operation targeted.
        path: String,
    },

    /// A conditional request failed: the object changed since its ETag was
    /// recorded (412 from `If-Match`).
    #[error("s3://{bucket}/{path}: etag changed")]
    EtagChanged {
        /// Bucket the operation targeted.
        bucket: String,
        /// Key the operation targeted.
        path: String,
    },

    /// The requested byte range cannot be satisfied (416).
    #[error("s3://{bucket}/{path}: range not satisfiable")]
    RangeNotSatisfiable {
        /// Bucket the operation targeted.
        bucket: String,
        /// Key the operation targeted.
        path: String,
    },

    /// An out-of-bounds seek on an object file.
    #[error("invalid seek offset {0}")]
    InvalidSeek(i64),

    /// A multipart part below the 5 MiB floor (other than the final part).
    #[error("part size {size} below minimum part size {min}")]
    PartTooSmall {
        /// The rejected part size.
        size: i64,
        /// The protocol minimum.
        min: i64,
    },

    /// A source delivered fewer bytes than its declared size.
    #[error("unexpected end of source data")]
    UnexpectedEof,

    /// Any other server-reported failure, annotated with the `<Message>`
    /// extracted from the XML error body.
    #[error("s3 {op}: {status} {message:?}")]
    Remote {
        /// The operation that failed.
        op: &'static str,
        /// HTTP status of the response.
        status: u16,
        /// `<Message>` text, or `"(no message)"`.
        message: String,
    },

    /// The server responded outside the protocol (missing ETag, echoed
    /// bucket mismatch, truncated page without a token, ...).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport-level failure, including timeouts. Reset-style errors are
    /// retried before surfacing here.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// A local I/O failure, e.g. the sink of a streaming copy.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A malformed XML body.
    #[error(transparent)]
    Xml(#[from] bucketfs_model::XmlError),

    /// Request signing failed.
    #[error(transparent)]
    Auth(#[from] bucketfs_auth::AuthError),

    /// A malformed glob pattern.
    #[error(transparent)]
    BadPattern(#[from] crate::path::BadPattern),
}

impl Error {
    /// A path, bucket name, pattern, or seek offset failed validation.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            Self::Invalid { .. }
                | Self::InvalidBucket(_)
                | Self::InvalidSeek(_)
                | Self::BadPattern(_)
        )
    }

    /// The object or prefix does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The server denied access.
    #[must_use]
    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Permission { .. })
    }

    /// An `If-Match` precondition failed.
    #[must_use]
    pub fn is_etag_changed(&self) -> bool {
        matches!(self, Self::EtagChanged { .. })
    }

    /// The requested range lies outside the object.
    #[must_use]
    pub fn is_range_not_satisfiable(&self) -> bool {
        matches!(self, Self::RangeNotSatisfiable { .. })
    }

    /// A server-side failure that was retried to exhaustion, or a reset-style
    /// transport error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Remote { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            Self::Http(err) => err.is_connect() || err.is_timeout(),
            _ => false,
        }
    }

    /// The operation exceeded a transport timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(err) if err.is_timeout())
    }

    /// Construct the error for a non-2xx response, consuming the body for
    /// its `<Message>` where the status is not otherwise classified.
    pub(crate) async fn from_response(
        op: &'static str,
        bucket: &str,
        path: &str,
        res: reqwest::Response,
    ) -> Self {
        let status = res.status().as_u16();
        match status {
            404 => Self::NotFound {
                bucket: bucket.to_owned(),
                path: path.to_owned(),
            },
            403 => Self::Permission {
                bucket: bucket.to_owned(),
                path: path.to_owned(),
            },
            412 => Self::EtagChanged {
                bucket: bucket.to_owned(),
                path: path.to_owned(),
            },
            416 => Self::RangeNotSatisfiable {
                bucket: bucket.to_owned(),
                path: path.to_owned(),
            },
            _ => {
                let body = res.bytes().await.unwrap_or_default();
                Self::Remote {
                    op,
                    status,
                    message: extract_message(&body),
                }
            }
        }
    }

    pub(crate) fn invalid(op: &'static str, detail: impl Into<String>) -> Self {
        Self::Invalid {
            op,
            detail: detail.into(),
        }
    }
}
