//! Error types for request signing.

use thiserror::Error;

/// Errors produced while deriving keys or signing requests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The service is not one SigV4 signing is supported for here.
    #[error("unsupported signing service {0:?} (expected \"s3\" or \"s3-object-lambda\")")]
    UnsupportedService(String),

    /// A header involved in signing is not valid HTTP header text.
    #[error("header value for {0:?} is not valid header text")]
    InvalidHeaderValue(String),
}
