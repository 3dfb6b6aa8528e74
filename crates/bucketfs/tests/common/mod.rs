//! Shared setup for the integration tests: one mock server per test,
//! tracing initialized once.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::sync::{Arc, Once};

use bucketfs::{Bucket, SigningKey};
use bucketfs_mock::MockServer;

pub const BUCKET: &str = "test-bucket";
pub const REGION: &str = "us-east-1";

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A signing key pointed at the mock server.
pub fn signing_key(server: &MockServer) -> Arc<SigningKey> {
    Arc::new(
        SigningKey::derive(
            &server.url(),
            "fake-access-key",
            "fake-secret-key",
            REGION,
            "s3",
        )
        .expect("s3 is a supported service"),
    )
}

/// Start a mock server and a bucket bound to it.
pub async fn mock_bucket() -> (MockServer, Bucket) {
    init_tracing();
    let server = MockServer::start(BUCKET, REGION)
        .await
        .expect("mock server should bind a local port");
    let bucket = Bucket::new(signing_key(&server), BUCKET);
    (server, bucket)
}

/// Deterministic test content: a repeating byte ramp.
pub fn ramp(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
