//! An in-process mock of the S3 API subset the bucketfs client speaks.
//!
//! One bucket, held in memory: object CRUD with ranged and conditional
//! GETs, ListObjectsV2 with delimiter/prefix/start-after/continuation
//! paging, the multipart upload lifecycle including ranged copy-part, and
//! the bucket-region HEAD probe. Every request is logged so tests can
//! assert on the operations a client performed, and error responses can be
//! forced for failure-path tests.
//!
//! Faithfulness notes: `start-after` is *inclusive* of the named key,
//! reproducing the server behavior the client's seek-stripping exists for,
//! and a completion manifest naming an unknown part fails with an `<Error>`
//! body wrapped in `200 OK`, the late-failure shape real S3 exhibits.

mod server;
mod xml;

pub use server::{ErrorSimulation, MockServer, RequestLog};
