//! An S3-compatible object store presented as a hierarchical, read/write
//! virtual filesystem.
//!
//! A [`Bucket`] binds a [`SigningKey`] to one bucket on any S3-compatible
//! store (AWS, Backblaze B2, MinIO, ...). Objects open as seekable
//! streaming files, common prefixes read as directories, small objects
//! write in one signed PUT, and large objects upload as parallel multipart
//! uploads:
//!
//! ```no_run
//! use std::sync::Arc;
//! use bucketfs::{Bucket, Entry, SigningKey};
//!
//! # async fn demo() -> Result<(), bucketfs::Error> {
//! let key = Arc::new(SigningKey::derive(
//!     "", "AKID", "SECRET", "us-east-1", "s3",
//! )?);
//! let bucket = Bucket::new(key, "my-bucket");
//!
//! bucket.put("hello.txt", "Hello, World!".into()).await?;
//! if let Entry::File(mut file) = bucket.open("hello.txt").await? {
//!     let contents = file.read_to_end().await?;
//!     assert_eq!(contents, b"Hello, World!");
//! }
//! for entry in bucket.read_dir(".").await? {
//!     println!("{} (dir: {})", entry.name(), entry.is_dir());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The pieces compose from the bottom up:
//!
//! - [`path`] - path cleaning/comparison and glob matching;
//! - [`Transport`] - the shared HTTP client with bounded retry of
//!   idempotent requests;
//! - [`Reader`] - HEAD/range-GET access to one object, with ETag-consistent
//!   reads;
//! - [`ObjectFile`] - a seek/read view that reconnects when S3 resets a
//!   slow stream;
//! - [`Prefix`] / [`DirEntry`] - delimiter-based directory listings with
//!   continuation paging and seek;
//! - [`walk_glob`] - pattern-driven tree walks that push prefix and seek
//!   filters into the listings;
//! - [`Uploader`] / [`MultipartUpload`] - the multipart upload engine with
//!   server-side copy-part and a parallel pump from any [`ReadAt`] source.

pub mod path;

mod bucket;
mod error;
mod file;
mod http;
mod prefix;
mod reader;
mod stream;
mod uploader;
pub mod url;
mod walk;

pub use bucket::{Bucket, Entry};
pub use bucketfs_auth::{AuthError, SigningKey};
pub use error::Error;
pub use file::ObjectFile;
pub use http::{Transport, TransportConfig};
pub use prefix::{DirEntry, Prefix};
pub use reader::{Reader, bucket_region, presigned_url};
pub use stream::ByteStream;
pub use uploader::{
    CompletedUpload, MAX_PARTS, MIN_PART_SIZE, MultipartUpload, ReadAt, Uploader,
};
pub use walk::{EntryMeta, GlobFs, WalkEntry, WalkFlow, open_glob, walk_glob};
