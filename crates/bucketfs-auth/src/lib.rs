//! AWS Signature Version 4 signing for the bucketfs client.
//!
//! This crate produces signatures; it never verifies them. It exposes:
//!
//! - [`SigningKey`] - an immutable signing identity (access id, secret,
//!   region, service, optional session token, optional custom endpoint)
//!   with a cached day-scoped derived key,
//! - header signing ([`SigningKey::sign_request`]) writing `Authorization`,
//!   `X-Amz-Date`, `X-Amz-Content-Sha256` and, when present,
//!   `X-Amz-Security-Token`,
//! - query-parameter presigning ([`SigningKey::presign`]) with
//!   `UNSIGNED-PAYLOAD`,
//! - the [`canonical`] building blocks, kept public because the exact
//!   canonical form is the part of SigV4 worth testing against the published
//!   AWS vectors.

pub mod canonical;
mod error;
mod sign;

pub use error::AuthError;
pub use sign::{
    SigningKey, build_string_to_sign, compute_signature, derive_signing_key, query_escape,
};
