//! S3 wire model for the bucketfs client.
//!
//! Typed views over the XML bodies the client exchanges with an
//! S3-compatible server:
//!
//! - [`ListPage`] - one page of a `ListObjectsV2` result,
//! - [`InitiateResult`], [`CompletedPart`], [`CompleteOutcome`],
//!   [`CopyPartResult`] - the multipart upload lifecycle,
//! - [`ErrorBody`] / [`extract_message`] - `<Error>` responses.
//!
//! Bodies are read and written at the `quick-xml` event level; see [`xml`]
//! for the conventions.

mod error;
mod list;
mod multipart;
pub mod xml;

pub use error::{ErrorBody, XmlError, extract_message};
pub use list::{ListPage, ObjectEntry};
pub use multipart::{
    CompleteOutcome, CompleteResult, CompletedPart, CopyPartResult, InitiateResult,
    complete_multipart_xml, parse_complete_request, parse_complete_response,
};
pub use xml::{FromXml, S3_NAMESPACE, from_xml};
