//! Multipart upload request/response model.

use std::io;

use quick_xml::events::{BytesDecl, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ErrorBody, XmlError};
use crate::xml::{
    FromXml, S3_NAMESPACE, parse_i64, read_text_content, reader_for, skip_element,
    write_text_element,
};

/// `<InitiateMultipartUploadResult>` - the reply to `POST ?uploads=`.
#[derive(Debug, Default)]
pub struct InitiateResult {
    /// Bucket echoed by the server; must match what was requested.
    pub bucket: String,
    /// Key echoed by the server; must match what was requested.
    pub key: String,
    /// The upload id every subsequent part operation carries.
    pub upload_id: String,
}

impl FromXml for InitiateResult {
    fn from_xml_reader(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut result = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"Bucket" => result.bucket = read_text_content(reader)?,
                    b"Key" => result.key = read_text_content(reader)?,
                    b"UploadId" => result.upload_id = read_text_content(reader)?,
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(result),
                Event::Eof => {
                    return Err(XmlError::Parse(
                        "truncated InitiateMultipartUploadResult".to_owned(),
                    ));
                }
                _ => {}
            }
        }
    }
}

/// One `<Part>` of a `CompleteMultipartUpload` request body.
#[derive(Debug, Clone)]
pub struct CompletedPart {
    /// 1-based part number, at most 10 000.
    pub part_number: i64,
    /// The ETag the server returned for this part.
    pub etag: String,
}

/// Serialize the `CompleteMultipartUpload` request body.
///
/// `parts` must already be sorted ascending by part number; the S3 API
/// rejects out-of-order manifests.
///
/// # Errors
///
/// Returns [`XmlError`] if writing fails.
pub fn complete_multipart_xml(parts: &[CompletedPart]) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(256);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer
        .create_element("CompleteMultipartUpload")
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| -> io::Result<()> {
            for part in parts {
                w.create_element("Part")
                    .write_inner_content(|w| -> io::Result<()> {
                        write_text_element(w, "PartNumber", &part.part_number.to_string())?;
                        write_text_element(w, "ETag", &part.etag)?;
                        Ok(())
                    })?;
            }
            Ok(())
        })?;

    Ok(buf)
}

/// `<CompleteMultipartUploadResult>` on success.
#[derive(Debug, Default)]
pub struct CompleteResult {
    /// URL of the completed object.
    pub location: Option<String>,
    /// Bucket of the completed object.
    pub bucket: Option<String>,
    /// Key of the completed object.
    pub key: Option<String>,
    /// ETag of the assembled object.
    pub etag: String,
}

impl FromXml for CompleteResult {
    fn from_xml_reader(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut result = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"Location" => result.location = Some(read_text_content(reader)?),
                    b"Bucket" => result.bucket = Some(read_text_content(reader)?),
                    b"Key" => result.key = Some(read_text_content(reader)?),
                    b"ETag" => result.etag = read_text_content(reader)?,
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(result),
                Event::Eof => {
                    return Err(XmlError::Parse(
                        "truncated CompleteMultipartUploadResult".to_owned(),
                    ));
                }
                _ => {}
            }
        }
    }
}

/// The two shapes a `POST ?uploadId=` 200 response can take.
///
/// S3 may return `200 OK` carrying an `<Error>` body when the completion
/// fails late; the root element name is the only discriminator.
#[derive(Debug)]
pub enum CompleteOutcome {
    /// `<CompleteMultipartUploadResult>` - the object was assembled.
    Completed(CompleteResult),
    /// `<Error>` - the completion failed despite the 200.
    Failed(ErrorBody),
}

/// Decode a Complete-Multipart response body by its root element name.
///
/// # Errors
///
/// Returns [`XmlError::UnexpectedElement`] for any root other than
/// `CompleteMultipartUploadResult` or `Error`, and [`XmlError`] parse
/// failures for malformed documents.
pub fn parse_complete_response(xml: &[u8]) -> Result<CompleteOutcome, XmlError> {
    let mut reader = reader_for(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                return match e.local_name().as_ref() {
                    b"CompleteMultipartUploadResult" => Ok(CompleteOutcome::Completed(
                        CompleteResult::from_xml_reader(&mut reader)?,
                    )),
                    b"Error" => Ok(CompleteOutcome::Failed(ErrorBody::from_xml_reader(
                        &mut reader,
                    )?)),
                    other => Err(XmlError::UnexpectedElement(
                        String::from_utf8_lossy(other).into_owned(),
                    )),
                };
            }
            Event::Eof => return Err(XmlError::MissingElement("root element".to_owned())),
            _ => {}
        }
    }
}

/// `<CopyPartResult>` - the reply to an upload-part-copy PUT.
#[derive(Debug, Default)]
pub struct CopyPartResult {
    /// ETag of the copied part.
    pub etag: String,
}

impl FromXml for CopyPartResult {
    fn from_xml_reader(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut result = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"ETag" => result.etag = read_text_content(reader)?,
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(result),
                Event::Eof => return Err(XmlError::Parse("truncated CopyPartResult".to_owned())),
                _ => {}
            }
        }
    }
}

/// Parse `<PartNumber>` values out of a `CompleteMultipartUpload` body.
///
/// Used by servers (the mock included) rather than the client itself.
///
/// # Errors
///
/// Returns [`XmlError`] on malformed XML or non-numeric part numbers.
pub fn parse_complete_request(xml: &[u8]) -> Result<Vec<i64>, XmlError> {
    let mut reader = reader_for(xml);
    let mut parts = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if e.local_name().as_ref() == b"PartNumber" {
                    parts.push(parse_i64(&read_text_content(&mut reader)?)?);
                }
            }
            Event::Eof => return Ok(parts),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::from_xml;

    #[test]
    fn test_should_parse_initiate_result() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<InitiateMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <Bucket>example-bucket</Bucket>
    <Key>big/object.bin</Key>
    <UploadId>VXBsb2FkIElE</UploadId>
</InitiateMultipartUploadResult>"#;
        let init: InitiateResult = from_xml(xml).unwrap();
        assert_eq!(init.bucket, "example-bucket");
        assert_eq!(init.key, "big/object.bin");
        assert_eq!(init.upload_id, "VXBsb2FkIElE");
    }

    #[test]
    fn test_should_serialize_complete_request() {
        let parts = vec![
            CompletedPart {
                part_number: 1,
                etag: "\"aaa\"".to_owned(),
            },
            CompletedPart {
                part_number: 2,
                etag: "\"bbb\"".to_owned(),
            },
        ];
        let xml = complete_multipart_xml(&parts).unwrap();
        let text = String::from_utf8(xml).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains(
            "<CompleteMultipartUpload xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">"
        ));
        assert!(text.contains("<Part><PartNumber>1</PartNumber><ETag>&quot;aaa&quot;</ETag></Part>"));
        assert!(text.contains("<Part><PartNumber>2</PartNumber><ETag>&quot;bbb&quot;</ETag></Part>"));
    }

    #[test]
    fn test_should_round_trip_complete_request_part_numbers() {
        let parts = vec![
            CompletedPart {
                part_number: 1,
                etag: "\"a\"".to_owned(),
            },
            CompletedPart {
                part_number: 3,
                etag: "\"c\"".to_owned(),
            },
        ];
        let xml = complete_multipart_xml(&parts).unwrap();
        assert_eq!(parse_complete_request(&xml).unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_should_decode_complete_success_by_root_element() {
        let xml = br#"<CompleteMultipartUploadResult>
            <Location>http://example-bucket.s3.amazonaws.com/obj</Location>
            <Bucket>example-bucket</Bucket>
            <Key>obj</Key>
            <ETag>"final-etag"</ETag>
        </CompleteMultipartUploadResult>"#;
        match parse_complete_response(xml).unwrap() {
            CompleteOutcome::Completed(result) => {
                assert_eq!(result.etag, "\"final-etag\"");
                assert_eq!(result.bucket.as_deref(), Some("example-bucket"));
            }
            CompleteOutcome::Failed(body) => panic!("unexpected error body: {body:?}"),
        }
    }

    #[test]
    fn test_should_decode_complete_failure_wrapped_in_200() {
        let xml = br"<Error>
            <Code>InternalError</Code>
            <Message>We encountered an internal error.</Message>
        </Error>";
        match parse_complete_response(xml).unwrap() {
            CompleteOutcome::Failed(body) => {
                assert_eq!(body.code, "InternalError");
                assert_eq!(body.message, "We encountered an internal error.");
            }
            CompleteOutcome::Completed(result) => panic!("unexpected success: {result:?}"),
        }
    }

    #[test]
    fn test_should_reject_unknown_complete_root() {
        let result = parse_complete_response(b"<Wat/>");
        assert!(result.is_err());
    }

    #[test]
    fn test_should_parse_copy_part_result() {
        let xml = br#"<CopyPartResult><ETag>"copied"</ETag></CopyPartResult>"#;
        let copied: CopyPartResult = from_xml(xml).unwrap();
        assert_eq!(copied.etag, "\"copied\"");
    }
}
