//! Event-level XML plumbing for the S3 RestXml dialect.
//!
//! S3's XML does not round-trip cleanly through derive-based serde (attribute
//! namespaces, repeated elements, error bodies sharing a transport with
//! success bodies), so responses are read with a hand-written event loop and
//! requests are written through `quick_xml::Writer`. Conventions:
//!
//! - Namespace: `http://s3.amazonaws.com/doc/2006-03-01/`
//! - Booleans: lowercase `true`/`false`
//! - Timestamps: ISO 8601 (`2006-02-03T16:45:09.000Z`)

use std::io::{self, Write};

use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::XmlError;

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Trait for types readable from an S3 XML response body.
///
/// The root element has already been consumed by the caller; implementations
/// read child elements until the matching end tag is consumed.
pub trait FromXml: Sized {
    /// Deserialize an instance from the given XML reader.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError`] if the XML is malformed or required fields are
    /// missing.
    fn from_xml_reader(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError>;
}

/// Deserialize a whole document into a typed value.
///
/// Skips the declaration, consumes the root start tag, and delegates to the
/// type's [`FromXml`] implementation.
///
/// # Errors
///
/// Returns [`XmlError`] if the XML is malformed or deserialization fails.
pub fn from_xml<T: FromXml>(xml: &[u8]) -> Result<T, XmlError> {
    let mut reader = reader_for(xml);
    loop {
        match reader.read_event()? {
            Event::Start(_) => return T::from_xml_reader(&mut reader),
            Event::Eof => return Err(XmlError::MissingElement("root element".to_owned())),
            _ => {}
        }
    }
}

/// Build a reader with the trimming configuration used everywhere here.
pub(crate) fn reader_for(xml: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    reader
}

/// Read the text content of the current element and consume its end tag.
///
/// Expects the reader to be positioned right after a `Start` event.
pub(crate) fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| XmlError::Parse(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::End(_) => return Ok(text),
            Event::Eof => {
                return Err(XmlError::Parse(
                    "unexpected EOF while reading text content".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

/// Skip over an element and all its children.
pub(crate) fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::Parse(
                    "unexpected EOF while skipping element".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

/// Parse a boolean from XML text (`true`/`false`).
pub(crate) fn parse_bool(s: &str) -> Result<bool, XmlError> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(XmlError::Parse(format!("invalid boolean: {s}"))),
    }
}

/// Parse an i64 from XML text.
pub(crate) fn parse_i64(s: &str) -> Result<i64, XmlError> {
    s.parse::<i64>()
        .map_err(|e| XmlError::Parse(format!("invalid i64 '{s}': {e}")))
}

/// Parse an ISO 8601 timestamp from XML text.
pub(crate) fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>, XmlError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .or_else(|_| {
            // The S3 list format: 2006-02-03T16:45:09.000Z
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| XmlError::Parse(format!("invalid timestamp '{s}': {e}")))
}

/// Write a simple `<tag>text</tag>` element.
pub(crate) fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        value: String,
    }

    impl FromXml for Probe {
        fn from_xml_reader(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
            let mut value = String::new();
            loop {
                match reader.read_event()? {
                    Event::Start(e) => match e.local_name().as_ref() {
                        b"Value" => value = read_text_content(reader)?,
                        _ => skip_element(reader)?,
                    },
                    Event::End(_) => return Ok(Self { value }),
                    Event::Eof => return Err(XmlError::Parse("truncated".to_owned())),
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn test_should_read_root_and_text_content() {
        let xml = br#"<?xml version="1.0"?><Probe><Value>hello</Value></Probe>"#;
        let probe: Probe = from_xml(xml).unwrap();
        assert_eq!(probe.value, "hello");
    }

    #[test]
    fn test_should_unescape_text_content() {
        let xml = br"<Probe><Value>a &amp; b</Value></Probe>";
        let probe: Probe = from_xml(xml).unwrap();
        assert_eq!(probe.value, "a & b");
    }

    #[test]
    fn test_should_skip_unknown_elements() {
        let xml = br"<Probe><Noise><Deep>x</Deep></Noise><Value>kept</Value></Probe>";
        let probe: Probe = from_xml(xml).unwrap();
        assert_eq!(probe.value, "kept");
    }

    #[test]
    fn test_should_fail_on_empty_document() {
        let result: Result<Probe, _> = from_xml(b"   ");
        assert!(matches!(result, Err(XmlError::MissingElement(_))));
    }

    #[test]
    fn test_should_parse_s3_timestamps() {
        assert!(parse_timestamp("2006-02-03T16:45:09.000Z").is_ok());
        assert!(parse_timestamp("2006-02-03T16:45:09Z").is_ok());
        assert!(parse_timestamp("not-a-time").is_err());
    }

    #[test]
    fn test_should_parse_booleans_strictly() {
        assert!(parse_bool("true").unwrap());
        assert!(!parse_bool("false").unwrap());
        assert!(parse_bool("True").is_err());
    }
}
