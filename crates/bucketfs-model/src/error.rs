//! XML error bodies and the crate's own error type.

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;

use crate::xml::{FromXml, read_text_content, reader_for, skip_element};

/// Errors from reading or writing S3 XML bodies.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum XmlError {
    /// Malformed content inside an otherwise well-formed document.
    #[error("xml parse error: {0}")]
    Parse(String),

    /// A required element was absent.
    #[error("missing element {0}")]
    MissingElement(String),

    /// A root element this model does not know.
    #[error("unexpected element {0}")]
    UnexpectedElement(String),

    /// Low-level reader/writer failure.
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    /// Writer I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An S3 `<Error>` response body.
///
/// Servers return this shape for every failed request (and occasionally,
/// for multipart completion, inside a 200).
#[derive(Debug, Default, Clone)]
pub struct ErrorBody {
    /// Machine-readable code, e.g. `NoSuchKey`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl FromXml for ErrorBody {
    fn from_xml_reader(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut body = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"Code" => body.code = read_text_content(reader)?,
                    b"Message" => body.message = read_text_content(reader)?,
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(body),
                Event::Eof => return Err(XmlError::Parse("truncated Error body".to_owned())),
                _ => {}
            }
        }
    }
}

/// Best-effort extraction of the `<Message>` text from an error response.
///
/// Failed requests carry an XML `<Error>` body; surfacing its message makes
/// remote failures debuggable. Undecodable bodies yield `"(no message)"`;
/// a decodable body without a message yields the empty string, matching how
/// much the server actually said.
#[must_use]
pub fn extract_message(body: &[u8]) -> String {
    let mut reader = reader_for(body);
    let mut message = String::new();
    let mut saw_root = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if saw_root && e.local_name().as_ref() == b"Message" {
                    if let Ok(text) = read_text_content(&mut reader) {
                        message = text;
                    }
                } else {
                    saw_root = true;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return "(no message)".to_owned(),
        }
    }
    if saw_root {
        message
    } else {
        "(no message)".to_owned()
    }
}
