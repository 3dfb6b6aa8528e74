//! ListObjectsV2 response model.

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::XmlError;
use crate::xml::{
    FromXml, parse_bool, parse_i64, parse_timestamp, read_text_content, skip_element,
};

/// One page of a `ListObjectsV2` result (`<ListBucketResult>`).
///
/// `contents` are the objects directly under the listed prefix;
/// `common_prefixes` are the pseudo-directories grouped by the delimiter.
/// Both arrive in the server's lexicographic key order.
#[derive(Debug, Default)]
pub struct ListPage {
    /// Whether the listing was cut short and a continuation token follows.
    pub is_truncated: bool,
    /// Cursor for the next page; meaningful only when `is_truncated`.
    pub next_token: Option<String>,
    /// Objects in this page.
    pub contents: Vec<ObjectEntry>,
    /// Delimiter-grouped prefixes in this page (trailing `/` included).
    pub common_prefixes: Vec<String>,
}

/// An object summary inside `<Contents>`.
#[derive(Debug, Default)]
pub struct ObjectEntry {
    /// Full key within the bucket.
    pub key: String,
    /// Object size in bytes.
    pub size: i64,
    /// Quoted entity tag, exactly as the server returned it.
    pub etag: String,
    /// Last modification time, when present.
    pub last_modified: Option<DateTime<Utc>>,
}

impl FromXml for ListPage {
    fn from_xml_reader(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut page = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"IsTruncated" => {
                        page.is_truncated = parse_bool(&read_text_content(reader)?)?;
                    }
                    b"NextContinuationToken" => {
                        page.next_token = Some(read_text_content(reader)?);
                    }
                    b"Contents" => page.contents.push(ObjectEntry::from_xml_reader(reader)?),
                    b"CommonPrefixes" => {
                        if let Some(prefix) = read_common_prefix(reader)? {
                            page.common_prefixes.push(prefix);
                        }
                    }
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(page),
                Event::Eof => {
                    return Err(XmlError::Parse("truncated ListBucketResult".to_owned()));
                }
                _ => {}
            }
        }
    }
}

impl FromXml for ObjectEntry {
    fn from_xml_reader(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut entry = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"Key" => entry.key = read_text_content(reader)?,
                    b"Size" => entry.size = parse_i64(&read_text_content(reader)?)?,
                    b"ETag" => entry.etag = read_text_content(reader)?,
                    b"LastModified" => {
                        entry.last_modified = Some(parse_timestamp(&read_text_content(reader)?)?);
                    }
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(entry),
                Event::Eof => return Err(XmlError::Parse("truncated Contents".to_owned())),
                _ => {}
            }
        }
    }
}

/// Read a `<CommonPrefixes><Prefix>…</Prefix></CommonPrefixes>` group.
fn read_common_prefix(reader: &mut Reader<&[u8]>) -> Result<Option<String>, XmlError> {
    let mut prefix = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Prefix" => prefix = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => return Ok(prefix),
            Event::Eof => return Err(XmlError::Parse("truncated CommonPrefixes".to_owned())),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::from_xml;

    const SAMPLE: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <Name>example-bucket</Name>
    <Prefix>photos/</Prefix>
    <KeyCount>3</KeyCount>
    <MaxKeys>1000</MaxKeys>
    <Delimiter>/</Delimiter>
    <IsTruncated>true</IsTruncated>
    <NextContinuationToken>1ueGcxLPRx1Tr</NextContinuationToken>
    <Contents>
        <Key>photos/january.jpg</Key>
        <LastModified>2014-11-21T19:40:05.000Z</LastModified>
        <ETag>&quot;70ee1738b6b21e2c8a43f3a5ab0eee71&quot;</ETag>
        <Size>11</Size>
        <StorageClass>STANDARD</StorageClass>
    </Contents>
    <Contents>
        <Key>photos/index</Key>
        <LastModified>2014-11-21T19:40:05.000Z</LastModified>
        <ETag>&quot;9c8af9a76df052144598c115ef33e511&quot;</ETag>
        <Size>0</Size>
    </Contents>
    <CommonPrefixes>
        <Prefix>photos/2014/</Prefix>
    </CommonPrefixes>
    <CommonPrefixes>
        <Prefix>photos/2015/</Prefix>
    </CommonPrefixes>
</ListBucketResult>"#;

    #[test]
    fn test_should_parse_list_page() {
        let page: ListPage = from_xml(SAMPLE).unwrap();
        assert!(page.is_truncated);
        assert_eq!(page.next_token.as_deref(), Some("1ueGcxLPRx1Tr"));
        assert_eq!(page.contents.len(), 2);
        assert_eq!(page.common_prefixes, vec!["photos/2014/", "photos/2015/"]);
    }

    #[test]
    fn test_should_parse_object_entry_fields() {
        let page: ListPage = from_xml(SAMPLE).unwrap();
        let first = &page.contents[0];
        assert_eq!(first.key, "photos/january.jpg");
        assert_eq!(first.size, 11);
        // Quotes come through the entity escape intact.
        assert_eq!(first.etag, "\"70ee1738b6b21e2c8a43f3a5ab0eee71\"");
        assert!(first.last_modified.is_some());
    }

    #[test]
    fn test_should_parse_final_page_without_token() {
        let xml = br"<ListBucketResult><IsTruncated>false</IsTruncated></ListBucketResult>";
        let page: ListPage = from_xml(xml).unwrap();
        assert!(!page.is_truncated);
        assert!(page.next_token.is_none());
        assert!(page.contents.is_empty());
        assert!(page.common_prefixes.is_empty());
    }
}
