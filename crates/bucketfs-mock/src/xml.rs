//! XML response bodies, written with the same event-level conventions the
//! client uses to read them.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

/// The S3 XML namespace.
const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// One `<Contents>` entry of a listing.
pub(crate) struct ListObject {
    pub key: String,
    pub etag: String,
    pub size: i64,
    pub last_modified: DateTime<Utc>,
}

/// A complete `<ListBucketResult>` document.
pub(crate) fn list_result(
    bucket: &str,
    prefix: &str,
    is_truncated: bool,
    next_token: Option<&str>,
    contents: &[ListObject],
    common_prefixes: &[String],
) -> Vec<u8> {
    document("ListBucketResult", |w| {
        text(w, "Name", bucket)?;
        text(w, "Prefix", prefix)?;
        text(w, "Delimiter", "/")?;
        text(w, "IsTruncated", if is_truncated { "true" } else { "false" })?;
        if let Some(token) = next_token {
            text(w, "NextContinuationToken", token)?;
        }
        for obj in contents {
            w.create_element("Contents")
                .write_inner_content(|w| -> io::Result<()> {
                    text(w, "Key", &obj.key)?;
                    text(
                        w,
                        "LastModified",
                        &obj.last_modified.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
                    )?;
                    text(w, "ETag", &obj.etag)?;
                    text(w, "Size", &obj.size.to_string())?;
                    text(w, "StorageClass", "STANDARD")?;
                    Ok(())
                })?;
        }
        for common in common_prefixes {
            w.create_element("CommonPrefixes")
                .write_inner_content(|w| -> io::Result<()> { text(w, "Prefix", common) })?;
        }
        Ok(())
    })
}

/// An `<InitiateMultipartUploadResult>` document.
pub(crate) fn initiate_result(bucket: &str, key: &str, upload_id: &str) -> Vec<u8> {
    document("InitiateMultipartUploadResult", |w| {
        text(w, "Bucket", bucket)?;
        text(w, "Key", key)?;
        text(w, "UploadId", upload_id)?;
        Ok(())
    })
}

/// A `<CompleteMultipartUploadResult>` document.
pub(crate) fn complete_result(host: &str, bucket: &str, key: &str, etag: &str) -> Vec<u8> {
    document("CompleteMultipartUploadResult", |w| {
        text(w, "Location", &format!("http://{host}/{bucket}/{key}"))?;
        text(w, "Bucket", bucket)?;
        text(w, "Key", key)?;
        text(w, "ETag", etag)?;
        Ok(())
    })
}

/// A `<CopyPartResult>` document.
pub(crate) fn copy_part_result(etag: &str, last_modified: DateTime<Utc>) -> Vec<u8> {
    document("CopyPartResult", |w| {
        text(
            w,
            "LastModified",
            &last_modified.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        )?;
        text(w, "ETag", etag)?;
        Ok(())
    })
}

/// An `<Error>` document.
pub(crate) fn error_body(code: &str, message: &str, resource: &str) -> Vec<u8> {
    document("Error", |w| {
        text(w, "Code", code)?;
        text(w, "Message", message)?;
        text(w, "Resource", resource)?;
        Ok(())
    })
}

/// Write a namespaced document with declaration around `content`.
fn document<F>(root: &str, content: F) -> Vec<u8>
where
    F: FnOnce(&mut Writer<&mut Vec<u8>>) -> io::Result<()>,
{
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);
    let written: io::Result<()> = (|| {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer
            .create_element(root)
            .with_attribute(("xmlns", S3_NAMESPACE))
            .write_inner_content(content)?;
        Ok(())
    })();
    // Writing into a Vec cannot fail.
    debug_assert!(written.is_ok());
    buf
}

fn text<W: Write>(writer: &mut Writer<W>, tag: &str, value: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(value))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_write_error_body() {
        let body = error_body("NoSuchKey", "The specified key does not exist.", "/b/k");
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("<Error xmlns="));
        assert!(text.contains("<Code>NoSuchKey</Code>"));
        assert!(text.contains("<Message>The specified key does not exist.</Message>"));
    }

    #[test]
    fn test_should_write_listing_the_client_can_parse() {
        let body = list_result(
            "bkt",
            "dir/",
            true,
            Some("tok"),
            &[ListObject {
                key: "dir/a.txt".to_owned(),
                etag: "\"abc\"".to_owned(),
                size: 3,
                last_modified: Utc::now(),
            }],
            &["dir/sub/".to_owned()],
        );
        let page: bucketfs_model::ListPage = bucketfs_model::from_xml(&body).unwrap();
        assert!(page.is_truncated);
        assert_eq!(page.next_token.as_deref(), Some("tok"));
        assert_eq!(page.contents.len(), 1);
        assert_eq!(page.contents[0].key, "dir/a.txt");
        assert_eq!(page.contents[0].etag, "\"abc\"");
        assert_eq!(page.common_prefixes, vec!["dir/sub/"]);
    }

    #[test]
    fn test_should_write_initiate_result_the_client_can_parse() {
        let body = initiate_result("bkt", "big.bin", "upload-1");
        let init: bucketfs_model::InitiateResult = bucketfs_model::from_xml(&body).unwrap();
        assert_eq!(init.bucket, "bkt");
        assert_eq!(init.key, "big.bin");
        assert_eq!(init.upload_id, "upload-1");
    }
}
