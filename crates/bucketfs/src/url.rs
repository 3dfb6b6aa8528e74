//! Endpoint selection, URL building, and bucket-name validation.
//!
//! Buckets without dots in their name get virtual-hosted URLs
//! (`{bucket}.s3.{region}.amazonaws.com/{key}`). A dot in the bucket name
//! breaks TLS against the wildcard certificate, so those buckets use
//! path-style URLs (`s3.{region}.amazonaws.com/{bucket}/{key}`), as does any
//! custom endpoint configured on the signing key.

use bucketfs_auth::SigningKey;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Query escaping keeps only the unreserved set (`-`, `_`, `.`, `~`,
/// alphanumerics); notably `/`, `+` and space are escaped.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Path escaping is the query set minus `/`: key separators stay literal so
/// the path keeps its shape.
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Validate an S3 bucket name.
///
/// Rules (per the AWS bucket naming documentation):
/// - 3-63 characters long
/// - only lowercase letters, digits, hyphens, and dots
/// - begins and ends with a letter or digit
/// - no consecutive dots
/// - must not start with `xn--`
/// - must not end with `-s3alias`
///
/// # Examples
///
/// ```
/// use bucketfs::url::valid_bucket;
///
/// assert!(valid_bucket("docexamplebucket1"));
/// assert!(valid_bucket("my.example.s3.bucket"));
/// assert!(!valid_bucket("DocExampleBucket"));
/// assert!(!valid_bucket("-startwithhyphen"));
/// ```
#[must_use]
pub fn valid_bucket(name: &str) -> bool {
    let len = name.len();
    if !(3..=63).contains(&len) {
        return false;
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return false;
    }
    let first = name.as_bytes()[0];
    let last = name.as_bytes()[len - 1];
    if !(first.is_ascii_lowercase() || first.is_ascii_digit())
        || !(last.is_ascii_lowercase() || last.is_ascii_digit())
    {
        return false;
    }
    if name.contains("..") {
        return false;
    }
    if name.starts_with("xn--") || name.ends_with("-s3alias") {
        return false;
    }
    true
}

/// A fully resolved request destination: the URL to dial plus the pieces
/// (host, path, query) the signer covers.
#[derive(Debug, Clone)]
pub(crate) struct Target {
    pub scheme: String,
    pub host: String,
    /// Percent-encoded absolute path, exactly as it appears on the wire.
    pub path: String,
    /// Raw query string without the leading `?`; empty when absent.
    pub query: String,
}

impl Target {
    /// Render the complete URL.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            format!("{}://{}{}", self.scheme, self.host, self.path)
        } else {
            format!("{}://{}{}?{}", self.scheme, self.host, self.path, self.query)
        }
    }
}

/// Target for an object key, optionally with a query string.
pub(crate) fn object_target(key: &SigningKey, bucket: &str, object: &str, query: &str) -> Target {
    let (scheme, host, path_style) = endpoint(key, bucket);
    let path = if path_style {
        format!("/{bucket}/{}", path_escape(object))
    } else {
        format!("/{}", path_escape(object))
    };
    Target {
        scheme,
        host,
        path,
        query: query.to_owned(),
    }
}

/// Target for the bucket root (listings, region probes).
pub(crate) fn bucket_target(key: &SigningKey, bucket: &str, query: &str) -> Target {
    let (scheme, host, path_style) = endpoint(key, bucket);
    let path = if path_style {
        format!("/{bucket}/")
    } else {
        "/".to_owned()
    };
    Target {
        scheme,
        host,
        path,
        query: query.to_owned(),
    }
}

/// Resolve `(scheme, host, path_style)` for a bucket under this key.
fn endpoint(key: &SigningKey, bucket: &str) -> (String, String, bool) {
    if let Some(base) = key.base_uri() {
        let (scheme, host) = match base.split_once("://") {
            Some((scheme, host)) => (scheme.to_owned(), host.to_owned()),
            None => ("https".to_owned(), base.to_owned()),
        };
        return (scheme, host, true);
    }
    if bucket.contains('.') {
        // Virtual hosting would put the dotted name in TLS SNI, where it
        // cannot match the *.s3 wildcard certificate.
        (
            "https".to_owned(),
            format!("s3.{}.amazonaws.com", key.region()),
            true,
        )
    } else {
        (
            "https".to_owned(),
            format!("{bucket}.s3.{}.amazonaws.com", key.region()),
            false,
        )
    }
}

/// Percent-encode a query parameter value (everything outside unreserved).
#[must_use]
pub fn query_escape(s: &str) -> String {
    utf8_percent_encode(s, QUERY_ENCODE_SET).to_string()
}

/// Percent-encode an object key for use in a URL path, keeping `/` literal.
#[must_use]
pub fn path_escape(s: &str) -> String {
    utf8_percent_encode(s, PATH_ENCODE_SET).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(base_uri: &str) -> SigningKey {
        SigningKey::derive(base_uri, "fake-access-key", "fake-secret-key", "us-east-1", "s3")
            .expect("s3 is a supported service")
    }

    #[test]
    fn test_should_accept_valid_bucket_names() {
        let names = [
            // from the AWS docs
            "docexamplebucket1",
            "log-delivery-march-2020",
            "my-hosted-content",
            // valid but not recommended
            "docexamplewebsite.com",
            "www.docexamplewebsite.com",
            "my.example.s3.bucket",
            // additional valid names
            "default",
            "abc",
            "123456789",
            "this.is.a.long.bucket-name",
            "123456789a123456789b123456789c123456789d123456789e123456789f123",
        ];
        for name in names {
            assert!(valid_bucket(name), "bucket name {name:?} should be valid");
        }
    }

    #[test]
    fn test_should_reject_invalid_bucket_names() {
        let names = [
            "doc_example_bucket",  // underscores
            "DocExampleBucket",    // uppercase
            "doc-example-bucket-", // trailing hyphen
            "-startwithhyphen",
            ".startwithdot",
            "enddot.",
            "double..dot",
            "xn---invalid-prefix",
            "invalid-suffix-s3alias",
            "a",
            "ab",
            "123456789a123456789b123456789c123456789d123456789e123456789F1234", // 64 chars
        ];
        for name in names {
            assert!(!valid_bucket(name), "bucket name {name:?} should be invalid");
        }
    }

    #[test]
    fn test_should_use_virtual_hosted_url_for_plain_bucket() {
        let key = test_key("");
        let target = object_target(&key, "foo", "a/b.txt", "");
        assert_eq!(target.host, "foo.s3.us-east-1.amazonaws.com");
        assert_eq!(target.path, "/a/b.txt");
        assert_eq!(target.url(), "https://foo.s3.us-east-1.amazonaws.com/a/b.txt");
    }

    #[test]
    fn test_should_use_path_style_url_for_dotted_bucket() {
        let key = test_key("");
        let target = object_target(&key, "a.b.c", "x.txt", "");
        assert_eq!(target.host, "s3.us-east-1.amazonaws.com");
        assert_eq!(target.path, "/a.b.c/x.txt");
    }

    #[test]
    fn test_should_use_path_style_url_for_custom_endpoint() {
        let key = test_key("http://localhost:9000");
        let target = object_target(&key, "foo", "x.txt", "");
        assert_eq!(target.scheme, "http");
        assert_eq!(target.host, "localhost:9000");
        assert_eq!(target.path, "/foo/x.txt");
        let listing = bucket_target(&key, "foo", "list-type=2");
        assert_eq!(listing.url(), "http://localhost:9000/foo/?list-type=2");
    }

    #[test]
    fn test_should_escape_object_paths() {
        let cases = [
            ("simple/path", "simple/path"),
            ("path with spaces", "path%20with%20spaces"),
            ("path/with/slashes", "path/with/slashes"),
            ("path with+plus", "path%20with%2Bplus"),
            ("path=with&special", "path%3Dwith%26special"),
        ];
        for (input, expected) in cases {
            assert_eq!(path_escape(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_should_escape_query_values() {
        let cases = [
            ("simple", "simple"),
            ("with spaces", "with%20spaces"),
            ("with+plus", "with%2Bplus"),
            ("with/slash", "with%2Fslash"),
            ("with=equals", "with%3Dequals"),
            ("with&ampersand", "with%26ampersand"),
        ];
        for (input, expected) in cases {
            assert_eq!(query_escape(input), expected, "input {input:?}");
        }
    }
}
