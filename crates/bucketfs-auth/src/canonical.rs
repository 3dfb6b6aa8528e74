//! Canonical request construction for AWS Signature Version 4.
//!
//! This module implements the canonical request format as specified by AWS:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! The client controls how it encodes its own requests, so the canonical form
//! produced here must match the bytes that actually go on the wire: the URI
//! encoder is applied to the percent-encoded path of the outgoing request and
//! the query string is sorted but otherwise preserved verbatim.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use sha2::{Digest, Sha256};

/// The set of characters that must be percent-encoded in URI path segments.
///
/// Per AWS SigV4 spec, all characters except unreserved characters
/// (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`) must be encoded.
/// Forward slashes in the path are preserved (not encoded).
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build the full canonical request string from its components.
///
/// The result is a newline-separated string of:
/// 1. HTTP method
/// 2. Canonical URI
/// 3. Canonical query string
/// 4. Canonical headers (terminated by an extra newline)
/// 5. Signed headers
/// 6. Hashed payload
///
/// `headers` must contain an entry (lowercase name) for every name in
/// `signed_headers`.
#[must_use]
pub fn build_canonical_request(
    method: &str,
    uri: &str,
    query_string: &str,
    headers: &[(String, String)],
    signed_headers: &[String],
    payload_hash: &str,
) -> String {
    let canonical_uri = build_canonical_uri(uri);
    let canonical_query = build_canonical_query_string(query_string);
    let canonical_headers = build_canonical_headers(headers, signed_headers);
    let signed_headers_str = build_signed_headers_string(signed_headers);

    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n\n{signed_headers_str}\n{payload_hash}"
    )
}

/// Build the canonical URI by URI-encoding each path segment individually.
///
/// Forward slashes (`/`) are preserved. Empty paths are normalized to `/`.
/// Segments are decoded first so that an already percent-encoded path is not
/// double-encoded, then re-encoded against the SigV4 unreserved set.
///
/// # Examples
///
/// ```
/// use bucketfs_auth::canonical::build_canonical_uri;
///
/// assert_eq!(build_canonical_uri("/test.txt"), "/test.txt");
/// assert_eq!(build_canonical_uri(""), "/");
/// assert_eq!(build_canonical_uri("/hello world"), "/hello%20world");
/// ```
#[must_use]
pub fn build_canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    let encoded: Vec<String> = path
        .split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            utf8_percent_encode(&decoded, URI_ENCODE_SET).to_string()
        })
        .collect();

    encoded.join("/")
}

/// Build the canonical query string by sorting parameters.
///
/// Parameters are sorted by key name first, then by value for duplicate keys.
/// The raw parameter bytes are preserved as-is (no decode/re-encode): the
/// signature must cover exactly the encoding this client puts in the request
/// line, and the request builders in the client crate already produce
/// SigV4-compatible escapes.
///
/// # Examples
///
/// ```
/// use bucketfs_auth::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string(""), "");
/// assert_eq!(build_canonical_query_string("b=2&a=1"), "a=1&b=2");
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(&str, &str)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| param.split_once('=').unwrap_or((param, "")))
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical headers string from the request headers.
///
/// Only headers listed in `signed_headers` are included. Header names are
/// matched lowercase, values are trimmed and runs of whitespace are collapsed
/// to a single space. Headers are emitted sorted by name, one `name:value`
/// per line, without a trailing newline.
#[must_use]
pub fn build_canonical_headers(headers: &[(String, String)], signed_headers: &[String]) -> String {
    let mut sorted: Vec<&str> = signed_headers.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    sorted
        .iter()
        .filter_map(|name| {
            headers
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, value)| format!("{name}:{}", collapse_whitespace(value.trim())))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the signed headers string as a semicolon-separated list of lowercase
/// header names, sorted lexicographically.
///
/// # Examples
///
/// ```
/// use bucketfs_auth::canonical::build_signed_headers_string;
///
/// let names = ["x-amz-date".to_owned(), "host".to_owned()];
/// assert_eq!(build_signed_headers_string(&names), "host;x-amz-date");
/// ```
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[String]) -> String {
    let mut sorted: Vec<&str> = signed_headers.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(";")
}

/// Compute the SHA-256 hash of the given payload as lowercase hex.
///
/// This is the value of the `x-amz-content-sha256` header and the final line
/// of the canonical request.
///
/// # Examples
///
/// ```
/// use bucketfs_auth::canonical::sha256_hex;
///
/// // SHA-256 of the empty payload
/// assert_eq!(
///     sha256_hex(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn sha256_hex(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Collapse consecutive whitespace characters in a string to a single space.
fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_should_build_canonical_uri_for_simple_path() {
        assert_eq!(build_canonical_uri("/test.txt"), "/test.txt");
    }

    #[test]
    fn test_should_normalize_empty_path_to_slash() {
        assert_eq!(build_canonical_uri(""), "/");
        assert_eq!(build_canonical_uri("/"), "/");
    }

    #[test]
    fn test_should_encode_special_characters_in_path() {
        assert_eq!(build_canonical_uri("/hello world"), "/hello%20world");
    }

    #[test]
    fn test_should_not_double_encode_uri_path() {
        assert_eq!(build_canonical_uri("/hello%20world"), "/hello%20world");
        assert_eq!(
            build_canonical_uri("/hello world"),
            build_canonical_uri("/hello%20world")
        );
    }

    #[test]
    fn test_should_sort_query_parameters() {
        assert_eq!(build_canonical_query_string("b=2&a=1&c=3"), "a=1&b=2&c=3");
    }

    #[test]
    fn test_should_return_empty_for_empty_query() {
        assert_eq!(build_canonical_query_string(""), "");
    }

    #[test]
    fn test_should_preserve_percent_encoded_query_values() {
        assert_eq!(
            build_canonical_query_string("key=hello%20world"),
            "key=hello%20world"
        );
        assert_eq!(
            build_canonical_query_string("prefix=a%2Fb&list-type=2"),
            "list-type=2&prefix=a%2Fb"
        );
    }

    #[test]
    fn test_should_sort_duplicate_query_keys_by_value() {
        assert_eq!(
            build_canonical_query_string("k=b&k=a&p=1"),
            "k=a&k=b&p=1"
        );
    }

    #[test]
    fn test_should_build_canonical_headers_sorted() {
        let headers = owned(&[
            ("host", "examplebucket.s3.amazonaws.com"),
            ("range", "bytes=0-9"),
            (
                "x-amz-content-sha256",
                "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            ),
            ("x-amz-date", "20130524T000000Z"),
        ]);
        let signed = names(&["host", "range", "x-amz-content-sha256", "x-amz-date"]);
        let result = build_canonical_headers(&headers, &signed);
        let expected = "host:examplebucket.s3.amazonaws.com\n\
                        range:bytes=0-9\n\
                        x-amz-content-sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855\n\
                        x-amz-date:20130524T000000Z";
        assert_eq!(result, expected);
    }

    #[test]
    fn test_should_collapse_whitespace_in_header_values() {
        let headers = owned(&[("host", "  example.com  "), ("x-custom", "a   b   c")]);
        let signed = names(&["host", "x-custom"]);
        let result = build_canonical_headers(&headers, &signed);
        assert_eq!(result, "host:example.com\nx-custom:a b c");
    }

    #[test]
    fn test_should_build_signed_headers_string_sorted() {
        let signed = names(&["x-amz-date", "host", "range"]);
        assert_eq!(build_signed_headers_string(&signed), "host;range;x-amz-date");
    }

    #[test]
    fn test_should_build_canonical_request_matching_aws_example() {
        // AWS test vector: GET /test.txt from examplebucket
        let headers = owned(&[
            ("host", "examplebucket.s3.amazonaws.com"),
            ("range", "bytes=0-9"),
            (
                "x-amz-content-sha256",
                "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            ),
            ("x-amz-date", "20130524T000000Z"),
        ]);
        let signed = names(&["host", "range", "x-amz-content-sha256", "x-amz-date"]);

        let canonical = build_canonical_request(
            "GET",
            "/test.txt",
            "",
            &headers,
            &signed,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        );

        let expected = "GET\n\
                        /test.txt\n\
                        \n\
                        host:examplebucket.s3.amazonaws.com\n\
                        range:bytes=0-9\n\
                        x-amz-content-sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855\n\
                        x-amz-date:20130524T000000Z\n\
                        \n\
                        host;range;x-amz-content-sha256;x-amz-date\n\
                        e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert_eq!(canonical, expected);

        // The hash of the canonical request matches the published AWS vector.
        assert_eq!(
            sha256_hex(canonical.as_bytes()),
            "7344ae5b7ee6c3e7e6b0fe0640412a37625d1fbfff95c48bbb2dc43964946972"
        );
    }

    #[test]
    fn test_should_hash_empty_payload() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_should_hash_nonempty_payload() {
        let hash = sha256_hex(b"Hello, World!");
        assert_eq!(hash.len(), 64);
        assert_ne!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
