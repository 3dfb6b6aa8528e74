//! Multipart upload lifecycle tests against the mock server.

mod common;

use bucketfs::{MIN_PART_SIZE, Reader, Transport};
use bytes::Bytes;
use common::{mock_bucket, ramp, signing_key};

fn part_of(fill: u8) -> Bytes {
    Bytes::from(vec![fill; usize::try_from(MIN_PART_SIZE).unwrap()])
}

#[tokio::test]
async fn test_should_assemble_parts_in_number_order() {
    let (server, bucket) = mock_bucket().await;
    let upload = bucket.uploader("ordered.bin").unwrap().start().await.unwrap();

    // Upload out of order; the manifest must still be ascending.
    upload.upload(3, part_of(b'3')).await.unwrap();
    upload.upload(1, part_of(b'1')).await.unwrap();
    upload.upload(2, part_of(b'2')).await.unwrap();
    assert_eq!(upload.completed_parts(), 3);

    let done = upload.complete(Bytes::new()).await.unwrap();
    assert_eq!(done.size, 3 * MIN_PART_SIZE);

    let object = server.object("ordered.bin").unwrap();
    let min = usize::try_from(MIN_PART_SIZE).unwrap();
    assert_eq!(object.len(), 3 * min);
    assert!(object[..min].iter().all(|&b| b == b'1'));
    assert!(object[min..2 * min].iter().all(|&b| b == b'2'));
    assert!(object[2 * min..].iter().all(|&b| b == b'3'));
}

#[tokio::test]
async fn test_should_reject_undersized_parts() {
    let (_server, bucket) = mock_bucket().await;
    let upload = bucket.uploader("small.bin").unwrap().start().await.unwrap();

    let err = upload.upload(1, Bytes::from_static(b"tiny")).await.unwrap_err();
    assert!(matches!(err, bucketfs::Error::PartTooSmall { .. }));
    upload.abort().await.unwrap();
}

#[tokio::test]
async fn test_should_write_from_source_with_one_initiate() {
    let (server, bucket) = mock_bucket().await;
    let content = ramp(usize::try_from(2 * MIN_PART_SIZE).unwrap() + 1000);
    let source = Bytes::from(content.clone());

    bucket
        .write_from("threshold.bin", &source, i64::try_from(content.len()).unwrap())
        .await
        .unwrap();

    assert_eq!(server.count_requests("POST", "uploads="), 1);
    assert!(server.count_requests("PUT", "partNumber=") >= 3);
    assert_eq!(server.count_requests("POST", "uploadId="), 1);
    assert_eq!(server.object("threshold.bin").unwrap(), source);
}

#[tokio::test]
async fn test_should_round_trip_large_uploads() {
    let (server, bucket) = mock_bucket().await;
    let len = usize::try_from(2 * MIN_PART_SIZE).unwrap() + 123_456;
    let content = ramp(len);
    let source = Bytes::from(content.clone());

    let upload = bucket.uploader("large.bin").unwrap().start().await.unwrap();
    let done = upload
        .upload_from(&source, i64::try_from(len).unwrap())
        .await
        .unwrap();
    assert_eq!(done.size, i64::try_from(len).unwrap());
    // Two full parts plus the tail.
    assert!(done.etag.ends_with("-3\""));

    assert_eq!(server.object("large.bin").unwrap(), source);
}

#[tokio::test]
async fn test_should_copy_ranges_server_side() {
    let (server, bucket) = mock_bucket().await;
    let source_len = usize::try_from(MIN_PART_SIZE).unwrap() + 4096;
    let content = ramp(source_len);
    server.put_object("source-object", &content);

    let source = bucket.stat("source-object").await.unwrap();
    let mut upload = bucket.uploader("copied.bin").unwrap().start().await.unwrap();
    upload.copy_from(1, &source, 0, MIN_PART_SIZE).unwrap();
    let tail = Bytes::copy_from_slice(&content[usize::try_from(MIN_PART_SIZE).unwrap()..]);
    let done = upload.complete(tail).await.unwrap();
    assert_eq!(done.size, i64::try_from(source_len).unwrap());

    let object = server.object("copied.bin").unwrap();
    let min = usize::try_from(MIN_PART_SIZE).unwrap();
    assert_eq!(&object[..min], &content[..min]);
    assert_eq!(&object[min..], &content[min..]);
}

#[tokio::test]
async fn test_should_copy_whole_objects_server_side() {
    let (server, bucket) = mock_bucket().await;
    let content = ramp(usize::try_from(MIN_PART_SIZE).unwrap());
    server.put_object("whole-source", &content);

    let source = bucket.stat("whole-source").await.unwrap();
    let mut upload = bucket.uploader("whole-copy").unwrap().start().await.unwrap();
    // (0, 0) copies the entire source object.
    upload.copy_from(1, &source, 0, 0).unwrap();
    upload.complete(Bytes::new()).await.unwrap();

    assert_eq!(server.object("whole-copy").unwrap(), Bytes::from(content));
}

#[tokio::test]
async fn test_should_surface_copy_errors_from_complete() {
    let (server, bucket) = mock_bucket().await;
    server.put_object("volatile", &ramp(usize::try_from(MIN_PART_SIZE).unwrap()));

    let key = signing_key(&server);
    // A stale ETag: the copy's if-match precondition must fail.
    let stale = Reader::new(
        key,
        Transport::default(),
        common::BUCKET,
        "volatile",
        "\"stale-etag\"",
        MIN_PART_SIZE,
    );
    let mut upload = bucket.uploader("never.bin").unwrap().start().await.unwrap();
    upload.copy_from(1, &stale, 0, 0).unwrap();
    let err = upload.complete(Bytes::new()).await.unwrap_err();
    assert!(err.is_etag_changed(), "got {err}");
}

#[tokio::test]
async fn test_should_reject_copy_ranges_beyond_source() {
    let (server, bucket) = mock_bucket().await;
    server.put_object("short-source", &ramp(1024));

    let source = bucket.stat("short-source").await.unwrap();
    let mut upload = bucket.uploader("oops.bin").unwrap().start().await.unwrap();
    let err = upload.copy_from(1, &source, 0, 4096).unwrap_err();
    assert!(err.is_invalid(), "got {err}");
    let err = upload.copy_from(1, &source, 0, 512).unwrap_err();
    assert!(matches!(err, bucketfs::Error::PartTooSmall { .. }), "got {err}");
    upload.abort().await.unwrap();
}

#[tokio::test]
async fn test_should_discard_parts_on_abort() {
    let (server, bucket) = mock_bucket().await;
    let upload = bucket.uploader("aborted.bin").unwrap().start().await.unwrap();
    upload.upload(1, part_of(b'x')).await.unwrap();
    assert_eq!(server.pending_uploads(), 1);

    upload.abort().await.unwrap();
    assert_eq!(server.pending_uploads(), 0);
    assert!(server.object("aborted.bin").is_none());

    // Starting over builds a fresh upload with empty part state.
    let retry = bucket.uploader("aborted.bin").unwrap().start().await.unwrap();
    assert_eq!(retry.completed_parts(), 0);
    retry.upload(1, part_of(b'y')).await.unwrap();
    retry.complete(Bytes::new()).await.unwrap();
    let object = server.object("aborted.bin").unwrap();
    assert!(object.iter().all(|&b| b == b'y'));
}

#[tokio::test]
async fn test_should_dispense_unique_part_numbers() {
    let (_server, bucket) = mock_bucket().await;
    let upload = bucket.uploader("dispensed.bin").unwrap().start().await.unwrap();
    assert_eq!(upload.next_part(), 1);
    assert_eq!(upload.next_part(), 2);
    assert_eq!(upload.next_part(), 3);
    upload.abort().await.unwrap();
}

#[tokio::test]
async fn test_should_upload_tail_as_highest_part() {
    let (server, bucket) = mock_bucket().await;
    let upload = bucket.uploader("tailed.bin").unwrap().start().await.unwrap();
    upload.upload(1, part_of(b'a')).await.unwrap();
    upload.upload(2, part_of(b'b')).await.unwrap();

    let done = upload.complete(Bytes::from_static(b"the-tail")).await.unwrap();
    assert_eq!(done.size, 2 * MIN_PART_SIZE + 8);

    let object = server.object("tailed.bin").unwrap();
    assert!(object.ends_with(b"the-tail"));
}

#[tokio::test]
async fn test_should_expose_upload_id_after_start() {
    let (_server, bucket) = mock_bucket().await;
    let upload = bucket.uploader("identity.bin").unwrap().start().await.unwrap();
    assert!(!upload.upload_id().is_empty());
    upload.abort().await.unwrap();
}
