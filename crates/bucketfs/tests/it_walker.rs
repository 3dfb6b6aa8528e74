//! Walker and directory-visit tests against the mock server.

mod common;

use bucketfs::{DirEntry, WalkFlow, open_glob, walk_glob};
use common::mock_bucket;

#[tokio::test]
async fn test_should_walk_globs_over_real_listings() {
    let (server, bucket) = mock_bucket().await;
    for key in ["a/b/c", "x/b/c", "x/y/a", "x/y/z"] {
        server.put_object(key, b"walked");
    }

    let cases = [
        ("", "x/?/?", vec!["x/b/c", "x/y/a", "x/y/z"]),
        ("x/b/z", "x/?/?", vec!["x/y/a", "x/y/z"]),
        ("x/y", "?/?/?", vec!["x/y/a", "x/y/z"]),
        ("x/y/a", "?/?/?", vec!["x/y/z"]),
        ("x/c", "?/?/?", vec!["x/y/a", "x/y/z"]),
        ("", "*/b/*", vec!["a/b/c", "x/b/c"]),
    ];
    for (seek, pattern, want) in cases {
        let mut got = Vec::new();
        walk_glob(&bucket, seek, pattern, |path: &str, _file| {
            got.push(path.to_owned());
            Ok(WalkFlow::Continue)
        })
        .await
        .unwrap();
        assert_eq!(got, want, "walk({seek:?}, {pattern:?})");
    }
}

#[tokio::test]
async fn test_should_strip_echoed_seek_key_from_listings() {
    let (server, bucket) = mock_bucket().await;
    server.put_object("d/a", b"1");
    server.put_object("d/b", b"2");
    server.put_object("d/c", b"3");

    // The mock's start-after includes the named key itself; the visit must
    // surface only strictly-greater entries.
    let mut seen = Vec::new();
    bucket
        .visit_dir("d", "a", "", &mut |entry: DirEntry| {
            seen.push(entry.name().to_owned());
            Ok(WalkFlow::Continue)
        })
        .await
        .unwrap();
    assert_eq!(seen, vec!["b", "c"]);
}

#[tokio::test]
async fn test_should_filter_visits_by_pattern() {
    let (server, bucket) = mock_bucket().await;
    server.put_object("logs/app.log", b"l");
    server.put_object("logs/app.txt", b"t");
    server.put_object("logs/other.txt", b"t");

    let mut seen = Vec::new();
    bucket
        .visit_dir("logs", "", "*.txt", &mut |entry: DirEntry| {
            seen.push(entry.name().to_owned());
            Ok(WalkFlow::Continue)
        })
        .await
        .unwrap();
    assert_eq!(seen, vec!["app.txt", "other.txt"]);
}

#[tokio::test]
async fn test_should_open_anchored_literal_without_listing() {
    let (server, bucket) = mock_bucket().await;
    server.put_object("a/b/c", b"anchored");
    server.put_object("a/b/d", b"other");
    server.clear_requests();

    let mut opened = Vec::new();
    walk_glob(&bucket, "", "a/b/c", |path: &str, _file| {
        opened.push(path.to_owned());
        Ok(WalkFlow::Continue)
    })
    .await
    .unwrap();

    assert_eq!(opened, vec!["a/b/c"]);
    // No listings, exactly one object fetch.
    assert_eq!(server.count_requests("GET", "list-type"), 0);
    assert_eq!(server.count_requests("GET", ""), 1);
}

#[tokio::test]
async fn test_should_prune_subtrees_before_seek() {
    let (server, bucket) = mock_bucket().await;
    for key in ["aa/one", "bb/two", "cc/three"] {
        server.put_object(key, b"x");
    }
    server.clear_requests();

    let mut got = Vec::new();
    walk_glob(&bucket, "bb/two", "*/*", |path: &str, _file| {
        got.push(path.to_owned());
        Ok(WalkFlow::Continue)
    })
    .await
    .unwrap();
    assert_eq!(got, vec!["cc/three"]);

    // aa/ sorts wholly before the seek key and must never be listed; bb/
    // still has to be checked for keys after the seek. One root listing
    // plus bb/ and cc/.
    assert_eq!(server.count_requests("GET", "list-type"), 3);
    assert!(!server.requests().iter().any(|r| r.query.contains("prefix=aa")));
}

#[tokio::test]
async fn test_should_collect_matches_with_open_glob() {
    let (server, bucket) = mock_bucket().await;
    server.put_object("a/b/c", b"first");
    server.put_object("x/b/z", b"second");
    server.put_object("x/q/n", b"no-match");

    let found = open_glob(&bucket, "[ax]/b/[cz]").await.unwrap();
    let paths: Vec<&str> = found.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(paths, vec!["a/b/c", "x/b/z"]);
}

#[tokio::test]
async fn test_should_stop_bucket_walk_on_skip_all() {
    let (server, bucket) = mock_bucket().await;
    for key in ["w/a", "w/b", "w/c", "w/d"] {
        server.put_object(key, b"x");
    }

    let mut got = Vec::new();
    walk_glob(&bucket, "", "w/*", |path: &str, _file| {
        got.push(path.to_owned());
        Ok(if got.len() == 2 {
            WalkFlow::SkipAll
        } else {
            WalkFlow::Continue
        })
    })
    .await
    .unwrap();
    assert_eq!(got, vec!["w/a", "w/b"]);
}

#[tokio::test]
async fn test_should_hand_readable_files_to_the_callback() {
    let (server, bucket) = mock_bucket().await;
    server.put_object("docs/readme", b"hello walker");

    let mut bodies = Vec::new();
    walk_glob(&bucket, "", "docs/*", |_path: &str, file| {
        bodies.push(file);
        Ok(WalkFlow::Continue)
    })
    .await
    .unwrap();

    assert_eq!(bodies.len(), 1);
    let contents = bodies[0].read_to_end().await.unwrap();
    assert_eq!(contents, b"hello walker");
}
