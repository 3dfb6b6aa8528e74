//! Prefix-as-directory listings over ListObjectsV2.

use std::sync::Arc;

use bucketfs_auth::SigningKey;
use bucketfs_model::{ListPage, from_xml};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::bucket::Entry;
use crate::error::Error;
use crate::file::ObjectFile;
use crate::http::Transport;
use crate::path::{clean, match_name, split_meta, valid_path};
use crate::reader::{Reader, signed_bucket_request};
use crate::url::{query_escape, valid_bucket};
use crate::walk::WalkFlow;

/// A pseudo-directory: a bucket plus a path that is either `"."` (the
/// bucket root) or ends in `/`.
///
/// A `Prefix` doubles as a stateful directory handle: successive
/// [`Prefix::read_dir`] calls page through the listing using the
/// continuation token kept between calls. That state is per-handle;
/// two tasks must not share one `Prefix` for `read_dir`.
#[derive(Debug, Clone)]
pub struct Prefix {
    pub(crate) key: Arc<SigningKey>,
    pub(crate) http: Transport,
    pub(crate) bucket: String,
    pub(crate) path: String,
    /// Continuation token between `read_dir` calls; `None` = start over.
    token: Option<String>,
    /// Set once the listing is exhausted; further `read_dir` returns empty.
    dir_eof: bool,
}

/// One listing entry: an object (with its metadata) or a common prefix.
#[derive(Debug, Clone)]
pub enum DirEntry {
    /// An object directly under the listed prefix.
    File(Reader),
    /// A delimiter-grouped pseudo-directory.
    Dir(Prefix),
}

impl DirEntry {
    /// The entry's base name (final path segment, no trailing slash).
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File(reader) => reader.name(),
            Self::Dir(prefix) => base_name(&prefix.path),
        }
    }

    /// The full path of the entry within the bucket.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::File(reader) => reader.path(),
            Self::Dir(prefix) => &prefix.path,
        }
    }

    /// Whether this entry is a pseudo-directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Dir(_))
    }

    /// Object size; zero for directories.
    #[must_use]
    pub fn size(&self) -> i64 {
        match self {
            Self::File(reader) => reader.size,
            Self::Dir(_) => 0,
        }
    }

    /// Last modification time; directories have none.
    #[must_use]
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::File(reader) => reader.last_modified,
            Self::Dir(_) => None,
        }
    }
}

/// One page of directory entries plus the cursor for the next.
pub(crate) struct DirPage {
    pub entries: Vec<DirEntry>,
    /// `None` once the directory is exhausted.
    pub next: Option<String>,
}

impl Prefix {
    /// Create a prefix handle. `path` must be `"."` or end with `/`.
    #[must_use]
    pub fn new(
        key: Arc<SigningKey>,
        http: Transport,
        bucket: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            key,
            http,
            bucket: bucket.into(),
            path: path.into(),
            token: None,
            dir_eof: false,
        }
    }

    /// The prefix path (`"."` for the bucket root).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The bucket this prefix lives in.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The prefix's base name.
    #[must_use]
    pub fn name(&self) -> &str {
        base_name(&self.path)
    }

    /// Join a path fragment onto this prefix.
    pub(crate) fn join(&self, extra: &str) -> String {
        if self.path == "." {
            return extra.to_owned();
        }
        crate::path::join(&self.path, extra)
    }

    /// A child prefix with fresh listing state.
    pub(crate) fn sub(&self, name: &str) -> Self {
        Self::new(
            self.key.clone(),
            self.http.clone(),
            self.bucket.clone(),
            self.join(name),
        )
    }

    /// Open the object or pseudo-directory at `file`, relative to this
    /// prefix.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when neither an object nor any key under
    /// `{file}/` exists.
    pub async fn open(&self, file: &str) -> Result<Entry, Error> {
        let file = clean(file);
        if file == "." {
            return Ok(Entry::Dir(self.clone()));
        }
        if !valid_path(&file) {
            return Err(Error::invalid("open", file));
        }
        let full = self.join(&file);
        match ObjectFile::open(
            self.key.clone(),
            self.http.clone(),
            &self.bucket,
            &full,
            true,
        )
        .await
        {
            Ok(f) => Ok(Entry::File(f)),
            Err(err) if err.is_not_found() => Ok(Entry::Dir(self.sub(&file).open_dir().await?)),
            Err(err) => Err(err),
        }
    }

    /// Probe that this prefix exists (at least one key beneath it) and
    /// return it with a directory-shaped (`/`-terminated) path.
    pub(crate) async fn open_dir(&self) -> Result<Self, Error> {
        if self.path.is_empty() || self.path == "." {
            // The root directory trivially exists.
            return Ok(self.clone());
        }
        let page = self.list(1, None, "", "").await?;
        if page.contents.is_empty() && page.common_prefixes.is_empty() {
            return Err(Error::NotFound {
                bucket: self.bucket.clone(),
                path: self.path.clone(),
            });
        }
        let path = if self.path.ends_with('/') {
            self.path.clone()
        } else {
            format!("{}/", self.path)
        };
        Ok(Self::new(
            self.key.clone(),
            self.http.clone(),
            self.bucket.clone(),
            path,
        ))
    }

    /// Read directory entries.
    ///
    /// `n > 0` returns at most `n` entries per call, remembering the
    /// continuation token for the next call; `n < 0` drains the whole
    /// directory. An empty result means the directory is exhausted.
    pub async fn read_dir(&mut self, n: i64) -> Result<Vec<DirEntry>, Error> {
        if self.dir_eof {
            return Ok(Vec::new());
        }
        if n < 0 {
            let mut all = Vec::new();
            loop {
                let page = self.read_dir_at(-1, self.token.as_deref(), "", "").await?;
                all.extend(page.entries);
                match page.next {
                    Some(token) => self.token = Some(token),
                    None => {
                        self.dir_eof = true;
                        return Ok(all);
                    }
                }
            }
        }
        let page = self.read_dir_at(n, self.token.as_deref(), "", "").await?;
        match page.next {
            Some(token) => self.token = Some(token),
            None => self.dir_eof = true,
        }
        Ok(page.entries)
    }

    /// Visit every entry of the directory `name` (relative to this prefix,
    /// `"."` for the prefix itself), in order, streaming across listing
    /// pages.
    ///
    /// `seek` names a point to resume after; only entries strictly greater
    /// are visited. Despite its name, the `start-after` listing parameter
    /// is observed to include the seek key itself on some servers, so the
    /// echoed key is stripped here. `pattern` filters entries by base name.
    pub async fn visit_dir(
        &self,
        name: &str,
        seek: &str,
        pattern: &str,
        visit: &mut (dyn FnMut(DirEntry) -> Result<WalkFlow, Error> + Send),
    ) -> Result<(), Error> {
        if !valid_bucket(&self.bucket) {
            return Err(Error::InvalidBucket(self.bucket.clone()));
        }
        let subp = if name == "." {
            self.clone()
        } else {
            let mut sub = self.sub(name);
            if !sub.path.ends_with('/') {
                sub.path.push('/');
            }
            sub
        };
        let mut token: Option<String> = None;
        loop {
            let page = subp.read_dir_at(-1, token.as_deref(), seek, pattern).await?;
            let mut entries = page.entries;
            if entries.first().is_some_and(|e| e.name() == seek) {
                entries.remove(0);
            }
            for entry in entries {
                match visit(entry)? {
                    WalkFlow::Continue => {}
                    WalkFlow::SkipDir | WalkFlow::SkipAll => return Ok(()),
                }
            }
            match page.next {
                Some(next) => token = Some(next),
                None => return Ok(()),
            }
        }
    }

    /// One paged read: list, filter, merge, sort.
    ///
    /// `pattern`'s literal lead-in (up to the first meta-character) is
    /// pushed down to the server as a listing prefix; the full pattern then
    /// filters base names client-side. Object keys that are empty, dot
    /// segments, or directory-shaped are dropped.
    pub(crate) async fn read_dir_at(
        &self,
        n: i64,
        token: Option<&str>,
        seek: &str,
        pattern: &str,
    ) -> Result<DirPage, Error> {
        let (listing_prefix, _) = split_meta(pattern);
        let page = self.list(n, token, seek, listing_prefix).await?;
        let mut entries = Vec::with_capacity(page.contents.len() + page.common_prefixes.len());
        for obj in page.contents {
            if ignore_key(&obj.key, false) {
                continue;
            }
            if !pat_match(pattern, base_name(&obj.key))? {
                continue;
            }
            let mut reader = Reader::new(
                self.key.clone(),
                self.http.clone(),
                self.bucket.clone(),
                obj.key,
                obj.etag,
                obj.size,
            );
            reader.last_modified = obj.last_modified;
            entries.push(DirEntry::File(reader));
        }
        for common in page.common_prefixes {
            if ignore_key(&common, true) {
                continue;
            }
            if !pat_match(pattern, base_name(&common))? {
                continue;
            }
            entries.push(DirEntry::Dir(Self::new(
                self.key.clone(),
                self.http.clone(),
                self.bucket.clone(),
                common,
            )));
        }
        entries.sort_by(|a, b| a.name().cmp(b.name()));

        let next = if page.is_truncated {
            match page.next_token {
                Some(token) => Some(token),
                None => {
                    return Err(Error::Protocol(
                        "truncated listing without a continuation token".to_owned(),
                    ));
                }
            }
        } else {
            None
        };
        Ok(DirPage { entries, next })
    }

    /// One raw ListObjectsV2 request.
    async fn list(
        &self,
        n: i64,
        token: Option<&str>,
        seek: &str,
        listing_prefix: &str,
    ) -> Result<ListPage, Error> {
        if !valid_bucket(&self.bucket) {
            return Err(Error::InvalidBucket(self.bucket.clone()));
        }
        let mut parts = vec!["delimiter=%2F".to_owned(), "list-type=2".to_owned()];

        // The effective key prefix: this directory plus the pattern's
        // literal lead-in.
        let mut prefix_path = self.path.clone();
        if prefix_path.is_empty() || prefix_path == "." {
            prefix_path = listing_prefix.to_owned();
        } else {
            if !prefix_path.ends_with('/') {
                prefix_path.push('/');
            }
            prefix_path.push_str(listing_prefix);
        }
        if !prefix_path.is_empty() {
            parts.push(format!("prefix={}", query_escape(&prefix_path)));
        }

        // A seek below the listing prefix is meaningless; AWS tolerates a
        // redundant start-after but MinIO rejects it.
        if !seek.is_empty() && (seek < listing_prefix || !seek.starts_with(listing_prefix)) {
            return Err(Error::invalid(
                "list",
                format!("seek {seek:?} not compatible with prefix {listing_prefix:?}"),
            ));
        }
        if !seek.is_empty() {
            parts.push(format!("start-after={}", query_escape(&self.join(seek))));
        }
        if n > 0 {
            parts.push(format!("max-keys={n}"));
        }
        if let Some(token) = token {
            parts.push(format!("continuation-token={}", query_escape(token)));
        }
        parts.sort_unstable();
        let query = parts.join("&");
        debug!(bucket = %self.bucket, prefix = %prefix_path, %query, "list objects");

        let req = signed_bucket_request(&self.key, &self.http, &self.bucket, &query)?;
        let res = self.http.send_retry(req).await?;
        match res.status().as_u16() {
            200 => {}
            403 => {
                return Err(Error::Permission {
                    bucket: self.bucket.clone(),
                    path: self.path.clone(),
                });
            }
            404 => {
                // Usually the bucket itself does not exist.
                return Err(Error::NotFound {
                    bucket: self.bucket.clone(),
                    path: self.path.clone(),
                });
            }
            _ => return Err(Error::from_response("LIST", &self.bucket, &self.path, res).await),
        }
        let body = res.bytes().await?;
        Ok(from_xml::<ListPage>(&body)?)
    }
}

/// Base name of a key; directory keys keep their name without the slash.
pub(crate) fn base_name(key: &str) -> &str {
    let trimmed = key.trim_end_matches('/');
    if trimmed.is_empty() {
        return ".";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Whether a listed key should be hidden from directory results.
fn ignore_key(key: &str, dir_ok: bool) -> bool {
    if key.is_empty() {
        return true;
    }
    if !dir_ok && key.ends_with('/') {
        return true;
    }
    let name = base_name(key);
    name == "." || name == ".."
}

/// Pattern filter with the empty pattern matching everything.
fn pat_match(pattern: &str, name: &str) -> Result<bool, Error> {
    if pattern.is_empty() {
        return Ok(true);
    }
    Ok(match_name(pattern, name)?)
}
