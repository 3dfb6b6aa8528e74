//! The bucket façade: one bucket bound to a signing key, exposed as a
//! read/write filesystem.

use std::sync::Arc;

use async_trait::async_trait;
use bucketfs_auth::SigningKey;
use bytes::Bytes;
use http::HeaderMap;
use http::header::ETAG;
use reqwest::Method;
use tracing::debug;

use crate::error::Error;
use crate::file::ObjectFile;
use crate::http::Transport;
use crate::path::{clean, valid_path};
use crate::prefix::{DirEntry, Prefix};
use crate::reader::Reader;
use crate::uploader::{CompletedUpload, ReadAt, Uploader};
use crate::url::{object_target, valid_bucket};
use crate::walk::{EntryMeta, GlobFs, WalkEntry, WalkFlow};

/// A bucket bound to a signing key and transport.
///
/// All paths taken by the public methods are lexically cleaned and then
/// validated; `"."` names the bucket root.
#[derive(Debug, Clone)]
pub struct Bucket {
    key: Arc<SigningKey>,
    http: Transport,
    bucket: String,
    delay_get: bool,
}

/// What [`Bucket::open`] found: an object or a pseudo-directory.
#[derive(Debug)]
pub enum Entry {
    /// An object, opened as a seekable file.
    File(ObjectFile),
    /// A common prefix with at least one object beneath it.
    Dir(Prefix),
}

impl Bucket {
    /// Bind `bucket` to a signing key, using the shared default transport.
    #[must_use]
    pub fn new(key: Arc<SigningKey>, bucket: impl Into<String>) -> Self {
        Self {
            key,
            http: Transport::default(),
            bucket: bucket.into(),
            delay_get: false,
        }
    }

    /// Use a specific transport instead of the shared default.
    #[must_use]
    pub fn with_transport(mut self, http: Transport) -> Self {
        self.http = http;
        self
    }

    /// Make [`Bucket::open`] issue a HEAD instead of an eager GET; the
    /// first `read` then performs the GET.
    #[must_use]
    pub fn with_delayed_get(mut self, delay: bool) -> Self {
        self.delay_get = delay;
        self
    }

    /// The bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.bucket
    }

    /// The bucket root as a [`Prefix`].
    #[must_use]
    pub fn root(&self) -> Prefix {
        Prefix::new(self.key.clone(), self.http.clone(), self.bucket.clone(), ".")
    }

    /// Write `contents` as the object `path`, returning the new ETag.
    ///
    /// # Errors
    ///
    /// [`Error::Invalid`] for paths that do not name an object.
    pub async fn put(&self, path: &str, contents: Bytes) -> Result<String, Error> {
        let path = clean(path);
        if !valid_path(&path) || path == "." {
            return Err(Error::invalid("put", path));
        }
        if !valid_bucket(&self.bucket) {
            return Err(Error::InvalidBucket(self.bucket.clone()));
        }
        let target = object_target(&self.key, &self.bucket, &path, "");
        let mut headers = HeaderMap::new();
        self.key.sign_request(
            "PUT",
            &target.path,
            &target.query,
            &target.host,
            &mut headers,
            &contents,
        )?;
        let size = contents.len();
        let req = self
            .http
            .request(Method::PUT, &target.url())
            .headers(headers)
            .body(contents)
            .build()?;
        let res = self.http.send_retry(req).await?;
        if !res.status().is_success() {
            return Err(Error::from_response("PUT", &self.bucket, &path, res).await);
        }
        let etag = res
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        debug!(bucket = %self.bucket, %path, size, %etag, "object written");
        Ok(etag)
    }

    /// Open `name` as an object or, failing that, as a pseudo-directory.
    ///
    /// A trailing `/` forces the directory interpretation. Object opens are
    /// eager GETs unless [`Bucket::with_delayed_get`] was set.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when neither an object nor any key under
    /// `{name}/` exists.
    pub async fn open(&self, name: &str) -> Result<Entry, Error> {
        let is_dir = name.ends_with('/');
        let name = clean(name);
        if !valid_path(&name) {
            return Err(Error::invalid("open", name));
        }
        if name == "." {
            return Ok(Entry::Dir(self.root()));
        }
        if !is_dir {
            // A HEAD/GET is cheaper and faster than a listing; fall back to
            // the listing only when no such object exists.
            match ObjectFile::open(
                self.key.clone(),
                self.http.clone(),
                &self.bucket,
                &name,
                !self.delay_get,
            )
            .await
            {
                Ok(file) => return Ok(Entry::File(file)),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(Entry::Dir(self.sub_prefix(&name).open_dir().await?))
    }

    /// Open a byte range of the object `name`, conditional on `etag` when
    /// non-empty.
    ///
    /// `width <= 0` reads to the end of the object.
    ///
    /// # Errors
    ///
    /// [`Error::EtagChanged`] when `etag` no longer matches.
    pub async fn open_range(
        &self,
        name: &str,
        etag: &str,
        start: i64,
        width: i64,
    ) -> Result<crate::stream::ByteStream, Error> {
        let name = clean(name);
        if !valid_path(&name) || name == "." {
            return Err(Error::invalid("open_range", name));
        }
        let reader = Reader::new(
            self.key.clone(),
            self.http.clone(),
            self.bucket.clone(),
            name,
            etag,
            0,
        );
        reader.range_reader(start, width).await
    }

    /// HEAD the object `name` and return its metadata handle.
    pub async fn stat(&self, name: &str) -> Result<Reader, Error> {
        let name = clean(name);
        if !valid_path(&name) || name == "." {
            return Err(Error::invalid("stat", name));
        }
        Reader::stat(self.key.clone(), self.http.clone(), &self.bucket, &name).await
    }

    /// Delete the object at `path`.
    ///
    /// # Errors
    ///
    /// Anything but the expected `204 No Content` is an error.
    pub async fn remove(&self, path: &str) -> Result<(), Error> {
        let path = clean(path);
        if !valid_path(&path) || path == "." {
            return Err(Error::invalid("remove", path));
        }
        let target = object_target(&self.key, &self.bucket, &path, "");
        let mut headers = HeaderMap::new();
        self.key.sign_request(
            "DELETE",
            &target.path,
            &target.query,
            &target.host,
            &mut headers,
            b"",
        )?;
        let req = self
            .http
            .request(Method::DELETE, &target.url())
            .headers(headers)
            .build()?;
        let res = self.http.send_retry(req).await?;
        if res.status().as_u16() != 204 {
            return Err(Error::from_response("DELETE", &self.bucket, &path, res).await);
        }
        debug!(bucket = %self.bucket, %path, "object removed");
        Ok(())
    }

    /// Read the full entry list of the directory `name` (`"."` for the
    /// root), sorted by name.
    ///
    /// # Errors
    ///
    /// An empty result for a non-root directory is double-checked with an
    /// existence probe so a missing directory reports [`Error::NotFound`]
    /// instead of appearing empty.
    pub async fn read_dir(&self, name: &str) -> Result<Vec<DirEntry>, Error> {
        let name = clean(name);
        if !valid_path(&name) {
            return Err(Error::invalid("read_dir", name));
        }
        if name == "." {
            return self.root().read_dir(-1).await;
        }
        let mut prefix = self.sub_prefix(&format!("{name}/"));
        let entries = prefix.read_dir(-1).await?;
        if entries.is_empty() {
            // Almost always because the directory does not exist.
            self.sub_prefix(&format!("{name}/")).open_dir().await?;
        }
        Ok(entries)
    }

    /// A [`Prefix`] rooted at the directory `dir` (`"."` for this bucket's
    /// root).
    ///
    /// # Errors
    ///
    /// [`Error::Invalid`] for malformed paths; existence is not checked.
    pub fn sub(&self, dir: &str) -> Result<Prefix, Error> {
        let dir = clean(dir);
        if !valid_path(&dir) {
            return Err(Error::invalid("sub", dir));
        }
        if dir == "." {
            return Ok(self.root());
        }
        Ok(self.sub_prefix(&format!("{dir}/")))
    }

    /// Visit the entries of the directory `name` in order, strictly after
    /// `seek`, filtered by `pattern`. See [`Prefix::visit_dir`].
    pub async fn visit_dir(
        &self,
        name: &str,
        seek: &str,
        pattern: &str,
        visit: &mut (dyn FnMut(DirEntry) -> Result<WalkFlow, Error> + Send),
    ) -> Result<(), Error> {
        let name = clean(name);
        if !valid_path(&name) {
            return Err(Error::invalid("visit_dir", name));
        }
        self.root().visit_dir(&name, seek, pattern, visit).await
    }

    /// A multipart [`Uploader`] for the object `name`.
    ///
    /// # Errors
    ///
    /// [`Error::Invalid`] for paths that do not name an object.
    pub fn uploader(&self, name: &str) -> Result<Uploader, Error> {
        let name = clean(name);
        if !valid_path(&name) || name == "." {
            return Err(Error::invalid("upload", name));
        }
        Ok(Uploader::new(
            self.key.clone(),
            self.http.clone(),
            self.bucket.clone(),
            name,
        ))
    }

    /// Upload `size` bytes from a random-access source as the object
    /// `name` through a parallel multipart upload.
    pub async fn write_from<R>(&self, name: &str, source: &R, size: i64) -> Result<String, Error>
    where
        R: ReadAt + ?Sized,
    {
        let upload = self.uploader(name)?.start().await?;
        let done: CompletedUpload = upload.upload_from(source, size).await?;
        Ok(done.etag)
    }

    /// Resolve the region this bucket lives in. See
    /// [`crate::reader::bucket_region`].
    pub async fn region(&self) -> Result<String, Error> {
        crate::reader::bucket_region(&self.key, &self.http, &self.bucket).await
    }

    /// A presigned GET URL for `name`, valid `expires_secs` seconds.
    pub fn presigned_get(&self, name: &str, expires_secs: u64) -> Result<String, Error> {
        let name = clean(name);
        if !valid_path(&name) || name == "." {
            return Err(Error::invalid("presign", name));
        }
        crate::reader::presigned_url(&self.key, &self.bucket, &name, expires_secs)
    }

    fn sub_prefix(&self, path: &str) -> Prefix {
        Prefix::new(
            self.key.clone(),
            self.http.clone(),
            self.bucket.clone(),
            path,
        )
    }
}

#[async_trait]
impl GlobFs for Bucket {
    type File = ObjectFile;

    async fn open_entry(&self, path: &str) -> Result<WalkEntry<ObjectFile>, Error> {
        match self.open(path).await? {
            Entry::File(file) => Ok(WalkEntry::File(file)),
            Entry::Dir(_) => Ok(WalkEntry::Dir),
        }
    }

    async fn list_dir(
        &self,
        dir: &str,
        seek: &str,
        pattern: &str,
    ) -> Result<Vec<EntryMeta>, Error> {
        let mut out = Vec::new();
        self.visit_dir(dir, seek, pattern, &mut |entry: DirEntry| {
            out.push(EntryMeta {
                name: entry.name().to_owned(),
                is_dir: entry.is_dir(),
            });
            Ok(WalkFlow::Continue)
        })
        .await?;
        Ok(out)
    }
}
