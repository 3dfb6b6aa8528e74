//! Glob-driven tree walking with listing pushdown.
//!
//! [`walk_glob`] visits every file matching a `/`-segmented glob pattern,
//! in path order, optionally resuming strictly after a `seek` path. It keeps
//! the observable operation count minimal:
//!
//! - the pattern's literal lead-in anchors the walk, so fully literal
//!   patterns perform a single open and no listings at all;
//! - each directory level lists once with that level's pattern segment and
//!   the applicable portion of the seek key pushed down;
//! - subtrees wholly before the seek key are pruned without listing them.

use std::cmp::Ordering;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::Error;
use crate::path::{path_cmp, split_meta, tree_cmp};

/// Flow control returned by walk and visit callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkFlow {
    /// Keep going.
    Continue,
    /// Stop visiting the current directory, continue with its siblings.
    SkipDir,
    /// Terminate the walk.
    SkipAll,
}

/// Name and kind of one directory entry, as seen by the walker.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    /// Base name within its directory.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// What an [`GlobFs::open_entry`] call found.
#[derive(Debug)]
pub enum WalkEntry<F> {
    /// A file, opened.
    File(F),
    /// A directory.
    Dir,
}

/// The filesystem surface the walker runs against.
///
/// Implemented by [`crate::Bucket`]; tests use in-memory fixtures that
/// record the operations performed.
#[async_trait]
pub trait GlobFs: Sync {
    /// The opened-file handle passed to walk callbacks.
    type File: Send;

    /// Open the entry at `path` (`"."` for the root).
    async fn open_entry(&self, path: &str) -> Result<WalkEntry<Self::File>, Error>;

    /// List the entries of `dir` whose base names match `pattern`
    /// (empty = all), strictly after the dir-relative `seek` (empty = from
    /// the start), in name order.
    async fn list_dir(
        &self,
        dir: &str,
        seek: &str,
        pattern: &str,
    ) -> Result<Vec<EntryMeta>, Error>;
}

/// Walk all files matching `pattern`, strictly after `seek`, in path order.
///
/// `pattern` is matched segment-for-segment: `a/*/c.txt` matches paths of
/// exactly three segments. The callback may return [`WalkFlow::SkipDir`] to
/// prune the directory of the current match or [`WalkFlow::SkipAll`] to end
/// the walk early; both end the walk successfully.
///
/// # Errors
///
/// Propagates listing/open failures and callback errors. A missing anchor
/// (the pattern's literal directory lead-in) is not an error; the walk just
/// matches nothing.
pub async fn walk_glob<F, C>(fs: &F, seek: &str, pattern: &str, mut f: C) -> Result<(), Error>
where
    F: GlobFs,
    C: FnMut(&str, F::File) -> Result<WalkFlow, Error> + Send,
{
    let pattern = if pattern.is_empty() { "*" } else { pattern };
    let (literal, meta) = split_meta(pattern);

    if meta.is_empty() {
        // A fully literal pattern needs no listings: one direct open.
        if !after_seek(pattern, seek) {
            return Ok(());
        }
        match fs.open_entry(pattern).await {
            Ok(WalkEntry::File(file)) => {
                f(pattern, file)?;
            }
            Ok(WalkEntry::Dir) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }
        return Ok(());
    }

    // Anchor at the literal directory lead-in of the pattern.
    let (dir, sub_pattern) = match literal.rfind('/') {
        Some(i) => (&pattern[..i], &pattern[i + 1..]),
        None => (".", pattern),
    };
    match fs.open_entry(dir).await {
        Ok(WalkEntry::Dir) => {}
        Ok(WalkEntry::File(_)) => return Ok(()),
        Err(err) if err.is_not_found() => return Ok(()),
        Err(err) => return Err(err),
    }
    descend(fs, dir.to_owned(), seek.to_owned(), sub_pattern.to_owned(), &mut f).await?;
    Ok(())
}

/// Collect every file matching `pattern` into a list.
///
/// # Errors
///
/// As for [`walk_glob`].
pub async fn open_glob<F: GlobFs>(fs: &F, pattern: &str) -> Result<Vec<(String, F::File)>, Error> {
    let mut out = Vec::new();
    walk_glob(fs, "", pattern, |path: &str, file| {
        out.push((path.to_owned(), file));
        Ok(WalkFlow::Continue)
    })
    .await?;
    Ok(out)
}

/// Recursive per-directory step. `pattern` holds the segments still to be
/// consumed below `dir`; `seek` stays absolute.
fn descend<'a, F: GlobFs>(
    fs: &'a F,
    dir: String,
    seek: String,
    pattern: String,
    emit: &'a mut (dyn FnMut(&str, F::File) -> Result<WalkFlow, Error> + Send),
) -> BoxFuture<'a, Result<WalkFlow, Error>> {
    Box::pin(async move {
        let (seg, rest) = match pattern.split_once('/') {
            Some((seg, rest)) => (seg, rest),
            None => (pattern.as_str(), ""),
        };
        let leaf = rest.is_empty();

        if split_meta(seg).1.is_empty() {
            // Literal segment: no listing needed at this level.
            let child = join(&dir, seg);
            if leaf {
                if !after_seek(&child, &seek) {
                    return Ok(WalkFlow::Continue);
                }
                return match fs.open_entry(&child).await {
                    Ok(WalkEntry::File(file)) => match emit(&child, file)? {
                        WalkFlow::SkipAll => Ok(WalkFlow::SkipAll),
                        _ => Ok(WalkFlow::Continue),
                    },
                    Ok(WalkEntry::Dir) => Ok(WalkFlow::Continue),
                    Err(err) if err.is_not_found() => Ok(WalkFlow::Continue),
                    Err(err) => Err(err),
                };
            }
            return match child_seek(&child, &seek) {
                None => Ok(WalkFlow::Continue),
                Some(sub_seek) => {
                    descend(fs, child, sub_seek, rest.to_owned(), &mut *emit).await
                }
            };
        }

        // Wildcard segment: list the directory once with this segment's
        // pattern and whatever part of the seek applies here.
        let Some(visit_seek) = visit_seek(&dir, &seek, seg, leaf) else {
            return Ok(WalkFlow::Continue);
        };
        let entries = fs.list_dir(&dir, &visit_seek, seg).await?;
        for entry in entries {
            let child = join(&dir, &entry.name);
            if leaf {
                if entry.is_dir || !after_seek(&child, &seek) {
                    continue;
                }
                match fs.open_entry(&child).await {
                    Ok(WalkEntry::File(file)) => match emit(&child, file)? {
                        WalkFlow::Continue => {}
                        WalkFlow::SkipDir => return Ok(WalkFlow::Continue),
                        WalkFlow::SkipAll => return Ok(WalkFlow::SkipAll),
                    },
                    // Deleted between listing and open.
                    Ok(WalkEntry::Dir) => {}
                    Err(err) if err.is_not_found() => {}
                    Err(err) => return Err(err),
                }
            } else {
                if !entry.is_dir {
                    continue;
                }
                match child_seek(&child, &seek) {
                    None => {}
                    Some(sub_seek) => {
                        if descend(fs, child, sub_seek, rest.to_owned(), &mut *emit).await?
                            == WalkFlow::SkipAll
                        {
                            return Ok(WalkFlow::SkipAll);
                        }
                    }
                }
            }
        }
        Ok(WalkFlow::Continue)
    })
}

/// Whether `p` sorts strictly after the seek key (or there is none).
fn after_seek(p: &str, seek: &str) -> bool {
    seek.is_empty() || path_cmp(p, seek) == Ordering::Greater
}

/// Seek to carry into the subtree at `child`: `None` prunes the subtree,
/// `Some("")` descends unconstrained, `Some(seek)` keeps filtering.
fn child_seek(child: &str, seek: &str) -> Option<String> {
    if seek.is_empty() {
        return Some(String::new());
    }
    match tree_cmp(child, seek) {
        // The whole subtree sorts before the seek key.
        Ordering::Less => None,
        Ordering::Greater => Some(String::new()),
        Ordering::Equal => Some(seek.to_owned()),
    }
}

/// The dir-relative seek to push into a listing of `dir` filtered by the
/// pattern segment `seg`. `None` skips the listing entirely.
fn visit_seek(dir: &str, seek: &str, seg: &str, leaf: bool) -> Option<String> {
    if seek.is_empty() {
        return Some(String::new());
    }
    match tree_cmp(dir, seek) {
        Ordering::Less => None,
        Ordering::Greater => Some(String::new()),
        Ordering::Equal => {
            let remainder = if seek == dir {
                ""
            } else if dir == "." {
                seek
            } else {
                &seek[dir.len() + 1..]
            };
            if remainder.is_empty() {
                return Some(String::new());
            }
            let (lp, _) = split_meta(seg);
            let first = remainder.split('/').next().unwrap_or(remainder);
            if !lp.is_empty() && !first.starts_with(lp) {
                // The listed range (keys under the literal pattern prefix)
                // lies wholly on one side of the seek key.
                return if first < lp {
                    Some(String::new())
                } else {
                    None
                };
            }
            // A bare entry-name seek at a non-leaf level must not reach the
            // listing: the named entry's own subtree can still hold matches
            // strictly after the seek key.
            if leaf || remainder.contains('/') {
                Some(remainder.to_owned())
            } else {
                Some(String::new())
            }
        }
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir == "." {
        name.to_owned()
    } else {
        format!("{dir}/{name}")
    }
}
