//! Slash-separated path utilities and glob matching.
//!
//! Object keys are treated as rooted, `/`-separated paths without a leading
//! slash. The literal `"."` names the bucket root. Comparison is
//! *segment-wise*: `"a"` sorts before `"a/b"` which sorts before `"b"`, which
//! is not what plain string comparison gives (`'/'` vs e.g. `'!'`).

use std::cmp::Ordering;

/// Lexically simplify a path: collapse `//` and `.` segments, resolve `..`
/// against preceding segments, and normalize the empty result to `"."`.
///
/// # Examples
///
/// ```
/// use bucketfs::path::clean;
///
/// assert_eq!(clean("a/b/../c"), "a/c");
/// assert_eq!(clean("./a//b/"), "a/b");
/// assert_eq!(clean(""), ".");
/// assert_eq!(clean("../a"), "../a");
/// ```
#[must_use]
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_owned();
    }
    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|s| *s != "..") {
                    out.pop();
                } else if !rooted {
                    out.push("..");
                }
            }
            _ => out.push(segment),
        }
    }
    let joined = out.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_owned(),
        (false, false) => joined,
    }
}

/// Whether `p` is a valid object path.
///
/// Valid paths are `"."` (the root) or non-empty `/`-separated sequences of
/// segments where no segment is empty, `"."`, or `".."`. In particular a
/// valid path never begins or ends with `/` and never contains `//`.
///
/// # Examples
///
/// ```
/// use bucketfs::path::valid_path;
///
/// assert!(valid_path("a/b/c.txt"));
/// assert!(valid_path("."));
/// assert!(!valid_path(""));
/// assert!(!valid_path("/a"));
/// assert!(!valid_path("a//b"));
/// assert!(!valid_path("a/../b"));
/// ```
#[must_use]
pub fn valid_path(p: &str) -> bool {
    if p == "." {
        return true;
    }
    if p.is_empty() {
        return false;
    }
    p.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

/// Join two path fragments and clean the result.
#[must_use]
pub fn join(base: &str, extra: &str) -> String {
    if base.is_empty() || base == "." {
        return clean(extra);
    }
    clean(&format!("{base}/{extra}"))
}

/// Split a glob pattern at its first meta-character (`*`, `?`, `[`, `\`).
///
/// The returned prefix is the longest literal lead-in; it is what can be
/// pushed down to a server-side listing as a key prefix.
///
/// # Examples
///
/// ```
/// use bucketfs::path::split_meta;
///
/// assert_eq!(split_meta("pre*post"), ("pre", "*post"));
/// assert_eq!(split_meta("no/meta/chars"), ("no/meta/chars", ""));
/// assert_eq!(split_meta("*start"), ("", "*start"));
/// ```
#[must_use]
pub fn split_meta(pattern: &str) -> (&str, &str) {
    match pattern.find(['*', '?', '[', '\\']) {
        Some(i) => pattern.split_at(i),
        None => (pattern, ""),
    }
}

/// Compare two paths segment-wise. `"."` compares equal to `""`.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use bucketfs::path::path_cmp;
///
/// assert_eq!(path_cmp("a", "a/b"), Ordering::Less);
/// assert_eq!(path_cmp("a/b", "b"), Ordering::Less);
/// assert_eq!(path_cmp(".", ""), Ordering::Equal);
/// ```
#[must_use]
pub fn path_cmp(a: &str, b: &str) -> Ordering {
    let a = if a == "." { "" } else { a };
    let b = if b == "." { "" } else { b };
    a.split('/').cmp(b.split('/'))
}

/// Compare a path against the subtree rooted at `root`.
///
/// Returns `Equal` when `p == root` or `p` lies under `root` (the character
/// after the `root` prefix is `/`), and the segment-wise comparison of `root`
/// and `p` otherwise. `Less` therefore means the whole subtree sorts before
/// `p`; `Greater` means it sorts after. The root `"."` contains everything.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use bucketfs::path::tree_cmp;
///
/// assert_eq!(tree_cmp("a/b", "a/b/c"), Ordering::Equal);
/// assert_eq!(tree_cmp("a/b", "a/b"), Ordering::Equal);
/// assert_eq!(tree_cmp("a", "b/c"), Ordering::Less);
/// assert_eq!(tree_cmp("c", "b/z"), Ordering::Greater);
/// ```
#[must_use]
pub fn tree_cmp(root: &str, p: &str) -> Ordering {
    if root == "." {
        return Ordering::Equal;
    }
    if p == root || (p.starts_with(root) && p.as_bytes().get(root.len()) == Some(&b'/')) {
        return Ordering::Equal;
    }
    path_cmp(root, p)
}

/// Number of `/`-separated segments in `p`, or `None` for invalid paths.
///
/// `""` and `"."` have zero segments.
#[must_use]
pub fn segments(p: &str) -> Option<usize> {
    if p.is_empty() || p == "." {
        return Some(0);
    }
    if !valid_path(p) {
        return None;
    }
    Some(p.split('/').count())
}

/// Split `p` into its first `n` segments and the single segment that follows
/// them (empty when `p` has no more than `n` segments).
///
/// Returns `None` for invalid non-empty paths.
#[must_use]
pub fn trim(p: &str, n: usize) -> Option<(String, String)> {
    if !p.is_empty() && p != "." && !valid_path(p) {
        return None;
    }
    if p.is_empty() || p == "." {
        return Some(if n == 0 {
            (String::new(), p.to_owned())
        } else {
            (p.to_owned(), String::new())
        });
    }
    let parts: Vec<&str> = p.split('/').collect();
    if parts.len() <= n {
        return Some((parts.join("/"), String::new()));
    }
    Some((parts[..n].join("/"), parts[n].to_owned()))
}

/// A malformed glob pattern (an unterminated character class or a trailing
/// backslash).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadPattern;

impl std::fmt::Display for BadPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("syntax error in glob pattern")
    }
}

impl std::error::Error for BadPattern {}

/// Glob-match `name` against `pattern`.
///
/// Semantics: `*` matches any run of non-`/` characters, `?` matches one
/// non-`/` character, `[...]` matches a character class (ranges allowed,
/// `^` negates), and `\` escapes the next character. The pattern must match
/// the whole name.
///
/// # Errors
///
/// Returns [`BadPattern`] for malformed patterns such as `"["`.
///
/// # Examples
///
/// ```
/// use bucketfs::path::match_name;
///
/// assert!(match_name("*.txt", "file.txt").unwrap());
/// assert!(!match_name("*.txt", "dir/file.txt").unwrap());
/// assert!(match_name("[abc]", "a").unwrap());
/// assert!(match_name("a/?/c", "a/b/c").unwrap());
/// assert!(match_name("", "").unwrap());
/// assert!(match_name("[", "a").is_err());
/// ```
pub fn match_name(pattern: &str, name: &str) -> Result<bool, BadPattern> {
    let mut pattern = pattern;
    let mut name = name;
    'pattern: while !pattern.is_empty() {
        let (star, chunk, rest) = scan_chunk(pattern);
        pattern = rest;
        if star && chunk.is_empty() {
            // Trailing * matches the rest of the name unless it has a /.
            return Ok(!name.contains('/'));
        }
        // Look for a match at the current position.
        if let Some(t) = match_chunk(chunk, name)? {
            if t.is_empty() || !pattern.is_empty() {
                name = t;
                continue;
            }
        }
        if star {
            // Retry the chunk after skipping one non-separator character at
            // a time.
            let mut skipped = name;
            while let Some(ch) = skipped.chars().next() {
                if ch == '/' {
                    break;
                }
                skipped = &skipped[ch.len_utf8()..];
                if let Some(t) = match_chunk(chunk, skipped)? {
                    // The final chunk must exhaust the name.
                    if pattern.is_empty() && !t.is_empty() {
                        continue;
                    }
                    name = t;
                    continue 'pattern;
                }
            }
        }
        return Ok(false);
    }
    Ok(name.is_empty())
}

/// Split the pattern into a leading `*` run, the next literal/class chunk,
/// and the remainder.
fn scan_chunk(mut pattern: &str) -> (bool, &str, &str) {
    let mut star = false;
    while let Some(rest) = pattern.strip_prefix('*') {
        pattern = rest;
        star = true;
    }
    let bytes = pattern.as_bytes();
    let mut in_class = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                if i + 1 < bytes.len() {
                    i += 1;
                }
            }
            b'[' => in_class = true,
            b']' => in_class = false,
            b'*' if !in_class => break,
            _ => {}
        }
        i += 1;
    }
    (star, &pattern[..i], &pattern[i..])
}

/// Match a star-free chunk at the start of `s`; on success return the
/// remainder of `s`.
fn match_chunk<'a>(mut chunk: &str, mut s: &'a str) -> Result<Option<&'a str>, BadPattern> {
    // Keep scanning the chunk even after a mismatch so malformed patterns are
    // reported regardless of the input.
    let mut failed = false;
    while !chunk.is_empty() {
        if !failed && s.is_empty() {
            failed = true;
        }
        let op = chunk.as_bytes()[0];
        match op {
            b'[' => {
                let mut r = '\0';
                if !failed {
                    // Already checked non-empty above.
                    r = s.chars().next().unwrap_or('\0');
                    s = &s[r.len_utf8()..];
                }
                chunk = &chunk[1..];
                let negated = if let Some(rest) = chunk.strip_prefix('^') {
                    chunk = rest;
                    true
                } else {
                    false
                };
                let mut matched = false;
                let mut nrange = 0;
                loop {
                    if chunk.starts_with(']') && nrange > 0 {
                        chunk = &chunk[1..];
                        break;
                    }
                    let (lo, rest) = class_char(chunk)?;
                    chunk = rest;
                    let hi = if let Some(rest) = chunk.strip_prefix('-') {
                        let (hi, rest) = class_char(rest)?;
                        chunk = rest;
                        hi
                    } else {
                        lo
                    };
                    if lo <= r && r <= hi {
                        matched = true;
                    }
                    nrange += 1;
                }
                if matched == negated {
                    failed = true;
                }
            }
            b'?' => {
                if !failed {
                    let ch = s.chars().next().unwrap_or('/');
                    if ch == '/' {
                        failed = true;
                    } else {
                        s = &s[ch.len_utf8()..];
                    }
                }
                chunk = &chunk[1..];
            }
            _ => {
                let lit = if op == b'\\' {
                    chunk = &chunk[1..];
                    chunk.chars().next().ok_or(BadPattern)?
                } else {
                    chunk.chars().next().unwrap_or('\0')
                };
                if !failed {
                    if s.chars().next() == Some(lit) {
                        s = &s[lit.len_utf8()..];
                    } else {
                        failed = true;
                    }
                }
                chunk = &chunk[lit.len_utf8()..];
            }
        }
    }
    Ok(if failed { None } else { Some(s) })
}

/// Read one (possibly escaped) character of a character class.
fn class_char(chunk: &str) -> Result<(char, &str), BadPattern> {
    let mut chunk = chunk;
    if let Some(rest) = chunk.strip_prefix('\\') {
        chunk = rest;
    }
    match chunk.chars().next() {
        None | Some(']') => Err(BadPattern),
        Some('-') => Err(BadPattern),
        Some(ch) => Ok((ch, &chunk[ch.len_utf8()..])),
    }
}
