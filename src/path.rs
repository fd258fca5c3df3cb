//! Canonical in-archive paths and link resolution.
//!
//! Manifests inside a tome reference other entries with author-supplied link
//! strings. [`resolve`] interprets such a link against the location of the
//! referencing file and returns either a [`CanonicalPath`] inside the archive,
//! an external link that must never be looked up in the archive, or
//! [`Resolved::Invalid`] when the link would climb above the archive root.
//!
//! ## Link syntax
//!
//! | Link                 | Kind            | Resolves from                      |
//! |----------------------|-----------------|------------------------------------|
//! | `content.html`       | relative        | directory of the referencing file  |
//! | `./content.html`     | relative        | directory of the referencing file  |
//! | `../assets/a.css`    | parent-relative | bounded at the archive root        |
//! | `/images/cover.jpg`  | root-relative   | archive root                       |
//! | `https://example.com`| external        | never resolved                     |
//! | `mailto:a@b.com`     | external        | never resolved                     |

use std::fmt;

use crate::{Error, Result};

/// Upper bound on path length accepted from archives and links.
const MAX_PATH_LENGTH: usize = 32768;

/// A normalized, root-relative archive address.
///
/// Segments are non-empty and never `.` or `..`, so a `CanonicalPath` can not
/// point outside the archive. The empty path is the archive root: it is a
/// valid base for resolution but never names an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    /// The archive root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Normalizes a store path.
    ///
    /// A leading `/` is optional, empty segments and `.` are dropped and `..`
    /// pops the previous segment. Climbing above the root, NUL bytes and
    /// oversized input are rejected with [`Error::InvalidPath`].
    pub fn normalize(raw: &str) -> Result<Self> {
        if raw.contains('\0') {
            return Err(Error::invalid_path(raw, "contains NUL byte"));
        }
        if raw.len() > MAX_PATH_LENGTH {
            return Err(Error::invalid_path(
                raw,
                format!("exceeds maximum length of {} bytes", MAX_PATH_LENGTH),
            ));
        }
        normalize_segments(raw.split('/'))
            .map(Self::from_segments)
            .ok_or_else(|| Error::invalid_path(raw, "escapes the archive root"))
    }

    /// Normalizes a path that must name an entry (anything but the root).
    pub fn entry(raw: &str) -> Result<Self> {
        let path = Self::normalize(raw)?;
        if path.is_root() {
            return Err(Error::invalid_path(raw, "the archive root is not an entry"));
        }
        Ok(path)
    }

    fn from_segments(segments: Vec<&str>) -> Self {
        Self(segments.join("/"))
    }

    /// Returns true for the archive root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the path as a string slice, without a leading slash.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the path segments. The root has none.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Returns the containing directory. The parent of a top-level entry is
    /// the root; the root has no parent.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind('/') {
            Some(idx) => Self(self.0[..idx].to_string()),
            None => Self::root(),
        })
    }

    /// Returns the last segment, or `""` for the root.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Returns the extension of the last segment, as written.
    ///
    /// Dot-files such as `.hidden` have no extension.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(pos) => Some(&name[pos + 1..]),
        }
    }

    /// Appends a relative path, normalizing the result.
    pub fn join(&self, other: &str) -> Result<Self> {
        if self.is_root() {
            return Self::normalize(other);
        }
        Self::normalize(&format!("{}/{}", self.0, other))
    }

    /// Component-wise prefix test: `a/bc` starts with `a` but not with `a/b`.
    pub fn starts_with(&self, prefix: &CanonicalPath) -> bool {
        if prefix.is_root() {
            return true;
        }
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0.as_bytes()[prefix.0.len()] == b'/')
    }
}

impl AsRef<str> for CanonicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl TryFrom<&str> for CanonicalPath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::normalize(s)
    }
}

impl TryFrom<String> for CanonicalPath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::normalize(&s)
    }
}

/// Outcome of resolving a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A location inside the archive. It may or may not exist.
    Internal(CanonicalPath),
    /// A link with a URI scheme, returned unchanged.
    External(String),
    /// Empty, malformed, or climbing above the archive root.
    Invalid,
}

impl Resolved {
    /// Returns the internal path, if any.
    pub fn internal(&self) -> Option<&CanonicalPath> {
        match self {
            Resolved::Internal(path) => Some(path),
            _ => None,
        }
    }
}

/// Resolves `raw_link` as written in the file at `base`.
///
/// Root-relative links ignore `base`; relative links start from the directory
/// containing `base`. The function is pure: the same inputs always produce
/// the same output.
pub fn resolve(raw_link: &str, base: &CanonicalPath) -> Resolved {
    if raw_link.trim().is_empty() || raw_link.contains('\0') || raw_link.len() > MAX_PATH_LENGTH {
        return Resolved::Invalid;
    }

    if has_scheme(raw_link) {
        return Resolved::External(raw_link.to_string());
    }

    let dir = base.parent().unwrap_or_default();
    let normalized = match raw_link.strip_prefix('/') {
        Some(rooted) => normalize_segments(rooted.split('/')),
        None => normalize_segments(dir.segments().chain(raw_link.split('/'))),
    };

    match normalized {
        Some(segments) => Resolved::Internal(CanonicalPath::from_segments(segments)),
        None => Resolved::Invalid,
    }
}

/// Stack walk over raw segments. `None` means the walk tried to pop the root.
fn normalize_segments<'a>(segments: impl Iterator<Item = &'a str>) -> Option<Vec<&'a str>> {
    let mut stack = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            s => stack.push(s),
        }
    }
    Some(stack)
}

/// Detects `scheme:` prefixes (`http://`, `mailto:`, `x-custom+v1:` ...).
///
/// Single-letter schemes are not accepted so that `C:/dir` stays a path.
fn has_scheme(link: &str) -> bool {
    let Some(colon) = link.find(':') else {
        return false;
    };
    let scheme = &link[..colon];
    if scheme.len() < 2 || scheme.contains('/') {
        return false;
    }
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
