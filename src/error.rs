//! Error types for tome archive operations.
//!
//! Every fallible library call returns [`Result<T>`]. The variants map onto the
//! failure classes of the archive core:
//!
//! - path problems ([`Error::InvalidPath`])
//! - container problems ([`Error::CorruptArchive`])
//! - manifest problems ([`Error::MissingRootManifest`], [`Error::MalformedManifest`],
//!   [`Error::BrokenReference`])
//! - entry lookups ([`Error::NotFound`], [`Error::EntryExists`])
//! - edit gating ([`Error::InvalidEditState`])
//!
//! Archive-level failures block all further work on that archive. Per-node
//! failures found while walking manifests are not errors of this type; they
//! are recorded on the graph as [`NodeError`](crate::cascade::NodeError).

use std::io;

/// All failure modes of the archive core.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A path escapes the archive root or fails normalization.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The underlying container is unreadable.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// `tome.json` is absent from the archive root.
    #[error("tome.json not found in archive root")]
    MissingRootManifest,

    /// A manifest is present but unparsable, lacks `type`, or has a mistyped field.
    #[error("malformed manifest '{path}': {reason}")]
    MalformedManifest { path: String, reason: String },

    /// A declared reference cannot be resolved or its target is absent.
    #[error("broken reference '{link}' in '{from}': {reason}")]
    BrokenReference {
        from: String,
        link: String,
        reason: String,
    },

    /// The requested entry is absent.
    #[error("entry not found: {path}")]
    NotFound { path: String },

    /// An entry already exists at the target path.
    #[error("entry already exists: {path}")]
    EntryExists { path: String },

    /// A commit or serialize was attempted while dirty entries are invalid.
    #[error("invalid edit state: {}", paths.join(", "))]
    InvalidEditState { paths: Vec<String> },

    /// The file on disk does not carry the `.tome` extension.
    #[error("'{name}' is not a .tome file")]
    InvalidFileType { name: String },

    /// The archive exceeds the configured size limit.
    #[error("archive is {size} bytes, maximum is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    /// No template with the requested id exists in the catalog.
    #[error("unknown template '{id}'")]
    UnknownTemplate { id: String },

    /// I/O error from the reader or the filesystem.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(path: impl AsRef<str>) -> Self {
        Self::NotFound {
            path: path.as_ref().to_string(),
        }
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptArchive(reason.into())
    }

    pub(crate) fn malformed(path: impl AsRef<str>, reason: impl Into<String>) -> Self {
        Self::MalformedManifest {
            path: path.as_ref().to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true for failures that make the whole archive unusable.
    pub fn is_archive_level(&self) -> bool {
        matches!(
            self,
            Self::CorruptArchive(_)
                | Self::MissingRootManifest
                | Self::InvalidFileType { .. }
                | Self::FileTooLarge { .. }
        ) || matches!(self, Self::MalformedManifest { path, .. } if path == crate::ROOT_MANIFEST)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
