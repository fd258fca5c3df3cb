//! # tomekit
//!
//! Reading, navigating and editing `.tome` archives.
//!
//! A tome is a ZIP archive with a JSON manifest, `tome.json`, at its root.
//! The manifest's `type` decides how the rest of the archive is read: comic
//! volumes list chapters, chapters list pages, book chapters point at a
//! content document, audiobooks list tracks.
//!
//! ## Features
//!
//! - Path resolution for links written inside manifests, confined to the
//!   archive root
//! - Loading archives from local files or memory, and writing them back with
//!   untouched entries copied byte-for-byte
//! - A manifest cascade that turns the manifests into an ordered content graph,
//!   with per-node errors instead of aborting on broken references
//! - Edit sessions with validated commits and gated serialization
//! - New tomes from templates
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use tomekit::{ArchiveStore, LoadLimits, ManifestCascade};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = ArchiveStore::open_path(Path::new("vol1.tome"), &LoadLimits::default()).await?;
//!     let graph = ManifestCascade::build(&store)?;
//!     for page in graph.leaves() {
//!         println!("{}", page.path);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cascade;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod manifest;
pub mod path;
pub mod session;
pub mod store;
pub mod template;
pub mod tree;
pub mod zip;

/// Name of the root manifest.
pub const ROOT_MANIFEST: &str = "tome.json";

pub use cascade::{ContentGraph, ContentNode, ManifestCascade, NodeError, NodeKind};
pub use cli::Cli;
pub use config::LoadLimits;
pub use error::{Error, Result};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use manifest::{Manifest, OrderKey};
pub use path::{CanonicalPath, Resolved, resolve};
pub use session::{CommitReport, EditSession, OpenFile};
pub use store::ArchiveStore;
pub use template::{TemplateCatalog, TomeTemplate};
pub use tree::{FileNode, FileTree, FileType};
