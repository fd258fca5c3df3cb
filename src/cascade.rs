//! Manifest cascade: from `tome.json` to an ordered content graph.
//!
//! The cascade starts at the root manifest, dispatches on its `type`, follows
//! reference fields into chapter lists, page lists and nested chapter
//! manifests, and produces a [`ContentGraph`] whose leaves are the content
//! files in reading order.
//!
//! Only a missing or malformed root manifest fails the build. Problems below
//! the root are recorded on the node that hit them as a [`NodeError`] and the
//! walk carries on with the siblings.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, warn};
use serde_json::Value;

use crate::manifest::{
    AudioChapterEntry, ChapterEntry, Manifest, OrderKey, PageEntry, compare_keys, parse_list,
};
use crate::path::{CanonicalPath, Resolved, resolve};
use crate::store::ArchiveStore;
use crate::tree::{is_audio, is_image};
use crate::{Error, ROOT_MANIFEST, Result};

/// Why a reference could not be followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokenReason {
    /// The link is empty or climbs above the archive root.
    Invalid,
    /// The link carries a URI scheme.
    External,
    /// Nothing is stored at the resolved path.
    Missing,
    /// The target is already being walked.
    Cycle,
}

impl fmt::Display for BrokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BrokenReason::Invalid => "invalid link",
            BrokenReason::External => "external link",
            BrokenReason::Missing => "target not found",
            BrokenReason::Cycle => "reference cycle",
        };
        f.write_str(text)
    }
}

/// A failure recorded on a single node of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    BrokenReference { link: String, reason: BrokenReason },
    MalformedManifest { reason: String },
}

impl NodeError {
    fn broken(link: &str, reason: BrokenReason) -> Self {
        NodeError::BrokenReference {
            link: link.to_string(),
            reason,
        }
    }

    fn malformed(reason: impl Into<String>) -> Self {
        NodeError::MalformedManifest {
            reason: reason.into(),
        }
    }

    /// Converts to the crate error, attributing it to the node at `from`.
    pub fn to_error(&self, from: &CanonicalPath) -> Error {
        match self {
            NodeError::BrokenReference { link, reason } => Error::BrokenReference {
                from: from.to_string(),
                link: link.clone(),
                reason: reason.to_string(),
            },
            NodeError::MalformedManifest { reason } => Error::malformed(from, reason.clone()),
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::BrokenReference { link, reason } => write!(f, "{} '{}'", reason, link),
            NodeError::MalformedManifest { reason } => write!(f, "malformed: {}", reason),
        }
    }
}

type NodeResult<T> = std::result::Result<T, NodeError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A manifest document; the root node is always one.
    Manifest { type_name: String },
    /// A chapter listed by a chapters file.
    Chapter,
    /// A directory taken as a chapter because no chapters file exists.
    Directory,
    /// An image page.
    Page,
    /// A text content document.
    Content,
    /// An audio track.
    Audio,
}

impl NodeKind {
    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeKind::Page | NodeKind::Content | NodeKind::Audio)
    }
}

/// A node of the content graph.
///
/// `path` is the entry the node stands for. A node whose reference failed
/// carries the path of the document that declared it.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentNode {
    pub path: CanonicalPath,
    pub kind: NodeKind,
    pub order_key: Option<OrderKey>,
    pub title: Option<String>,
    pub children: Vec<ContentNode>,
    pub error: Option<NodeError>,
}

impl ContentNode {
    fn new(path: CanonicalPath, kind: NodeKind) -> Self {
        Self {
            path,
            kind,
            order_key: None,
            title: None,
            children: Vec::new(),
            error: None,
        }
    }

    fn fail(&mut self, error: NodeError) {
        warn!("'{}': {}", self.path, error);
        self.children.clear();
        self.error = Some(error);
    }

    fn failed(path: CanonicalPath, kind: NodeKind, error: NodeError) -> Self {
        let mut node = Self::new(path, kind);
        node.fail(error);
        node
    }

    /// This node and its descendants, depth first in child order.
    pub fn walk(&self) -> Vec<&ContentNode> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a ContentNode>) {
        out.push(self);
        for child in &self.children {
            child.collect(out);
        }
    }
}

/// The navigable structure of a tome: the parsed root manifest and the tree
/// built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentGraph {
    pub manifest: Manifest,
    pub root: ContentNode,
}

impl ContentGraph {
    /// Content leaves in reading order.
    pub fn leaves(&self) -> Vec<&ContentNode> {
        self.root
            .walk()
            .into_iter()
            .filter(|node| node.kind.is_leaf() && node.error.is_none())
            .collect()
    }

    /// Every node error, in walk order.
    pub fn errors(&self) -> Vec<Error> {
        self.root
            .walk()
            .into_iter()
            .filter_map(|node| node.error.as_ref().map(|e| e.to_error(&node.path)))
            .collect()
    }

    /// True when no node recorded an error.
    pub fn is_complete(&self) -> bool {
        self.root.walk().iter().all(|node| node.error.is_none())
    }
}

/// Walks the manifests of one archive.
///
/// `stack` holds the documents currently being expanded; a reference back
/// into it is reported as a cycle.
pub struct ManifestCascade<'a> {
    store: &'a ArchiveStore,
    stack: Vec<CanonicalPath>,
}

impl<'a> ManifestCascade<'a> {
    /// Builds the content graph of `store`.
    ///
    /// Fails only when `tome.json` is absent or malformed.
    pub fn build(store: &'a ArchiveStore) -> Result<ContentGraph> {
        let root_path = CanonicalPath::entry(ROOT_MANIFEST)?;
        let bytes = store
            .get(&root_path)
            .map_err(|_| Error::MissingRootManifest)?;
        let manifest = Manifest::parse_at(&root_path, bytes)?;
        debug!("cascade: root manifest type '{}'", manifest.type_name());

        let mut cascade = ManifestCascade {
            store,
            stack: vec![root_path.clone()],
        };
        let mut root = ContentNode::new(
            root_path.clone(),
            NodeKind::Manifest {
                type_name: manifest.type_name().to_string(),
            },
        );
        root.title = manifest.title().map(str::to_string);
        match cascade.expand(&root_path, &manifest) {
            Ok(children) => root.children = children,
            Err(error) => root.fail(error),
        }

        Ok(ContentGraph { manifest, root })
    }

    /// Children of the manifest stored at `path`.
    fn expand(&mut self, path: &CanonicalPath, manifest: &Manifest) -> NodeResult<Vec<ContentNode>> {
        let dir = path.parent().unwrap_or_default();
        match manifest {
            Manifest::ComicVolume(volume) => match &volume.chapters_file {
                Some(link) => self.comic_chapters(path, link),
                None => Ok(self.chapter_directories(&dir)),
            },
            Manifest::ComicChapter(chapter) => match &chapter.pages_file {
                Some(link) => self.pages(path, link),
                None => Ok(self.images_under(&dir)),
            },
            Manifest::BookChapter(chapter) => {
                let target = self.lookup(path, &chapter.content)?;
                Ok(vec![ContentNode::new(target, NodeKind::Content)])
            }
            Manifest::AudioBook(book) => match &book.chapters_file {
                Some(link) => self.audio_chapters(path, link),
                None => Ok(self.audio_under(&dir)),
            },
            Manifest::Epub(_) | Manifest::Other { .. } => Ok(Vec::new()),
        }
    }

    /// Resolves a reference that must name a stored file.
    fn lookup(&self, from: &CanonicalPath, link: &str) -> NodeResult<CanonicalPath> {
        match resolve(link, from) {
            Resolved::Internal(target) if self.store.contains(&target) => Ok(target),
            resolved => Err(unresolved(link, &resolved)),
        }
    }

    /// Pushes a referenced document onto the traversal stack and returns its
    /// bytes. Every successful call is paired with [`Self::leave`].
    fn enter(&mut self, target: &CanonicalPath, link: &str) -> NodeResult<&'a [u8]> {
        if self.stack.contains(target) {
            return Err(NodeError::broken(link, BrokenReason::Cycle));
        }
        let bytes = self
            .store
            .get(target)
            .map_err(|_| NodeError::broken(link, BrokenReason::Missing))?;
        debug!("cascade: entering '{}'", target);
        self.stack.push(target.clone());
        Ok(bytes)
    }

    fn leave(&mut self) {
        self.stack.pop();
    }

    fn comic_chapters(&mut self, from: &CanonicalPath, link: &str) -> NodeResult<Vec<ContentNode>> {
        let list = self.lookup(from, link)?;
        let bytes = self.enter(&list, link)?;
        let result = match parse_list::<ChapterEntry>(bytes) {
            Ok(rows) => {
                let mut children: Vec<_> = rows.iter().map(|row| self.chapter(&list, row)).collect();
                sort_nodes(&mut children);
                Ok(children)
            }
            Err(reason) => Err(NodeError::malformed(format!("'{}': {}", list, reason))),
        };
        self.leave();
        result
    }

    fn chapter(&mut self, list: &CanonicalPath, row: &ChapterEntry) -> ContentNode {
        let mut node = match resolve(&row.path, list) {
            Resolved::Internal(target) if self.store.contains(&target) => {
                self.chapter_document(target, &row.path)
            }
            Resolved::Internal(target) if self.store.is_dir(&target) => {
                let mut node = ContentNode::new(target.clone(), NodeKind::Chapter);
                node.children = self.images_under(&target);
                node
            }
            resolved => ContentNode::failed(
                list.clone(),
                NodeKind::Chapter,
                unresolved(&row.path, &resolved),
            ),
        };
        node.order_key = row.chapter_number.clone();
        if row.title.is_some() {
            node.title = row.title.clone();
        }
        node
    }

    /// A chapter whose `path` names a file: either a pages list or a nested
    /// chapter manifest.
    fn chapter_document(&mut self, target: CanonicalPath, link: &str) -> ContentNode {
        let mut node = ContentNode::new(target.clone(), NodeKind::Chapter);
        let bytes = match self.enter(&target, link) {
            Ok(bytes) => bytes,
            Err(error) => {
                node.fail(error);
                return node;
            }
        };

        match serde_json::from_slice::<Value>(bytes) {
            Ok(value @ Value::Array(_)) => match serde_json::from_value::<Vec<PageEntry>>(value) {
                Ok(rows) => node.children = self.page_nodes(&target, &rows),
                Err(e) => node.fail(NodeError::malformed(e.to_string())),
            },
            Ok(value) => match Manifest::from_value(value) {
                Ok(manifest) => {
                    node.title = manifest.title().map(str::to_string);
                    match self.expand(&target, &manifest) {
                        Ok(children) => node.children = children,
                        Err(error) => node.fail(error),
                    }
                }
                Err(reason) => node.fail(NodeError::malformed(reason)),
            },
            Err(e) => node.fail(NodeError::malformed(e.to_string())),
        }

        self.leave();
        node
    }

    fn pages(&mut self, from: &CanonicalPath, link: &str) -> NodeResult<Vec<ContentNode>> {
        let list = self.lookup(from, link)?;
        let bytes = self.enter(&list, link)?;
        let result = parse_list::<PageEntry>(bytes)
            .map(|rows| self.page_nodes(&list, &rows))
            .map_err(|reason| NodeError::malformed(format!("'{}': {}", list, reason)));
        self.leave();
        result
    }

    fn page_nodes(&self, list: &CanonicalPath, rows: &[PageEntry]) -> Vec<ContentNode> {
        let mut nodes: Vec<_> = rows
            .iter()
            .map(|row| {
                let mut node = match self.lookup(list, &row.file) {
                    Ok(target) => ContentNode::new(target, NodeKind::Page),
                    Err(error) => ContentNode::failed(list.clone(), NodeKind::Page, error),
                };
                node.order_key = row.page.clone();
                node.title = row.alt.clone();
                node
            })
            .collect();
        sort_nodes(&mut nodes);
        nodes
    }

    fn audio_chapters(&mut self, from: &CanonicalPath, link: &str) -> NodeResult<Vec<ContentNode>> {
        let list = self.lookup(from, link)?;
        let bytes = self.enter(&list, link)?;
        let result = match parse_list::<AudioChapterEntry>(bytes) {
            Ok(rows) => {
                let mut nodes: Vec<_> = rows
                    .iter()
                    .map(|row| {
                        let mut node = match self.lookup(&list, &row.file) {
                            Ok(target) => ContentNode::new(target, NodeKind::Audio),
                            Err(error) => ContentNode::failed(list.clone(), NodeKind::Audio, error),
                        };
                        node.order_key = row.chapter_number.clone();
                        node.title = row.title.clone();
                        node
                    })
                    .collect();
                sort_nodes(&mut nodes);
                Ok(nodes)
            }
            Err(reason) => Err(NodeError::malformed(format!("'{}': {}", list, reason))),
        };
        self.leave();
        result
    }

    /// Image files anywhere below `dir`, by path.
    fn images_under(&self, dir: &CanonicalPath) -> Vec<ContentNode> {
        self.store
            .files_under(dir)
            .into_iter()
            .filter(|path| is_image(path.as_str()))
            .map(|path| ContentNode::new(path.clone(), NodeKind::Page))
            .collect()
    }

    fn audio_under(&self, dir: &CanonicalPath) -> Vec<ContentNode> {
        self.store
            .files_under(dir)
            .into_iter()
            .filter(|path| is_audio(path.as_str()))
            .map(|path| ContentNode::new(path.clone(), NodeKind::Audio))
            .collect()
    }

    /// Immediate subdirectories of `dir` holding images, each as a chapter.
    fn chapter_directories(&self, dir: &CanonicalPath) -> Vec<ContentNode> {
        let depth = dir.segments().count();
        let subdirs: BTreeSet<&str> = self
            .store
            .files_under(dir)
            .into_iter()
            .filter(|path| path.segments().count() > depth + 1)
            .filter_map(|path| path.segments().nth(depth))
            .collect();

        subdirs
            .into_iter()
            .filter_map(|name| dir.join(name).ok())
            .filter_map(|sub| {
                let pages = self.images_under(&sub);
                if pages.is_empty() {
                    return None;
                }
                let mut node = ContentNode::new(sub, NodeKind::Directory);
                node.children = pages;
                Some(node)
            })
            .collect()
    }
}

fn unresolved(link: &str, resolved: &Resolved) -> NodeError {
    let reason = match resolved {
        Resolved::Internal(_) => BrokenReason::Missing,
        Resolved::External(_) => BrokenReason::External,
        Resolved::Invalid => BrokenReason::Invalid,
    };
    NodeError::broken(link, reason)
}

/// Keyed nodes first by key, then unkeyed; ties by path.
fn sort_nodes(nodes: &mut [ContentNode]) {
    nodes.sort_by(|a, b| {
        compare_keys(a.order_key.as_ref(), b.order_key.as_ref()).then_with(|| a.path.cmp(&b.path))
    });
}
