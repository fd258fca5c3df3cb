//! Edit sessions over an archive.
//!
//! An [`EditSession`] owns an [`ArchiveStore`] and a shadow ([`OpenFile`])
//! for every file opened for editing. Edits change only the shadow's live
//! content; the store sees them on commit. Serialization reads the store, so
//! uncommitted edits never reach the output, and it refuses to run while any
//! shadow holds changes that fail validation.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;

use chrono::NaiveDate;
use log::{debug, info};
use serde_json::Value;

use crate::cascade::{ContentGraph, ManifestCascade, NodeKind};
use crate::manifest::{Manifest, is_valid_json};
use crate::path::CanonicalPath;
use crate::store::ArchiveStore;
use crate::template::TomeTemplate;
use crate::tree::{FileType, is_json, language_for};
use crate::{Error, ROOT_MANIFEST, Result};

/// Editor-side copy of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    path: CanonicalPath,
    live: Vec<u8>,
    committed: Vec<u8>,
    /// Validated as a manifest rather than as plain JSON.
    manifest: bool,
    valid: bool,
    file_type: FileType,
    language: &'static str,
}

impl OpenFile {
    fn new(path: CanonicalPath, content: Vec<u8>, manifest: bool) -> Self {
        let valid = validate(&path, manifest, &content);
        Self {
            file_type: FileType::of(path.as_str()),
            language: language_for(path.as_str()),
            path,
            live: content.clone(),
            committed: content,
            manifest,
            valid,
        }
    }

    fn set_live(&mut self, content: Vec<u8>) {
        self.valid = validate(&self.path, self.manifest, &content);
        self.live = content;
    }

    pub fn path(&self) -> &CanonicalPath {
        &self.path
    }

    /// Content as currently edited.
    pub fn live(&self) -> &[u8] {
        &self.live
    }

    /// Content as last committed to the store.
    pub fn committed(&self) -> &[u8] {
        &self.committed
    }

    /// Live content as text, if it is UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.live).ok()
    }

    /// Whether the live content passes validation.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_dirty(&self) -> bool {
        self.live != self.committed
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn language(&self) -> &'static str {
        self.language
    }
}

/// Manifests must parse as such, other JSON files must parse, anything else
/// is accepted.
fn validate(path: &CanonicalPath, manifest: bool, content: &[u8]) -> bool {
    if manifest {
        Manifest::parse(content).is_ok()
    } else if is_json(path.as_str()) {
        is_valid_json(content)
    } else {
        true
    }
}

/// Whether `path` is the root manifest or a chapter manifest the committed
/// graph reaches. Pages lists are reached as chapters too but hold arrays.
fn is_manifest(store: &ArchiveStore, path: &CanonicalPath) -> bool {
    if path.as_str() == ROOT_MANIFEST {
        return true;
    }
    let Ok(graph) = ManifestCascade::build(store) else {
        return false;
    };
    let reached = graph
        .root
        .walk()
        .iter()
        .any(|node| node.kind == NodeKind::Chapter && &node.path == path);
    reached
        && store.get(path).is_ok_and(|bytes| {
            matches!(serde_json::from_slice::<Value>(bytes), Ok(Value::Object(_)))
        })
}

/// Outcome of [`EditSession::commit_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub committed: Vec<CanonicalPath>,
    /// Dirty files left uncommitted because they fail validation.
    pub invalid: Vec<CanonicalPath>,
}

/// An archive plus the files open for editing.
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    store: ArchiveStore,
    open: BTreeMap<CanonicalPath, OpenFile>,
}

impl EditSession {
    pub fn new(store: ArchiveStore) -> Self {
        Self {
            store,
            open: BTreeMap::new(),
        }
    }

    /// Starts a brand-new tome from a template. `tome.json` and every
    /// template file are written to the store and opened clean.
    pub fn create(template: &TomeTemplate, today: NaiveDate) -> Result<Self> {
        let mut store = ArchiveStore::new();
        store.add(ROOT_MANIFEST, template.render_tome_json(today))?;
        for file in &template.files {
            store.add(&file.path, file.content.as_bytes())?;
        }

        let mut session = Self::new(store);
        session.open(ROOT_MANIFEST)?;
        for file in &template.files {
            session.open(&file.path)?;
        }
        info!("created tome from template '{}'", template.id);
        Ok(session)
    }

    /// Opens a file for editing, or returns the existing shadow.
    pub fn open(&mut self, path: impl AsRef<str>) -> Result<&OpenFile> {
        let path = CanonicalPath::entry(path.as_ref())?;
        match self.open.entry(path) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let content = self.store.get(entry.key())?.to_vec();
                let manifest = is_manifest(&self.store, entry.key());
                debug!("opened '{}'", entry.key());
                let file = OpenFile::new(entry.key().clone(), content, manifest);
                Ok(entry.insert(file))
            }
        }
    }

    pub fn get(&self, path: impl AsRef<str>) -> Option<&OpenFile> {
        let path = CanonicalPath::entry(path.as_ref()).ok()?;
        self.open.get(&path)
    }

    /// Replaces the live content of an open file.
    pub fn update(&mut self, path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> Result<&OpenFile> {
        let file = self.open_mut(path.as_ref())?;
        file.set_live(content.into());
        Ok(file)
    }

    /// Writes an open file's live content to the store.
    ///
    /// Fails with [`Error::InvalidEditState`] when the content does not
    /// validate; the store is left untouched.
    pub fn commit(&mut self, path: impl AsRef<str>) -> Result<()> {
        let path = CanonicalPath::entry(path.as_ref())?;
        let file = self
            .open
            .get_mut(&path)
            .ok_or_else(|| Error::not_found(&path))?;
        if !file.valid {
            return Err(Error::InvalidEditState {
                paths: vec![path.to_string()],
            });
        }
        if file.is_dirty() {
            self.store.put(&path, file.live.clone())?;
            file.committed = file.live.clone();
            debug!("committed '{}'", path);
        }
        Ok(())
    }

    /// Commits every dirty file that validates. Invalid ones stay dirty and
    /// are listed in the report.
    pub fn commit_all(&mut self) -> Result<CommitReport> {
        let mut report = CommitReport::default();
        for (path, file) in self.open.iter_mut() {
            if !file.is_dirty() {
                continue;
            }
            if !file.valid {
                report.invalid.push(path.clone());
                continue;
            }
            self.store.put(path, file.live.clone())?;
            file.committed = file.live.clone();
            report.committed.push(path.clone());
        }
        debug!(
            "commit_all: {} committed, {} invalid",
            report.committed.len(),
            report.invalid.len()
        );
        Ok(report)
    }

    /// Resets an open file to its committed content.
    pub fn discard(&mut self, path: impl AsRef<str>) -> Result<&OpenFile> {
        let file = self.open_mut(path.as_ref())?;
        let committed = file.committed.clone();
        file.set_live(committed);
        Ok(file)
    }

    /// Drops the shadow of a file, uncommitted changes included.
    pub fn close(&mut self, path: impl AsRef<str>) -> Result<OpenFile> {
        let path = CanonicalPath::entry(path.as_ref())?;
        self.open.remove(&path).ok_or_else(|| Error::not_found(&path))
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.open.values().any(OpenFile::is_dirty)
    }

    pub fn open_files(&self) -> impl Iterator<Item = &OpenFile> {
        self.open.values()
    }

    /// Open files that are dirty and fail validation.
    pub fn invalid_paths(&self) -> Vec<&CanonicalPath> {
        self.open
            .values()
            .filter(|file| file.is_dirty() && !file.valid)
            .map(|file| &file.path)
            .collect()
    }

    /// Serializes the committed archive.
    ///
    /// Refuses with [`Error::InvalidEditState`] while any open file is dirty
    /// and invalid.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.check_serializable()?;
        self.store.serialize()
    }

    /// Serializes the committed archive into a file, under the same gate as
    /// [`Self::serialize`].
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        self.check_serializable()?;
        self.store.write_to(path).await
    }

    fn check_serializable(&self) -> Result<()> {
        let invalid = self.invalid_paths();
        if invalid.is_empty() {
            return Ok(());
        }
        Err(Error::InvalidEditState {
            paths: invalid.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// Content graph of the committed archive.
    pub fn graph(&self) -> Result<ContentGraph> {
        ManifestCascade::build(&self.store)
    }

    /// Adds a new file to the store. Fails with [`Error::EntryExists`] if the
    /// path is taken.
    pub fn add_file(&mut self, path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> Result<()> {
        self.store.add(path, content)
    }

    /// Sets a file's content through the validation gate, creating the file
    /// if needed. The file is left open and clean.
    ///
    /// Content that fails validation is refused with
    /// [`Error::InvalidEditState`] and the store is left as it was.
    pub fn write_file(&mut self, path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> Result<()> {
        let path = CanonicalPath::entry(path.as_ref())?;
        if self.store.contains(&path) {
            self.open(&path)?;
            self.update(&path, content)?;
            return self.commit(&path);
        }

        self.store.add(&path, content)?;
        if !self.open(&path)?.is_valid() {
            self.open.remove(&path);
            self.store.remove(&path)?;
            return Err(Error::InvalidEditState {
                paths: vec![path.to_string()],
            });
        }
        Ok(())
    }

    /// Deletes a file from the store and closes its shadow.
    pub fn remove_file(&mut self, path: impl AsRef<str>) -> Result<Vec<u8>> {
        let path = CanonicalPath::entry(path.as_ref())?;
        self.ensure_clean(&path)?;
        let content = self.store.remove(&path)?;
        self.open.remove(&path);
        Ok(content)
    }

    /// Moves a file. An open shadow moves with it.
    pub fn rename_file(&mut self, from: impl AsRef<str>, to: impl AsRef<str>) -> Result<()> {
        let from = CanonicalPath::entry(from.as_ref())?;
        let to = CanonicalPath::entry(to.as_ref())?;
        self.ensure_clean(&from)?;
        self.store.rename(&from, &to)?;
        if let Some(file) = self.open.remove(&from) {
            let manifest = is_manifest(&self.store, &to);
            self.open
                .insert(to.clone(), OpenFile::new(to, file.committed, manifest));
        }
        Ok(())
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    pub fn into_store(self) -> ArchiveStore {
        self.store
    }

    fn open_mut(&mut self, path: &str) -> Result<&mut OpenFile> {
        let path = CanonicalPath::entry(path)?;
        self.open
            .get_mut(&path)
            .ok_or_else(|| Error::not_found(&path))
    }

    fn ensure_clean(&self, path: &CanonicalPath) -> Result<()> {
        match self.open.get(path) {
            Some(file) if file.is_dirty() => Err(Error::InvalidEditState {
                paths: vec![path.to_string()],
            }),
            _ => Ok(()),
        }
    }
}
