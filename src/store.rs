//! In-memory archive model.
//!
//! [`ArchiveStore`] owns the byte-level truth of one tome. Entries are keyed
//! by [`CanonicalPath`]; directories exist only as prefixes of entry paths.
//! Each entry keeps the bytes exactly as they are stored in the container, so
//! entries that are never touched are written back with the same compressed
//! stream, method, timestamp and CRC they were loaded with.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use crate::config::LoadLimits;
use crate::io::{LocalFileReader, MemoryReader, ReadAt};
use crate::path::CanonicalPath;
use crate::zip::{self, DosDateTime, ZipExtractor, ZipFileEntry, ZipWriter};
use crate::{Error, Result};

/// Name of the entry EPUB readers expect to find stored, uncompressed, first.
const EPUB_MIMETYPE: &str = "mimetype";

#[derive(Debug, Clone)]
struct StoredEntry {
    /// Position in the written archive; loaded entries keep their order.
    seq: u64,
    header: ZipFileEntry,
    raw: Vec<u8>,
    data: Vec<u8>,
    modified: bool,
}

/// Editable set of archive entries.
#[derive(Debug, Clone, Default)]
pub struct ArchiveStore {
    entries: BTreeMap<CanonicalPath, StoredEntry>,
    next_seq: u64,
}

impl ArchiveStore {
    /// An empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every entry from a random-access source.
    ///
    /// Fails with [`Error::CorruptArchive`] when the container is unreadable,
    /// uses encryption or an unsupported method, fails a CRC check, or names
    /// an entry outside the archive root.
    pub async fn open<R: ReadAt>(reader: Arc<R>) -> Result<Self> {
        Self::load(reader).await.map_err(|e| match e {
            Error::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                Error::corrupt("unexpected end of archive")
            }
            other => other,
        })
    }

    /// Loads an archive held in memory.
    pub async fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::open(Arc::new(MemoryReader::new(bytes))).await
    }

    /// Loads an archive file after checking it against `limits`.
    pub async fn open_path(path: &Path, limits: &LoadLimits) -> Result<Self> {
        limits.check_name(path)?;
        let reader = LocalFileReader::new(path)?;
        limits.check_size(reader.size())?;
        debug!("loading {} ({} bytes)", path.display(), reader.size());
        Self::open(Arc::new(reader)).await
    }

    async fn load<R: ReadAt>(reader: Arc<R>) -> Result<Self> {
        let extractor = ZipExtractor::new(reader);
        let mut store = Self::new();

        for header in extractor.list_files().await? {
            if header.is_directory {
                debug!("dropping directory record '{}'", header.file_name);
                continue;
            }
            let path = CanonicalPath::entry(&header.file_name).map_err(|_| {
                Error::corrupt(format!("unsafe entry name '{}'", header.file_name))
            })?;

            if let Some(existing) = store.entries.get(&path) {
                if existing.header.raw_name != header.raw_name {
                    return Err(Error::corrupt(format!(
                        "entries '{}' and '{}' both name '{}'",
                        existing.header.file_name, header.file_name, path
                    )));
                }
                warn!("duplicate entry '{}', keeping the last one", path);
            }

            // raw_name keeps the header bytes; only the decoded name is canonical
            let extracted = extractor.extract(&header).await?;
            let mut header = extracted.header;
            header.file_name = path.as_str().to_string();

            let seq = store.bump_seq();
            let entry = StoredEntry {
                seq,
                header,
                raw: extracted.raw,
                data: extracted.data,
                modified: false,
            };
            store.entries.insert(path, entry);
        }

        debug!("loaded {} entries", store.entries.len());
        Ok(store)
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn lookup(&self, path: &str) -> Result<(CanonicalPath, &StoredEntry)> {
        let path = CanonicalPath::entry(path)?;
        match self.entries.get(&path) {
            Some(entry) => Ok((path, entry)),
            None => Err(Error::not_found(path)),
        }
    }

    /// Returns an entry's content.
    pub fn get(&self, path: impl AsRef<str>) -> Result<&[u8]> {
        self.lookup(path.as_ref()).map(|(_, entry)| entry.data.as_slice())
    }

    /// Returns an entry's bytes as stored in the container (possibly compressed).
    pub fn stored_bytes(&self, path: impl AsRef<str>) -> Result<&[u8]> {
        self.lookup(path.as_ref()).map(|(_, entry)| entry.raw.as_slice())
    }

    /// Returns the ZIP header an entry will be written with.
    pub fn header(&self, path: impl AsRef<str>) -> Result<&ZipFileEntry> {
        self.lookup(path.as_ref()).map(|(_, entry)| &entry.header)
    }

    /// True when `path` names an existing entry. Invalid paths name nothing.
    pub fn contains(&self, path: impl AsRef<str>) -> bool {
        self.lookup(path.as_ref()).is_ok()
    }

    /// True when some entry lives below `dir`. The root is a directory of
    /// every non-empty archive.
    pub fn is_dir(&self, dir: &CanonicalPath) -> bool {
        self.entries
            .keys()
            .any(|path| path != dir && path.starts_with(dir))
    }

    /// True when the entry was written or renamed since load.
    pub fn is_modified(&self, path: impl AsRef<str>) -> bool {
        self.lookup(path.as_ref())
            .is_ok_and(|(_, entry)| entry.modified)
    }

    /// Creates or overwrites an entry. Other entries, including ones below a
    /// directory of the same name, are left alone.
    pub fn put(&mut self, path: impl AsRef<str>, bytes: impl Into<Vec<u8>>) -> Result<()> {
        let path = CanonicalPath::entry(path.as_ref())?;
        let bytes = bytes.into();

        if let Some(existing) = self.entries.get(&path)
            && existing.data == bytes
        {
            return Ok(());
        }

        let force_stored = path.as_str() == EPUB_MIMETYPE;
        let (header, raw) = zip::encode(path.as_str(), &bytes, DosDateTime::now(), force_stored)?;
        let seq = match self.entries.get(&path) {
            Some(existing) => existing.seq,
            None => self.bump_seq(),
        };

        debug!("put '{}' ({} bytes)", path, bytes.len());
        self.entries.insert(
            path,
            StoredEntry {
                seq,
                header,
                raw,
                data: bytes,
                modified: true,
            },
        );
        Ok(())
    }

    /// Creates a new entry, failing with [`Error::EntryExists`] if one is there.
    pub fn add(&mut self, path: impl AsRef<str>, bytes: impl Into<Vec<u8>>) -> Result<()> {
        let path = CanonicalPath::entry(path.as_ref())?;
        if self.entries.contains_key(&path) {
            return Err(Error::EntryExists {
                path: path.to_string(),
            });
        }
        self.put(&path, bytes)
    }

    /// Deletes an entry and returns its content.
    pub fn remove(&mut self, path: impl AsRef<str>) -> Result<Vec<u8>> {
        let path = CanonicalPath::entry(path.as_ref())?;
        match self.entries.remove(&path) {
            Some(entry) => {
                debug!("removed '{}'", path);
                Ok(entry.data)
            }
            None => Err(Error::not_found(path)),
        }
    }

    /// Moves an entry to a new path, keeping its stored bytes.
    pub fn rename(&mut self, from: impl AsRef<str>, to: impl AsRef<str>) -> Result<()> {
        let from = CanonicalPath::entry(from.as_ref())?;
        let to = CanonicalPath::entry(to.as_ref())?;
        if from == to {
            return if self.entries.contains_key(&from) {
                Ok(())
            } else {
                Err(Error::not_found(from))
            };
        }
        if self.entries.contains_key(&to) {
            return Err(Error::EntryExists {
                path: to.to_string(),
            });
        }
        let mut entry = self
            .entries
            .remove(&from)
            .ok_or_else(|| Error::not_found(&from))?;

        entry.header.set_name(to.as_str());
        entry.modified = true;
        debug!("renamed '{}' to '{}'", from, to);
        self.entries.insert(to, entry);
        Ok(())
    }

    /// All entry paths, ascending.
    pub fn list(&self) -> Vec<CanonicalPath> {
        self.entries.keys().cloned().collect()
    }

    /// Entry paths in the order they will be written.
    pub fn archive_order(&self) -> Vec<&CanonicalPath> {
        let mut ordered: Vec<_> = self.entries.iter().collect();
        ordered.sort_by_key(|(_, entry)| entry.seq);
        ordered.into_iter().map(|(path, _)| path).collect()
    }

    /// Files below `dir` at any depth, ascending by path.
    pub fn files_under(&self, dir: &CanonicalPath) -> Vec<&CanonicalPath> {
        self.entries
            .keys()
            .filter(|path| *path != dir && path.starts_with(dir))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the complete archive.
    ///
    /// Entries are written in load order followed by new entries in creation
    /// order. The output depends only on the store's state: timestamps of new
    /// content are fixed when the content is put.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut ordered: Vec<_> = self.entries.values().collect();
        ordered.sort_by_key(|entry| entry.seq);

        let mut writer = ZipWriter::new();
        for entry in ordered {
            writer.add_raw(entry.header.clone(), &entry.raw)?;
        }
        let bytes = writer.finish()?;
        debug!(
            "serialized {} entries into {} bytes",
            self.entries.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Serializes and writes the archive in a single write once the buffer
    /// is complete.
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        let bytes = self.serialize()?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}
