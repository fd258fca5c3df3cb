use flate2::read::DeflateDecoder;
use std::io::Read;
use std::sync::Arc;

use crate::io::ReadAt;
use crate::{Error, Result};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

/// One entry as read from the archive: its header, the stored bytes and the
/// decoded content.
#[derive(Debug, Clone)]
pub struct ExtractedEntry {
    pub header: ZipFileEntry,
    pub raw: Vec<u8>,
    pub data: Vec<u8>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Read an entry's stored bytes and decode them.
    pub async fn extract(&self, entry: &ZipFileEntry) -> Result<ExtractedEntry> {
        let raw = self.parser.read_raw(entry).await?;
        let data = decode(entry, &raw)?;
        Ok(ExtractedEntry {
            header: entry.clone(),
            raw,
            data,
        })
    }

    /// Extract file data to memory
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let raw = self.parser.read_raw(entry).await?;
        decode(entry, &raw)
    }
}

/// Decompress an entry's stored bytes and verify size and CRC-32.
pub fn decode(entry: &ZipFileEntry, raw: &[u8]) -> Result<Vec<u8>> {
    if entry.is_encrypted() {
        return Err(Error::corrupt(format!(
            "'{}' is encrypted, which is not supported",
            entry.file_name
        )));
    }

    let data = match entry.compression_method {
        CompressionMethod::Stored => raw.to_vec(),
        CompressionMethod::Deflate => {
            // declared size is untrusted, so only a bounded preallocation
            let hint = entry.uncompressed_size.min(raw.len() as u64 * 4);
            let mut out = Vec::with_capacity(hint as usize);
            DeflateDecoder::new(raw)
                .take(entry.uncompressed_size.saturating_add(1))
                .read_to_end(&mut out)
                .map_err(|e| {
                    Error::corrupt(format!("cannot inflate '{}': {}", entry.file_name, e))
                })?;
            out
        }
        CompressionMethod::Unknown(method) => {
            return Err(Error::corrupt(format!(
                "'{}' uses unsupported compression method {}",
                entry.file_name, method
            )));
        }
    };

    if data.len() as u64 != entry.uncompressed_size {
        return Err(Error::corrupt(format!(
            "'{}' decoded to {} bytes, header says {}",
            entry.file_name,
            data.len(),
            entry.uncompressed_size
        )));
    }
    let crc = crc32fast::hash(&data);
    if crc != entry.crc32 {
        return Err(Error::corrupt(format!(
            "CRC mismatch in '{}': expected {:08x}, got {:08x}",
            entry.file_name, entry.crc32, crc
        )));
    }

    Ok(data)
}
