//! ZIP archive writer.
//!
//! Entries are appended as (header, stored bytes) pairs. Entries carried over
//! from a loaded archive keep their compressed stream, method, timestamp, CRC
//! and extra fields; new content goes through [`encode`] first.
//!
//! The writer produces classic (non-ZIP64) archives. Archives that would need
//! ZIP64 records are rejected, which the load size limit keeps out of reach.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::{self, Write};

use crate::{Error, Result};

use super::structures::*;

/// Encode new content as a file entry.
///
/// DEFLATE is used when it makes the entry smaller; `force_stored` keeps the
/// bytes uncompressed regardless (EPUB requires this for `mimetype`).
pub fn encode(
    name: &str,
    data: &[u8],
    modified: DosDateTime,
    force_stored: bool,
) -> Result<(ZipFileEntry, Vec<u8>)> {
    let deflated = if force_stored || data.is_empty() {
        None
    } else {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        Some(encoder.finish()?).filter(|d| d.len() < data.len())
    };

    let (method, raw) = match deflated {
        Some(raw) => (CompressionMethod::Deflate, raw),
        None => (CompressionMethod::Stored, data.to_vec()),
    };

    let mut header = ZipFileEntry::new_file(name.to_string(), method, modified);
    header.crc32 = crc32fast::hash(data);
    header.compressed_size = raw.len() as u64;
    header.uncompressed_size = data.len() as u64;
    Ok((header, raw))
}

/// Accumulates entries into an in-memory archive.
#[derive(Default)]
pub struct ZipWriter {
    out: Vec<u8>,
    central: Vec<ZipFileEntry>,
}

impl ZipWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry whose stored bytes are already encoded.
    pub fn add_raw(&mut self, mut header: ZipFileEntry, raw: &[u8]) -> Result<()> {
        if header.compressed_size != raw.len() as u64 {
            return Err(Error::corrupt(format!(
                "'{}' has {} stored bytes, header says {}",
                header.file_name,
                raw.len(),
                header.compressed_size
            )));
        }
        fits_u32(header.compressed_size, &header.file_name)?;
        fits_u32(header.uncompressed_size, &header.file_name)?;
        let offset = fits_u32(self.out.len() as u64, &header.file_name)?;

        // Sizes are known up front, so no trailing data descriptor is written.
        header.flags &= !flags::DATA_DESCRIPTOR;
        header.lfh_offset = offset as u64;

        let name = header.raw_name.as_slice();
        let out = &mut self.out;
        out.write_all(LFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(header.version_needed)?;
        out.write_u16::<LittleEndian>(header.flags)?;
        out.write_u16::<LittleEndian>(header.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(header.last_mod_time)?;
        out.write_u16::<LittleEndian>(header.last_mod_date)?;
        out.write_u32::<LittleEndian>(header.crc32)?;
        out.write_u32::<LittleEndian>(header.compressed_size as u32)?;
        out.write_u32::<LittleEndian>(header.uncompressed_size as u32)?;
        out.write_u16::<LittleEndian>(len_u16(name.len(), "file name")?)?;
        out.write_u16::<LittleEndian>(len_u16(header.extra_field.len(), "extra field")?)?;
        out.write_all(name)?;
        out.write_all(&header.extra_field)?;
        out.write_all(raw)?;

        self.central.push(header);
        Ok(())
    }

    /// Number of entries written so far.
    pub fn len(&self) -> usize {
        self.central.len()
    }

    pub fn is_empty(&self) -> bool {
        self.central.is_empty()
    }

    /// Write the central directory and the end record, returning the archive.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let entries = len_u16(self.central.len(), "entry count")?;
        let cd_offset = fits_u32(self.out.len() as u64, "central directory")?;

        for header in &self.central {
            write_cdfh(&mut self.out, header)?;
        }

        let cd_size = fits_u32(self.out.len() as u64 - cd_offset as u64, "central directory")?;
        EndOfCentralDirectory::new(entries, cd_size, cd_offset).write_to(&mut self.out)?;
        Ok(self.out)
    }
}

fn write_cdfh(out: &mut Vec<u8>, header: &ZipFileEntry) -> Result<()> {
    let name = header.raw_name.as_slice();
    out.write_all(CDFH_SIGNATURE)?;
    out.write_u16::<LittleEndian>(header.version_made_by)?;
    out.write_u16::<LittleEndian>(header.version_needed)?;
    out.write_u16::<LittleEndian>(header.flags)?;
    out.write_u16::<LittleEndian>(header.compression_method.as_u16())?;
    out.write_u16::<LittleEndian>(header.last_mod_time)?;
    out.write_u16::<LittleEndian>(header.last_mod_date)?;
    out.write_u32::<LittleEndian>(header.crc32)?;
    out.write_u32::<LittleEndian>(header.compressed_size as u32)?;
    out.write_u32::<LittleEndian>(header.uncompressed_size as u32)?;
    out.write_u16::<LittleEndian>(len_u16(name.len(), "file name")?)?;
    out.write_u16::<LittleEndian>(len_u16(header.extra_field.len(), "extra field")?)?;
    out.write_u16::<LittleEndian>(len_u16(header.file_comment.len(), "file comment")?)?;
    out.write_u16::<LittleEndian>(0)?; // disk number start
    out.write_u16::<LittleEndian>(header.internal_attrs)?;
    out.write_u32::<LittleEndian>(header.external_attrs)?;
    out.write_u32::<LittleEndian>(header.lfh_offset as u32)?;
    out.write_all(name)?;
    out.write_all(&header.extra_field)?;
    out.write_all(&header.file_comment)?;
    Ok(())
}

fn fits_u32(value: u64, what: &str) -> Result<u32> {
    // 0xFFFFFFFF itself is the ZIP64 marker
    if value >= u32::MAX as u64 {
        return Err(too_large(what));
    }
    Ok(value as u32)
}

fn len_u16(value: usize, what: &str) -> Result<u16> {
    if value >= u16::MAX as usize {
        return Err(too_large(what));
    }
    Ok(value as u16)
}

fn too_large(what: &str) -> Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("{} too large for a ZIP archive without ZIP64 records", what),
    )
    .into()
}
