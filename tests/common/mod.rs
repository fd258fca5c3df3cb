//! Hand-built ZIP archives for integration tests.
//!
//! The fixtures are written byte by byte rather than through the crate's own
//! writer, so loading them exercises the reader against an independent
//! encoding.

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// One entry of a fixture archive.
pub struct FixtureEntry {
    pub name: Vec<u8>,
    pub data: Vec<u8>,
    pub flags: u16,
    pub method: u16,
    pub crc: Option<u32>,
    /// Sizes and offset moved into a ZIP64 extra record, with the 32-bit
    /// header fields saturated.
    pub zip64_uncompressed: Option<u64>,
    pub zip64_offset: Option<u64>,
}

impl FixtureEntry {
    pub fn stored(name: &str, data: &[u8]) -> Self {
        Self::raw_named(name.as_bytes(), data)
    }

    /// An entry whose name bytes are written as given, whatever the encoding.
    pub fn raw_named(name: &[u8], data: &[u8]) -> Self {
        Self {
            name: name.to_vec(),
            data: data.to_vec(),
            flags: 0,
            method: 0,
            crc: None,
            zip64_uncompressed: None,
            zip64_offset: None,
        }
    }

    /// An explicit directory record (`name/`, no data).
    pub fn directory(name: &str) -> Self {
        Self::stored(&format!("{}/", name.trim_end_matches('/')), b"")
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_method(mut self, method: u16) -> Self {
        self.method = method;
        self
    }

    pub fn with_crc(mut self, crc: u32) -> Self {
        self.crc = Some(crc);
        self
    }

    pub fn with_zip64_uncompressed(mut self, size: u64) -> Self {
        self.zip64_uncompressed = Some(size);
        self
    }

    pub fn with_zip64_offset(mut self, offset: u64) -> Self {
        self.zip64_offset = Some(offset);
        self
    }

    /// The ZIP64 extra record, in field order, if any field moved there.
    fn zip64_extra(&self) -> Vec<u8> {
        let fields: Vec<u64> = [self.zip64_uncompressed, self.zip64_offset]
            .into_iter()
            .flatten()
            .collect();
        if fields.is_empty() {
            return Vec::new();
        }
        let mut extra = Vec::new();
        extra.write_u16::<LittleEndian>(0x0001).unwrap();
        extra.write_u16::<LittleEndian>(fields.len() as u16 * 8).unwrap();
        for field in fields {
            extra.write_u64::<LittleEndian>(field).unwrap();
        }
        extra
    }
}

/// Builds an archive of stored entries.
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let entries: Vec<_> = entries
        .iter()
        .map(|(name, data)| FixtureEntry::stored(name, data))
        .collect();
    build_zip_from(&entries)
}

pub fn build_zip_from(entries: &[FixtureEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();

    for entry in entries {
        let offset = out.len() as u32;
        let crc = entry.crc.unwrap_or_else(|| crc32fast::hash(&entry.data));
        let size = entry.data.len() as u32;
        let name = entry.name.as_slice();
        let extra = entry.zip64_extra();

        // local file header
        out.write_all(b"PK\x03\x04").unwrap();
        out.write_u16::<LittleEndian>(20).unwrap();
        out.write_u16::<LittleEndian>(entry.flags).unwrap();
        out.write_u16::<LittleEndian>(entry.method).unwrap();
        out.write_u16::<LittleEndian>(0x6000).unwrap(); // 12:00
        out.write_u16::<LittleEndian>(0x5A21).unwrap(); // 2025-01-01
        out.write_u32::<LittleEndian>(crc).unwrap();
        out.write_u32::<LittleEndian>(size).unwrap();
        out.write_u32::<LittleEndian>(size).unwrap();
        out.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_all(name).unwrap();
        out.write_all(&entry.data).unwrap();

        // central directory header
        central.write_all(b"PK\x01\x02").unwrap();
        central.write_u16::<LittleEndian>(20).unwrap();
        central.write_u16::<LittleEndian>(20).unwrap();
        central.write_u16::<LittleEndian>(entry.flags).unwrap();
        central.write_u16::<LittleEndian>(entry.method).unwrap();
        central.write_u16::<LittleEndian>(0x6000).unwrap();
        central.write_u16::<LittleEndian>(0x5A21).unwrap();
        central.write_u32::<LittleEndian>(crc).unwrap();
        central.write_u32::<LittleEndian>(size).unwrap();
        let uncompressed = match entry.zip64_uncompressed {
            Some(_) => u32::MAX,
            None => size,
        };
        central.write_u32::<LittleEndian>(uncompressed).unwrap();
        central.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        central.write_u16::<LittleEndian>(extra.len() as u16).unwrap();
        central.write_u16::<LittleEndian>(0).unwrap(); // comment
        central.write_u16::<LittleEndian>(0).unwrap(); // disk
        central.write_u16::<LittleEndian>(0).unwrap(); // internal attrs
        central.write_u32::<LittleEndian>(0).unwrap(); // external attrs
        let lfh_offset = match entry.zip64_offset {
            Some(_) => u32::MAX,
            None => offset,
        };
        central.write_u32::<LittleEndian>(lfh_offset).unwrap();
        central.write_all(name).unwrap();
        central.write_all(&extra).unwrap();
    }

    let cd_offset = out.len() as u32;
    out.extend_from_slice(&central);

    out.write_all(b"PK\x05\x06").unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u16::<LittleEndian>(entries.len() as u16).unwrap();
    out.write_u16::<LittleEndian>(entries.len() as u16).unwrap();
    out.write_u32::<LittleEndian>(central.len() as u32).unwrap();
    out.write_u32::<LittleEndian>(cd_offset).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out
}

/// A comic volume with two chapters whose listed order is the reverse of
/// their chapter numbers.
pub fn comic_volume() -> Vec<u8> {
    build_zip(&[
        (
            "tome.json",
            br#"{"type":"comic_volume","title":"Heroes Vol. 1","chapters_file":"/chapters.json","x-publisher-id":42}"#,
        ),
        (
            "chapters.json",
            br#"[{"path":"ch1/pages.json","chapter_number":2,"title":"Later"},{"path":"ch2","chapter_number":1,"title":"First"}]"#,
        ),
        ("ch1/pages.json", br#"[{"file":"p1.jpg","page":1},{"file":"p2.jpg","page":2}]"#),
        ("ch1/p1.jpg", b"\xFF\xD8one"),
        ("ch1/p2.jpg", b"\xFF\xD8two"),
        ("ch2/b.jpg", b"\xFF\xD8b"),
        ("ch2/a.jpg", b"\xFF\xD8a"),
    ])
}
