use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::io::{Cursor, Write};

use crate::{Error, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompressionMethod::Stored => "Stored",
            CompressionMethod::Deflate => "Defl:N",
            CompressionMethod::Unknown(_) => "Unk",
        }
    }
}

/// General purpose bit flags we act on.
pub mod flags {
    /// Entry data is encrypted.
    pub const ENCRYPTED: u16 = 0x0001;
    /// Sizes and CRC follow the data in a data descriptor.
    pub const DATA_DESCRIPTOR: u16 = 0x0008;
    /// File name and comment are UTF-8.
    pub const UTF8_NAMES: u16 = 0x0800;
}

/// Extra field header id of the ZIP64 extended information record.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::corrupt("invalid end of central directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Single-disk record for an archive without a comment.
    pub fn new(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(self.comment_len)
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }

    pub fn is_multi_disk(&self) -> bool {
        self.disk_number != 0 || self.disk_with_cd != 0
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::corrupt("invalid ZIP64 locator"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::corrupt("invalid ZIP64 end of central directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Version 2.0: deflate and directories.
pub const VERSION_NEEDED_DEFAULT: u16 = 20;
/// Made by UNIX, APPNOTE version 2.0. Keeps external attributes meaningful.
pub const VERSION_MADE_BY_DEFAULT: u16 = (3 << 8) | 20;
/// `-rw-r--r--` regular file, in the high word of the external attributes.
pub const EXTERNAL_ATTRS_DEFAULT: u32 = 0o100644 << 16;

/// Parsed ZIP file entry information
///
/// Everything needed to write the entry back unchanged is kept, except the
/// ZIP64 extra record, which is stripped on load.
///
/// `file_name` is the decoded name; `raw_name` holds the bytes written to the
/// headers, which stay as loaded until the entry is renamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub raw_name: Vec<u8>,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub extra_field: Vec<u8>,
    pub file_comment: Vec<u8>,
    pub is_directory: bool,
}

impl ZipFileEntry {
    /// Metadata for a freshly written file entry.
    pub fn new_file(
        file_name: String,
        compression_method: CompressionMethod,
        modified: DosDateTime,
    ) -> Self {
        let flags = if file_name.is_ascii() {
            0
        } else {
            flags::UTF8_NAMES
        };
        Self {
            raw_name: file_name.as_bytes().to_vec(),
            file_name,
            version_made_by: VERSION_MADE_BY_DEFAULT,
            version_needed: VERSION_NEEDED_DEFAULT,
            flags,
            compression_method,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: 0,
            last_mod_time: modified.time,
            last_mod_date: modified.date,
            internal_attrs: 0,
            external_attrs: EXTERNAL_ATTRS_DEFAULT,
            extra_field: Vec::new(),
            file_comment: Vec::new(),
            is_directory: false,
        }
    }

    /// Replaces the name, writing it as UTF-8 from now on.
    pub fn set_name(&mut self, name: &str) {
        self.file_name = name.to_string();
        self.raw_name = name.as_bytes().to_vec();
        if name.is_ascii() {
            self.flags &= !flags::UTF8_NAMES;
        } else {
            self.flags |= flags::UTF8_NAMES;
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & flags::ENCRYPTED != 0
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// Decodes a header name.
///
/// Names flagged UTF-8 must be valid UTF-8. Unflagged names are taken as
/// UTF-8 when they decode cleanly and as IBM code page 437 otherwise.
pub fn decode_name(raw: &[u8], general_flags: u16) -> Option<String> {
    match std::str::from_utf8(raw) {
        Ok(name) => Some(name.to_string()),
        Err(_) if general_flags & flags::UTF8_NAMES != 0 => None,
        Err(_) => Some(
            raw.iter()
                .map(|&b| match b {
                    0x00..=0x7F => b as char,
                    _ => CP437_HIGH[(b - 0x80) as usize],
                })
                .collect(),
        ),
    }
}

/// Code page 437 bytes 0x80..=0xFF.
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

/// MS-DOS packed timestamp as stored in ZIP headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable instant.
    pub const EPOCH: DosDateTime = DosDateTime {
        time: 0,
        date: (1 << 5) | 1,
    };

    /// Packs a calendar time. Instants outside 1980..=2107 clamp to the range ends.
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        let year = dt.year();
        if year < 1980 {
            return Self::EPOCH;
        }
        if year > 2107 {
            return Self {
                time: (23 << 11) | (59 << 5) | 29,
                date: (127 << 9) | (12 << 5) | 31,
            };
        }
        Self {
            time: ((dt.hour() as u16) << 11)
                | ((dt.minute() as u16) << 5)
                | (dt.second() as u16 / 2),
            date: (((year - 1980) as u16) << 9) | ((dt.month() as u16) << 5) | dt.day() as u16,
        }
    }

    /// Current local time.
    pub fn now() -> Self {
        Self::from_datetime(&chrono::Local::now().naive_local())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_dos_datetime_round_trips_through_entry() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(13, 45, 30)
            .unwrap();
        let entry = ZipFileEntry::new_file(
            "a.txt".into(),
            CompressionMethod::Stored,
            DosDateTime::from_datetime(&dt),
        );
        assert_eq!(entry.mod_date(), (2024, 3, 1));
        assert_eq!(entry.mod_time(), (13, 45, 30));
    }

    #[test]
    fn test_decode_name() {
        assert_eq!(decode_name(b"pages/a.jpg", 0).as_deref(), Some("pages/a.jpg"));
        assert_eq!(
            decode_name("caf\u{e9}.txt".as_bytes(), flags::UTF8_NAMES).as_deref(),
            Some("caf\u{e9}.txt")
        );
        assert_eq!(decode_name(b"\x82t\x81.jpg", 0).as_deref(), Some("\u{e9}t\u{fc}.jpg"));
        assert_eq!(decode_name(b"\xFF", 0).as_deref(), Some("\u{a0}"));
        assert_eq!(decode_name(b"\x82.jpg", flags::UTF8_NAMES), None);
    }

    #[test]
    fn test_set_name_tracks_utf8_flag() {
        let mut entry =
            ZipFileEntry::new_file("a.txt".into(), CompressionMethod::Stored, DosDateTime::EPOCH);
        entry.set_name("\u{e9}.txt");
        assert_eq!(entry.raw_name, "\u{e9}.txt".as_bytes());
        assert_ne!(entry.flags & flags::UTF8_NAMES, 0);
        entry.set_name("b.txt");
        assert_eq!(entry.raw_name, b"b.txt");
        assert_eq!(entry.flags & flags::UTF8_NAMES, 0);
    }

    #[test]
    fn test_dos_datetime_clamps_before_1980() {
        let dt = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(DosDateTime::from_datetime(&dt), DosDateTime::EPOCH);
    }

    #[test]
    fn test_eocd_write_then_parse() {
        let mut buf = Vec::new();
        EndOfCentralDirectory::new(3, 150, 4096)
            .write_to(&mut buf)
            .unwrap();
        assert_eq!(buf.len(), EndOfCentralDirectory::SIZE);

        let eocd = EndOfCentralDirectory::from_bytes(&buf).unwrap();
        assert_eq!(eocd.total_entries, 3);
        assert_eq!(eocd.cd_size, 150);
        assert_eq!(eocd.cd_offset, 4096);
        assert!(!eocd.is_zip64());
        assert!(!eocd.is_multi_disk());
    }

    #[test]
    fn test_eocd_rejects_bad_signature() {
        let buf = [0u8; EndOfCentralDirectory::SIZE];
        assert!(matches!(
            EndOfCentralDirectory::from_bytes(&buf),
            Err(Error::CorruptArchive(_))
        ));
    }

    #[test]
    fn test_non_ascii_names_set_utf8_flag() {
        let entry = ZipFileEntry::new_file(
            "日本語.txt".into(),
            CompressionMethod::Deflate,
            DosDateTime::EPOCH,
        );
        assert_eq!(entry.flags & flags::UTF8_NAMES, flags::UTF8_NAMES);
    }
}
