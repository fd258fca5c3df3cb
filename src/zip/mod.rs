//! ZIP archive reading and writing.
//!
//! A tome is a plain ZIP archive. This module is the container codec the rest
//! of the crate sits on.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`extractor`]: Decoding of entry data with CRC verification
//! - [`writer`]: Serialization of entries back into an archive
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Reading starts from the EOCD, then the Central Directory, then each
//! entry's Local File Header.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions when reading
//! - STORED (no compression) method
//! - DEFLATE compression method
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods
//! - ZIP64 records are never written

mod extractor;
mod parser;
mod structures;
mod writer;

pub use extractor::{ExtractedEntry, ZipExtractor, decode};
pub use parser::ZipParser;
pub use structures::*;
pub use writer::{ZipWriter, encode};
