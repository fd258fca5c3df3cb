//! Load-time limits for archives read from disk.

use std::path::Path;

use crate::{Error, Result};

/// Default ceiling on archive size: 500 MiB.
pub const DEFAULT_MAX_ARCHIVE_SIZE: u64 = 500 * 1024 * 1024;

/// File extension of tome archives.
pub const TOME_EXTENSION: &str = "tome";

/// Checks applied before an archive file is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadLimits {
    /// Largest accepted archive, in bytes.
    pub max_archive_size: u64,
    /// Reject files whose name does not end in `.tome`.
    pub require_tome_extension: bool,
}

impl Default for LoadLimits {
    fn default() -> Self {
        Self {
            max_archive_size: DEFAULT_MAX_ARCHIVE_SIZE,
            require_tome_extension: true,
        }
    }
}

impl LoadLimits {
    /// No extension check and no size ceiling.
    pub fn unrestricted() -> Self {
        Self {
            max_archive_size: u64::MAX,
            require_tome_extension: false,
        }
    }

    pub fn with_max_archive_size(mut self, bytes: u64) -> Self {
        self.max_archive_size = bytes;
        self
    }

    pub fn with_tome_extension(mut self, required: bool) -> Self {
        self.require_tome_extension = required;
        self
    }

    /// Validates the file name against the extension rule.
    pub fn check_name(&self, path: &Path) -> Result<()> {
        if !self.require_tome_extension {
            return Ok(());
        }
        let is_tome = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(TOME_EXTENSION));
        if is_tome {
            Ok(())
        } else {
            Err(Error::InvalidFileType {
                name: path.display().to_string(),
            })
        }
    }

    /// Validates an archive size against the ceiling.
    pub fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_archive_size {
            return Err(Error::FileTooLarge {
                size,
                limit: self.max_archive_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_check() {
        let limits = LoadLimits::default();
        assert!(limits.check_name(Path::new("series/vol1.tome")).is_ok());
        assert!(limits.check_name(Path::new("VOL1.TOME")).is_ok());
        assert!(matches!(
            limits.check_name(Path::new("vol1.zip")),
            Err(Error::InvalidFileType { .. })
        ));
        assert!(LoadLimits::unrestricted()
            .check_name(Path::new("vol1.zip"))
            .is_ok());
    }

    #[test]
    fn test_size_check() {
        let limits = LoadLimits::default().with_max_archive_size(10);
        assert!(limits.check_size(10).is_ok());
        assert!(matches!(
            limits.check_size(11),
            Err(Error::FileTooLarge { size: 11, limit: 10 })
        ));
    }
}
