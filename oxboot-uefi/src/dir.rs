//! Directory iteration over the EFI File Protocol
//!
//! Reading from an open directory handle yields successive
//! `EFI_FILE_INFO` records; the handle's cursor tracks how far
//! enumeration has progressed across calls.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::Error;
use crate::file::{File, FileInfo, FILE_INFO_SIZE};
use crate::fs::FsRoot;

/// Upper bound on entries enumerated from one directory.
pub const MAX_DIR_ENTRIES: usize = 512;

/// Longest file name accounted for in the per-entry read buffer, in
/// UTF-16 units.
pub const MAX_FILE_NAME: usize = 255;

/// A directory entry.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub info: FileInfo,
}

impl DirEntry {
    /// The name of the file or subdirectory described by the entry.
    #[must_use]
    pub fn name(&self) -> &str {
        self.info.name()
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.info.is_dir()
    }
}

impl File {
    /// Read up to `n` directory entries, continuing from the cursor; a
    /// negative `n` reads the remainder of the directory.
    pub fn read_dir(&mut self, n: isize) -> Result<Vec<DirEntry>, Error> {
        let info = self.stat()?;

        if !info.is_dir() {
            return Err(Error::InvalidArgument("not a directory"));
        }

        let end = if n < 0 {
            MAX_DIR_ENTRIES - self.cursor
        } else {
            n as usize
        };

        let mut entries = Vec::new();

        for _ in self.cursor..end {
            let mut buf = vec![0u8; FILE_INFO_SIZE + MAX_FILE_NAME * 2];
            let read = self.read(&mut buf)?;

            if read == 0 {
                break;
            }

            entries.push(DirEntry {
                info: FileInfo::parse(&buf[..read])?,
            });
        }

        self.cursor += entries.len();
        Ok(entries)
    }
}

impl FsRoot {
    /// List the contents of the named directory.
    pub fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, Error> {
        let mut dir = self.open(path)?;
        dir.read_dir(-1)
    }
}
