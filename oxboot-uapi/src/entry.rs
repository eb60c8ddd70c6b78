//! Type #1 Boot Loader Entry parsing

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use oxboot_uefi::{Error as UefiError, Volume};

/// Errors raised while loading a boot entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    /// The entry file itself could not be read.
    Read { path: String, source: UefiError },
    /// A line referenced a blob that could not be loaded; the offending
    /// line is attached.
    Line { line: String, source: UefiError },
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "error reading entry file {path}, {source}")
            }
            Self::Line { line, source } => {
                write!(f, "error parsing entry line, {source} line:{line}")
            }
        }
    }
}

/// The contents loaded from a Type #1 Boot Loader Entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Human-readable entry title; the last occurrence wins.
    pub title: String,
    /// The kernel image to execute; a duplicate key replaces it.
    pub linux: Vec<u8>,
    /// The ramdisk cpio image; multiple keys concatenate in order.
    pub initrd: Vec<u8>,
    /// Kernel parameters; multiple keys concatenate verbatim.
    pub options: String,

    parsed: String,
    ignored: String,
}

impl Entry {
    /// The successfully parsed entry lines.
    #[must_use]
    pub fn parsed(&self) -> &str {
        &self.parsed
    }

    /// The entry lines preserved verbatim but not interpreted.
    #[must_use]
    pub fn ignored(&self) -> &str {
        &self.ignored
    }

    fn parse_line<V: Volume>(&mut self, volume: &V, line: &str) -> Result<(), UefiError> {
        let Some((key, value)) = line.split_once(' ') else {
            return Ok(());
        };

        let value = value.trim_end_matches(['\n', '\r']).trim();

        match key {
            "title" => self.title = value.to_string(),
            "linux" => self.linux = volume.read_file(value)?,
            "initrd" => {
                let initrd = volume.read_file(value)?;
                self.initrd.extend_from_slice(&initrd);
            }
            "options" => self.options += value,
            _ => {
                self.ignored += line;
                return Ok(());
            }
        }

        self.parsed += line;
        Ok(())
    }
}

/// Parse a Type #1 Boot Loader Entry from `path` and load each
/// referenced blob from `volume`.
pub fn load_entry<V: Volume>(volume: &V, path: &str) -> Result<Entry, EntryError> {
    let raw = volume.read_file(path).map_err(|source| EntryError::Read {
        path: path.to_string(),
        source,
    })?;

    let text = String::from_utf8_lossy(&raw);
    let mut entry = Entry::default();

    for line in lines_inclusive(&text) {
        entry
            .parse_line(volume, line)
            .map_err(|source| EntryError::Line {
                line: line.to_string(),
                source,
            })?;
    }

    Ok(entry)
}

/// Iterate over lines keeping their terminators, so parsed and ignored
/// content is preserved byte-for-byte.
fn lines_inclusive(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;

    core::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }

        let split = match rest.find('\n') {
            Some(i) => i + 1,
            None => rest.len(),
        };

        let (line, tail) = rest.split_at(split);
        rest = tail;
        Some(line)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    struct MapVolume(Vec<(&'static str, Vec<u8>)>);

    impl Volume for MapVolume {
        fn read_file(&self, path: &str) -> Result<Vec<u8>, UefiError> {
            self.0
                .iter()
                .find(|(name, _)| *name == path)
                .map(|(_, data)| data.clone())
                .ok_or(UefiError::NotFound)
        }
    }

    fn volume() -> MapVolume {
        MapVolume(vec![
            (
                "/loader/entries/arch.conf",
                b"title Arch\nlinux /vmlinuz-linux\ninitrd /initramfs-linux.img\noptions root=UUID=3659 rw\n".to_vec(),
            ),
            ("/vmlinuz-linux", b"MZkernel".to_vec()),
            ("/initramfs-linux.img", b"ramdisk".to_vec()),
            ("/amd-ucode.img", b"ucode".to_vec()),
        ])
    }

    #[test]
    fn test_load_entry() {
        let entry = load_entry(&volume(), "/loader/entries/arch.conf").unwrap();

        assert_eq!(entry.title, "Arch");
        assert_eq!(entry.linux, b"MZkernel");
        assert_eq!(entry.initrd, b"ramdisk");
        assert_eq!(entry.options, "root=UUID=3659 rw");
        assert_eq!(entry.ignored(), "");
    }

    #[test]
    fn test_multiple_initrds_concatenate() {
        let mut v = volume();
        v.0[0].1 =
            b"linux /vmlinuz-linux\ninitrd /amd-ucode.img\ninitrd /initramfs-linux.img\n".to_vec();

        let entry = load_entry(&v, "/loader/entries/arch.conf").unwrap();
        assert_eq!(entry.initrd, b"ucoderamdisk");
    }

    #[test]
    fn test_duplicate_linux_replaces() {
        let mut v = volume();
        v.0[0].1 = b"linux /initramfs-linux.img\nlinux /vmlinuz-linux\n".to_vec();

        let entry = load_entry(&v, "/loader/entries/arch.conf").unwrap();
        assert_eq!(entry.linux, b"MZkernel");
    }

    #[test]
    fn test_duplicate_title_last_wins() {
        let mut v = volume();
        v.0[0].1 = b"title first\ntitle second\n".to_vec();

        let entry = load_entry(&v, "/loader/entries/arch.conf").unwrap();
        assert_eq!(entry.title, "second");
    }

    #[test]
    fn test_options_concatenate_verbatim() {
        let mut v = volume();
        v.0[0].1 = b"options root=/dev/sda1\noptions quiet\n".to_vec();

        let entry = load_entry(&v, "/loader/entries/arch.conf").unwrap();
        assert_eq!(entry.options, "root=/dev/sda1quiet");
    }

    #[test]
    fn test_unknown_keys_preserved() {
        let mut v = volume();
        v.0[0].1 = b"title Arch\nefi /EFI/arch/linux.efi\nsort-key arch\n".to_vec();

        let entry = load_entry(&v, "/loader/entries/arch.conf").unwrap();
        assert_eq!(entry.ignored(), "efi /EFI/arch/linux.efi\nsort-key arch\n");
        assert_eq!(entry.parsed(), "title Arch\n");
    }

    #[test]
    fn test_crlf_values() {
        let mut v = volume();
        v.0[0].1 = b"title Arch\r\nlinux /vmlinuz-linux\r\n".to_vec();

        let entry = load_entry(&v, "/loader/entries/arch.conf").unwrap();
        assert_eq!(entry.title, "Arch");
        assert_eq!(entry.linux, b"MZkernel");
    }

    #[test]
    fn test_missing_blob_attaches_line() {
        let mut v = volume();
        v.0[0].1 = b"linux /missing\n".to_vec();

        let err = load_entry(&v, "/loader/entries/arch.conf").unwrap_err();
        match err {
            EntryError::Line { line, source } => {
                assert_eq!(line, "linux /missing\n");
                assert_eq!(source, UefiError::NotFound);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_entry_file() {
        let err = load_entry(&volume(), "/loader/entries/none.conf").unwrap_err();
        match err {
            EntryError::Read { path, .. } => assert_eq!(path, "/loader/entries/none.conf"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_lines_without_value_skipped() {
        let mut v = volume();
        v.0[0].1 = b"title\n\nlinux /vmlinuz-linux\n".to_vec();

        let entry = load_entry(&v, "/loader/entries/arch.conf").unwrap();
        assert_eq!(entry.title, "");
        assert_eq!(entry.linux, b"MZkernel");
    }
}
