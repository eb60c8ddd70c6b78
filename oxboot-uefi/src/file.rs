//! EFI File Protocol

use alloc::string::String;
use alloc::vec;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::codec;
use crate::error::Error;
use crate::guid::Guid;
use crate::invoke;
use crate::runtime::Time;
use crate::status::{self, EFI_DEVICE_ERROR};

pub const FILE_INFO_ID: Guid = Guid::from_fields(
    0x09576e92,
    0x6d3f,
    0x11d2,
    [0x8e, 0x39, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b],
);

pub const FILE_PROTOCOL_REVISION: u64 = 0x00010000;
pub const FILE_PROTOCOL_REVISION2: u64 = 0x00020000;

pub const FILE_MODE_READ: u64 = 0x0000000000000001;
pub const FILE_DIRECTORY: u64 = 0x0000000000000010;

/// Fixed-length prefix of an `EFI_FILE_INFO` record.
pub(crate) const FILE_INFO_SIZE: usize = core::mem::size_of::<FileInfoRaw>();

/// An EFI File Protocol instance: eleven table slots.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy)]
#[repr(C)]
pub(crate) struct FileProtocol {
    pub revision: u64,
    pub open: u64,
    pub close: u64,
    pub delete: u64,
    pub read: u64,
    pub write: u64,
    pub get_position: u64,
    pub set_position: u64,
    pub get_info: u64,
    pub set_info: u64,
    pub flush: u64,
}

/// The fixed-layout prefix of `EFI_FILE_INFO`; a variable-length UTF-16
/// file name follows it.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy)]
#[repr(C)]
pub struct FileInfoRaw {
    pub size: u64,
    pub file_size: u64,
    pub physical_size: u64,
    pub create_time: Time,
    pub last_access_time: Time,
    pub modification_time: Time,
    pub attribute: u64,
}

/// File metadata, as returned by `Stat`.
#[derive(Debug, Clone)]
pub struct FileInfo {
    name: String,
    raw: FileInfoRaw,
}

impl FileInfo {
    pub(crate) fn new(name: String, raw: FileInfoRaw) -> Self {
        Self { name, raw }
    }

    /// Parse an `EFI_FILE_INFO` record: fixed prefix plus trailing name.
    pub(crate) fn parse(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < FILE_INFO_SIZE {
            return Err(Error::Protocol("EFI_FILE_INFO size"));
        }

        let raw = FileInfoRaw::read_from_bytes(&buf[..FILE_INFO_SIZE])
            .map_err(|_| Error::Protocol("EFI_FILE_INFO layout"))?;

        let name = codec::utf16_decode(&buf[FILE_INFO_SIZE..]);

        Ok(Self { name, raw })
    }

    /// The name of the file as presented to `Open`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file length in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.raw.file_size
    }

    /// Whether this entry describes a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.raw.attribute & FILE_DIRECTORY > 0
    }

    /// The file modification time.
    #[must_use]
    pub fn modification_time(&self) -> Time {
        self.raw.modification_time
    }

    /// The raw attribute word.
    #[must_use]
    pub fn attribute(&self) -> u64 {
        self.raw.attribute
    }
}

/// An open file on the ESP.
///
/// Owns the firmware handle until dropped; the directory read cursor
/// lives here as well.
pub struct File {
    pub(crate) proto: FileProtocol,
    pub(crate) addr: u64,
    pub(crate) name: String,
    pub(crate) cursor: usize,
}

impl File {
    pub(crate) fn from_addr(addr: u64, name: String) -> Result<Self, Error> {
        let proto: FileProtocol = codec::decode(addr)?;

        if proto.revision != FILE_PROTOCOL_REVISION && proto.revision != FILE_PROTOCOL_REVISION2 {
            return Err(Error::Protocol("EFI File Protocol revision"));
        }

        Ok(Self {
            proto,
            addr,
            name,
            cursor: 0,
        })
    }

    /// Call `EFI_FILE_PROTOCOL.Open()` relative to this handle.
    pub fn open(&self, name: &str, mode: u64) -> Result<File, Error> {
        let file_name = codec::utf16_encode(name);
        let mut addr = 0u64;

        // SAFETY: the slot holds this handle's Open entry; file_name and
        // addr live across the call on this frame.
        let s = unsafe {
            invoke::call(
                invoke::ptrval(&self.proto.open),
                &[
                    self.addr,
                    invoke::ptrval_mut(&mut addr),
                    file_name.as_ptr() as u64,
                    mode,
                    0,
                ],
            )
        };

        status::check(s)?;
        File::from_addr(addr, String::from(name))
    }

    /// Read up to `buf.len()` bytes from the current position.
    ///
    /// Returns `Ok(0)` at end of file: the UEFI specification conflates
    /// `EFI_DEVICE_ERROR` and zero-length reads there.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.addr == 0 {
            return Err(Error::InvalidArgument("file instance"));
        }

        let mut size = buf.len() as u64;

        // SAFETY: the slot holds this handle's Read entry; size and buf
        // live across the call.
        let s = unsafe {
            invoke::call(
                invoke::ptrval(&self.proto.read),
                &[
                    self.addr,
                    invoke::ptrval_mut(&mut size),
                    buf.as_mut_ptr() as u64,
                ],
            )
        };

        if status::code(s) == EFI_DEVICE_ERROR || size == 0 {
            return Ok(0);
        }

        status::check(s)?;
        Ok(size as usize)
    }

    /// Call `EFI_FILE_PROTOCOL.GetInfo()` and return the file metadata.
    pub fn stat(&self) -> Result<FileInfo, Error> {
        if self.addr == 0 {
            return Err(Error::InvalidArgument("file instance"));
        }

        let mut buf = vec![0u8; FILE_INFO_SIZE + 512];
        let mut size = buf.len() as u64;

        // SAFETY: the slot holds this handle's GetInfo entry; the GUID,
        // size and buf live across the call.
        let s = unsafe {
            invoke::call(
                invoke::ptrval(&self.proto.get_info),
                &[
                    self.addr,
                    FILE_INFO_ID.as_ptr() as u64,
                    invoke::ptrval_mut(&mut size),
                    buf.as_mut_ptr() as u64,
                ],
            )
        };

        status::check(s)?;

        let mut info = FileInfo::parse(&buf[..size as usize])?;
        if info.name.is_empty() || info.name == "\\" {
            info.name = self.name.clone();
        }

        Ok(info)
    }

    fn close(&self) {
        if self.addr == 0 {
            return;
        }

        // SAFETY: the slot holds this handle's Close entry.
        let _ = unsafe { invoke::call(invoke::ptrval(&self.proto.close), &[self.addr]) };
    }
}

impl Drop for File {
    fn drop(&mut self) {
        self.close();
    }
}
