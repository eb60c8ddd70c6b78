//! Simple File System view of the ESP
//!
//! [`FsRoot`] is a file-system-shaped handle on the EFI System
//! Partition: open, read, stat and directory listing over the Simple
//! File System and File protocols. Paths accept either separator;
//! firmware only speaks backslash.

use alloc::string::String;
use alloc::vec::Vec;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::codec;
use crate::error::Error;
use crate::file::{File, FILE_MODE_READ};
use crate::guid::Guid;
use crate::invoke;
use crate::path;
use crate::status;
use crate::Services;

pub const LOADED_IMAGE_PROTOCOL_GUID: Guid = Guid::from_fields(
    0x5b1b31a1,
    0x9562,
    0x11d2,
    [0x8e, 0x3f, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b],
);

pub const SIMPLE_FILE_SYSTEM_PROTOCOL_GUID: Guid = Guid::from_fields(
    0x964e5b22,
    0x6459,
    0x11d2,
    [0x8e, 0x39, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b],
);

pub const LOADED_IMAGE_PROTOCOL_REVISION: u32 = 0x00001000;
pub const SIMPLE_FILE_SYSTEM_PROTOCOL_REVISION: u64 = 0x00010000;

/// An EFI Loaded Image Protocol instance.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy)]
#[repr(C)]
pub(crate) struct LoadedImage {
    pub revision: u32,
    _reserved0: u32,
    pub parent_handle: u64,
    pub system_table: u64,
    pub device_handle: u64,
    pub file_path: u64,
    _reserved1: u64,
    pub load_options_size: u32,
    _reserved2: u32,
    pub load_options: u64,
    pub image_base: u64,
    pub image_size: u64,
    pub image_code_type: u32,
    pub image_data_type: u32,
    pub unload: u64,
}

/// An EFI Simple File System Protocol instance.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy)]
#[repr(C)]
pub(crate) struct SimpleFileSystem {
    pub revision: u64,
    pub open_volume: u64,
}

/// Read access to a boot volume, the seam consumed by entry loading and
/// the transparency validator.
pub trait Volume {
    /// Read the whole named file.
    fn read_file(&self, path: &str) -> Result<Vec<u8>, Error>;
}

/// Normalize a path for firmware: forward slashes become backslashes.
#[must_use]
pub fn normalize(path: &str) -> String {
    path.replace('/', "\\")
}

/// The ESP root volume of the running image.
pub struct FsRoot {
    image: LoadedImage,
    volume: File,
}

impl Services {
    fn loaded_image(&self) -> Result<LoadedImage, Error> {
        let addr = self
            .boot
            .handle_protocol(self.image_handle(), &LOADED_IMAGE_PROTOCOL_GUID)?;

        let image: LoadedImage = codec::decode(addr)?;

        if image.revision != LOADED_IMAGE_PROTOCOL_REVISION {
            return Err(Error::Protocol("EFI Loaded Image Protocol revision"));
        }

        Ok(image)
    }

    /// The load address and size of the running image, from the Loaded
    /// Image protocol.
    pub fn loaded_image_region(&self) -> Result<(u64, u64), Error> {
        let image = self.loaded_image()?;
        Ok((image.image_base, image.image_size))
    }

    /// Open the root volume of the device this image was loaded from.
    pub fn root(&self) -> Result<FsRoot, Error> {
        let image = self.loaded_image()?;

        let addr = self
            .boot
            .handle_protocol(image.device_handle, &SIMPLE_FILE_SYSTEM_PROTOCOL_GUID)?;

        let fs: SimpleFileSystem = codec::decode(addr)?;

        if fs.revision != SIMPLE_FILE_SYSTEM_PROTOCOL_REVISION {
            return Err(Error::Protocol("EFI Simple File System Protocol revision"));
        }

        let mut volume_addr = 0u64;

        // SAFETY: the slot holds the decoded OpenVolume entry; addr and
        // volume_addr live across the call on this frame.
        let s = unsafe {
            invoke::call(
                invoke::ptrval(&fs.open_volume),
                &[addr, invoke::ptrval_mut(&mut volume_addr)],
            )
        };

        status::check(s)?;

        let volume = File::from_addr(volume_addr, String::from("\\"))?;

        Ok(FsRoot { image, volume })
    }
}

impl FsRoot {
    /// Open the named file read-only.
    pub fn open(&self, name: &str) -> Result<File, Error> {
        self.volume.open(&normalize(name), FILE_MODE_READ)
    }

    /// The load address of the running image.
    #[must_use]
    pub fn image_base(&self) -> u64 {
        self.image.image_base
    }

    /// The size of the running image in bytes.
    #[must_use]
    pub fn image_size(&self) -> u64 {
        self.image.image_size
    }

    /// The handle of the device the image was loaded from.
    #[must_use]
    pub fn device_handle(&self) -> u64 {
        self.image.device_handle
    }

    /// Build the full EFI Device Path for the named file: the boot
    /// device's path prefix, a File Path node, and the terminator.
    pub fn file_path(&self, services: &Services, name: &str) -> Result<Vec<u8>, Error> {
        let addr = services
            .boot
            .handle_protocol(self.image.device_handle, &path::DEVICE_PATH_PROTOCOL_GUID)?;

        let (_, prefix) = path::parse(addr)?;

        Ok(path::with_file_path(&prefix, &normalize(name)))
    }
}

impl Volume for FsRoot {
    fn read_file(&self, name: &str) -> Result<Vec<u8>, Error> {
        let file = self.open(name)?;
        let info = file.stat()?;

        let mut buf = alloc::vec![0u8; info.size() as usize];
        let mut off = 0;

        while off < buf.len() {
            let n = file.read(&mut buf[off..])?;

            if n == 0 {
                break;
            }

            off += n;
        }

        buf.truncate(off);
        Ok(buf)
    }
}
