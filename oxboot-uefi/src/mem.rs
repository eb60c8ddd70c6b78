//! EFI Memory Map

use alloc::vec;
use alloc::vec::Vec;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::boot::BootServices;
use crate::error::Error;
use crate::invoke;
use crate::status;

/// EFI Boot Services offset for GetMemoryMap.
const GET_MEMORY_MAP: u64 = 0x38;

/// Memory map buffer headroom, in descriptors.
const MAX_ENTRIES: usize = 1000;

/// The EFI page size in bytes.
pub const PAGE_SIZE: usize = 4096;

/// An EFI Memory Descriptor.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct MemoryDescriptor {
    pub memory_type: u32,
    _reserved0: u32,
    pub physical_start: u64,
    pub virtual_start: u64,
    pub number_of_pages: u64,
    pub attribute: u64,
    _reserved1: u64,
}

impl MemoryDescriptor {
    #[must_use]
    pub fn new(memory_type: u32, physical_start: u64, number_of_pages: u64) -> Self {
        Self {
            memory_type,
            _reserved0: 0,
            physical_start,
            virtual_start: 0,
            number_of_pages,
            attribute: 0,
            _reserved1: 0,
        }
    }

    /// The descriptor physical end address.
    #[must_use]
    pub fn physical_end(&self) -> u64 {
        self.physical_start + self.number_of_pages * PAGE_SIZE as u64
    }

    /// The descriptor size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.number_of_pages * PAGE_SIZE as u64
    }
}

/// An EFI Memory Map snapshot.
///
/// The `map_key` is valid only until any allocation changes the map; the
/// exit handshake re-acquires the map immediately before
/// `ExitBootServices`.
#[derive(Debug)]
pub struct MemoryMap {
    pub descriptors: Vec<MemoryDescriptor>,
    pub map_key: u64,
    pub descriptor_size: u64,
    pub descriptor_version: u32,

    map_size: u64,
    buf: Vec<u8>,
}

impl MemoryMap {
    /// The memory map buffer address, as the kernel consumes it.
    #[must_use]
    pub fn address(&self) -> u64 {
        self.buf.as_ptr() as u64
    }

    /// The used prefix of the buffer, in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.map_size
    }

    /// Assemble a memory map from a buffer previously filled by
    /// firmware (or synthesized for tests).
    pub fn from_buffer(
        buf: Vec<u8>,
        map_size: u64,
        map_key: u64,
        descriptor_size: u64,
        descriptor_version: u32,
    ) -> Result<Self, Error> {
        Self::parse(
            buf,
            RawMap {
                map_size,
                map_key,
                descriptor_size,
                descriptor_version,
            },
        )
    }

    pub(crate) fn parse(
        buf: Vec<u8>,
        raw: RawMap,
    ) -> Result<Self, Error> {
        let stride = raw.descriptor_size as usize;
        let used = raw.map_size as usize;

        if stride < core::mem::size_of::<MemoryDescriptor>() || used % stride != 0 {
            return Err(Error::Protocol("memory descriptor size"));
        }

        let mut descriptors = Vec::with_capacity(used / stride);

        for chunk in buf[..used].chunks_exact(stride) {
            let desc = MemoryDescriptor::read_from_bytes(
                &chunk[..core::mem::size_of::<MemoryDescriptor>()],
            )
            .map_err(|_| Error::Protocol("memory descriptor layout"))?;

            descriptors.push(desc);
        }

        Ok(Self {
            descriptors,
            map_key: raw.map_key,
            descriptor_size: raw.descriptor_size,
            descriptor_version: raw.descriptor_version,
            map_size: raw.map_size,
            buf,
        })
    }
}

/// Raw out-parameters of a GetMemoryMap call.
pub(crate) struct RawMap {
    pub map_size: u64,
    pub map_key: u64,
    pub descriptor_size: u64,
    pub descriptor_version: u32,
}

impl BootServices {
    /// Call `EFI_BOOT_SERVICES.GetMemoryMap()`.
    pub fn get_memory_map(&self) -> Result<MemoryMap, Error> {
        let mut buf = vec![0u8; core::mem::size_of::<MemoryDescriptor>() * MAX_ENTRIES];
        let token = invoke::lock();
        let raw = self.memory_map_raw(&token, &mut buf)?;
        drop(token);

        MemoryMap::parse(buf, raw)
    }

    /// The raw call, for use inside the exit critical section. No
    /// allocation happens between entry and return.
    pub(crate) fn memory_map_raw(
        &self,
        token: &invoke::Token,
        buf: &mut [u8],
    ) -> Result<RawMap, Error> {
        let slot = self.slot(GET_MEMORY_MAP)?;

        let mut map_size = buf.len() as u64;
        let mut map_key = 0u64;
        let mut descriptor_size = 0u64;
        let mut descriptor_version = 0u32;

        // SAFETY: the slot is a live Boot Services entry; all pointer
        // arguments address locals or the caller's buffer, live across
        // the call.
        let s = unsafe {
            invoke::call_locked(
                token,
                slot,
                &[
                    invoke::ptrval_mut(&mut map_size),
                    buf.as_mut_ptr() as u64,
                    invoke::ptrval_mut(&mut map_key),
                    invoke::ptrval_mut(&mut descriptor_size),
                    invoke::ptrval_mut(&mut descriptor_version),
                ],
            )
        };

        status::check(s).map_err(|err| match err {
            Error::BufferTooSmall { .. } => Error::BufferTooSmall {
                needed: map_size as usize,
            },
            other => other,
        })?;

        Ok(RawMap {
            map_size,
            map_key,
            descriptor_size,
            descriptor_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_layout() {
        assert_eq!(core::mem::size_of::<MemoryDescriptor>(), 48);
    }

    #[test]
    fn test_descriptor_bounds() {
        let d = MemoryDescriptor::new(7, 0x10_0000, 16);
        assert_eq!(d.size(), 16 * 4096);
        assert_eq!(d.physical_end(), 0x10_0000 + 16 * 4096);
        assert!(d.physical_end() > d.physical_start);
    }

    #[test]
    fn test_parse_with_firmware_stride() {
        // firmware may report a stride larger than the struct
        let stride = 56usize;
        let mut buf = vec![0u8; stride * 3];

        for (i, desc) in [
            MemoryDescriptor::new(7, 0x1000, 10),
            MemoryDescriptor::new(2, 0xb000, 5),
        ]
        .iter()
        .enumerate()
        {
            buf[i * stride..i * stride + 48].copy_from_slice(desc.as_bytes());
        }

        let map = MemoryMap::parse(
            buf,
            RawMap {
                map_size: (stride * 2) as u64,
                map_key: 9,
                descriptor_size: stride as u64,
                descriptor_version: 1,
            },
        )
        .unwrap();

        assert_eq!(map.descriptors.len(), 2);
        assert_eq!(map.descriptors[0].physical_start, 0x1000);
        assert_eq!(map.descriptors[1].number_of_pages, 5);
        assert_eq!(map.map_key, 9);
    }

    #[test]
    fn test_parse_rejects_ragged_size() {
        let buf = vec![0u8; 96];
        let raw = RawMap {
            map_size: 50,
            map_key: 0,
            descriptor_size: 48,
            descriptor_version: 1,
        };

        assert!(MemoryMap::parse(buf, raw).is_err());
    }

    #[test]
    fn test_total_pages_match_sizes() {
        let descriptors = [
            MemoryDescriptor::new(7, 0x1000, 10),
            MemoryDescriptor::new(4, 0x100000, 32),
        ];

        let pages: u64 = descriptors.iter().map(|d| d.number_of_pages * 4096).sum();
        let sizes: u64 = descriptors.iter().map(MemoryDescriptor::size).sum();
        assert_eq!(pages, sizes);
    }
}
