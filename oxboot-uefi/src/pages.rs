//! EFI Page Allocation

use crate::boot::BootServices;
use crate::error::Error;
use crate::invoke;
use crate::mem::PAGE_SIZE;
use crate::status;

// EFI Boot Services offsets
const ALLOCATE_PAGES: u64 = 0x28;
const FREE_PAGES: u64 = 0x30;

/// EFI_ALLOCATE_TYPE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AllocateType {
    AnyPages = 0,
    MaxAddress = 1,
    Address = 2,
}

/// EFI_MEMORY_TYPE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MemoryType {
    ReservedMemoryType = 0,
    LoaderCode = 1,
    LoaderData = 2,
    BootServicesCode = 3,
    BootServicesData = 4,
    RuntimeServicesCode = 5,
    RuntimeServicesData = 6,
    ConventionalMemory = 7,
    UnusableMemory = 8,
    AcpiReclaimMemory = 9,
    AcpiMemoryNvs = 10,
    MemoryMappedIo = 11,
    MemoryMappedIoPortSpace = 12,
    PalCode = 13,
    PersistentMemory = 14,
    UnacceptedMemoryType = 15,
}

impl MemoryType {
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::ReservedMemoryType,
            1 => Self::LoaderCode,
            2 => Self::LoaderData,
            3 => Self::BootServicesCode,
            4 => Self::BootServicesData,
            5 => Self::RuntimeServicesCode,
            6 => Self::RuntimeServicesData,
            7 => Self::ConventionalMemory,
            8 => Self::UnusableMemory,
            9 => Self::AcpiReclaimMemory,
            10 => Self::AcpiMemoryNvs,
            11 => Self::MemoryMappedIo,
            12 => Self::MemoryMappedIoPortSpace,
            13 => Self::PalCode,
            14 => Self::PersistentMemory,
            15 => Self::UnacceptedMemoryType,
            _ => return None,
        })
    }
}

impl BootServices {
    /// Call `EFI_BOOT_SERVICES.AllocatePages()`.
    ///
    /// `size` is in bytes and rounds up to whole pages. Returns the
    /// address of the allocation (which equals `address` for
    /// [`AllocateType::Address`]).
    pub fn allocate_pages(
        &self,
        allocate_type: AllocateType,
        memory_type: MemoryType,
        size: usize,
        address: u64,
    ) -> Result<u64, Error> {
        let slot = self.slot(ALLOCATE_PAGES)?;
        let pages = size.div_ceil(PAGE_SIZE) as u64;
        let mut physical_address = address;

        // SAFETY: live Boot Services slot; physical_address stays on this
        // frame across the call.
        let s = unsafe {
            invoke::call(
                slot,
                &[
                    allocate_type as u64,
                    memory_type as u64,
                    pages,
                    invoke::ptrval_mut(&mut physical_address),
                ],
            )
        };

        status::check(s)?;
        Ok(physical_address)
    }

    /// Call `EFI_BOOT_SERVICES.FreePages()`.
    pub fn free_pages(&self, address: u64, size: usize) -> Result<(), Error> {
        let slot = self.slot(FREE_PAGES)?;
        let pages = size.div_ceil(PAGE_SIZE) as u64;

        // SAFETY: live Boot Services slot, scalar arguments only.
        let s = unsafe { invoke::call(slot, &[address, pages]) };

        status::check(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::BootServices;
    use core::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_memory_type_round_trip() {
        for v in 0..16u32 {
            let t = MemoryType::from_u32(v).unwrap();
            assert_eq!(t as u32, v);
        }

        assert!(MemoryType::from_u32(16).is_none());
        assert!(MemoryType::from_u32(0x8000_0000).is_none());
    }

    static ALLOC_PAGES_ARG: AtomicU64 = AtomicU64::new(0);

    extern "efiapi" fn fake_allocate_pages(
        _allocate_type: u64,
        _memory_type: u64,
        pages: u64,
        address: u64,
    ) -> u64 {
        ALLOC_PAGES_ARG.store(pages, Ordering::SeqCst);

        // SAFETY: the wrapper passes a pointer to a live local.
        unsafe { *(address as *mut u64) = 0x5000 };

        0
    }

    #[test]
    fn test_allocate_rounds_up_to_pages() {
        let mut table = [0u64; 32];
        table[ALLOCATE_PAGES as usize / 8] = fake_allocate_pages as usize as u64;

        let bs = BootServices::new(table.as_ptr() as u64, 0);

        let addr = bs
            .allocate_pages(AllocateType::AnyPages, MemoryType::LoaderData, 4097, 0)
            .unwrap();

        assert_eq!(addr, 0x5000);
        assert_eq!(ALLOC_PAGES_ARG.load(Ordering::SeqCst), 2);
    }
}
