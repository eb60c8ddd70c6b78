//! E820 synthesis
//!
//! Converts the UEFI memory map into the legacy E820 form the kernel
//! expects after firmware hand-off. Adjacent same-type entries are
//! merged, except around the loader's own runtime window, which stays
//! isolated as its own entry so boot-time reservation code can find it.

use alloc::vec::Vec;

use oxboot_uefi::{MemoryDescriptor, MemoryType};

use crate::params::{E820Entry, E820_ACPI, E820_NVS, E820_PMEM, E820_RAM, E820_RESERVED};

/// Map a UEFI memory type to its E820 type, per the memory type usage
/// after `ExitBootServices()`.
#[must_use]
pub fn e820_type(memory_type: u32) -> u32 {
    match MemoryType::from_u32(memory_type) {
        Some(
            MemoryType::LoaderCode
            | MemoryType::LoaderData
            | MemoryType::BootServicesCode
            | MemoryType::BootServicesData
            | MemoryType::ConventionalMemory,
        ) => E820_RAM,
        Some(MemoryType::PersistentMemory) => E820_PMEM,
        Some(MemoryType::AcpiReclaimMemory) => E820_ACPI,
        Some(MemoryType::AcpiMemoryNvs) => E820_NVS,
        _ => E820_RESERVED,
    }
}

/// Convert one descriptor.
#[must_use]
pub fn from_descriptor(desc: &MemoryDescriptor) -> E820Entry {
    E820Entry {
        addr: desc.physical_start,
        size: desc.size(),
        mem_type: e820_type(desc.memory_type),
    }
}

/// Convert a memory map to E820 form, defragmenting adjacent same-type
/// entries. The runtime window `(ram_start, ram_end)` is never merged
/// into a neighbor.
#[must_use]
pub fn from_memory_map(descriptors: &[MemoryDescriptor], runtime: (u64, u64)) -> Vec<E820Entry> {
    let (ram_start, ram_end) = runtime;
    let mut e820: Vec<E820Entry> = Vec::with_capacity(descriptors.len());

    for desc in descriptors {
        let entry = from_descriptor(desc);

        if let Some(prev) = e820.last_mut() {
            let prev_end = prev.addr + prev.size;

            // join adjacent entries, keeping the runtime window isolated
            if (entry.addr != ram_start && prev_end != ram_end)
                && (prev.mem_type == entry.mem_type && prev_end == entry.addr)
            {
                prev.size += entry.size;
                continue;
            }
        }

        e820.push(entry);
    }

    e820
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    const NO_RUNTIME: (u64, u64) = (0, 0);

    #[test]
    fn test_type_mapping() {
        assert_eq!(e820_type(MemoryType::LoaderCode as u32), E820_RAM);
        assert_eq!(e820_type(MemoryType::LoaderData as u32), E820_RAM);
        assert_eq!(e820_type(MemoryType::BootServicesCode as u32), E820_RAM);
        assert_eq!(e820_type(MemoryType::BootServicesData as u32), E820_RAM);
        assert_eq!(e820_type(MemoryType::ConventionalMemory as u32), E820_RAM);
        assert_eq!(e820_type(MemoryType::PersistentMemory as u32), E820_PMEM);
        assert_eq!(e820_type(MemoryType::AcpiReclaimMemory as u32), E820_ACPI);
        assert_eq!(e820_type(MemoryType::AcpiMemoryNvs as u32), E820_NVS);
        assert_eq!(e820_type(MemoryType::MemoryMappedIo as u32), E820_RESERVED);
        assert_eq!(e820_type(MemoryType::ReservedMemoryType as u32), E820_RESERVED);
        assert_eq!(e820_type(0xffff), E820_RESERVED);
    }

    #[test]
    fn test_adjacent_same_type_merge() {
        let descriptors = [
            MemoryDescriptor::new(MemoryType::ConventionalMemory as u32, 0x1000, 10),
            MemoryDescriptor::new(MemoryType::ConventionalMemory as u32, 0xb000, 5),
        ];

        let e820 = from_memory_map(&descriptors, NO_RUNTIME);

        assert_eq!(e820.len(), 1);
        let E820Entry { addr, size, mem_type } = e820[0];
        assert_eq!(addr, 0x1000);
        assert_eq!(size, 0xf000);
        assert_eq!(mem_type, E820_RAM);
    }

    #[test]
    fn test_gap_prevents_merge() {
        let descriptors = [
            MemoryDescriptor::new(MemoryType::ConventionalMemory as u32, 0x1000, 10),
            MemoryDescriptor::new(MemoryType::ConventionalMemory as u32, 0xc000, 5),
        ];

        let e820 = from_memory_map(&descriptors, NO_RUNTIME);
        assert_eq!(e820.len(), 2);
    }

    #[test]
    fn test_type_change_prevents_merge() {
        let descriptors = [
            MemoryDescriptor::new(MemoryType::ConventionalMemory as u32, 0x1000, 10),
            MemoryDescriptor::new(MemoryType::AcpiReclaimMemory as u32, 0xb000, 5),
        ];

        let e820 = from_memory_map(&descriptors, NO_RUNTIME);
        assert_eq!(e820.len(), 2);
        let E820Entry { mem_type, .. } = e820[1];
        assert_eq!(mem_type, E820_ACPI);
    }

    #[test]
    fn test_runtime_window_stays_isolated() {
        let descriptors = [
            MemoryDescriptor::new(MemoryType::LoaderCode as u32, 0x1000, 10),
            MemoryDescriptor::new(MemoryType::LoaderData as u32, 0xb000, 5),
        ];

        // the second descriptor is the runtime window
        let e820 = from_memory_map(&descriptors, (0xb000, 0x10000));

        assert_eq!(e820.len(), 2);
        let E820Entry { addr: first_addr, .. } = e820[0];
        let E820Entry { addr: second_addr, .. } = e820[1];
        assert_eq!(first_addr, 0x1000);
        assert_eq!(second_addr, 0xb000);
    }

    #[test]
    fn test_every_byte_accounted_once() {
        let descriptors = [
            MemoryDescriptor::new(MemoryType::ConventionalMemory as u32, 0x1000, 10),
            MemoryDescriptor::new(MemoryType::ConventionalMemory as u32, 0xb000, 5),
            MemoryDescriptor::new(MemoryType::MemoryMappedIo as u32, 0x10000, 16),
            MemoryDescriptor::new(MemoryType::ConventionalMemory as u32, 0x20000, 8),
        ];

        let total: u64 = descriptors.iter().map(MemoryDescriptor::size).sum();

        let e820 = from_memory_map(&descriptors, NO_RUNTIME);
        let covered: u64 = e820.iter().map(|e| e.size).sum();
        assert_eq!(total, covered);

        // no overlap: entries are strictly ordered
        let mut entries = vec![];
        for e in &e820 {
            entries.push((e.addr, e.addr + e.size));
        }
        for pair in entries.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
        }
    }
}
