//! Kernel image placement and boot
//!
//! The pipeline: parse the bzImage header, reserve a conventional
//! memory region, compute aligned placement offsets, gather screen and
//! EFI info, exit Boot Services and load-then-jump. Reservation acts as
//! a transaction: every failure before the exit handshake releases the
//! region and its pages; once the firmware memory map has been
//! relinquished nothing is released anymore.

use alloc::string::String;
use alloc::vec::Vec;

use zerocopy::{FromZeros, IntoBytes};

use oxboot_mem::PhysWindow;
use oxboot_uefi::{AllocateType, MemoryMap, MemoryType, Services};

use crate::bzimage::{Kernel, SetupHeader, ENTRY_OFFSET_64};
use crate::e820;
use crate::error::BootError;
use crate::handoff;
use crate::params::{
    BootParams, E820Entry, EfiInfo, ScreenInfo, E820_MAX_ENTRIES, E820_RAM,
    EFI64_LOADER_SIGNATURE, VIDEO_CAPABILITY_64BIT_BASE, VIDEO_TYPE_EFI,
};

/// Lowest load address considered, avoiding the early DMA region.
const MIN_LOAD_ADDR: u64 = 0x0100_0000;

/// Size of the `boot_params` zero page.
const PARAMS_SIZE: usize = 0x1000;

struct Region {
    start: u64,
    size: usize,
    window: PhysWindow,
}

/// Aligned offsets of every blob within the reserved region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placement {
    pub initrd_offset: usize,
    pub kernel_offset: usize,
    pub cmdline_offset: usize,
    pub params_offset: usize,
}

/// The working record for one Linux boot.
pub struct LinuxImage {
    pub kernel: Vec<u8>,
    pub initrd: Vec<u8>,
    pub cmdline: String,

    header: Option<SetupHeader>,
    setup_size: usize,
    alignment: u64,
    cmdline_size: usize,

    region: Option<Region>,
    placement: Option<Placement>,
    e820: Vec<E820Entry>,
}

impl LinuxImage {
    #[must_use]
    pub fn new(kernel: Vec<u8>, initrd: Vec<u8>, cmdline: String) -> Self {
        Self {
            kernel,
            initrd,
            cmdline,
            header: None,
            setup_size: 0,
            alignment: 0,
            cmdline_size: 0,
            region: None,
            placement: None,
            e820: Vec::new(),
        }
    }

    /// Parse the kernel and cache the header fields the pipeline needs.
    pub fn parse(&mut self) -> Result<(), BootError> {
        if self.kernel.is_empty() {
            return Err(BootError::InvalidArgument("empty kernel"));
        }

        let parsed = Kernel::parse(&self.kernel)?;

        self.alignment = parsed.alignment();
        self.cmdline_size = parsed.cmdline_size();
        self.setup_size = parsed.setup_size();
        self.header = Some(*parsed.header());

        Ok(())
    }

    fn kernel_code(&self) -> &[u8] {
        &self.kernel[self.setup_size..]
    }

    /// Reserve memory for the kernel, initrd, command line and boot
    /// parameters, and record the E820 view of the current map.
    ///
    /// The first conventional E820 region that fits is taken whole, so
    /// the command line and zero page land at its far end. Regions the
    /// allocator refuses (our own runtime pages among them) are skipped.
    pub fn reserve(&mut self, services: &Services, runtime: (u64, u64)) -> Result<(), BootError> {
        if !services.boot.is_bound() {
            return Err(BootError::Uefi(oxboot_uefi::Error::FirmwareUnavailable));
        }

        let needed = self.kernel_code().len() + self.initrd.len();
        let map = services.boot.get_memory_map()?;

        // availability after exiting Boot Services
        self.e820 = e820::from_memory_map(&map.descriptors, runtime);

        for entry in &self.e820 {
            if entry.mem_type != E820_RAM {
                continue;
            }

            let Some((start, size)) = usable_range(entry.addr, entry.size, needed) else {
                continue;
            };

            let Some(placement) = place(
                start,
                size,
                self.alignment,
                self.initrd.len(),
                self.kernel_code().len(),
                self.cmdline_size,
            ) else {
                continue;
            };

            // reserve against our own allocator bookkeeping first
            let Ok(window) = PhysWindow::map_mut(start, size) else {
                continue;
            };

            // then have firmware record ownership as LoaderData
            if services
                .boot
                .allocate_pages(AllocateType::Address, MemoryType::LoaderData, size, start)
                .is_err()
            {
                // our own runtime heap pages naturally fail here
                continue;
            }

            log::info!("reserving memory {:#x} - {:#x}", start, start + size as u64);

            self.region = Some(Region {
                start,
                size,
                window,
            });
            self.placement = Some(placement);

            return Ok(());
        }

        Err(BootError::NoUsableMemory)
    }

    /// Release the reserved region after a failure before the exit
    /// handshake.
    fn abort(&mut self, services: &Services) {
        if let Some(region) = self.region.take() {
            if let Err(err) = services.boot.free_pages(region.start, region.size) {
                log::warn!("could not release reserved pages, {err}");
            }
        }

        self.placement = None;
    }

    /// Run the full hand-off. Returns only on failure.
    pub fn boot(mut self, services: &Services, runtime: (u64, u64)) -> Result<(), BootError> {
        self.parse()?;
        self.reserve(services, runtime)?;

        // best-effort screen information, gathered while Boot Services
        // are still available
        let screen = match screen_info(services) {
            Ok(screen) => Some(screen),
            Err(err) => {
                log::warn!("could not detect screen information, {err}");
                None
            }
        };

        log::info!("exiting EFI boot services and jumping to kernel");

        let map = match services.boot.exit_boot_services() {
            Ok(map) => map,
            Err(err) => {
                self.abort(services);
                return Err(err.into());
            }
        };

        // firmware console is gone with Boot Services
        services.console.silence();

        let (entry, params) = self.load(services.address(), &map, screen)?;

        // the reserved region now belongs to the kernel
        core::mem::forget(self);

        // SAFETY: the kernel and zero page are fully placed and Boot
        // Services have been exited.
        unsafe { handoff::jump(entry, params) }
    }

    /// Copy every blob into the reserved region and build the zero
    /// page. Returns the kernel entry and `boot_params` addresses.
    fn load(
        &mut self,
        systab: u64,
        map: &MemoryMap,
        screen: Option<ScreenInfo>,
    ) -> Result<(u64, u64), BootError> {
        let placement = self
            .placement
            .ok_or(BootError::InvalidArgument("image not reserved"))?;

        let header = self
            .header
            .ok_or(BootError::InvalidArgument("image not parsed"))?;

        let region = self
            .region
            .as_mut()
            .ok_or(BootError::InvalidArgument("image not reserved"))?;

        let base = region.start;
        let initrd_addr = base + placement.initrd_offset as u64;
        let cmdline_addr = base + placement.cmdline_offset as u64;

        // the boot protocol carries these as 32-bit fields
        if cmdline_addr > u32::MAX as u64 {
            return Err(BootError::InvalidArgument("load region above 4G"));
        }

        if self.cmdline.len() + 1 > self.cmdline_size {
            return Err(BootError::InvalidArgument("command line too long"));
        }

        let kernel_code = &self.kernel[self.setup_size..];
        region.window.write(placement.kernel_offset, kernel_code)?;

        if !self.initrd.is_empty() {
            region.window.write(placement.initrd_offset, &self.initrd)?;
        }

        region
            .window
            .write(placement.cmdline_offset, self.cmdline.as_bytes())?;
        region
            .window
            .write(placement.cmdline_offset + self.cmdline.len(), &[0])?;

        let mut params = BootParams::new_zeroed();

        params.hdr = header;
        params.hdr.type_of_loader = 0xff;
        params.hdr.cmd_line_ptr = cmdline_addr as u32;

        if !self.initrd.is_empty() {
            params.hdr.ramdisk_image = initrd_addr as u32;
            params.hdr.ramdisk_size = self.initrd.len() as u32;
        }

        if let Some(screen) = screen {
            params.screen_info = screen;
        }

        params.efi_info = efi_info(systab, map);

        let count = self.e820.len().min(E820_MAX_ENTRIES);
        if count < self.e820.len() {
            log::warn!("E820 table truncated to {count} entries");
        }

        let mut table = [E820Entry {
            addr: 0,
            size: 0,
            mem_type: 0,
        }; E820_MAX_ENTRIES];
        table[..count].copy_from_slice(&self.e820[..count]);

        params.e820_table = table;
        params.e820_entries = count as u8;

        region.window.write(placement.params_offset, params.as_bytes())?;

        let entry = base + placement.kernel_offset as u64 + ENTRY_OFFSET_64;
        Ok((entry, base + placement.params_offset as u64))
    }
}

/// Shift a candidate range above [`MIN_LOAD_ADDR`] and recheck that it
/// still fits `needed` bytes.
fn usable_range(addr: u64, size: u64, needed: usize) -> Option<(u64, usize)> {
    let (addr, size) = if addr < MIN_LOAD_ADDR {
        let shift = MIN_LOAD_ADDR - addr;

        if size <= shift {
            return None;
        }

        (MIN_LOAD_ADDR, size - shift)
    } else {
        (addr, size)
    };

    if (size as usize) < needed {
        return None;
    }

    Some((addr, size as usize))
}

/// Compute the aligned offsets of initrd, kernel, command line and zero
/// page within a region, or nothing when the region cannot hold them.
fn place(
    base: u64,
    size: usize,
    alignment: u64,
    initrd_len: usize,
    kernel_len: usize,
    cmdline_size: usize,
) -> Option<Placement> {
    let align = alignment.max(1);
    let mask = (align - 1) as usize;

    let initrd_offset = (base.wrapping_neg() & (align - 1)) as usize;

    let mut kernel_offset = initrd_offset + initrd_len;
    kernel_offset += (base + kernel_offset as u64).wrapping_neg() as usize & mask;

    let cmdline_offset = size.checked_sub(cmdline_size)?;
    let params_offset = cmdline_offset.checked_sub(PARAMS_SIZE)?;

    if kernel_offset + kernel_len > params_offset {
        return None;
    }

    Some(Placement {
        initrd_offset,
        kernel_offset,
        cmdline_offset,
        params_offset,
    })
}

/// Build the EFI info block from the final memory map.
fn efi_info(systab: u64, map: &MemoryMap) -> EfiInfo {
    EfiInfo {
        loader_signature: EFI64_LOADER_SIGNATURE,
        systab: systab as u32,
        systab_hi: (systab >> 32) as u32,
        memdesc_size: map.descriptor_size as u32,
        // Linux only accepts this value
        memdesc_version: 1,
        memmap: map.address() as u32,
        memmap_hi: (map.address() >> 32) as u32,
        memmap_size: map.size() as u32,
    }
}

/// Read the GOP mode into a `screen_info` for the kernel's EFI
/// framebuffer console.
pub fn screen_info(services: &Services) -> Result<ScreenInfo, BootError> {
    let gop = services.boot.graphics_output()?;
    let mode = gop.mode()?;
    let info = mode.info()?;

    let mut screen = ScreenInfo::new_zeroed();

    screen.orig_video_is_vga = VIDEO_TYPE_EFI;
    screen.lfb_width = info.horizontal_resolution as u16;
    screen.lfb_height = info.vertical_resolution as u16;
    screen.lfb_base = mode.frame_buffer_base as u32;
    screen.lfb_size = mode.frame_buffer_size as u32;
    screen.lfb_linelength = (info.horizontal_resolution * 4) as u16;
    screen.ext_lfb_base = (mode.frame_buffer_base >> 32) as u32;

    if mode.frame_buffer_base >> 32 > 0 {
        screen.capabilities = VIDEO_CAPABILITY_64BIT_BASE;
    }

    Ok(screen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bzimage::synthetic_image;
    use alloc::vec;

    #[test]
    fn test_placement_alignment() {
        // alignment 2 MiB, region at 16 MiB, initrd just over 512 KiB
        let p = place(0x0100_0000, 0x0800_0000, 0x0020_0000, 0x0008_1234, 0x100000, 2048)
            .unwrap();

        assert_eq!(p.initrd_offset, 0);
        assert_eq!(p.kernel_offset, 0x0020_0000);

        let base = 0x0100_0000u64;
        assert_eq!((base + p.kernel_offset as u64) % 0x0020_0000, 0);
        assert_eq!((base + p.initrd_offset as u64) % 0x0020_0000, 0);
        assert!(p.initrd_offset + 0x0008_1234 <= p.kernel_offset);
        assert_eq!(p.params_offset + 0x1000, p.cmdline_offset);
        assert_eq!(p.cmdline_offset + 2048, 0x0800_0000);
    }

    #[test]
    fn test_placement_unaligned_base() {
        let align = 0x0020_0000u64;
        let base = 0x0123_4000u64;
        let p = place(base, 0x0400_0000, align, 0x1000, 0x1000, 1024).unwrap();

        assert_eq!((base + p.initrd_offset as u64) % align, 0);
        assert_eq!((base + p.kernel_offset as u64) % align, 0);
        assert!(p.initrd_offset + 0x1000 <= p.kernel_offset);
    }

    #[test]
    fn test_placement_rejects_tight_region() {
        // kernel would overlap the zero page
        assert!(place(0x0100_0000, 0x0020_0000, 0x0020_0000, 0, 0x100000, 2048).is_none());
        // region smaller than the cmdline alone
        assert!(place(0x0100_0000, 0x100, 0x1000, 0, 0, 2048).is_none());
    }

    #[test]
    fn test_usable_range_shifts_low_regions() {
        // region straddling the DMA floor is shifted up
        assert_eq!(
            usable_range(0x10_0000, 0x0200_0000, 0x1000),
            Some((MIN_LOAD_ADDR, 0x0200_0000 - 0x0F0_0000))
        );

        // region entirely below the floor is unusable
        assert_eq!(usable_range(0x1000, 0x1000, 0x100), None);

        // high regions pass through
        assert_eq!(
            usable_range(0x0200_0000, 0x1000_0000, 0x1000),
            Some((0x0200_0000, 0x1000_0000))
        );

        // shift must recheck the size
        assert_eq!(usable_range(0xFF_F000, 0x2000, 0x100), None);
    }

    #[test]
    fn test_parse_caches_header_fields() {
        let mut image = LinuxImage::new(
            synthetic_image(b"code"),
            vec![0u8; 16],
            String::from("console=ttyS0"),
        );

        image.parse().unwrap();

        assert_eq!(image.alignment, 0x0020_0000);
        assert_eq!(image.cmdline_size, 2047);
        assert_eq!(image.kernel_code(), b"code");
    }

    #[test]
    fn test_parse_rejects_empty_kernel() {
        let mut image = LinuxImage::new(Vec::new(), Vec::new(), String::new());

        assert!(matches!(
            image.parse(),
            Err(BootError::InvalidArgument("empty kernel"))
        ));
    }

    #[test]
    fn test_efi_info_block() {
        use oxboot_uefi::MemoryDescriptor;

        let buf = vec![0u8; 96];
        let addr = buf.as_ptr() as u64;

        let map = MemoryMap::from_buffer(
            buf,
            96,
            7,
            core::mem::size_of::<MemoryDescriptor>() as u64,
            1,
        )
        .unwrap();

        let systab = 0x1_2345_6789u64;
        let info = efi_info(systab, &map);

        assert_eq!(info.loader_signature, EFI64_LOADER_SIGNATURE);
        assert_eq!(info.systab, 0x2345_6789);
        assert_eq!(info.systab_hi, 0x1);
        assert_eq!(info.memmap, addr as u32);
        assert_eq!(info.memmap_hi, (addr >> 32) as u32);
        assert_eq!(info.memmap_size, 96);
        assert_eq!(info.memdesc_version, 1);
    }
}
