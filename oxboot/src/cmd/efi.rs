//! UEFI-facing commands

use alloc::format;
use alloc::string::String;
use core::fmt::Write;

use oxboot_linux::e820;
use oxboot_uefi::runtime::ResetType;
use oxboot_uefi::{AllocateType, Guid, MemoryType, Volume};

use crate::cmd::{CmdError, CmdResult};
use crate::config;
use crate::platform::Platform;

/// `uefi` — firmware information.
pub fn uefi_info(p: &Platform) -> CmdResult {
    let mut buf = String::new();
    let t = &p.services.system_table;

    let _ = writeln!(buf, "UEFI Revision ......: {}", t.revision());

    if let Ok(vendor) = t.vendor(config::MAX_VENDOR_SIZE) {
        let _ = writeln!(buf, "Firmware Vendor ....: {vendor}");
    }

    let _ = writeln!(buf, "Firmware Revision ..: {:#x}", t.firmware_revision);
    let _ = writeln!(buf, "Runtime Services  ..: {:#x}", t.runtime_services);
    let _ = writeln!(buf, "Boot Services ......: {:#x}", t.boot_services);

    if let Ok(screen) = oxboot_linux::image::screen_info(&p.services) {
        let base = (screen.ext_lfb_base as u64) << 32 | screen.lfb_base as u64;
        let (width, height) = (screen.lfb_width, screen.lfb_height);
        let _ = writeln!(buf, "Frame Buffer .......: {width}x{height} @ {base:#x}");
    }

    let _ = writeln!(buf, "Configuration Tables: {:#x}", t.configuration_table);

    if let Ok(tables) = t.configuration_tables() {
        for entry in tables {
            let _ = writeln!(buf, "  {} ({:#x})", entry.guid, entry.vendor_table);
        }
    }

    Ok(buf)
}

/// `memmap [e820]` — show the UEFI memory map.
pub fn memmap(p: &Platform, as_e820: bool) -> CmdResult {
    let map = p.services.boot.get_memory_map()?;
    let mut buf = String::new();

    let _ = write!(buf, "Type Start            End              Pages            ");

    if as_e820 {
        let _ = writeln!(buf);

        for entry in e820::from_memory_map(&map.descriptors, p.runtime_region()) {
            let (addr, size, mem_type) = (entry.addr, entry.size, entry.mem_type);
            let _ = writeln!(
                buf,
                "{:02}   {:016x} {:016x} {:016x}",
                mem_type,
                addr,
                addr + size - 1,
                size / 4096,
            );
        }
    } else {
        let _ = writeln!(buf, "Attributes");

        for desc in &map.descriptors {
            let _ = writeln!(
                buf,
                "{:02}   {:016x} {:016x} {:016x} {:016x}",
                desc.memory_type,
                desc.physical_start,
                desc.physical_end() - 1,
                desc.number_of_pages,
                desc.attribute,
            );
        }
    }

    Ok(buf)
}

/// `alloc <hex addr> <dec size>` — allocate pages at a fixed address.
pub fn alloc_pages(p: &Platform, addr: u64, size: u64) -> CmdResult {
    if addr % 8 != 0 || size % 8 != 0 {
        return Err(CmdError::Invalid("only 64-bit aligned accesses are supported"));
    }

    log::info!("allocating memory range {:#08x} - {:#08x}", addr, addr + size);

    p.services.boot.allocate_pages(
        AllocateType::Address,
        MemoryType::LoaderData,
        size as usize,
        addr,
    )?;

    Ok(String::new())
}

/// `protocol <guid>` — locate a UEFI protocol.
pub fn protocol(p: &Platform, guid: &str) -> CmdResult {
    let parsed = Guid::parse(guid)?;
    let addr = p.services.boot.locate_protocol(&parsed)?;

    Ok(format!("{parsed}: {addr:#08x}"))
}

/// `ls [path]` — list directory contents.
pub fn ls(p: &Platform, path: Option<&str>) -> CmdResult {
    let root = p.services.root()?;
    let mut buf = String::new();

    for entry in root.read_dir(path.unwrap_or("."))? {
        let kind = if entry.is_dir() { 'd' } else { 'f' };
        let _ = writeln!(buf, "{} {}", kind, entry.name());
    }

    Ok(buf)
}

/// `cat <path>` — show file contents.
pub fn cat(p: &Platform, path: &str) -> CmdResult {
    let root = p.services.root()?;
    let data = root.read_file(path)?;

    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// `stat <path>` — show file information and digest.
pub fn stat(p: &Platform, path: &str) -> CmdResult {
    let root = p.services.root()?;
    let file = root.open(path)?;
    let info = file.stat()?;
    let data = root.read_file(path)?;

    Ok(format!(
        "Size:{} ModTime:{} IsDir:{} Sum256:{}",
        info.size(),
        info.modification_time(),
        info.is_dir(),
        oxboot_transparency::hash(&data),
    ))
}

/// `clear` — clear the screen.
pub fn clear(p: &Platform) -> CmdResult {
    p.services.console.clear_screen()?;
    Ok(String::new())
}

/// `mode <n>` — set the text console mode.
pub fn mode(p: &Platform, mode: u64) -> CmdResult {
    p.services.console.set_mode(mode)?;
    log::info!("switched to EFI Console mode {mode}");
    Ok(String::new())
}

/// `. <path>` — load and start an EFI image.
pub fn image(p: &Platform, path: &str) -> CmdResult {
    let root = p.services.root()?;

    log::info!("loading EFI image {path}");
    let handle = p.services.boot.load_image(&p.services, false, &root, path)?;

    log::info!("starting EFI image {handle:#x}");
    p.services.boot.start_image(handle)?;

    // a chain-loaded boot manager may hand control back
    Ok(String::from("image returned control"))
}

/// `windows` — launch the Windows UEFI boot manager.
pub fn windows(p: &Platform) -> CmdResult {
    image(p, config::WINDOWS_BOOT_MANAGER)
}

/// `reset [cold|warm]` — reset the system.
pub fn reset(p: &Platform, kind: Option<&str>) -> CmdResult {
    let reset_type = match kind {
        Some("cold") => ResetType::Cold,
        Some("warm") | None => ResetType::Warm,
        Some("shutdown") => ResetType::Shutdown,
        Some(_) => return Err(CmdError::Invalid("reset type")),
    };

    log::info!("performing system reset type {}", reset_type as u32);
    p.services.runtime.reset_system(reset_type)?;

    Ok(String::new())
}

/// `halt` / `shutdown` — power the system off.
pub fn halt(p: &Platform) -> CmdResult {
    reset(p, Some("shutdown"))
}

/// `exit` / `quit` — return to the firmware boot manager.
pub fn exit(p: &Platform) -> CmdResult {
    p.services.boot.exit(0)?;
    Ok(String::new())
}
