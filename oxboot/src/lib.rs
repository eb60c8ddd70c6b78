//! oxboot
//!
//! A UEFI boot loader: runs as an `EFI_APPLICATION`, drives firmware
//! through its native protocol tables, and chain-loads either a Linux
//! kernel described by a UAPI Type #1 Boot Loader Entry or another UEFI
//! image. Kernel launches can be gated on a boot-transparency inclusion
//! proof plus policy.
//!
//! This crate is the application shell around the service crates:
//! platform bring-up, the `log` backend, and the command layer an
//! external line dispatcher drives.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod cmd;
pub mod config;
pub mod logger;
pub mod platform;

pub use platform::Platform;

use oxboot_mem::BootHeap;
use oxboot_uefi::Error;

/// Bring the loader up and boot the default entry.
///
/// Returns only when the default boot path failed or handed control
/// back; the caller then exits to firmware.
pub fn run(image_handle: u64, system_table: u64, heap: &'static BootHeap) -> Result<(), Error> {
    let platform = platform::init(image_handle, system_table, heap)?;

    logger::init();

    let _ = platform.services.console.clear_screen();
    log::info!("{}", config::BANNER);

    // the firmware watchdog would reset us mid-interaction
    if let Err(err) = platform.services.boot.set_watchdog_timer(0) {
        log::warn!("could not disable watchdog, {err}");
    }

    match cmd::linux(platform, None) {
        Ok(output) => log::info!("{output}"),
        Err(err) => log::error!("could not boot default entry, {err}"),
    }

    Ok(())
}
