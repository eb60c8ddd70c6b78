//! EFI application entry
//!
//! The CPU init stub hands over `image_handle` and the System Table
//! pointer; everything after that is [`oxboot::run`]. If the default
//! boot path returns, control goes back to the firmware boot manager,
//! falling back to a platform reset.

#![cfg_attr(target_os = "uefi", no_std)]
#![cfg_attr(target_os = "uefi", no_main)]

#[cfg(target_os = "uefi")]
mod efi_app {
    use oxboot_mem::BootHeap;
    use oxboot_uefi::runtime::ResetType;

    /// Heap seed carried in the image, backing allocation until the
    /// heap grows into firmware memory.
    const SEED_SIZE: usize = 1 << 20;

    #[global_allocator]
    static HEAP: BootHeap = BootHeap::empty();

    static mut SEED: [u8; SEED_SIZE] = [0; SEED_SIZE];

    #[no_mangle]
    pub extern "efiapi" fn efi_main(image_handle: u64, system_table: u64) -> u64 {
        // SAFETY: called once, before any allocation; SEED is static.
        unsafe { HEAP.seed(core::ptr::addr_of_mut!(SEED) as *mut u8, SEED_SIZE) };

        if let Err(err) = oxboot::run(image_handle, system_table, &HEAP) {
            log::error!("init failed, {err}");
        }

        // hand control back to the firmware boot manager
        if let Some(platform) = oxboot::platform::get() {
            log::info!("exit");

            if let Err(err) = platform.services.boot.exit(0) {
                log::error!("halting due to exit error, {err}");
                let _ = platform.services.runtime.reset_system(ResetType::Shutdown);
            }
        }

        0
    }

    #[panic_handler]
    fn panic(info: &core::panic::PanicInfo) -> ! {
        log::error!("loader panic: {info}");

        if let Some(platform) = oxboot::platform::get() {
            let _ = platform.services.runtime.reset_system(ResetType::Shutdown);
        }

        loop {
            core::hint::spin_loop();
        }
    }
}

#[cfg(not(target_os = "uefi"))]
fn main() {
    // the loader only runs as an EFI application; see README for the
    // build target
}
