//! EFI Image Load and Start

use crate::boot::BootServices;
use crate::error::Error;
use crate::fs::{FsRoot, Volume};
use crate::invoke;
use crate::status;
use crate::Services;

// EFI Boot Services offsets
const LOAD_IMAGE: u64 = 0xc8;
const START_IMAGE: u64 = 0xd0;

impl BootServices {
    /// Call `EFI_BOOT_SERVICES.LoadImage()` with the named file from the
    /// root volume and its full device path.
    pub fn load_image(
        &self,
        services: &Services,
        boot_policy: bool,
        root: &FsRoot,
        name: &str,
    ) -> Result<u64, Error> {
        let slot = self.slot(LOAD_IMAGE)?;

        let buf = root.read_file(name)?;
        let device_path = root.file_path(services, name)?;
        let mut image_handle = 0u64;

        // SAFETY: live Boot Services slot; buf, device_path and
        // image_handle live across the call on this frame.
        let s = unsafe {
            invoke::call(
                slot,
                &[
                    boot_policy as u64,
                    self.image_handle(),
                    device_path.as_ptr() as u64,
                    buf.as_ptr() as u64,
                    buf.len() as u64,
                    invoke::ptrval_mut(&mut image_handle),
                ],
            )
        };

        status::check(s)?;
        Ok(image_handle)
    }

    /// Call `EFI_BOOT_SERVICES.StartImage()`.
    ///
    /// May return: a chain-loaded boot manager can hand control back.
    /// The returned status is surfaced as-is; callers must not assume
    /// control is lost.
    pub fn start_image(&self, image_handle: u64) -> Result<(), Error> {
        let slot = self.slot(START_IMAGE)?;

        // SAFETY: live Boot Services slot, scalar arguments only.
        let s = unsafe { invoke::call(slot, &[image_handle, 0, 0]) };

        status::check(s)
    }
}
