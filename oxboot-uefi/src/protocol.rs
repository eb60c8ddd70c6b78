//! EFI Protocol Location

use crate::boot::BootServices;
use crate::error::Error;
use crate::guid::Guid;
use crate::invoke;
use crate::status;

// EFI Boot Services offsets
const HANDLE_PROTOCOL: u64 = 0x98;
const LOCATE_PROTOCOL: u64 = 0x140;

impl BootServices {
    /// Call `EFI_BOOT_SERVICES.HandleProtocol()` for a per-handle
    /// protocol (Loaded Image, Simple File System on a device handle).
    pub fn handle_protocol(&self, handle: u64, guid: &Guid) -> Result<u64, Error> {
        let slot = self.slot(HANDLE_PROTOCOL)?;
        let mut addr = 0u64;

        // SAFETY: live Boot Services slot; guid and addr live across the
        // call on this frame.
        let s = unsafe {
            invoke::call(
                slot,
                &[
                    handle,
                    guid.as_ptr() as u64,
                    invoke::ptrval_mut(&mut addr),
                ],
            )
        };

        status::check(s)?;
        Ok(addr)
    }

    /// Call `EFI_BOOT_SERVICES.LocateProtocol()` for a singleton
    /// protocol (GOP, Simple Network).
    pub fn locate_protocol(&self, guid: &Guid) -> Result<u64, Error> {
        let slot = self.slot(LOCATE_PROTOCOL)?;
        let mut addr = 0u64;

        // SAFETY: live Boot Services slot; guid and addr live across the
        // call on this frame.
        let s = unsafe {
            invoke::call(
                slot,
                &[guid.as_ptr() as u64, 0, invoke::ptrval_mut(&mut addr)],
            )
        };

        status::check(s)?;
        Ok(addr)
    }
}
