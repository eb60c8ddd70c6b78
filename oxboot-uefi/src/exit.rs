//! Boot Services Exit
//!
//! `ExitBootServices` accepts only the key of the very latest memory map,
//! so the map acquisition and the exit call run back-to-back inside one
//! invocation-token critical section with no intervening allocation. On
//! `EFI_INVALID_PARAMETER` (stale key) the handshake drops back to
//! `Bound` and retries with a fresh map, up to [`EXIT_RETRIES`] times.

use alloc::vec;

use crate::boot::{BootServices, Lifecycle};
use crate::error::Error;
use crate::invoke;
use crate::mem::{MemoryDescriptor, MemoryMap};
use crate::status::{self, EFI_INVALID_PARAMETER, EFI_SUCCESS};

// EFI Boot Services offsets
const EXIT: u64 = 0xd8;
const EXIT_BOOT_SERVICES: u64 = 0xe8;

/// Attempts before the exit handshake is declared fatal.
pub const EXIT_RETRIES: usize = 3;

const MAX_ENTRIES: usize = 1000;

impl BootServices {
    /// Call `EFI_BOOT_SERVICES.Exit()`, returning control to the
    /// firmware boot manager.
    pub fn exit(&self, code: u64) -> Result<(), Error> {
        let slot = self.slot(EXIT)?;

        // SAFETY: live Boot Services slot, scalar arguments only.
        let s = unsafe { invoke::call(slot, &[self.image_handle(), code, 0, 0]) };

        status::check(s)
    }

    /// Call `EFI_BOOT_SERVICES.ExitBootServices()`.
    ///
    /// On success the binding is poisoned: Boot Services are gone, the
    /// loader owns all not-yet-handed-out RAM, and the returned map is
    /// the final one the kernel must see. Runtime Services remain
    /// callable.
    pub fn exit_boot_services(&self) -> Result<MemoryMap, Error> {
        let exit_slot = self.slot(EXIT_BOOT_SERVICES)?;

        // The buffer is allocated up front: no heap activity may happen
        // between map acquisition and the exit call.
        let mut buf = vec![0u8; core::mem::size_of::<MemoryDescriptor>() * MAX_ENTRIES];

        for _ in 0..EXIT_RETRIES {
            self.set_state(Lifecycle::Exiting);

            let token = invoke::lock();

            let raw = match self.memory_map_raw(&token, &mut buf) {
                Ok(raw) => raw,
                Err(err) => {
                    drop(token);
                    self.set_state(Lifecycle::Fatal);
                    return Err(err);
                }
            };

            // SAFETY: live Boot Services slot; the key comes from the
            // map call just above, inside the same critical section.
            let s = unsafe {
                invoke::call_locked(&token, exit_slot, &[self.image_handle(), raw.map_key])
            };

            drop(token);

            if s == EFI_SUCCESS {
                self.poison();
                return MemoryMap::parse(buf, raw);
            }

            if status::code(s) != EFI_INVALID_PARAMETER {
                self.set_state(Lifecycle::Fatal);
                return Err(Error::Status(s));
            }

            // stale key, take a fresh map and try again
            self.set_state(Lifecycle::Bound);
            log::warn!("stale memory map key, retrying ExitBootServices");
        }

        self.set_state(Lifecycle::Fatal);
        Err(Error::Fatal("could not exit EFI Boot Services"))
    }
}
