//! UEFI Service Binding Layer
//!
//! A driver for the Unified Extensible Firmware Interface following the
//! specifications at:
//!
//! <https://uefi.org/specs/UEFI/2.10/>
//!
//! Firmware tables are traversed through scoped physical windows
//! ([`oxboot_mem::PhysWindow`]) and every service call goes through one
//! invocation trampoline ([`invoke`]): a service binding is a table base
//! plus a set of byte-offset constants, never a typed vtable. Adding a
//! service means adding an offset, not another binding layer.
//!
//! The entry point is [`Services::init`], which validates the System
//! Table handed over by the platform init stub and caches the console,
//! boot and runtime service records.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod boot;
pub mod codec;
pub mod console;
pub mod dir;
pub mod error;
pub mod exit;
pub mod file;
pub mod fs;
pub mod graphics;
pub mod guid;
pub mod image;
mod invoke;
pub mod mem;
pub mod net;
pub mod pages;
pub mod path;
pub mod protocol;
pub mod runtime;
pub mod sev;
pub mod status;
pub mod system;
pub mod wdog;

pub use boot::{BootServices, Lifecycle};
pub use console::Console;
pub use error::Error;
pub use fs::{FsRoot, Volume};
pub use guid::Guid;
pub use mem::{MemoryDescriptor, MemoryMap, PAGE_SIZE};
pub use pages::{AllocateType, MemoryType};
pub use runtime::RuntimeServices;
pub use system::SystemTable;

use crate::codec::decode;

/// The UEFI services instance.
///
/// Created once at init and passed by reference to every component; the
/// System Table snapshot is immutable after validation (firmware
/// guarantees the cached pointers do not move until `ExitBootServices`).
pub struct Services {
    /// EFI System Table snapshot.
    pub system_table: SystemTable,

    /// UEFI services.
    pub console: Console,
    pub boot: BootServices,
    pub runtime: RuntimeServices,

    image_handle: u64,
    system_table_addr: u64,
}

impl Services {
    /// Initialize a UEFI services instance from the pointers handed over
    /// by the platform init stub.
    pub fn init(image_handle: u64, system_table: u64) -> Result<Self, Error> {
        let table: SystemTable = decode(system_table)?;

        if table.header.signature != system::TABLE_SIGNATURE {
            return Err(Error::FirmwareUnavailable);
        }

        let console = Console::new(table.con_in, table.con_out);
        let boot = BootServices::new(table.boot_services, image_handle);
        let runtime = RuntimeServices::new(table.runtime_services);

        Ok(Self {
            system_table: table,
            console,
            boot,
            runtime,
            image_handle,
            system_table_addr: system_table,
        })
    }

    /// The UEFI image handle pointer.
    #[must_use]
    pub fn image_handle(&self) -> u64 {
        self.image_handle
    }

    /// The EFI System Table pointer.
    #[must_use]
    pub fn address(&self) -> u64 {
        self.system_table_addr
    }
}
