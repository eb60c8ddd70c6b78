//! EFI System Table and Configuration Tables

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use oxboot_mem::PhysWindow;

use crate::error::Error;
use crate::guid::Guid;

/// EFI Table Header Signature ("IBI SYST").
pub const TABLE_SIGNATURE: u64 = 0x5453595320494249;

/// The data structure that precedes all standard EFI table types.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy)]
#[repr(C)]
pub struct TableHeader {
    pub signature: u64,
    pub revision: u32,
    pub header_size: u32,
    pub crc32: u32,
    pub reserved: u32,
}

/// The EFI System Table, containing pointers to the console, runtime and
/// boot services tables.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy)]
#[repr(C)]
pub struct SystemTable {
    pub header: TableHeader,
    pub firmware_vendor: u64,
    pub firmware_revision: u32,
    _reserved: u32,
    pub console_in_handle: u64,
    pub con_in: u64,
    pub console_out_handle: u64,
    pub con_out: u64,
    pub standard_error_handle: u64,
    pub std_err: u64,
    pub runtime_services: u64,
    pub boot_services: u64,
    pub number_of_table_entries: u64,
    pub configuration_table: u64,
}

/// An EFI Configuration Table entry.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct ConfigurationTable {
    pub guid: Guid,
    pub vendor_table: u64,
}

/// UEFI specification revision, as carried in the table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision(pub u32);

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let major = self.0 >> 16;
        let minor = self.0 & 0xffff;

        // 2.10 is encoded as minor 100
        if minor % 10 == 0 {
            write!(f, "{}.{}", major, minor / 10)
        } else {
            write!(f, "{}.{}.{}", major, minor / 10, minor % 10)
        }
    }
}

impl SystemTable {
    /// The UEFI revision the firmware implements.
    #[must_use]
    pub fn revision(&self) -> Revision {
        Revision(self.header.revision)
    }

    /// Read the firmware vendor string, capped at `max` UTF-16 units.
    pub fn vendor(&self, max: usize) -> Result<alloc::string::String, Error> {
        if self.firmware_vendor == 0 {
            return Err(Error::NotFound);
        }

        let window = PhysWindow::map(self.firmware_vendor, max * 2)?;
        let mut buf = vec![0u8; max * 2];
        window.read(0, &mut buf)?;

        Ok(crate::codec::utf16_decode(&buf))
    }

    /// Enumerate the EFI Configuration Tables.
    pub fn configuration_tables(&self) -> Result<Vec<ConfigurationTable>, Error> {
        let count = self.number_of_table_entries as usize;

        if count == 0 || self.configuration_table == 0 {
            return Err(Error::Protocol("EFI Configuration Table"));
        }

        let entry_size = core::mem::size_of::<ConfigurationTable>();
        let window = PhysWindow::map(self.configuration_table, entry_size * count)?;

        let mut tables = Vec::with_capacity(count);
        let mut buf = [0u8; core::mem::size_of::<ConfigurationTable>()];

        for i in 0..count {
            window.read(i * entry_size, &mut buf)?;

            let entry = ConfigurationTable::read_from_bytes(&buf)
                .map_err(|_| Error::Protocol("EFI Configuration Table"))?;

            tables.push(entry);
        }

        Ok(tables)
    }

    /// Locate a configuration table by GUID; the lookup is linear.
    pub fn locate_configuration(&self, guid: Guid) -> Result<ConfigurationTable, Error> {
        self.configuration_tables()?
            .into_iter()
            .find(|t| t.guid == guid)
            .ok_or(Error::NotFound)
    }
}
