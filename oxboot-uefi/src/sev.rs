//! AMD SEV-SNP Configuration
//!
//! The Confidential Computing blob configuration table published by
//! firmware on SEV-SNP guests carries the secrets and CPUID page
//! addresses. The GHCB exchange itself lives in a guest driver outside
//! this crate.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::codec;
use crate::error::Error;
use crate::guid::Guid;
use crate::Services;

/// "AMDE"
const SNP_SIGNATURE: u32 = 0x45444d41;

/// AMD SEV-ES Guest-Hypervisor Communication Block Standardization
pub const SEV_SNP_CC_BLOB_GUID: Guid = Guid::from_fields(
    0x067b1f5f,
    0xcf26,
    0x44c5,
    [0x85, 0x54, 0x93, 0xd7, 0x77, 0x91, 0x2d, 0x42],
);

/// An EFI SNP Confidential Computing Blob Configuration Table.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy)]
#[repr(C)]
pub struct SnpConfigurationTable {
    pub header: u32,
    pub version: u16,
    _reserved0: u16,
    pub secrets_page_physical_address: u64,
    pub secrets_page_size: u32,
    _reserved1: u32,
    pub cpuid_page_physical_address: u64,
    pub cpuid_page_size: u32,
    _reserved2: u32,
}

impl Services {
    /// Locate and validate the SNP Confidential Computing Blob
    /// Configuration Table.
    pub fn snp_configuration(&self) -> Result<SnpConfigurationTable, Error> {
        let table = self.system_table.locate_configuration(SEV_SNP_CC_BLOB_GUID)?;
        let snp: SnpConfigurationTable = codec::decode(table.vendor_table)?;

        if snp.header != SNP_SIGNATURE || snp.version < 2 {
            return Err(Error::Protocol("EFI SNP Configuration Table"));
        }

        Ok(snp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(core::mem::size_of::<SnpConfigurationTable>(), 40);
    }

    #[test]
    fn test_signature_bytes() {
        assert_eq!(&SNP_SIGNATURE.to_le_bytes(), b"AMDE");
    }
}
