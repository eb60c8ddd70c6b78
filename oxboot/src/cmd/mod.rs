//! Command layer
//!
//! One function per command surfaced to the external shell. Commands
//! take the platform by reference and typed arguments (the dispatcher
//! owns line parsing) and return their output as a string; user-visible
//! failures carry a single-line summary.

mod common;
mod efi;
mod linux;
mod sev;

pub use common::{date, dma, info, uptime};
pub use efi::{
    alloc_pages, cat, clear, exit, halt, image, ls, memmap, mode, protocol, reset, stat,
    uefi_info, windows,
};
pub use linux::{bt, linux};
pub use sev::{sev, sev_report};

use core::fmt;

use oxboot_linux::BootError;
use oxboot_transparency::ValidateError;
use oxboot_uapi::EntryError;
use oxboot_uefi::Error as UefiError;

/// Command failures, printed by the shell as one line.
#[derive(Debug)]
pub enum CmdError {
    Uefi(UefiError),
    Boot(BootError),
    Entry(EntryError),
    Validate(ValidateError),
    Invalid(&'static str),
    Unsupported(&'static str),
}

impl fmt::Display for CmdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uefi(err) => write!(f, "{err}"),
            Self::Boot(err) => write!(f, "{err}"),
            Self::Entry(err) => write!(f, "{err}"),
            Self::Validate(err) => write!(f, "{err}"),
            Self::Invalid(what) => write!(f, "invalid argument, {what}"),
            Self::Unsupported(what) => write!(f, "{what}"),
        }
    }
}

impl From<UefiError> for CmdError {
    fn from(err: UefiError) -> Self {
        Self::Uefi(err)
    }
}

impl From<BootError> for CmdError {
    fn from(err: BootError) -> Self {
        Self::Boot(err)
    }
}

impl From<EntryError> for CmdError {
    fn from(err: EntryError) -> Self {
        Self::Entry(err)
    }
}

impl From<ValidateError> for CmdError {
    fn from(err: ValidateError) -> Self {
        Self::Validate(err)
    }
}

/// The command result: printable output, or a one-line failure.
pub type CmdResult = Result<alloc::string::String, CmdError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_single_line_summaries() {
        let err = CmdError::Uefi(UefiError::Status(0x8000_0000_0000_0005));
        assert_eq!(err.to_string(), "EFI_STATUS error 0x8000000000000005 (5)");

        let err = CmdError::Invalid("bt status");
        assert_eq!(err.to_string(), "invalid argument, bt status");

        let err = CmdError::Boot(BootError::NoUsableMemory);
        assert!(!err.to_string().contains('\n'));
    }
}
