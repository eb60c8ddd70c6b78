//! Boot pipeline errors

use core::fmt;

use oxboot_mem::WindowError;
use oxboot_uefi::Error as UefiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// The kernel image failed bzImage validation.
    InvalidImage(&'static str),
    /// A pipeline input was rejected (empty kernel, oversized cmdline,
    /// load address beyond what the boot protocol can express).
    InvalidArgument(&'static str),
    /// The memory scan did not locate a suitable conventional region.
    NoUsableMemory,
    /// A firmware call failed.
    Uefi(UefiError),
    /// Physical window bookkeeping rejected the load region.
    Window(WindowError),
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidImage(what) => write!(f, "invalid kernel image, {what}"),
            Self::InvalidArgument(what) => write!(f, "invalid argument, {what}"),
            Self::NoUsableMemory => write!(f, "could not find memory for kernel loading"),
            Self::Uefi(err) => write!(f, "{err}"),
            Self::Window(err) => write!(f, "{err}"),
        }
    }
}

impl From<UefiError> for BootError {
    fn from(err: UefiError) -> Self {
        Self::Uefi(err)
    }
}

impl From<WindowError> for BootError {
    fn from(err: WindowError) -> Self {
        Self::Window(err)
    }
}
