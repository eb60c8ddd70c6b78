//! Error taxonomy for firmware interaction.

use core::fmt;

use oxboot_mem::WindowError;

/// Errors surfaced by the service binding layer.
///
/// Raw status words are translated here, at the narrow waist between the
/// invoker and the service wrappers; composite operations attach context
/// above this level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// System Table missing, wrong signature, or Boot Services exited.
    FirmwareUnavailable,
    /// Raw EFI status word from a service call.
    Status(u64),
    /// Retry-later signal (console reads).
    NotReady,
    /// Retry with a larger buffer; carries the size firmware asked for.
    BufferTooSmall { needed: usize },
    /// Variable, protocol or file absent.
    NotFound,
    /// Malformed GUID, non-aligned address, bad size.
    InvalidArgument(&'static str),
    /// A firmware structure failed a shape or revision check.
    Protocol(&'static str),
    /// Physical window bookkeeping rejected an access.
    Window(WindowError),
    /// Unrecoverable; the caller typically resets the system.
    Fatal(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirmwareUnavailable => write!(f, "EFI services unavailable"),
            Self::Status(s) => write!(f, "EFI_STATUS error {:#x} ({})", s, s & 0xff),
            Self::NotReady => write!(f, "not ready"),
            Self::BufferTooSmall { needed } => {
                write!(f, "buffer too small, {needed} bytes required")
            }
            Self::NotFound => write!(f, "not found"),
            Self::InvalidArgument(what) => write!(f, "invalid argument, {what}"),
            Self::Protocol(what) => write!(f, "invalid protocol data, {what}"),
            Self::Window(err) => write!(f, "{err}"),
            Self::Fatal(what) => write!(f, "fatal error, {what}"),
        }
    }
}

impl From<WindowError> for Error {
    fn from(err: WindowError) -> Self {
        Self::Window(err)
    }
}
