//! EFI status codes and their mapping to the error taxonomy.

use crate::error::Error;

// EFI Status Codes
pub const EFI_SUCCESS: u64 = 0;
pub const EFI_LOAD_ERROR: u64 = 1;
pub const EFI_INVALID_PARAMETER: u64 = 2;
pub const EFI_UNSUPPORTED: u64 = 3;
pub const EFI_BAD_BUFFER_SIZE: u64 = 4;
pub const EFI_BUFFER_TOO_SMALL: u64 = 5;
pub const EFI_NOT_READY: u64 = 6;
pub const EFI_DEVICE_ERROR: u64 = 7;
pub const EFI_WRITE_PROTECTED: u64 = 8;
pub const EFI_OUT_OF_RESOURCES: u64 = 9;
pub const EFI_VOLUME_CORRUPTED: u64 = 10;
pub const EFI_VOLUME_FULL: u64 = 11;
pub const EFI_NO_MEDIA: u64 = 12;
pub const EFI_MEDIA_CHANGED: u64 = 13;
pub const EFI_NOT_FOUND: u64 = 14;
pub const EFI_ACCESS_DENIED: u64 = 15;
pub const EFI_NO_RESPONSE: u64 = 16;
pub const EFI_NO_MAPPING: u64 = 17;
pub const EFI_TIMEOUT: u64 = 18;
pub const EFI_NOT_STARTED: u64 = 19;
pub const EFI_ALREADY_STARTED: u64 = 20;
pub const EFI_ABORTED: u64 = 21;
pub const EFI_ICMP_ERROR: u64 = 22;
pub const EFI_TFTP_ERROR: u64 = 23;
pub const EFI_PROTOCOL_ERROR: u64 = 24;
pub const EFI_INCOMPATIBLE_VERSION: u64 = 25;
pub const EFI_SECURITY_VIOLATION: u64 = 26;
pub const EFI_CRC_ERROR: u64 = 27;
pub const EFI_END_OF_MEDIA: u64 = 28;
pub const EFI_END_OF_FILE: u64 = 29;
pub const EFI_INVALID_LANGUAGE: u64 = 30;
pub const EFI_COMPROMISED_DATA: u64 = 31;
pub const EFI_IP_ADDRESS_CONFLICT: u64 = 32;
pub const EFI_HTTP_ERROR: u64 = 33;

/// The code part of a status word (the high bit carries the error class).
#[must_use]
pub fn code(status: u64) -> u64 {
    status & 0xff
}

/// Translate a raw status word into the error taxonomy.
///
/// `EFI_NOT_READY`, `EFI_BUFFER_TOO_SMALL` and `EFI_NOT_FOUND` get
/// distinct kinds because callers recover from them; everything else is
/// surfaced with the raw word attached. Callers that learn the required
/// size fill in `BufferTooSmall::needed` themselves.
pub fn check(status: u64) -> Result<(), Error> {
    if status == EFI_SUCCESS {
        return Ok(());
    }

    match code(status) {
        EFI_NOT_READY => Err(Error::NotReady),
        EFI_BUFFER_TOO_SMALL => Err(Error::BufferTooSmall { needed: 0 }),
        EFI_NOT_FOUND => Err(Error::NotFound),
        _ => Err(Error::Status(status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERR: u64 = 1 << 63;

    #[test]
    fn test_success() {
        assert!(check(EFI_SUCCESS).is_ok());
    }

    #[test]
    fn test_recoverable_kinds() {
        assert_eq!(check(ERR | EFI_NOT_READY), Err(Error::NotReady));
        assert_eq!(
            check(ERR | EFI_BUFFER_TOO_SMALL),
            Err(Error::BufferTooSmall { needed: 0 })
        );
        assert_eq!(check(ERR | EFI_NOT_FOUND), Err(Error::NotFound));
    }

    #[test]
    fn test_raw_status_preserved() {
        let status = ERR | EFI_DEVICE_ERROR;
        assert_eq!(check(status), Err(Error::Status(status)));
    }
}
