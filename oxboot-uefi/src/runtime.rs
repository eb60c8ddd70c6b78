//! EFI Runtime Services
//!
//! Runtime Services outlive `ExitBootServices`; the binding is never
//! poisoned. Besides system reset this covers the wall clock and the
//! variable services.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::codec;
use crate::error::Error;
use crate::guid::Guid;
use crate::invoke;
use crate::status::{self, EFI_BUFFER_TOO_SMALL, EFI_SUCCESS};

// EFI Runtime Services offsets
const GET_TIME: u64 = 0x18;
const GET_VARIABLE: u64 = 0x48;
const GET_NEXT_VARIABLE_NAME: u64 = 0x50;
const RESET_SYSTEM: u64 = 0x68;

pub const EFI_GLOBAL_VARIABLE_GUID: Guid = Guid::from_fields(
    0x8be4df61,
    0x93ca,
    0x11d2,
    [0xaa, 0x0d, 0x00, 0xe0, 0x98, 0x03, 0x2b, 0x8c],
);

/// EFI_RESET_SYSTEM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResetType {
    Cold = 0,
    Warm = 1,
    Shutdown = 2,
    PlatformSpecific = 3,
}

/// An EFI_TIME instance.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy)]
#[repr(C)]
pub struct Time {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    _pad0: u8,
    pub nanosecond: u32,
    pub time_zone: i16,
    pub daylight: u8,
    _pad1: u8,
}

impl fmt::Display for Time {
    /// RFC 3339 representation of the firmware clock.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )?;

        // 0x7ff marks an unspecified timezone
        if self.time_zone == 0x7ff || self.time_zone == 0 {
            write!(f, "Z")
        } else {
            let tz = self.time_zone;
            let (sign, tz) = if tz < 0 { ('+', -tz) } else { ('-', tz) };
            write!(f, "{}{:02}:{:02}", sign, tz / 60, tz % 60)
        }
    }
}

/// Attributes of a UEFI variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariableAttributes {
    pub non_volatile: bool,
    pub boot_service_access: bool,
    pub runtime_service_access: bool,
    pub hardware_error_record: bool,
    pub auth_write_access: bool,
    pub time_based_auth_write_access: bool,
    pub append_write: bool,
    pub enhanced_auth_access: bool,
}

impl VariableAttributes {
    #[must_use]
    pub fn from_bits(attributes: u32) -> Self {
        Self {
            non_volatile: attributes & 0x01 != 0,
            boot_service_access: attributes & 0x02 != 0,
            runtime_service_access: attributes & 0x04 != 0,
            hardware_error_record: attributes & 0x08 != 0,
            auth_write_access: attributes & 0x10 != 0,
            time_based_auth_write_access: attributes & 0x20 != 0,
            append_write: attributes & 0x40 != 0,
            enhanced_auth_access: attributes & 0x80 != 0,
        }
    }
}

/// An EFI Runtime Services instance.
pub struct RuntimeServices {
    base: u64,
}

impl RuntimeServices {
    pub(crate) fn new(base: u64) -> Self {
        Self { base }
    }

    fn slot(&self, offset: u64) -> Result<u64, Error> {
        if self.base == 0 {
            return Err(Error::FirmwareUnavailable);
        }

        Ok(self.base + offset)
    }

    /// Call `EFI_RUNTIME_SERVICES.ResetSystem()`. On success this does
    /// not return; an error means the firmware refused the request.
    pub fn reset_system(&self, reset_type: ResetType) -> Result<(), Error> {
        let slot = self.slot(RESET_SYSTEM)?;

        // SAFETY: live Runtime Services slot, scalar arguments only.
        let s = unsafe { invoke::call(slot, &[reset_type as u64, EFI_SUCCESS, 0, 0]) };

        status::check(s)
    }

    /// Call `EFI_RUNTIME_SERVICES.GetTime()`.
    pub fn get_time(&self) -> Result<Time, Error> {
        let slot = self.slot(GET_TIME)?;
        let mut time = Time::new_zeroed();

        // SAFETY: live Runtime Services slot; time lives across the call
        // on this frame, capabilities are not requested.
        let s = unsafe { invoke::call(slot, &[invoke::ptrval_mut(&mut time), 0]) };

        status::check(s)?;
        Ok(time)
    }

    /// Call `EFI_RUNTIME_SERVICES.GetVariable()`.
    ///
    /// The first call retrieves attributes and data size; the data
    /// itself is fetched with a second call when `with_data` is set.
    pub fn get_variable(
        &self,
        name: &str,
        guid: &Guid,
        with_data: bool,
    ) -> Result<(VariableAttributes, Vec<u8>), Error> {
        let slot = self.slot(GET_VARIABLE)?;
        let name_utf16 = codec::utf16_encode(name);

        let mut attributes = 0u32;
        let mut size = 0u64;

        // SAFETY: live Runtime Services slot; name, attributes and size
        // live across the call on this frame.
        let s = unsafe {
            invoke::call(
                slot,
                &[
                    name_utf16.as_ptr() as u64,
                    guid.as_ptr() as u64,
                    invoke::ptrval_mut(&mut attributes),
                    invoke::ptrval_mut(&mut size),
                    0,
                ],
            )
        };

        if s != EFI_SUCCESS && status::code(s) != EFI_BUFFER_TOO_SMALL {
            return Err(status::check(s).unwrap_err());
        }

        let attr = VariableAttributes::from_bits(attributes);

        if !with_data {
            return Ok((attr, Vec::new()));
        }

        let mut data = vec![0u8; size as usize];

        // SAFETY: as above, with the correctly sized data buffer.
        let s = unsafe {
            invoke::call(
                slot,
                &[
                    name_utf16.as_ptr() as u64,
                    guid.as_ptr() as u64,
                    0,
                    invoke::ptrval_mut(&mut size),
                    data.as_mut_ptr() as u64,
                ],
            )
        };

        status::check(s)?;
        data.truncate(size as usize);

        Ok((attr, data))
    }

    /// Call `EFI_RUNTIME_SERVICES.GetNextVariableName()`.
    ///
    /// Pass an empty name to start enumeration; returns
    /// [`Error::NotFound`] past the last variable.
    pub fn get_next_variable_name(
        &self,
        name: &mut String,
        guid: &mut Guid,
    ) -> Result<(), Error> {
        let slot = self.slot(GET_NEXT_VARIABLE_NAME)?;
        let last = codec::utf16_encode(name);

        let mut buf = vec![0u8; last.len().max(1024)];
        buf[..last.len()].copy_from_slice(&last);
        let mut size = buf.len() as u64;

        // SAFETY: live Runtime Services slot; size, buf and guid live
        // across the call on this frame.
        let s = unsafe {
            invoke::call(
                slot,
                &[
                    invoke::ptrval_mut(&mut size),
                    buf.as_mut_ptr() as u64,
                    guid.0.as_mut_ptr() as u64,
                ],
            )
        };

        status::check(s)?;
        *name = codec::utf16_decode(&buf);

        Ok(())
    }
}
