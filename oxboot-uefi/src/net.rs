//! EFI Simple Network Protocol
//!
//! Thin wrappers used by the online transparency probe. Transmits wait
//! for the transmit interrupt with a bounded poll; receives map
//! `EFI_NOT_READY` to an empty read so callers can poll without
//! blocking.

use crate::boot::BootServices;
use crate::error::Error;
use crate::guid::Guid;
use crate::invoke;
use crate::status::{self, EFI_NOT_READY, EFI_TIMEOUT};

pub const SIMPLE_NETWORK_PROTOCOL_GUID: Guid = Guid::from_fields(
    0xa19832b9,
    0xac25,
    0x11d3,
    [0x9a, 0x2d, 0x00, 0x90, 0x27, 0x3f, 0xc1, 0x4d],
);

pub const SIMPLE_NETWORK_TRANSMIT_INTERRUPT: u32 = 0x02;

// EFI Simple Network Protocol offsets
const START: u64 = 0x08;
const STOP: u64 = 0x10;
const INITIALIZE: u64 = 0x18;
const GET_STATUS: u64 = 0x58;
const TRANSMIT: u64 = 0x60;
const RECEIVE: u64 = 0x68;

/// Status polls before a transmit wait is abandoned (about 10 ms of
/// firmware round-trips on common platforms).
const TRANSMIT_WAIT_POLLS: usize = 100_000;

/// An EFI Simple Network Protocol instance.
pub struct SimpleNetwork {
    base: u64,
}

impl SimpleNetwork {
    /// Call `EFI_SIMPLE_NETWORK.Start()`.
    pub fn start(&self) -> Result<(), Error> {
        // SAFETY: base is the live protocol instance.
        let s = unsafe { invoke::call(self.base + START, &[self.base]) };
        status::check(s)
    }

    /// Call `EFI_SIMPLE_NETWORK.Stop()`.
    pub fn stop(&self) -> Result<(), Error> {
        // SAFETY: base is the live protocol instance.
        let s = unsafe { invoke::call(self.base + STOP, &[self.base]) };
        status::check(s)
    }

    /// Call `EFI_SIMPLE_NETWORK.Initialize()`.
    pub fn initialize(&self) -> Result<(), Error> {
        // SAFETY: base is the live protocol instance.
        let s = unsafe { invoke::call(self.base + INITIALIZE, &[self.base, 0, 0]) };
        status::check(s)
    }

    /// Call `EFI_SIMPLE_NETWORK.GetStatus()`.
    pub fn get_status(&self) -> Result<(u32, u64), Error> {
        let mut interrupt_status = 0u32;
        let mut tx_buf = 0u64;

        // SAFETY: base is the live protocol instance; the out-parameters
        // live across the call on this frame.
        let s = unsafe {
            invoke::call(
                self.base + GET_STATUS,
                &[
                    self.base,
                    invoke::ptrval_mut(&mut interrupt_status),
                    invoke::ptrval_mut(&mut tx_buf),
                ],
            )
        };

        status::check(s)?;
        Ok((interrupt_status, tx_buf))
    }

    /// Call `EFI_SIMPLE_NETWORK.Transmit()` and wait for the transmit
    /// interrupt before returning.
    pub fn transmit(&self, buf: &[u8]) -> Result<(), Error> {
        // SAFETY: base is the live protocol instance; buf lives across
        // the call.
        let s = unsafe {
            invoke::call(
                self.base + TRANSMIT,
                &[
                    self.base,
                    0,
                    buf.len() as u64,
                    buf.as_ptr() as u64,
                    0,
                    0,
                    0,
                ],
            )
        };

        status::check(s)?;

        for _ in 0..TRANSMIT_WAIT_POLLS {
            let (interrupt_status, _) = self.get_status()?;

            if interrupt_status & SIMPLE_NETWORK_TRANSMIT_INTERRUPT != 0 {
                return Ok(());
            }

            core::hint::spin_loop();
        }

        Err(Error::Status(EFI_TIMEOUT | (1 << 63)))
    }

    /// Call `EFI_SIMPLE_NETWORK.Receive()`; returns zero when no frame
    /// is pending.
    pub fn receive(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut size = buf.len() as u64;

        // SAFETY: base is the live protocol instance; size and buf live
        // across the call.
        let s = unsafe {
            invoke::call(
                self.base + RECEIVE,
                &[
                    self.base,
                    0,
                    invoke::ptrval_mut(&mut size),
                    buf.as_mut_ptr() as u64,
                    0,
                    0,
                    0,
                ],
            )
        };

        if status::code(s) == EFI_NOT_READY {
            return Ok(0);
        }

        status::check(s)?;
        Ok(size as usize)
    }
}

impl BootServices {
    /// Locate the EFI Simple Network Protocol instance.
    pub fn network(&self) -> Result<SimpleNetwork, Error> {
        let base = self.locate_protocol(&SIMPLE_NETWORK_PROTOCOL_GUID)?;
        Ok(SimpleNetwork { base })
    }
}
