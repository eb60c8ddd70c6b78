//! EFI Console I/O
//!
//! An I/O adapter over the Simple Text Input/Output protocols. Writes
//! transcode UTF-8 to UTF-16, optionally replacing tabs and forcing a
//! carriage return after line feeds; reads poll `ReadKeyStroke` and
//! return what has been gathered when the firmware reports
//! `EFI_NOT_READY`, so callers never block inside a firmware call.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::error::Error;
use crate::invoke;
use crate::status::{self, EFI_NOT_READY, EFI_SUCCESS};

// EFI ConOut offsets
const OUTPUT_STRING: u64 = 0x08;
const SET_MODE: u64 = 0x20;
const SET_ATTRIBUTE: u64 = 0x28;
const CLEAR_SCREEN: u64 = 0x30;
const ENABLE_CURSOR: u64 = 0x40;

// EFI ConIn offsets
const READ_KEY_STROKE: u64 = 0x08;

// EFI text attributes
pub const EFI_BLACK: u64 = 0x00;
pub const EFI_BLUE: u64 = 0x01;
pub const EFI_GREEN: u64 = 0x02;
pub const EFI_CYAN: u64 = 0x03;
pub const EFI_RED: u64 = 0x04;
pub const EFI_MAGENTA: u64 = 0x05;
pub const EFI_BROWN: u64 = 0x06;
pub const EFI_LIGHTGRAY: u64 = 0x07;
pub const EFI_BRIGHT: u64 = 0x08;
pub const EFI_LIGHTBLUE: u64 = 0x09;
pub const EFI_LIGHTGREEN: u64 = 0x0a;
pub const EFI_LIGHTCYAN: u64 = 0x0b;
pub const EFI_LIGHTRED: u64 = 0x0c;
pub const EFI_LIGHTMAGENTA: u64 = 0x0d;
pub const EFI_YELLOW: u64 = 0x0e;
pub const EFI_WHITE: u64 = 0x0f;

// ASCII control characters
const TAB: u16 = 0x09;
const LF: u16 = 0x0a;
const CR: u16 = 0x0d;
const SPACE: u16 = 0x20;

/// Control Sequence Introducer n D - CUB - Cursor Back
const CUB: &[u8] = &[0x1b, 0x5b, 0x44, 0x20, 0x1b, 0x5b, 0x44];

/// An EFI Input Key descriptor.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy)]
#[repr(C)]
pub struct InputKey {
    pub scan_code: u16,
    pub unicode_char: [u8; 2],
}

/// Console I/O over the EFI Simple Text Input/Output protocols.
pub struct Console {
    /// Whether line feeds are supplemented with a carriage return.
    pub force_line: bool,
    /// Tab characters are replaced with this many spaces when non-zero.
    pub replace_tabs: usize,

    input: AtomicU64,
    output: AtomicU64,
}

impl Console {
    /// A fresh console binding: CR after LF on, tabs passed through
    /// until the platform configures a replacement width.
    pub(crate) fn new(input: u64, output: u64) -> Self {
        Self {
            force_line: true,
            replace_tabs: 0,
            input: AtomicU64::new(input),
            output: AtomicU64::new(output),
        }
    }

    /// Zero the output protocol pointer so later writes are no-ops; used
    /// right before the kernel hand-off.
    pub fn silence(&self) {
        self.output.store(0, Ordering::Release);
    }

    fn out(&self) -> u64 {
        self.output.load(Ordering::Acquire)
    }

    fn inp(&self) -> u64 {
        self.input.load(Ordering::Acquire)
    }

    /// Call `EFI_SIMPLE_TEXT_OUTPUT_PROTOCOL.ClearScreen()`.
    pub fn clear_screen(&self) -> Result<(), Error> {
        let out = self.out();
        if out == 0 {
            return Ok(());
        }

        // SAFETY: out is the live ConOut protocol instance.
        let s = unsafe { invoke::call(out + CLEAR_SCREEN, &[out]) };
        status::check(s)
    }

    /// Call `EFI_SIMPLE_TEXT_OUTPUT_PROTOCOL.SetMode()`.
    pub fn set_mode(&self, mode: u64) -> Result<(), Error> {
        let out = self.out();
        if out == 0 {
            return Ok(());
        }

        // SAFETY: out is the live ConOut protocol instance.
        let s = unsafe { invoke::call(out + SET_MODE, &[out, mode]) };
        status::check(s)
    }

    /// Call `EFI_SIMPLE_TEXT_OUTPUT_PROTOCOL.SetAttribute()`.
    pub fn set_attribute(&self, attribute: u64) -> Result<(), Error> {
        let out = self.out();
        if out == 0 {
            return Ok(());
        }

        // SAFETY: out is the live ConOut protocol instance.
        let s = unsafe { invoke::call(out + SET_ATTRIBUTE, &[out, attribute]) };
        status::check(s)
    }

    /// Call `EFI_SIMPLE_TEXT_OUTPUT_PROTOCOL.EnableCursor()`.
    pub fn enable_cursor(&self, visible: bool) -> Result<(), Error> {
        let out = self.out();
        if out == 0 {
            return Ok(());
        }

        // SAFETY: out is the live ConOut protocol instance.
        let s = unsafe { invoke::call(out + ENABLE_CURSOR, &[out, visible as u64]) };
        status::check(s)
    }

    /// Call `EFI_SIMPLE_TEXT_INPUT_PROTOCOL.ReadKeyStroke()`, returning
    /// the raw status word.
    pub fn input(&self, key: &mut InputKey) -> u64 {
        let inp = self.inp();
        if inp == 0 {
            return EFI_SUCCESS;
        }

        // SAFETY: inp is the live ConIn protocol instance; key lives
        // across the call on the caller's frame.
        unsafe { invoke::call(inp + READ_KEY_STROKE, &[inp, invoke::ptrval_mut(key)]) }
    }

    /// Call `EFI_SIMPLE_TEXT_OUTPUT_PROTOCOL.OutputString()` with a
    /// NUL-terminated UTF-16 buffer, returning the raw status word.
    pub fn output(&self, buf: &[u8]) -> u64 {
        let out = self.out();
        if out == 0 {
            return EFI_SUCCESS;
        }

        let mut s = Vec::with_capacity(buf.len() + 2);
        s.extend_from_slice(buf);

        if buf.len() < 2 || buf[buf.len() - 2..] != [0, 0] {
            s.extend_from_slice(&[0, 0]);
        }

        // SAFETY: out is the live ConOut protocol instance; s lives
        // across the call on this frame.
        unsafe { invoke::call(out + OUTPUT_STRING, &[out, s.as_ptr() as u64]) }
    }

    /// Read available keystrokes into `buf`, two bytes per key.
    ///
    /// Keys with a non-zero scan code are stored as the little-endian
    /// scan code; otherwise the Unicode char bytes are copied.
    /// `EFI_NOT_READY` ends the read early with what was gathered — a
    /// soft EOF for this call, never surfaced as an error.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut key = InputKey::new_zeroed();
        let mut n = 0;

        while n + 2 <= buf.len() {
            let s = self.input(&mut key);

            match s {
                _ if status::code(s) == EFI_NOT_READY && s != EFI_SUCCESS => {
                    // yield briefly so cooperative callers are not starved
                    core::hint::spin_loop();
                    return Ok(n);
                }
                EFI_SUCCESS => {
                    if key.scan_code > 0 {
                        buf[n..n + 2].copy_from_slice(&key.scan_code.to_le_bytes());
                    } else {
                        buf[n..n + 2].copy_from_slice(&key.unicode_char);
                    }

                    n += 2;
                }
                _ => return status::check(s).map(|()| n),
            }
        }

        Ok(n)
    }

    /// Write a UTF-8 buffer to the console.
    pub fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        // the terminal layer expresses backspace as cursor-back
        let buf = if buf == CUB { &[0x08, 0x00][..] } else { buf };

        let text = alloc::string::String::from_utf8_lossy(buf);
        let mut s: Vec<u8> = Vec::with_capacity(buf.len() * 2 + 2);

        for unit in text.encode_utf16() {
            if unit == TAB && self.replace_tabs > 0 {
                for _ in 0..self.replace_tabs {
                    s.extend_from_slice(&SPACE.to_le_bytes());
                }
                continue;
            }

            s.extend_from_slice(&unit.to_le_bytes());

            if unit == LF && self.force_line {
                s.extend_from_slice(&CR.to_le_bytes());
            }
        }

        let status = self.output(&s);
        status::check(status)?;

        Ok(buf.len())
    }
}
