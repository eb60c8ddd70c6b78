//! Scoped Physical Memory Windows
//!
//! A [`PhysWindow`] borrows a `(address, length)` range of firmware memory
//! for the duration of a scope. Firmware tables, protocol instances and
//! reserved load regions are only ever accessed through a window, so every
//! raw access has a registered owner and overlapping borrows are caught at
//! runtime instead of silently aliasing.
//!
//! The registry is a fixed table: the loader holds only a handful of
//! windows at any time (decode scopes plus the kernel load region).

use core::fmt;
use core::marker::PhantomData;

use spin::Mutex;

/// Maximum number of concurrently live windows.
const MAX_WINDOWS: usize = 16;

/// Errors raised by window mapping and access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowError {
    /// The requested address is zero or the length is zero.
    InvalidRange,
    /// The range overlaps a live window.
    Overlap,
    /// The registry is full.
    Exhausted,
    /// An access would fall outside the window.
    OutOfBounds,
    /// The window is read-only.
    ReadOnly,
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRange => write!(f, "invalid physical range"),
            Self::Overlap => write!(f, "range overlaps a live window"),
            Self::Exhausted => write!(f, "window registry exhausted"),
            Self::OutOfBounds => write!(f, "access outside window bounds"),
            Self::ReadOnly => write!(f, "window is read-only"),
        }
    }
}

#[derive(Clone, Copy)]
struct Slot {
    start: u64,
    end: u64,
    live: bool,
}

const EMPTY: Slot = Slot {
    start: 0,
    end: 0,
    live: false,
};

static REGISTRY: Mutex<[Slot; MAX_WINDOWS]> = Mutex::new([EMPTY; MAX_WINDOWS]);

/// A scoped borrow of a physical memory range.
///
/// The range is registered on creation and released when the window is
/// dropped. Windows must not outlive the firmware region they view; the
/// caller is responsible for only mapping addresses published by firmware
/// (System Table, protocol instances, configuration tables) or reserved
/// through `AllocatePages`.
#[derive(PartialEq)]
pub struct PhysWindow {
    start: u64,
    len: usize,
    writable: bool,
    // raw pointer semantics, not Send/Sync
    _marker: PhantomData<*mut u8>,
}

impl PhysWindow {
    /// Map a read-only window over `start..start + len`.
    pub fn map(start: u64, len: usize) -> Result<Self, WindowError> {
        Self::map_inner(start, len, false)
    }

    /// Map a writable window over `start..start + len`.
    pub fn map_mut(start: u64, len: usize) -> Result<Self, WindowError> {
        Self::map_inner(start, len, true)
    }

    fn map_inner(start: u64, len: usize, writable: bool) -> Result<Self, WindowError> {
        if start == 0 || len == 0 {
            return Err(WindowError::InvalidRange);
        }

        let end = start
            .checked_add(len as u64)
            .ok_or(WindowError::InvalidRange)?;

        let mut registry = REGISTRY.lock();
        let mut free = None;

        for (i, slot) in registry.iter().enumerate() {
            if !slot.live {
                free.get_or_insert(i);
                continue;
            }

            if start < slot.end && slot.start < end {
                return Err(WindowError::Overlap);
            }
        }

        let i = free.ok_or(WindowError::Exhausted)?;
        registry[i] = Slot {
            start,
            end,
            live: true,
        };

        Ok(Self {
            start,
            len,
            writable,
            _marker: PhantomData,
        })
    }

    /// Window start address.
    #[must_use]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Window length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `buf.len()` bytes out of the window at `offset`.
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), WindowError> {
        self.check(offset, buf.len())?;

        // SAFETY: the range is inside the registered window and the caller
        // mapped a firmware-published address.
        unsafe {
            core::ptr::copy_nonoverlapping(
                (self.start as usize + offset) as *const u8,
                buf.as_mut_ptr(),
                buf.len(),
            );
        }

        Ok(())
    }

    /// Copy `buf` into the window at `offset`.
    pub fn write(&mut self, offset: usize, buf: &[u8]) -> Result<(), WindowError> {
        if !self.writable {
            return Err(WindowError::ReadOnly);
        }

        self.check(offset, buf.len())?;

        // SAFETY: the range is inside the registered window, the window is
        // writable, and overlap with other live windows was rejected.
        unsafe {
            core::ptr::copy_nonoverlapping(
                buf.as_ptr(),
                (self.start as usize + offset) as *mut u8,
                buf.len(),
            );
        }

        Ok(())
    }

    /// Fill `len` bytes of the window at `offset` with `byte`.
    pub fn fill(&mut self, offset: usize, len: usize, byte: u8) -> Result<(), WindowError> {
        if !self.writable {
            return Err(WindowError::ReadOnly);
        }

        self.check(offset, len)?;

        // SAFETY: bounds checked above, writable window.
        unsafe {
            core::ptr::write_bytes((self.start as usize + offset) as *mut u8, byte, len);
        }

        Ok(())
    }

    fn check(&self, offset: usize, len: usize) -> Result<(), WindowError> {
        let end = offset.checked_add(len).ok_or(WindowError::OutOfBounds)?;

        if end > self.len {
            return Err(WindowError::OutOfBounds);
        }

        Ok(())
    }
}

impl Drop for PhysWindow {
    fn drop(&mut self) {
        let end = self.start + self.len as u64;
        let mut registry = REGISTRY.lock();

        for slot in registry.iter_mut() {
            if slot.live && slot.start == self.start && slot.end == end {
                slot.live = false;
                break;
            }
        }
    }
}

impl fmt::Debug for PhysWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PhysWindow({:#x}..{:#x})",
            self.start,
            self.start + self.len as u64
        )
    }
}

/// Snapshot of the live window ranges, for diagnostics.
pub fn live_windows(out: &mut [(u64, u64)]) -> usize {
    let registry = REGISTRY.lock();
    let mut n = 0;

    for slot in registry.iter() {
        if slot.live && n < out.len() {
            out[n] = (slot.start, slot.end);
            n += 1;
        }
    }

    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_and_release() {
        let buf = [0u8; 64];
        let addr = buf.as_ptr() as u64;

        {
            let w = PhysWindow::map(addr, 64).unwrap();
            assert_eq!(w.start(), addr);
            assert_eq!(w.len(), 64);
        }

        // released on drop, remappable
        let _w = PhysWindow::map(addr, 64).unwrap();
    }

    #[test]
    fn test_overlap_rejected() {
        let buf = [0u8; 128];
        let addr = buf.as_ptr() as u64;

        let _a = PhysWindow::map(addr, 128).unwrap();
        assert_eq!(PhysWindow::map(addr + 64, 16), Err(WindowError::Overlap));
        assert_eq!(PhysWindow::map(addr, 8), Err(WindowError::Overlap));

        // adjacent range is fine
        let other = [0u8; 16];
        let _b = PhysWindow::map(other.as_ptr() as u64, 16).unwrap();
    }

    #[test]
    fn test_zero_range_rejected() {
        assert_eq!(PhysWindow::map(0, 64), Err(WindowError::InvalidRange));

        let buf = [0u8; 8];
        assert_eq!(
            PhysWindow::map(buf.as_ptr() as u64, 0),
            Err(WindowError::InvalidRange)
        );
    }

    #[test]
    fn test_read_write() {
        let buf = [0xaau8; 32];
        let addr = buf.as_ptr() as u64;

        let w = PhysWindow::map(addr, 32).unwrap();
        let mut out = [0u8; 4];
        w.read(8, &mut out).unwrap();
        assert_eq!(out, [0xaa; 4]);

        assert_eq!(w.read(30, &mut [0u8; 4]), Err(WindowError::OutOfBounds));
        drop(w);

        let mut target = [0u8; 32];
        let mut w = PhysWindow::map_mut(target.as_mut_ptr() as u64, 32).unwrap();
        w.write(4, &[1, 2, 3]).unwrap();
        w.fill(10, 2, 0xff).unwrap();
        drop(w);

        assert_eq!(&target[4..7], &[1, 2, 3]);
        assert_eq!(&target[10..12], &[0xff, 0xff]);
    }

    #[test]
    fn test_read_only_write_rejected() {
        let buf = [0u8; 16];
        let mut w = PhysWindow::map(buf.as_ptr() as u64, 16).unwrap();
        assert_eq!(w.write(0, &[0]), Err(WindowError::ReadOnly));
        assert_eq!(w.fill(0, 1, 0), Err(WindowError::ReadOnly));
    }
}
