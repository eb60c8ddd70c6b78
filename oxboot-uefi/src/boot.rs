//! EFI Boot Services binding and lifetime state machine
//!
//! The binding holds the table base and the image handle; every call
//! resolves as `invoke::call(base + offset, args)`. The base is zeroed
//! once `ExitBootServices` succeeds, so a stray late call faults on the
//! slot read instead of corrupting firmware state, and the wrappers
//! refuse poisoned bindings with [`Error::FirmwareUnavailable`].

use core::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::error::Error;

/// Boot Services lifetime.
///
/// ```text
/// Uninit -> Bound -> Exiting -> Exited
///                 \-> Fatal
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Uninit = 0,
    /// Normal operation; all Boot Services calls permitted.
    Bound = 1,
    /// Inside the `GetMemoryMap` + `ExitBootServices` critical section.
    Exiting = 2,
    /// Boot Services are gone; only Runtime Services remain callable.
    Exited = 3,
    /// The exit handshake failed beyond retry.
    Fatal = 4,
}

impl Lifecycle {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Bound,
            2 => Self::Exiting,
            3 => Self::Exited,
            4 => Self::Fatal,
            _ => Self::Uninit,
        }
    }
}

/// An EFI Boot Services instance.
pub struct BootServices {
    base: AtomicU64,
    image_handle: u64,
    state: AtomicU8,
}

impl BootServices {
    pub(crate) fn new(base: u64, image_handle: u64) -> Self {
        let state = if base == 0 {
            Lifecycle::Uninit
        } else {
            Lifecycle::Bound
        };

        Self {
            base: AtomicU64::new(base),
            image_handle,
            state: AtomicU8::new(state as u8),
        }
    }

    /// The image handle this binding was created with.
    #[must_use]
    pub fn image_handle(&self) -> u64 {
        self.image_handle
    }

    /// Current lifetime state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether Boot Services calls are currently permitted.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.lifecycle() == Lifecycle::Bound
    }

    pub(crate) fn set_state(&self, state: Lifecycle) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Resolve a service slot address, refusing poisoned bindings.
    pub(crate) fn slot(&self, offset: u64) -> Result<u64, Error> {
        let base = self.base.load(Ordering::Acquire);

        if base == 0 {
            return Err(Error::FirmwareUnavailable);
        }

        Ok(base + offset)
    }

    /// Poison the binding after a successful `ExitBootServices`.
    pub(crate) fn poison(&self) {
        self.base.store(0, Ordering::Release);
        self.set_state(Lifecycle::Exited);
    }
}
