//! EFI Watchdog Timer

use crate::boot::BootServices;
use crate::error::Error;
use crate::invoke;
use crate::status;

/// EFI Boot Services offset for SetWatchdogTimer.
const SET_WATCHDOG_TIMER: u64 = 0x100;

/// Watchdog code identifying this loader's timeouts.
const WATCHDOG_CODE: u64 = 0xba3e5e7a1;

impl BootServices {
    /// Call `EFI_BOOT_SERVICES.SetWatchdogTimer()`; zero seconds disables
    /// the firmware watchdog.
    pub fn set_watchdog_timer(&self, seconds: u64) -> Result<(), Error> {
        let slot = self.slot(SET_WATCHDOG_TIMER)?;

        // SAFETY: live Boot Services slot, scalar arguments only.
        let s = unsafe { invoke::call(slot, &[seconds, WATCHDOG_CODE, 0, 0]) };

        status::check(s)
    }
}
