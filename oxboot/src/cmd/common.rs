//! Loader state commands

use alloc::format;
use alloc::string::String;
use core::fmt::Write;

use crate::cmd::{CmdError, CmdResult};
use crate::config;
use crate::platform::Platform;

/// `info` — loader information.
pub fn info(p: &Platform) -> CmdResult {
    let mut buf = String::new();
    let (ram_start, ram_end) = p.runtime_region();
    let stats = p.heap_stats();

    let _ = writeln!(buf, "{}", config::BANNER);
    let _ = writeln!(buf, "Runtime ............: {ram_start:#x} - {ram_end:#x}");
    let _ = writeln!(
        buf,
        "Heap ...............: {} used / {} free",
        stats.used, stats.free
    );

    if let Ok((base, size)) = p.services.loaded_image_region() {
        let _ = writeln!(buf, "Image ..............: {base:#x} ({size} bytes)");
    }

    Ok(buf)
}

/// `date [rfc3339]` — show the firmware wall clock.
pub fn date(p: &Platform, set: Option<&str>) -> CmdResult {
    if set.is_some() {
        // the RTC is owned by firmware; writing goes through an
        // out-of-scope driver
        return Err(CmdError::Unsupported("setting the clock is not supported"));
    }

    let time = p.services.runtime.get_time()?;
    Ok(format!("{time}"))
}

/// `uptime` — time since the tick source started.
pub fn uptime(p: &Platform) -> CmdResult {
    let Some(ns) = p.uptime() else {
        return Err(CmdError::Unsupported("no monotonic time source available"));
    };

    let secs = ns / 1_000_000_000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    Ok(format!("up {h}h{m}m{s}s"))
}

/// `dma [free|used]` — physical window and heap accounting.
pub fn dma(p: &Platform, filter: Option<&str>) -> CmdResult {
    let mut buf = String::new();
    let stats = p.heap_stats();

    let show_used = matches!(filter, None | Some("used"));
    let show_free = matches!(filter, None | Some("free"));

    if show_used {
        let mut windows = [(0u64, 0u64); 16];
        let n = oxboot_mem::window::live_windows(&mut windows);

        for (start, end) in &windows[..n] {
            let _ = writeln!(buf, "{:#08x}-{:#08x} {:10} window", start, end, end - start);
        }

        let _ = writeln!(buf, "{:21} {:10} bytes used", "", stats.used);
    }

    if show_free {
        let _ = writeln!(buf, "{:21} {:10} bytes free", "", stats.free);
    }

    if stats.grown_end > 0 {
        let _ = writeln!(
            buf,
            "heap region {:#08x}-{:#08x}",
            stats.grown_start, stats.grown_end
        );
    }

    Ok(buf)
}
