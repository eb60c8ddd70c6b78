//! `log` backend over the EFI console
//!
//! Records go to the Simple Text Output console of the installed
//! platform. Once the console has been silenced for the kernel
//! hand-off, writes become no-ops, so late records are harmless.

use core::fmt::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::platform;

static LOGGER: ConsoleLogger = ConsoleLogger;

struct ConsoleLogger;

struct ConsoleWriter<'a>(&'a oxboot_uefi::Console);

impl fmt::Write for ConsoleWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write(s.as_bytes()).map_err(|_| fmt::Error)?;
        Ok(())
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let Some(platform) = platform::get() else {
            return;
        };

        let mut out = ConsoleWriter(&platform.services.console);

        let _ = match record.level() {
            Level::Error | Level::Warn => {
                writeln!(out, "{}: {}", record.level(), record.args())
            }
            _ => writeln!(out, "{}", record.args()),
        };
    }

    fn flush(&self) {}
}

/// Install the console logger; called once after platform init.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}
