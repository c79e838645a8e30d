//! Best-effort diagnostics over the ROM UART printf
//!
//! Records are formatted into a fixed buffer and truncated when they do not
//! fit. Nothing here can fail the command being served.

use core::fmt::Write;

use heapless::String;
use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::rom;

const LINE_CAPACITY: usize = 160;

struct RomLogger;

static LOGGER: RomLogger = RomLogger;

fn tag(level: Level) -> &'static str {
    match level {
        Level::Error => "E",
        Level::Warn => "W",
        Level::Info => "I",
        Level::Debug => "D",
        Level::Trace => "V",
    }
}

impl Log for RomLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut line: String<LINE_CAPACITY> = String::new();
        // Overflow only truncates the line
        let _ = write!(line, "stub {}: {}", tag(record.level()), record.args());
        if line.push('\0').is_err() {
            // Make room for the terminator
            line.truncate(LINE_CAPACITY - 1);
            let _ = line.push('\0');
        }

        unsafe {
            rom::ets_printf(b"%s\n\0".as_ptr(), line.as_ptr());
        }
    }

    fn flush(&self) {}
}

/// Route the UART to the ROM printf and install the logger
///
/// # Safety
///
/// Must run once, before anything logs, with no other thread of execution.
pub unsafe fn attach(level: LevelFilter) {
    rom::uartAttach();
    rom::ets_install_uart_printf();
    // A second attach within one upload keeps the first logger
    let _ = log::set_logger_racy(&LOGGER);
    log::set_max_level_racy(level);
}
