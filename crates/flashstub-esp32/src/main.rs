//! flashstub-esp32 - flash stub for the dual-core ESP32
//!
//! The debug host loads this image into RAM and jumps to [`stub_main`]
//! with the command identifier and up to four 32-bit arguments in
//! registers. Nothing survives between calls except what the host reloads.

#![no_std]
#![no_main]
#![feature(asm_experimental_arch)]

mod platform;
mod rom;

#[cfg(feature = "diag")]
mod diag;

use core::ptr::addr_of_mut;

use flashstub_core::entry::{self, Stub};
use flashstub_core::{RawRequest, StubConfig, WriteMode};

use crate::platform::Esp32;

const MAX_POLLS: u32 = 1_000_000;

const CONFIG: StubConfig = {
    let config = StubConfig::new();
    let config = if cfg!(feature = "streaming-write") {
        config.with_write_mode(WriteMode::Streaming)
    } else {
        config
    };
    if cfg!(feature = "bounded-poll") {
        config.with_bounded_polling(MAX_POLLS)
    } else {
        config
    }
};

extern "C" {
    static mut _bss_start: u32;
    static mut _bss_end: u32;
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo<'_>) -> ! {
    loop {
        core::hint::spin_loop();
    }
}

/// Stub entry point
///
/// # Safety
///
/// Called only by the debug host's loader, once per upload, with arguments
/// encoded for `cmd` as [`RawRequest::decode`] expects.
#[no_mangle]
#[link_section = ".text.stub_main"]
pub unsafe extern "C" fn stub_main(
    cmd: i32,
    arg0: usize,
    arg1: usize,
    arg2: usize,
    arg3: usize,
) -> i32 {
    entry::zero_bss(addr_of_mut!(_bss_start), addr_of_mut!(_bss_end));

    #[cfg(feature = "diag")]
    diag::attach(CONFIG.log_level);

    let mut stub = Stub::new(Esp32::steal(), CONFIG);
    stub.handle_raw(&RawRequest::new(cmd, [arg0, arg1, arg2, arg3]))
        .code()
}
