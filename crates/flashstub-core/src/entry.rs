//! Entry point
//!
//! The loader jumps here once per upload with the command in registers.
//! Bring-up is the caller's job on the target (zeroing the uninitialised
//! data region with [`zero_bss`], attaching diagnostics); [`Stub`] then
//! decodes the request and routes flash commands to the dispatcher.

use log::{debug, warn};

use crate::command::{RawRequest, Request};
use crate::config::StubConfig;
use crate::dispatch;
use crate::error::Status;
use crate::platform::Platform;

/// Zero the words in `[start, end)`
///
/// # Safety
///
/// The range must be valid, word-aligned, writable memory that nothing
/// else references.
pub unsafe fn zero_bss(start: *mut u32, end: *mut u32) {
    let mut p = start;
    while p < end {
        // SAFETY: p stays inside [start, end), which the caller vouches for
        core::ptr::write_volatile(p, 0);
        p = p.add(1);
    }
}

/// The stub bound to a platform and a configuration
#[derive(Debug)]
pub struct Stub<P> {
    platform: P,
    config: StubConfig,
}

impl<P: Platform> Stub<P> {
    /// Create a stub
    pub fn new(platform: P, config: StubConfig) -> Self {
        Self { platform, config }
    }

    /// Access the platform
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Give the platform back
    pub fn into_platform(self) -> P {
        self.platform
    }

    /// Handle a decoded request
    pub fn handle(&mut self, request: Request<'_>) -> Status {
        match request {
            Request::SelfCheck => {
                debug!("TEST");
                Status::Ok
            }
            Request::Flash(command) => dispatch::dispatch(&mut self.platform, &self.config, command),
            Request::Unsupported(cmd) => {
                warn!("command {} not supported", cmd);
                Status::NotSupported
            }
        }
    }

    /// Decode and handle a request straight from the calling convention
    ///
    /// # Safety
    ///
    /// See [`RawRequest::decode`].
    pub unsafe fn handle_raw(&mut self, raw: &RawRequest) -> Status {
        debug!("cmd {}", raw.cmd);
        match raw.decode(self.config.write_mode) {
            Ok(request) => self.handle(request),
            Err(e) => {
                warn!("bad arguments for cmd {}: {}", raw.cmd, e);
                e.status()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;

    #[test]
    fn test_zero_bss() {
        let mut region = vec![0xDEAD_BEEFu32; 8];
        let range = region.as_mut_ptr_range();
        unsafe { zero_bss(range.start.add(2), range.end.sub(2)) };
        assert_eq!(
            region,
            [0xDEAD_BEEF, 0xDEAD_BEEF, 0, 0, 0, 0, 0xDEAD_BEEF, 0xDEAD_BEEF]
        );
    }

    #[test]
    fn test_zero_bss_empty_range() {
        let mut word = 7u32;
        let p: *mut u32 = &mut word;
        unsafe { zero_bss(p, p) };
        assert_eq!(word, 7);
    }
}
