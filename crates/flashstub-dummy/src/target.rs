//! Emulated dual-core target

use std::cell::Cell;

use flashstub_core::error::RomCode;
use flashstub_core::platform::{CacheControl, Clock, CoreId, Platform, RawFlash};

use crate::cache::EmulatedCaches;
use crate::flash::EmulatedFlash;

/// Cycles charged per byte moved by a primitive
const CYCLES_PER_BYTE: u32 = 40;

/// Flash and caches of one emulated target
///
/// Every flash primitive call made while either core's cache is still
/// enabled is counted as a violation of the quiescing protocol.
#[derive(Debug)]
pub struct EmulatedTarget {
    /// The flash chip
    pub flash: EmulatedFlash,
    /// The cache registers
    pub caches: EmulatedCaches,
    core: CoreId,
    cycles: Cell<u32>,
    violations: u32,
}

impl EmulatedTarget {
    /// A target executing on `core`
    pub fn new(flash: EmulatedFlash, caches: EmulatedCaches, core: CoreId) -> Self {
        Self {
            flash,
            caches,
            core,
            cycles: Cell::new(0),
            violations: 0,
        }
    }

    /// Switch the executing core
    pub fn set_core(&mut self, core: CoreId) {
        self.core = core;
    }

    /// Flash accesses seen while a cache was enabled
    pub fn violations(&self) -> u32 {
        self.violations
    }

    fn access(&mut self, bytes: usize) {
        if self.caches.any_enabled() {
            log::warn!("flash accessed with cache enabled");
            self.violations += 1;
        }
        let cost = (bytes as u32).saturating_mul(CYCLES_PER_BYTE);
        self.cycles.set(self.cycles.get().wrapping_add(cost));
    }
}

impl Default for EmulatedTarget {
    fn default() -> Self {
        Self::new(
            EmulatedFlash::default(),
            EmulatedCaches::default(),
            CoreId::Pro,
        )
    }
}

impl RawFlash for EmulatedTarget {
    fn unlock(&mut self) -> Result<(), RomCode> {
        self.access(0);
        self.flash.unlock()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), RomCode> {
        self.access(buf.len());
        self.flash.read(addr, buf)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), RomCode> {
        self.access(data.len());
        self.flash.write(addr, data)
    }

    fn erase_sector(&mut self, sector: u32) -> Result<(), RomCode> {
        self.access(0);
        self.flash.erase_sector(sector)
    }

    fn erase_area(&mut self, addr: u32, len: u32) -> Result<(), RomCode> {
        self.access(0);
        self.flash.erase_area(addr, len)
    }
}

impl CacheControl for EmulatedTarget {
    fn cache_mask(&self, core: CoreId) -> u32 {
        self.caches.cache_mask(core)
    }

    fn set_cache_mask(&mut self, core: CoreId, mask: u32) {
        self.caches.set_cache_mask(core, mask)
    }

    fn cache_state(&self, core: CoreId) -> u32 {
        self.caches.cache_state(core)
    }

    fn set_cache_enabled(&mut self, core: CoreId, enabled: bool) {
        self.caches.set_cache_enabled(core, enabled)
    }
}

impl Clock for EmulatedTarget {
    fn cycle_count(&self) -> u32 {
        self.cycles.get()
    }
}

impl Platform for EmulatedTarget {
    fn core_id(&self) -> CoreId {
        self.core
    }
}
