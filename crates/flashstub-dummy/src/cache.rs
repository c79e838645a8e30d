//! Emulated per-core cache control registers

use std::cell::Cell;

use flashstub_core::cache::CACHE_STATE_IDLE;
use flashstub_core::platform::{CacheControl, CoreId};

/// Register write recorded by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    /// Enable bit cleared
    Disabled(CoreId),
    /// Enable bit set
    Enabled(CoreId),
    /// Region mask written
    MaskWritten(CoreId, u32),
}

#[derive(Debug, Clone)]
struct CoreCache {
    mask: u32,
    enabled: bool,
    busy_polls: Cell<u32>,
    stuck: bool,
}

impl CoreCache {
    fn new(mask: u32) -> Self {
        Self {
            mask,
            enabled: true,
            busy_polls: Cell::new(0),
            stuck: false,
        }
    }
}

/// Cache registers of both cores
///
/// Each core can be made to report busy for a number of state polls, or
/// to never report idle at all.
#[derive(Debug, Clone)]
pub struct EmulatedCaches {
    cores: [CoreCache; 2],
    events: Vec<CacheEvent>,
    polls: Cell<u64>,
}

impl EmulatedCaches {
    /// Both caches enabled with the given region masks
    pub fn new(pro_mask: u32, app_mask: u32) -> Self {
        Self {
            cores: [CoreCache::new(pro_mask), CoreCache::new(app_mask)],
            events: Vec::new(),
            polls: Cell::new(0),
        }
    }

    fn core(&self, core: CoreId) -> &CoreCache {
        &self.cores[core.index() as usize]
    }

    fn core_mut(&mut self, core: CoreId) -> &mut CoreCache {
        &mut self.cores[core.index() as usize]
    }

    /// Report busy for the next `polls` state reads of `core`
    pub fn set_busy_polls(&mut self, core: CoreId, polls: u32) {
        self.core(core).busy_polls.set(polls);
    }

    /// Make `core` never report idle
    pub fn set_stuck(&mut self, core: CoreId, stuck: bool) {
        self.core_mut(core).stuck = stuck;
    }

    /// Whether the cache of `core` is enabled
    pub fn is_enabled(&self, core: CoreId) -> bool {
        self.core(core).enabled
    }

    /// `true` if either core's cache is enabled
    pub fn any_enabled(&self) -> bool {
        self.cores.iter().any(|c| c.enabled)
    }

    /// Observable configuration of `core`: enable bit and region mask
    pub fn snapshot(&self, core: CoreId) -> (bool, u32) {
        let c = self.core(core);
        (c.enabled, c.mask)
    }

    /// Every register write so far
    pub fn events(&self) -> &[CacheEvent] {
        &self.events
    }

    /// Enable/disable events only, in order
    pub fn toggles(&self) -> Vec<CacheEvent> {
        self.events
            .iter()
            .copied()
            .filter(|e| !matches!(e, CacheEvent::MaskWritten(..)))
            .collect()
    }

    /// Number of state polls seen on either core
    pub fn state_polls(&self) -> u64 {
        self.polls.get()
    }
}

impl Default for EmulatedCaches {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl CacheControl for EmulatedCaches {
    fn cache_mask(&self, core: CoreId) -> u32 {
        self.core(core).mask
    }

    fn set_cache_mask(&mut self, core: CoreId, mask: u32) {
        self.events.push(CacheEvent::MaskWritten(core, mask));
        self.core_mut(core).mask = mask;
    }

    fn cache_state(&self, core: CoreId) -> u32 {
        self.polls.set(self.polls.get() + 1);
        let c = self.core(core);
        if c.stuck {
            return 0;
        }
        match c.busy_polls.get() {
            0 => CACHE_STATE_IDLE,
            n => {
                c.busy_polls.set(n - 1);
                0
            }
        }
    }

    fn set_cache_enabled(&mut self, core: CoreId, enabled: bool) {
        self.events.push(if enabled {
            CacheEvent::Enabled(core)
        } else {
            CacheEvent::Disabled(core)
        });
        self.core_mut(core).enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashstub_core::cache;
    use flashstub_core::PollLimit;

    #[test]
    fn test_busy_then_idle() {
        let mut caches = EmulatedCaches::new(0x4, 0);
        caches.set_busy_polls(CoreId::Pro, 3);
        let state = cache::disable(&mut caches, CoreId::Pro, PollLimit::Forever).unwrap();
        assert_eq!(caches.state_polls(), 4);
        assert!(!caches.is_enabled(CoreId::Pro));
        cache::restore(&mut caches, state);
        assert_eq!(caches.snapshot(CoreId::Pro), (true, 0x4));
    }

    #[test]
    fn test_stuck_core_times_out() {
        let mut caches = EmulatedCaches::default();
        caches.set_stuck(CoreId::App, true);
        assert!(cache::disable(&mut caches, CoreId::App, PollLimit::Bounded(100)).is_err());
        assert!(caches.is_enabled(CoreId::App));
    }
}
