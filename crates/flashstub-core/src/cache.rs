//! Cache guard
//!
//! Before the flash array is erased or programmed, both cores must stop
//! fetching through their flash-mapped caches. Disabling a cache is a two
//! step protocol: capture the region mask so it can be put back bit for
//! bit, wait until the cache reports idle, then clear the enable bit.
//! Restoring sets the enable bit and writes the captured mask back, leaving
//! any region that was already masked masked.

use bitflags::bitflags;
use log::trace;

use crate::config::PollLimit;
use crate::error::{Error, Result};
use crate::platform::{CacheControl, CoreId};

/// Value of the cache state field when the cache is idle
pub const CACHE_STATE_IDLE: u32 = 1;

bitflags! {
    /// Cache region mask bits of the per-core cache control register
    ///
    /// A set bit masks the region off from the cache.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CacheRegions: u32 {
        /// Internal instruction RAM 0
        const IRAM0   = 1 << 0;
        /// Internal instruction RAM 1
        const IRAM1   = 1 << 1;
        /// Instruction ROM 0 (flash mapped code)
        const IROM0   = 1 << 2;
        /// Data RAM 1
        const DRAM1   = 1 << 3;
        /// Data ROM 0 (flash mapped rodata)
        const DROM0   = 1 << 4;
        /// External PSRAM
        const OPSDRAM = 1 << 5;
    }
}

/// Cache configuration captured by [`disable`]
///
/// Consumed by [`restore`], so a captured state can only be put back once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a disabled cache must be restored"]
pub struct CacheState {
    core: CoreId,
    regions: CacheRegions,
}

impl CacheState {
    /// Region mask as it was before the cache was disabled
    pub fn regions(&self) -> CacheRegions {
        self.regions
    }
}

/// Quiesce and disable the cache of `core`
///
/// Spins until the cache reports idle. With [`PollLimit::Forever`] this
/// never returns if the hardware never goes idle; with a bounded limit the
/// cache is left untouched and [`Error::CacheTimeout`] is returned.
pub fn disable<C: CacheControl + ?Sized>(
    cache: &mut C,
    core: CoreId,
    limit: PollLimit,
) -> Result<CacheState> {
    let regions = CacheRegions::from_bits_truncate(cache.cache_mask(core));

    if !limit.spin_until(|| cache.cache_state(core) == CACHE_STATE_IDLE) {
        return Err(Error::CacheTimeout(core));
    }

    cache.set_cache_enabled(core, false);
    trace!("cache disabled on {} core (mask 0x{:02X})", core, regions.bits());

    Ok(CacheState { core, regions })
}

/// Re-enable the cache of the core `state` was captured on
pub fn restore<C: CacheControl + ?Sized>(cache: &mut C, state: CacheState) {
    let core = state.core;
    cache.set_cache_enabled(core, true);

    let others = cache.cache_mask(core) & !CacheRegions::all().bits();
    cache.set_cache_mask(core, others | state.regions.bits());
    trace!("cache restored on {} core (mask 0x{:02X})", core, state.regions.bits());
}

/// Caches of both cores held disabled around a flash access
///
/// Acquisition disables the sibling core first and the executing core
/// second; [`QuiescedCaches::release`] restores them in reverse order.
#[derive(Debug)]
#[must_use = "caches stay disabled until released"]
pub struct QuiescedCaches {
    own: CacheState,
    sibling: CacheState,
}

impl QuiescedCaches {
    /// Disable the caches of `core` and its sibling
    ///
    /// If the executing core's cache cannot be disabled, the sibling is
    /// restored before the error is returned.
    pub fn acquire<C: CacheControl + ?Sized>(
        cache: &mut C,
        core: CoreId,
        limit: PollLimit,
    ) -> Result<Self> {
        let sibling = disable(cache, core.sibling(), limit)?;
        let own = match disable(cache, core, limit) {
            Ok(own) => own,
            Err(e) => {
                restore(cache, sibling);
                return Err(e);
            }
        };
        Ok(Self { own, sibling })
    }

    /// Restore both caches, executing core first
    pub fn release<C: CacheControl + ?Sized>(self, cache: &mut C) {
        restore(cache, self.own);
        restore(cache, self.sibling);
    }
}
