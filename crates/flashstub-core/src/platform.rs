//! Platform trait definitions
//!
//! The stub never touches hardware directly. Everything it needs from the
//! target is expressed by these traits: the vendor ROM flash primitives,
//! the per-core cache control registers and the identity of the core the
//! stub is executing on.

use core::fmt;

use crate::error::RomCode;

/// Size of the unit the raw flash primitives read and program
pub const WORD_SIZE: u32 = 4;

/// Minimum erase granularity of the flash device
pub const SECTOR_SIZE: u32 = 4096;

/// Value every byte holds after an erase
pub const ERASED_BYTE: u8 = 0xFF;

/// Processor core of the dual-core target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreId {
    /// Protocol CPU (core 0)
    Pro,
    /// Application CPU (core 1)
    App,
}

impl CoreId {
    /// Map a hardware core index to a core
    ///
    /// Only the lowest bit is significant, which matches how the core id
    /// is extracted from the processor id register.
    pub const fn from_index(index: u32) -> Self {
        if index & 1 == 0 {
            Self::Pro
        } else {
            Self::App
        }
    }

    /// Hardware core index
    pub const fn index(self) -> u32 {
        match self {
            Self::Pro => 0,
            Self::App => 1,
        }
    }

    /// The other core
    pub const fn sibling(self) -> Self {
        match self {
            Self::Pro => Self::App,
            Self::App => Self::Pro,
        }
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pro => write!(f, "PRO"),
            Self::App => write!(f, "APP"),
        }
    }
}

/// Trusted raw flash primitives supplied by the platform ROM
///
/// Addresses and lengths passed to `read` and `write` are always multiples
/// of [`WORD_SIZE`]; erase addresses are always multiples of
/// [`SECTOR_SIZE`]. Implementations may assume this and are not required to
/// handle anything else.
pub trait RawFlash {
    /// Remove the flash chip's write protection for this session
    fn unlock(&mut self) -> Result<(), RomCode>;

    /// Read `buf.len()` bytes starting at the word-aligned `addr`
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), RomCode>;

    /// Program `data` starting at the word-aligned `addr`
    ///
    /// Programming can only clear bits; the target is expected to be erased.
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), RomCode>;

    /// Erase a single sector by sector number
    fn erase_sector(&mut self, sector: u32) -> Result<(), RomCode>;

    /// Erase a sector-aligned range
    fn erase_area(&mut self, addr: u32, len: u32) -> Result<(), RomCode>;
}

/// Per-core cache control registers
///
/// This is a register-level view: the cache guard builds the quiescing
/// protocol on top of it.
pub trait CacheControl {
    /// Read the cache region mask bits of `core`
    fn cache_mask(&self, core: CoreId) -> u32;

    /// Write the cache region mask bits of `core`
    fn set_cache_mask(&mut self, core: CoreId, mask: u32);

    /// Read the raw cache state field of `core`
    ///
    /// See [`crate::cache::CACHE_STATE_IDLE`].
    fn cache_state(&self, core: CoreId) -> u32;

    /// Set or clear the cache enable bit of `core`
    fn set_cache_enabled(&mut self, core: CoreId, enabled: bool);
}

/// Free-running cycle counter, used only for timing diagnostics
pub trait Clock {
    /// Current cycle count; wraps freely
    fn cycle_count(&self) -> u32 {
        0
    }

    /// Frequency the cycle counter runs at
    fn cpu_freq_hz(&self) -> u32 {
        240_000_000
    }

    /// Milliseconds between two cycle counts
    fn elapsed_ms(&self, start: u32, end: u32) -> u32 {
        let per_ms = (self.cpu_freq_hz() / 1000).max(1);
        end.wrapping_sub(start) / per_ms
    }
}

/// Everything the dispatcher needs from the target
pub trait Platform: RawFlash + CacheControl + Clock {
    /// Core the stub is currently executing on
    fn core_id(&self) -> CoreId;
}
