//! flashstub-dummy - In-memory emulation of the stub's target
//!
//! This crate emulates everything the stub touches on a dual-core target:
//! a NOR flash behind word-granular ROM primitives, the cache control
//! registers of both cores and the caller-owned ring buffer of the
//! streaming write. It's useful for testing and development without real
//! hardware.

mod cache;
mod flash;
mod ring;
mod target;

pub use cache::{CacheEvent, EmulatedCaches};
pub use flash::{EmulatedFlash, FaultPlan, FlashConfig, FlashOp};
pub use ring::RingStorage;
pub use target::EmulatedTarget;
