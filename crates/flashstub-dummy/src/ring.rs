//! Host-side storage for the streaming write ring

use std::sync::atomic::AtomicU8;

use flashstub_core::flash::{RingConsumer, RingCursors, RingProducer};
use flashstub_core::Result;

/// Bus address the emulated ring's data area pretends to live at
pub const DEFAULT_RING_BASE: u32 = 0x3FFB_0008;

/// A ring region owned by the host
///
/// On the target the region lives in target RAM and the cursors hold its
/// real bus addresses. Here the data area is heap memory and the cursors
/// use a fictitious base address, which the stub never dereferences.
#[derive(Debug)]
pub struct RingStorage {
    cursors: RingCursors,
    data: Vec<AtomicU8>,
    base: u32,
}

impl RingStorage {
    /// An empty ring with a data area of `len` bytes
    pub fn new(len: usize) -> Self {
        Self::with_base(len, DEFAULT_RING_BASE)
    }

    /// An empty ring whose data area sits at bus address `base`
    pub fn with_base(len: usize, base: u32) -> Self {
        Self {
            cursors: RingCursors::new(base),
            data: (0..len).map(|_| AtomicU8::new(0)).collect(),
            base,
        }
    }

    /// Data area size
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if the data area is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The cursor pair
    pub fn cursors(&self) -> &RingCursors {
        &self.cursors
    }

    /// Stub side view
    pub fn consumer(&self) -> Result<RingConsumer<'_>> {
        RingConsumer::new(&self.cursors, &self.data, self.base)
    }

    /// Host side view
    pub fn producer(&self) -> Result<RingProducer<'_>> {
        RingProducer::new(&self.cursors, &self.data, self.base)
    }
}
