//! Ring buffer write protocol
//!
//! The caller owns a region `[buf_start, buf_end)` laid out as:
//!
//! ```text
//! buf_start + 0   write cursor (u32, advanced only by the producer)
//! buf_start + 4   read cursor  (u32, advanced only by the stub)
//! buf_start + 8   data area    ... up to buf_end
//! ```
//!
//! Both cursors hold absolute bus addresses inside the data area. Equal
//! cursors mean the ring is empty. A write cursor of 0 tells the stub the
//! producer is done; a read cursor of 0 tells the producer the stub failed.
//!
//! The producer keeps filling the ring while the stub programs flash in
//! chunks of [`STREAM_CHUNK_SIZE`] bytes, so no second buffer is needed.
//! Neither side takes a lock: each cursor has a single writer and both are
//! re-read on every poll.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use log::{debug, error, trace};

use crate::config::PollLimit;
use crate::error::{Error, Result};
use crate::platform::{RawFlash, ERASED_BYTE, WORD_SIZE};

/// Bytes programmed per flash write while the ring is streaming
pub const STREAM_CHUNK_SIZE: usize = 32;

/// Size of the cursor header at the start of the ring region
pub const RING_HEADER_SIZE: usize = core::mem::size_of::<RingCursors>();

/// Cursor value meaning "stopped"
pub const CURSOR_SENTINEL: u32 = 0;

const _: () = assert!(STREAM_CHUNK_SIZE % WORD_SIZE as usize == 0);

/// The two cursors at the head of a ring region
#[derive(Debug)]
#[repr(C)]
pub struct RingCursors {
    write: AtomicU32,
    read: AtomicU32,
}

impl RingCursors {
    /// Cursors of an empty ring whose data area starts at `data_start`
    pub const fn new(data_start: u32) -> Self {
        Self {
            write: AtomicU32::new(data_start),
            read: AtomicU32::new(data_start),
        }
    }

    /// Current write cursor
    pub fn write_cursor(&self) -> u32 {
        self.write.load(Ordering::Acquire)
    }

    /// Current read cursor
    pub fn read_cursor(&self) -> u32 {
        self.read.load(Ordering::Acquire)
    }
}

/// Shape of a ring: the data area and where it sits in the address space
#[derive(Debug, Clone, Copy)]
struct RingView<'a> {
    cursors: &'a RingCursors,
    data: &'a [AtomicU8],
    data_start: u32,
}

impl<'a> RingView<'a> {
    fn new(cursors: &'a RingCursors, data: &'a [AtomicU8], data_start: u32) -> Result<Self> {
        let len = u32::try_from(data.len()).map_err(|_| Error::InvalidBuffer)?;
        if data_start == CURSOR_SENTINEL
            || data_start % WORD_SIZE != 0
            || len % WORD_SIZE != 0
            || data.len() <= STREAM_CHUNK_SIZE
            || data_start.checked_add(len).is_none()
        {
            return Err(Error::InvalidBuffer);
        }
        Ok(Self {
            cursors,
            data,
            data_start,
        })
    }

    fn data_end(&self) -> u32 {
        self.data_start + self.data.len() as u32
    }

    fn contains(&self, cursor: u32) -> bool {
        (self.data_start..self.data_end()).contains(&cursor)
    }

    fn index(&self, cursor: u32) -> usize {
        (cursor - self.data_start) as usize
    }

    /// Step a cursor forward, wrapping to the data start at the end
    fn advance(&self, cursor: u32, by: u32) -> u32 {
        let next = cursor + by;
        if next >= self.data_end() {
            self.data_start + (next - self.data_end())
        } else {
            next
        }
    }
}

/// Stub side of the ring: may only advance the read cursor
#[derive(Debug, Clone, Copy)]
pub struct RingConsumer<'a> {
    view: RingView<'a>,
}

impl<'a> RingConsumer<'a> {
    /// Attach to a ring whose data area is `data`, located at bus address
    /// `data_start`
    ///
    /// The data area must be word sized and longer than one chunk.
    pub fn new(cursors: &'a RingCursors, data: &'a [AtomicU8], data_start: u32) -> Result<Self> {
        RingView::new(cursors, data, data_start).map(|view| Self { view })
    }

    /// Attach to a ring region handed over by the caller
    ///
    /// # Safety
    ///
    /// `[buf_start, buf_end)` must be valid, word-aligned memory for the
    /// whole lifetime `'a`, shared only with the external producer.
    pub unsafe fn from_raw(buf_start: *mut u8, buf_end: *mut u8) -> Result<Self> {
        let start = buf_start as usize;
        let end = buf_end as usize;
        if buf_start.is_null() || start % WORD_SIZE as usize != 0 || end < start + RING_HEADER_SIZE
        {
            return Err(Error::InvalidBuffer);
        }

        let data_ptr = buf_start.add(RING_HEADER_SIZE);
        let data_start = u32::try_from(data_ptr as usize).map_err(|_| Error::InvalidBuffer)?;
        // SAFETY: the caller guarantees the region is valid and aligned;
        // AtomicU32 and AtomicU8 have the layout of u32 and u8.
        let cursors = &*(buf_start as *const RingCursors);
        let data = core::slice::from_raw_parts(
            data_ptr as *const AtomicU8,
            end - start - RING_HEADER_SIZE,
        );
        Self::new(cursors, data, data_start)
    }

    /// Bus address of the first data byte
    pub fn data_start(&self) -> u32 {
        self.view.data_start
    }

    /// Bus address one past the last data byte
    pub fn data_end(&self) -> u32 {
        self.view.data_end()
    }

    /// Number of bytes that may be programmed next, or 0 if not ready yet
    ///
    /// A chunk is ready once the producer is a full chunk ahead, once the
    /// bytes still owed are all available, or when the write cursor has
    /// wrapped and the tail of the data area must be flushed.
    fn ready(&self, wr: u32, rd: u32, owed: u32) -> u32 {
        let chunk = STREAM_CHUNK_SIZE as u32;
        if wr == rd {
            0
        } else if wr > rd {
            let avail = wr - rd;
            if avail >= chunk || avail >= owed {
                chunk.min(owed)
            } else {
                0
            }
        } else {
            (self.view.data_end() - rd).min(chunk).min(owed)
        }
    }

    fn copy_out(&self, rd: u32, out: &mut [u8]) {
        let start = self.view.index(rd);
        for (dst, src) in out.iter_mut().zip(&self.view.data[start..]) {
            *dst = src.load(Ordering::Relaxed);
        }
    }

    fn advance_read(&self, rd: u32, by: u32) {
        let next = self.view.advance(rd, by);
        self.view.cursors.read.store(next, Ordering::Release);
    }

    pub(crate) fn abort(&self) {
        self.view
            .cursors
            .read
            .store(CURSOR_SENTINEL, Ordering::Release);
    }
}

/// Program `size` bytes at `addr` as they arrive through `ring`
///
/// Returns once `size` bytes are programmed or the producer clears the
/// write cursor. On failure the read cursor is set to the sentinel so the
/// producer stops filling.
pub fn stream_write<F: RawFlash + ?Sized>(
    flash: &mut F,
    mut addr: u32,
    size: u32,
    ring: &RingConsumer<'_>,
    limit: PollLimit,
) -> Result<()> {
    let fail = |e: Error| {
        ring.abort();
        e
    };

    if addr % WORD_SIZE != 0 {
        return Err(fail(Error::InvalidAlignment));
    }
    if u64::from(addr) + u64::from(size) > 1 << 32 {
        return Err(fail(Error::AddressOverflow));
    }

    let mut written = 0u32;
    let mut idle = 0u32;
    let mut piece = [0u8; STREAM_CHUNK_SIZE];

    while written < size {
        let wr = ring.view.cursors.write_cursor();
        let rd = ring.view.cursors.read_cursor();
        trace!("Write wr 0x{:x} rd 0x{:x}", wr, rd);

        if wr == CURSOR_SENTINEL {
            debug!("producer finished after {} of {} bytes", written, size);
            break;
        }
        if !ring.view.contains(wr) || !ring.view.contains(rd) {
            error!("ring cursor out of range: wr 0x{:x} rd 0x{:x}", wr, rd);
            return Err(fail(Error::InvalidBuffer));
        }

        let len = ring.ready(wr, rd, size - written);
        if len == 0 {
            if limit.exhausted(idle) {
                error!("ring stalled after {} of {} bytes", written, size);
                return Err(fail(Error::StreamStalled));
            }
            idle = idle.saturating_add(1);
            core::hint::spin_loop();
            continue;
        }
        idle = 0;

        let n = len as usize;
        let padded = n.next_multiple_of(WORD_SIZE as usize);
        ring.copy_out(rd, &mut piece[..n]);
        piece[n..padded].fill(ERASED_BYTE);

        debug!("Write flash @ 0x{:x} sz {}", addr, n);
        if let Err(code) = flash.write(addr, &piece[..padded]) {
            error!("Failed to write flash ({})", code);
            return Err(fail(Error::WriteFailed { addr, code }));
        }

        written += len;
        addr = addr.wrapping_add(len);
        ring.advance_read(rd, len);
    }

    Ok(())
}

/// Producer side of the ring: may only advance the write cursor
///
/// On the target the producer is the debug host writing through the debug
/// port; this type plays that role for the emulator and host tooling.
#[derive(Debug, Clone, Copy)]
pub struct RingProducer<'a> {
    view: RingView<'a>,
}

impl<'a> RingProducer<'a> {
    /// Attach to a ring whose data area is `data`, located at bus address
    /// `data_start`
    pub fn new(cursors: &'a RingCursors, data: &'a [AtomicU8], data_start: u32) -> Result<Self> {
        RingView::new(cursors, data, data_start).map(|view| Self { view })
    }

    /// `true` once the consumer has signalled failure
    pub fn consumer_aborted(&self) -> bool {
        self.view.cursors.read_cursor() == CURSOR_SENTINEL
    }

    /// Bytes that can be pushed without the write cursor catching up with
    /// the read cursor
    pub fn free(&self) -> usize {
        let wr = self.view.cursors.write.load(Ordering::Relaxed);
        let rd = self.view.cursors.read_cursor();
        if rd == CURSOR_SENTINEL || wr == CURSOR_SENTINEL {
            return 0;
        }
        let len = self.view.data.len();
        let used = if wr >= rd {
            (wr - rd) as usize
        } else {
            len - (rd - wr) as usize
        };
        len - used - 1
    }

    /// Copy as much of `bytes` into the ring as fits and publish it
    ///
    /// Returns the number of bytes accepted. Accepts nothing after the
    /// consumer aborted or the producer finished.
    pub fn push(&self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.free());
        if n == 0 {
            return 0;
        }

        let mut wr = self.view.cursors.write.load(Ordering::Relaxed);
        for &byte in &bytes[..n] {
            self.view.data[self.view.index(wr)].store(byte, Ordering::Relaxed);
            wr = self.view.advance(wr, 1);
        }
        self.view.cursors.write.store(wr, Ordering::Release);
        n
    }

    /// Tell the consumer no more data will arrive
    pub fn finish(&self) {
        self.view
            .cursors
            .write
            .store(CURSOR_SENTINEL, Ordering::Release);
    }
}
