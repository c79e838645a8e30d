//! Byte-addressable read, write and erase on top of word-granular primitives
//!
//! The raw primitives only accept word-aligned addresses and lengths. Every
//! request is split into an unaligned head word, an aligned bulk and an
//! unaligned tail word. Partial words are read back first so the bytes
//! outside the caller's range are programmed with their current value.

use log::{debug, error};

use crate::error::{Error, Result};
use crate::platform::{Clock, RawFlash, SECTOR_SIZE, WORD_SIZE};

const WORD: usize = WORD_SIZE as usize;

/// Pattern the self test programs
pub const SELF_TEST_PATTERN: [u8; 32] = {
    let mut buf = [0u8; 32];
    let head = [9, 1, 2, 3, 4, 5, 6, 8];
    let mut i = 0;
    while i < head.len() {
        buf[i] = head[i];
        i += 1;
    }
    buf
};

/// Round `addr` down to a multiple of `align` (a power of two)
#[inline]
pub const fn align_down(addr: u32, align: u32) -> u32 {
    addr & !(align - 1)
}

/// Offset of `addr` within its word
#[inline]
const fn word_offset(addr: u32) -> usize {
    (addr & (WORD_SIZE - 1)) as usize
}

/// One past the last byte of the 32-bit address space
const ADDRESS_SPACE_END: u64 = 1 << 32;

/// Reject windows `[addr, addr + len)` reaching past the address space
fn check_window(addr: u32, len: u64) -> Result<()> {
    if u64::from(addr) + len > ADDRESS_SPACE_END {
        return Err(Error::AddressOverflow);
    }
    Ok(())
}

/// Sector-aligned superset of `[addr, addr + len)`
///
/// Returns `(start, size)`. An empty window yields a size of zero.
pub fn sector_span(addr: u32, len: u32) -> Result<(u32, u32)> {
    if len == 0 {
        return Ok((align_down(addr, SECTOR_SIZE), 0));
    }
    check_window(addr, u64::from(len))?;
    let start = align_down(addr, SECTOR_SIZE);
    let end = (u64::from(addr) + u64::from(len)).next_multiple_of(u64::from(SECTOR_SIZE));
    let size = u32::try_from(end - u64::from(start)).map_err(|_| Error::AddressOverflow)?;
    Ok((start, size))
}

fn raw_read<F: RawFlash + ?Sized>(flash: &mut F, addr: u32, buf: &mut [u8]) -> Result<()> {
    flash.read(addr, buf).map_err(|code| {
        error!("Failed to read flash @ 0x{:x} ({})", addr, code);
        Error::ReadFailed { addr, code }
    })
}

fn raw_write<F: RawFlash + ?Sized>(flash: &mut F, addr: u32, data: &[u8]) -> Result<()> {
    flash.write(addr, data).map_err(|code| {
        error!("Failed to write flash @ 0x{:x} ({})", addr, code);
        Error::WriteFailed { addr, code }
    })
}

/// Read `dest.len()` bytes starting at any address
pub fn read<F>(flash: &mut F, addr: u32, dest: &mut [u8]) -> Result<()>
where
    F: RawFlash + Clock + ?Sized,
{
    let size = dest.len();
    check_window(addr, size as u64)?;

    let mut flash_addr = addr;
    let mut done = 0usize;
    let mut word = [0u8; WORD];

    let head = word_offset(addr);
    if head != 0 && size > 0 {
        let base = align_down(addr, WORD_SIZE);
        raw_read(flash, base, &mut word)?;
        let n = (WORD - head).min(size);
        debug!("Read flash dword @ 0x{:x} sz {}", base, n);
        dest[..n].copy_from_slice(&word[head..head + n]);
        done = n;
        flash_addr = base.wrapping_add(WORD_SIZE);
    }

    let bulk = (size - done) & !(WORD - 1);
    if bulk > 0 {
        let start = flash.cycle_count();
        raw_read(flash, flash_addr, &mut dest[done..done + bulk])?;
        let end = flash.cycle_count();
        debug!(
            "Read flash @ 0x{:x} sz {} in {} ms",
            flash_addr,
            bulk,
            flash.elapsed_ms(start, end)
        );
        done += bulk;
        flash_addr = flash_addr.wrapping_add(bulk as u32);
    }

    if done < size {
        raw_read(flash, flash_addr, &mut word)?;
        let n = size - done;
        debug!("Read flash dword @ 0x{:x} sz {}", flash_addr, n);
        dest[done..].copy_from_slice(&word[..n]);
    }

    Ok(())
}

/// Program `src` starting at any address
///
/// Bytes of a partially covered word outside `[addr, addr + src.len())`
/// are written back with the value they had before.
pub fn write<F>(flash: &mut F, addr: u32, src: &[u8]) -> Result<()>
where
    F: RawFlash + Clock + ?Sized,
{
    let size = src.len();
    check_window(addr, size as u64)?;

    let mut flash_addr = addr;
    let mut done = 0usize;
    let mut word = [0u8; WORD];

    let head = word_offset(addr);
    if head != 0 && size > 0 {
        let base = align_down(addr, WORD_SIZE);
        raw_read(flash, base, &mut word)?;
        let n = (WORD - head).min(size);
        debug!("Write flash dword @ 0x{:x} sz {}", base, n);
        word[head..head + n].copy_from_slice(&src[..n]);
        raw_write(flash, base, &word)?;
        done = n;
        flash_addr = base.wrapping_add(WORD_SIZE);
    }

    let bulk = (size - done) & !(WORD - 1);
    if bulk > 0 {
        let start = flash.cycle_count();
        raw_write(flash, flash_addr, &src[done..done + bulk])?;
        let end = flash.cycle_count();
        debug!(
            "Write flash @ 0x{:x} sz {} in {} ms",
            flash_addr,
            bulk,
            flash.elapsed_ms(start, end)
        );
        done += bulk;
        flash_addr = flash_addr.wrapping_add(bulk as u32);
    }

    if done < size {
        raw_read(flash, flash_addr, &mut word)?;
        let n = size - done;
        debug!("Write flash dword @ 0x{:x} sz {}", flash_addr, n);
        word[..n].copy_from_slice(&src[done..]);
        raw_write(flash, flash_addr, &word)?;
    }

    Ok(())
}

/// Erase every sector touched by `[addr, addr + len)`
///
/// The erased footprint is coarser than the request: whole sectors are
/// erased, including bytes before `addr` and after `addr + len` that share
/// a sector with the window.
pub fn erase<F: RawFlash + ?Sized>(flash: &mut F, addr: u32, len: u32) -> Result<()> {
    let (start, size) = sector_span(addr, len)?;
    if size == 0 {
        debug!("erase flash @ 0x{:x}: nothing to do", addr);
        return Ok(());
    }

    debug!("erase flash @ 0x{:x}, sz {}", start, size);
    flash.erase_area(start, size).map_err(|code| {
        error!("Failed to erase flash ({})", code);
        Error::EraseFailed { addr: start, code }
    })
}

/// Erase, program and read back a fixed pattern at `addr`
///
/// `addr` must be sector aligned. The sector is left holding the pattern.
pub fn self_test<F: RawFlash + ?Sized>(flash: &mut F, addr: u32) -> Result<()> {
    if addr % SECTOR_SIZE != 0 {
        return Err(Error::InvalidAlignment);
    }

    flash.erase_sector(addr / SECTOR_SIZE).map_err(|code| {
        error!("Failed to erase flash ({})", code);
        Error::EraseFailed { addr, code }
    })?;

    raw_write(flash, addr, &SELF_TEST_PATTERN)?;

    let mut buf = [0u8; SELF_TEST_PATTERN.len()];
    raw_read(flash, addr, &mut buf)?;
    debug!("Data: {:x?}", &buf[..10]);

    match buf.iter().zip(SELF_TEST_PATTERN.iter()).position(|(a, b)| a != b) {
        Some(i) => Err(Error::VerifyMismatch {
            addr: addr + i as u32,
        }),
        None => Ok(()),
    }
}
