//! ESP32 implementation of the stub platform traits

use core::arch::asm;
use core::ptr::{read_volatile, write_volatile};

use flashstub_core::error::RomCode;
use flashstub_core::platform::{CacheControl, Clock, CoreId, Platform, RawFlash, WORD_SIZE};

use crate::rom;

// DPORT cache registers
const DPORT_PRO_CACHE_CTRL_REG: usize = 0x3FF0_0040;
const DPORT_PRO_CACHE_CTRL1_REG: usize = 0x3FF0_0044;
const DPORT_APP_CACHE_CTRL_REG: usize = 0x3FF0_0058;
const DPORT_APP_CACHE_CTRL1_REG: usize = 0x3FF0_005C;
const DPORT_PRO_DCACHE_DBUG0_REG: usize = 0x3FF0_03F0;
const DPORT_APP_DCACHE_DBUG0_REG: usize = 0x3FF0_0418;

/// Cache enable bit in `*_CACHE_CTRL_REG`
const CACHE_ENABLE: u32 = 1 << 3;
/// Cache state field in `*_DCACHE_DBUG0_REG`
const CACHE_STATE_SHIFT: u32 = 7;
const CACHE_STATE_MASK: u32 = 0xFFF;

const XT_CLOCK_FREQ: u32 = 240_000_000;

/// Staging buffer for payloads the ROM cannot take directly
#[repr(C, align(4))]
struct Bounce([u8; 256]);

struct CoreRegs {
    ctrl: usize,
    ctrl1: usize,
    dbug0: usize,
}

const fn regs(core: CoreId) -> CoreRegs {
    match core {
        CoreId::Pro => CoreRegs {
            ctrl: DPORT_PRO_CACHE_CTRL_REG,
            ctrl1: DPORT_PRO_CACHE_CTRL1_REG,
            dbug0: DPORT_PRO_DCACHE_DBUG0_REG,
        },
        CoreId::App => CoreRegs {
            ctrl: DPORT_APP_CACHE_CTRL_REG,
            ctrl1: DPORT_APP_CACHE_CTRL1_REG,
            dbug0: DPORT_APP_DCACHE_DBUG0_REG,
        },
    }
}

fn reg_read(addr: usize) -> u32 {
    // SAFETY: DPORT registers are always mapped and word-aligned
    unsafe { read_volatile(addr as *const u32) }
}

fn reg_write(addr: usize, value: u32) {
    // SAFETY: see reg_read
    unsafe { write_volatile(addr as *mut u32, value) }
}

fn is_word_aligned(ptr: *const u8) -> bool {
    ptr as usize % WORD_SIZE as usize == 0
}

/// The ESP32 the stub is running on
pub struct Esp32 {
    _private: (),
}

impl Esp32 {
    /// # Safety
    ///
    /// Only one instance may exist; it owns the flash ROM routines and the
    /// DPORT cache registers for the duration of the call.
    pub unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl RawFlash for Esp32 {
    fn unlock(&mut self) -> Result<(), RomCode> {
        RomCode::check(unsafe { rom::esp_rom_spiflash_unlock() })
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), RomCode> {
        if is_word_aligned(buf.as_ptr()) {
            return RomCode::check(unsafe {
                rom::esp_rom_spiflash_read(addr, buf.as_mut_ptr().cast(), buf.len() as i32)
            });
        }

        let mut bounce = Bounce([0; 256]);
        let mut offset = 0;
        for chunk in buf.chunks_mut(bounce.0.len()) {
            let len = chunk.len();
            RomCode::check(unsafe {
                rom::esp_rom_spiflash_read(
                    addr + offset,
                    bounce.0.as_mut_ptr().cast(),
                    len as i32,
                )
            })?;
            chunk.copy_from_slice(&bounce.0[..len]);
            offset += len as u32;
        }
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), RomCode> {
        if is_word_aligned(data.as_ptr()) {
            return RomCode::check(unsafe {
                rom::esp_rom_spiflash_write(addr, data.as_ptr().cast(), data.len() as i32)
            });
        }

        let mut bounce = Bounce([0; 256]);
        let mut offset = 0;
        for chunk in data.chunks(bounce.0.len()) {
            let len = chunk.len();
            bounce.0[..len].copy_from_slice(chunk);
            RomCode::check(unsafe {
                rom::esp_rom_spiflash_write(addr + offset, bounce.0.as_ptr().cast(), len as i32)
            })?;
            offset += len as u32;
        }
        Ok(())
    }

    fn erase_sector(&mut self, sector: u32) -> Result<(), RomCode> {
        RomCode::check(unsafe { rom::esp_rom_spiflash_erase_sector(sector) })
    }

    fn erase_area(&mut self, addr: u32, len: u32) -> Result<(), RomCode> {
        RomCode::check(unsafe { rom::esp_rom_spiflash_erase_area(addr, len) })
    }
}

impl CacheControl for Esp32 {
    fn cache_mask(&self, core: CoreId) -> u32 {
        reg_read(regs(core).ctrl1)
    }

    fn set_cache_mask(&mut self, core: CoreId, mask: u32) {
        reg_write(regs(core).ctrl1, mask)
    }

    fn cache_state(&self, core: CoreId) -> u32 {
        (reg_read(regs(core).dbug0) >> CACHE_STATE_SHIFT) & CACHE_STATE_MASK
    }

    fn set_cache_enabled(&mut self, core: CoreId, enabled: bool) {
        let ctrl = regs(core).ctrl;
        let value = reg_read(ctrl);
        let value = if enabled {
            value | CACHE_ENABLE
        } else {
            value & !CACHE_ENABLE
        };
        reg_write(ctrl, value)
    }
}

impl Clock for Esp32 {
    fn cycle_count(&self) -> u32 {
        let count: u32;
        unsafe { asm!("rsr.ccount {0}", out(reg) count, options(nomem, nostack)) };
        count
    }

    fn cpu_freq_hz(&self) -> u32 {
        XT_CLOCK_FREQ
    }
}

impl Platform for Esp32 {
    fn core_id(&self) -> CoreId {
        let prid: u32;
        unsafe {
            asm!(
                "rsr.prid {0}",
                "extui {0}, {0}, 13, 1",
                out(reg) prid,
                options(nomem, nostack)
            )
        };
        CoreId::from_index(prid)
    }
}
