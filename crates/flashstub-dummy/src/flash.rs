//! Emulated NOR flash behind ROM-style primitives

use flashstub_core::error::RomCode;
use flashstub_core::platform::{RawFlash, ERASED_BYTE, SECTOR_SIZE, WORD_SIZE};

/// Configuration for the emulated flash
#[derive(Debug, Clone)]
pub struct FlashConfig {
    /// Flash size in bytes
    pub size: usize,
    /// Refuse program/erase until `unlock` was called
    pub require_unlock: bool,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            size: 4 * 1024 * 1024,
            require_unlock: true,
        }
    }
}

/// Primitive call recorded by the emulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashOp {
    /// `unlock()`
    Unlock,
    /// `read(addr, len)`
    Read {
        /// Address
        addr: u32,
        /// Length in bytes
        len: usize,
    },
    /// `write(addr, data)`
    Write {
        /// Address
        addr: u32,
        /// Programmed bytes
        data: Vec<u8>,
    },
    /// `erase_sector(sector)`
    EraseSector(u32),
    /// `erase_area(addr, len)`
    EraseArea {
        /// Address
        addr: u32,
        /// Length in bytes
        len: u32,
    },
}

/// Failures to inject into the primitives
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// `unlock` fails
    pub unlock: Option<RomCode>,
    /// `read` fails when the call covers this address
    pub read_at: Option<u32>,
    /// `write` fails when the call covers this address
    pub write_at: Option<u32>,
    /// Every erase fails
    pub erase: Option<RomCode>,
}

fn covers(addr: u32, len: usize, target: Option<u32>) -> bool {
    target.is_some_and(|t| {
        let t = u64::from(t);
        t >= u64::from(addr) && t < u64::from(addr) + len as u64
    })
}

/// Emulated flash
///
/// Starts erased (all 0xFF). Programming can only change bits from 1 to 0.
/// Misaligned primitive calls are rejected the way the ROM would reject
/// them, so the emulator also checks the stub only issues aligned calls.
#[derive(Debug)]
pub struct EmulatedFlash {
    config: FlashConfig,
    data: Vec<u8>,
    unlocked: bool,
    ops: Vec<FlashOp>,
    faults: FaultPlan,
}

impl EmulatedFlash {
    /// Create a new erased flash with the given configuration
    pub fn new(config: FlashConfig) -> Self {
        let data = vec![ERASED_BYTE; config.size];
        Self {
            config,
            data,
            unlocked: false,
            ops: Vec::new(),
            faults: FaultPlan::default(),
        }
    }

    /// Create a flash with pre-filled data
    ///
    /// Data beyond the flash size is dropped.
    pub fn with_data(config: FlashConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Every primitive call so far
    pub fn ops(&self) -> &[FlashOp] {
        &self.ops
    }

    /// Replace the injected failures
    pub fn set_faults(&mut self, faults: FaultPlan) {
        self.faults = faults;
    }

    fn range(&self, addr: u32, len: usize) -> Result<core::ops::Range<usize>, RomCode> {
        let start = addr as usize;
        let end = start.checked_add(len).ok_or(RomCode::Err)?;
        if end > self.data.len() {
            log::warn!("flash access 0x{:x}+{} out of bounds", addr, len);
            return Err(RomCode::Err);
        }
        Ok(start..end)
    }

    fn word_range(&self, addr: u32, len: usize) -> Result<core::ops::Range<usize>, RomCode> {
        if addr % WORD_SIZE != 0 || len % WORD_SIZE as usize != 0 {
            log::warn!("unaligned flash access 0x{:x}+{}", addr, len);
            return Err(RomCode::Err);
        }
        self.range(addr, len)
    }

    fn check_unlocked(&self) -> Result<(), RomCode> {
        if self.config.require_unlock && !self.unlocked {
            return Err(RomCode::Err);
        }
        Ok(())
    }
}

impl Default for EmulatedFlash {
    fn default() -> Self {
        Self::new(FlashConfig::default())
    }
}

impl RawFlash for EmulatedFlash {
    fn unlock(&mut self) -> Result<(), RomCode> {
        self.ops.push(FlashOp::Unlock);
        if let Some(code) = self.faults.unlock {
            return Err(code);
        }
        self.unlocked = true;
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), RomCode> {
        self.ops.push(FlashOp::Read {
            addr,
            len: buf.len(),
        });
        if covers(addr, buf.len(), self.faults.read_at) {
            return Err(RomCode::Err);
        }
        let range = self.word_range(addr, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), RomCode> {
        self.ops.push(FlashOp::Write {
            addr,
            data: data.to_vec(),
        });
        if covers(addr, data.len(), self.faults.write_at) {
            return Err(RomCode::Err);
        }
        self.check_unlocked()?;
        let range = self.word_range(addr, data.len())?;

        // Flash programming: can only change 1 -> 0
        for (cell, &byte) in self.data[range].iter_mut().zip(data) {
            *cell &= byte;
        }
        Ok(())
    }

    fn erase_sector(&mut self, sector: u32) -> Result<(), RomCode> {
        self.ops.push(FlashOp::EraseSector(sector));
        if let Some(code) = self.faults.erase {
            return Err(code);
        }
        self.check_unlocked()?;
        let addr = sector.checked_mul(SECTOR_SIZE).ok_or(RomCode::Err)?;
        let range = self.range(addr, SECTOR_SIZE as usize)?;
        self.data[range].fill(ERASED_BYTE);
        Ok(())
    }

    fn erase_area(&mut self, addr: u32, len: u32) -> Result<(), RomCode> {
        self.ops.push(FlashOp::EraseArea { addr, len });
        if let Some(code) = self.faults.erase {
            return Err(code);
        }
        self.check_unlocked()?;
        if addr % SECTOR_SIZE != 0 || len % SECTOR_SIZE != 0 {
            return Err(RomCode::Err);
        }
        let range = self.range(addr, len as usize)?;
        self.data[range].fill(ERASED_BYTE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> EmulatedFlash {
        EmulatedFlash::new(FlashConfig {
            size: 0x4000,
            require_unlock: true,
        })
    }

    #[test]
    fn test_read_write() {
        let mut flash = small();
        flash.unlock().unwrap();

        let data = [0x12, 0x34, 0x56, 0x78];
        flash.write(0x1000, &data).unwrap();

        let mut buf = [0u8; 4];
        flash.read(0x1000, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut flash = small();
        flash.unlock().unwrap();
        flash.write(0, &[0xF0, 0x0F, 0xFF, 0x00]).unwrap();
        flash.write(0, &[0x0F, 0xFF, 0x0F, 0xFF]).unwrap();
        assert_eq!(&flash.data()[..4], &[0x00, 0x0F, 0x0F, 0x00]);
    }

    #[test]
    fn test_locked_flash_refuses_program() {
        let mut flash = small();
        assert_eq!(flash.write(0, &[0; 4]), Err(RomCode::Err));
        assert_eq!(flash.erase_sector(0), Err(RomCode::Err));
        // Reads are allowed
        let mut buf = [0u8; 4];
        flash.read(0, &mut buf).unwrap();
    }

    #[test]
    fn test_rejects_unaligned() {
        let mut flash = small();
        flash.unlock().unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(flash.read(1, &mut buf), Err(RomCode::Err));
        assert_eq!(flash.write(0, &[0; 3]), Err(RomCode::Err));
        assert_eq!(flash.erase_area(0x800, 0x1000), Err(RomCode::Err));
    }

    #[test]
    fn test_erase() {
        let mut flash = small();
        flash.unlock().unwrap();
        flash.data_mut().fill(0);

        flash.erase_sector(1).unwrap();
        assert!(flash.data()[0x1000..0x2000].iter().all(|&b| b == 0xFF));
        assert!(flash.data()[..0x1000].iter().all(|&b| b == 0));

        flash.erase_area(0x2000, 0x2000).unwrap();
        assert!(flash.data()[0x2000..].iter().all(|&b| b == 0xFF));
        assert_eq!(flash.erase_area(0x3000, 0x2000), Err(RomCode::Err));
    }

    #[test]
    fn test_fault_injection() {
        let mut flash = small();
        flash.set_faults(FaultPlan {
            unlock: None,
            read_at: Some(0x102),
            write_at: None,
            erase: Some(RomCode::Timeout),
        });
        flash.unlock().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(flash.read(0x100, &mut buf), Err(RomCode::Err));
        flash.read(0x108, &mut buf).unwrap();
        assert_eq!(flash.erase_sector(0), Err(RomCode::Timeout));
        assert_eq!(flash.ops().len(), 4);
    }
}
