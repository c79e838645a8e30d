//! Command implementations
//!
//! Every command loads the image into an emulated target, hands one
//! request to [`Stub`] exactly as the target's entry point would, checks
//! that the cache guard left both cores as it found them and saves the
//! image back.

mod erase;
mod read;
mod test;
mod write;

pub use erase::run_erase;
pub use read::run_read;
pub use test::{run_flash_test, run_raw, run_test};
pub use write::run_write;

use flashstub_core::cache::CacheRegions;
use flashstub_core::entry::Stub;
use flashstub_core::platform::CoreId;
use flashstub_core::{Request, Status, StubConfig};
use flashstub_dummy::{EmulatedCaches, EmulatedFlash, EmulatedTarget, FlashConfig};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::cli::ImageArgs;
use crate::error::{io_at, Result, SimError};

const CORES: [CoreId; 2] = [CoreId::Pro, CoreId::App];

/// An emulated target backed by an image file
pub struct Session {
    path: PathBuf,
    stub: Stub<EmulatedTarget>,
    before: [(bool, u32); 2],
}

impl Session {
    /// Load `args.image`, or start from an erased flash if it does not exist
    pub fn open(args: &ImageArgs, config: StubConfig) -> Result<Self> {
        let flash_config = FlashConfig {
            size: args.size as usize,
            require_unlock: true,
        };

        let flash = match fs::read(&args.image) {
            Ok(data) => {
                if data.len() as u64 > u64::from(args.size) {
                    return Err(SimError::ImageTooLarge {
                        path: args.image.clone(),
                        len: data.len() as u64,
                        size: args.size,
                    });
                }
                log::info!("Loaded {} bytes from {:?}", data.len(), args.image);
                EmulatedFlash::with_data(flash_config, &data)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("Creating erased {} byte image", args.size);
                EmulatedFlash::new(flash_config)
            }
            Err(e) => return Err(io_at(&args.image)(e)),
        };

        let regions = CacheRegions::all().bits();
        let caches = EmulatedCaches::new(regions, regions);
        let core = if args.app_core {
            CoreId::App
        } else {
            CoreId::Pro
        };
        let target = EmulatedTarget::new(flash, caches, core);
        let before = CORES.map(|c| target.caches.snapshot(c));

        Ok(Self {
            path: args.image.clone(),
            stub: Stub::new(target, config),
            before,
        })
    }

    /// Flash size in bytes
    pub fn flash_size(&self) -> u32 {
        self.stub.platform().flash.data().len() as u32
    }

    /// The stub serving this session
    pub fn stub(&mut self) -> &mut Stub<EmulatedTarget> {
        &mut self.stub
    }

    /// Handle one decoded request
    pub fn handle(&mut self, request: Request<'_>) -> Status {
        self.stub.handle(request)
    }

    /// Reject windows that leave the flash
    pub fn check_range(&self, addr: u32, len: u64) -> Result<()> {
        let size = self.flash_size();
        if u64::from(addr) + len > u64::from(size) {
            return Err(SimError::OutOfRange { addr, len, size });
        }
        Ok(())
    }

    /// Verify the cache guard and write the image back
    ///
    /// The image is saved even when the stub failed, since a failed
    /// command may still have changed flash.
    pub fn finish(self, status: Status) -> Result<()> {
        let target = self.stub.into_platform();

        for (core, before) in CORES.into_iter().zip(self.before) {
            let after = target.caches.snapshot(core);
            if after != before {
                return Err(SimError::CacheAsymmetry {
                    core,
                    before,
                    after,
                });
            }
        }
        if target.violations() > 0 {
            return Err(SimError::CacheViolation(target.violations()));
        }

        save_image(&self.path, target.flash.data())?;
        log::debug!("{} flash primitive calls", target.flash.ops().len());

        println!("Status: {} ({})", status, status.code());
        if status.is_ok() {
            Ok(())
        } else {
            Err(SimError::Stub(status))
        }
    }
}

fn save_image(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).map_err(io_at(path))?;
    log::info!("Saved {} bytes to {:?}", data.len(), path);
    Ok(())
}
