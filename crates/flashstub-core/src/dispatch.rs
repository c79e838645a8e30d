//! Command dispatcher
//!
//! One invocation moves from idle to executing exactly once: both cores'
//! caches are disabled, the flash is unlocked and a single operation runs.
//! Whatever happens after the caches are disabled, they are restored
//! before the status is returned.

use log::{debug, error};

use crate::cache::QuiescedCaches;
use crate::command::FlashCommand;
use crate::config::{StubConfig, WriteMode};
use crate::error::{Error, Result, Status};
use crate::flash;
use crate::platform::Platform;

/// `true` if `command` is handled under `config`
///
/// Only the write algorithm the stub was configured with is accepted.
pub fn accepts(config: &StubConfig, command: &FlashCommand<'_>) -> bool {
    match command {
        FlashCommand::Write { .. } => config.write_mode == WriteMode::Direct,
        FlashCommand::StreamWrite { .. } => config.write_mode == WriteMode::Streaming,
        FlashCommand::Read { .. } | FlashCommand::Erase { .. } | FlashCommand::Test => true,
    }
}

/// Run a flash command with caches quiesced and return its status
///
/// A failed streaming write leaves the ring's read cursor at the sentinel.
pub fn dispatch<P: Platform + ?Sized>(
    platform: &mut P,
    config: &StubConfig,
    command: FlashCommand<'_>,
) -> Status {
    let ring = match &command {
        FlashCommand::StreamWrite { ring, .. } => Some(*ring),
        _ => None,
    };

    match run(platform, config, command) {
        Ok(()) => Status::Ok,
        Err(e) => {
            error!("flash command failed: {}", e);
            // The producer must stop even if the stream never started
            if let Some(ring) = ring {
                ring.abort();
            }
            e.status()
        }
    }
}

fn run<P: Platform + ?Sized>(
    platform: &mut P,
    config: &StubConfig,
    command: FlashCommand<'_>,
) -> Result<()> {
    if !accepts(config, &command) {
        return Err(Error::NotSupported);
    }

    let core = platform.core_id();
    debug!("{} on {} core", command.id(), core);

    let caches = QuiescedCaches::acquire(platform, core, config.cache_poll)?;
    let result = unlock(platform).and_then(|()| execute(platform, config, command));
    caches.release(platform);

    result
}

fn unlock<P: Platform + ?Sized>(platform: &mut P) -> Result<()> {
    platform.unlock().map_err(|code| {
        error!("Failed to unlock flash ({})", code);
        Error::UnlockFailed(code)
    })
}

fn execute<P: Platform + ?Sized>(
    platform: &mut P,
    config: &StubConfig,
    command: FlashCommand<'_>,
) -> Result<()> {
    match command {
        FlashCommand::Read { addr, buf } => {
            debug!("flash read @ 0x{:x} sz {}", addr, buf.len());
            flash::read(platform, addr, buf)
        }
        FlashCommand::Write { addr, data } => {
            debug!("flash write @ 0x{:x} sz {}", addr, data.len());
            flash::write(platform, addr, data)
        }
        FlashCommand::StreamWrite { addr, size, ring } => {
            debug!(
                "flash stream write @ 0x{:x} sz {} ring 0x{:x}..0x{:x}",
                addr,
                size,
                ring.data_start(),
                ring.data_end()
            );
            flash::stream_write(platform, addr, size, &ring, config.stream_poll)
        }
        FlashCommand::Erase { addr, size } => flash::erase(platform, addr, size),
        FlashCommand::Test => flash::self_test(platform, config.self_test_addr),
    }
}
