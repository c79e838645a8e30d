//! Self check, flash self test and raw commands

use flashstub_core::{CommandId, FlashCommand, RawRequest, Request, StubConfig};

use super::Session;
use crate::cli::ImageArgs;
use crate::error::{Result, SimError};

/// Send the no-op self check
pub fn run_test(image: &ImageArgs) -> Result<()> {
    let mut session = Session::open(image, StubConfig::new())?;
    let status = session.handle(Request::SelfCheck);
    session.finish(status)
}

/// Run the erase/program/read-back self test
pub fn run_flash_test(image: &ImageArgs, test_addr: Option<u32>) -> Result<()> {
    let mut config = StubConfig::new();
    if let Some(addr) = test_addr {
        config = config.with_self_test_addr(addr);
    }

    let mut session = Session::open(image, config)?;
    session.check_range(config.self_test_addr, 32)?;
    let status = session.handle(Request::Flash(FlashCommand::Test));
    session.finish(status)
}

/// Send an identifier with scalar arguments through the raw decoder
pub fn run_raw(image: &ImageArgs, cmd: i32, args: &[u32]) -> Result<()> {
    if let Some(id @ (CommandId::FlashRead | CommandId::FlashWrite)) = CommandId::from_raw(cmd) {
        return Err(SimError::PointerArgs(id));
    }

    let mut raw_args = [0usize; 4];
    for (slot, arg) in raw_args.iter_mut().zip(args) {
        *slot = *arg as usize;
    }
    let raw = RawRequest::new(cmd, raw_args);

    let mut session = Session::open(image, StubConfig::new())?;
    // SAFETY: the remaining identifiers carry no pointer arguments
    let status = unsafe { session.stub().handle_raw(&raw) };
    session.finish(status)
}
