//! Erase command implementation

use flashstub_core::flash::sector_span;
use flashstub_core::{FlashCommand, Request, StubConfig};

use super::Session;
use crate::cli::ImageArgs;
use crate::error::Result;

/// Run the erase command
pub fn run_erase(image: &ImageArgs, addr: u32, len: u32) -> Result<()> {
    let mut session = Session::open(image, StubConfig::new())?;

    let (start, span) = sector_span(addr, len)?;
    session.check_range(start, u64::from(span))?;
    if span > 0 {
        println!("Erasing 0x{:08X}..0x{:08X}", start, u64::from(start) + u64::from(span));
    }

    let status = session.handle(Request::Flash(FlashCommand::Erase { addr, size: len }));
    session.finish(status)
}
