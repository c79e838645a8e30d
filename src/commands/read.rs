//! Read command implementation

use flashstub_core::{FlashCommand, Request, StubConfig};
use std::fs;
use std::path::Path;

use super::Session;
use crate::cli::ImageArgs;
use crate::error::{io_at, Result};

/// Run the read command
pub fn run_read(image: &ImageArgs, addr: u32, len: u32, output: &Path) -> Result<()> {
    let mut session = Session::open(image, StubConfig::new())?;
    session.check_range(addr, u64::from(len))?;

    let mut data = vec![0u8; len as usize];
    let status = session.handle(Request::Flash(FlashCommand::Read {
        addr,
        buf: &mut data,
    }));

    if status.is_ok() {
        fs::write(output, &data).map_err(io_at(output))?;
        println!("Wrote {} bytes to {:?}", data.len(), output);
    }
    session.finish(status)
}
