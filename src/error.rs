//! Error type of the simulator

use flashstub_core::platform::CoreId;
use flashstub_core::{CommandId, Status};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised around a stub invocation
#[derive(Debug, Error)]
pub enum SimError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image {path} is {len} bytes, larger than the {size} byte flash")]
    ImageTooLarge { path: PathBuf, len: u64, size: u32 },

    #[error("{len} bytes at 0x{addr:08X} do not fit the {size} byte flash")]
    OutOfRange { addr: u32, len: u64, size: u32 },

    #[error("{0} takes pointer arguments; use the dedicated subcommand")]
    PointerArgs(CommandId),

    #[error("stub returned {0}")]
    Stub(Status),

    #[error(transparent)]
    Core(#[from] flashstub_core::Error),

    #[error("cache of {core} core left as {after:?}, was {before:?}")]
    CacheAsymmetry {
        core: CoreId,
        before: (bool, u32),
        after: (bool, u32),
    },

    #[error("{0} flash accesses with a cache enabled")]
    CacheViolation(u32),

    #[error("producer thread panicked")]
    Producer,

    #[error("invalid progress template: {0}")]
    Progress(#[from] indicatif::style::TemplateError),
}

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Attach the path to an I/O error
pub fn io_at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> SimError {
    let path = path.into();
    move |source| SimError::Io { path, source }
}
