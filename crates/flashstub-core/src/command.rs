//! Command model
//!
//! The host passes a command identifier followed by positional arguments.
//! [`RawRequest`] is that register-level view; [`Request`] is the decoded,
//! typed form every later stage works with.

use core::fmt;

use crate::config::WriteMode;
use crate::error::{Error, Result};
use crate::flash::RingConsumer;

/// Command identifiers understood by the stub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CommandId {
    /// No-op self check
    Test = 0,
    /// Read flash into a caller buffer
    FlashRead = 1,
    /// Program flash from a caller buffer or ring
    FlashWrite = 2,
    /// Erase flash sectors
    FlashErase = 3,
    /// Erase, program and verify a fixed test sector
    FlashTest = 4,
}

impl CommandId {
    /// All identifiers, in numeric order
    pub const ALL: [CommandId; 5] = [
        Self::Test,
        Self::FlashRead,
        Self::FlashWrite,
        Self::FlashErase,
        Self::FlashTest,
    ];

    /// Decode a raw identifier
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Test),
            1 => Some(Self::FlashRead),
            2 => Some(Self::FlashWrite),
            3 => Some(Self::FlashErase),
            4 => Some(Self::FlashTest),
            _ => None,
        }
    }

    /// Raw identifier value
    pub const fn raw(self) -> i32 {
        self as i32
    }

    /// `true` for identifiers that are forwarded to the dispatcher
    pub const fn is_flash(self) -> bool {
        !matches!(self, Self::Test)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Test => "TEST",
            Self::FlashRead => "FLASH_READ",
            Self::FlashWrite => "FLASH_WRITE",
            Self::FlashErase => "FLASH_ERASE",
            Self::FlashTest => "FLASH_TEST",
        };
        f.write_str(name)
    }
}

/// A flash command with exactly the arguments its identifier requires
#[derive(Debug)]
pub enum FlashCommand<'a> {
    /// Fill `buf` from flash starting at `addr`
    Read {
        /// Flash address, any alignment
        addr: u32,
        /// Destination buffer
        buf: &'a mut [u8],
    },
    /// Program `data` starting at `addr`
    Write {
        /// Flash address, any alignment
        addr: u32,
        /// Bytes to program
        data: &'a [u8],
    },
    /// Program `size` bytes at `addr` as they arrive through a ring
    StreamWrite {
        /// Flash address, word aligned
        addr: u32,
        /// Total number of bytes to program
        size: u32,
        /// Consumer side of the caller's ring buffer
        ring: RingConsumer<'a>,
    },
    /// Erase every sector touched by `[addr, addr + size)`
    Erase {
        /// Start of the window
        addr: u32,
        /// Length of the window in bytes
        size: u32,
    },
    /// Run the flash self test
    Test,
}

impl FlashCommand<'_> {
    /// Identifier this command is encoded with
    pub fn id(&self) -> CommandId {
        match self {
            Self::Read { .. } => CommandId::FlashRead,
            Self::Write { .. } | Self::StreamWrite { .. } => CommandId::FlashWrite,
            Self::Erase { .. } => CommandId::FlashErase,
            Self::Test => CommandId::FlashTest,
        }
    }
}

/// A decoded top-level request
#[derive(Debug)]
pub enum Request<'a> {
    /// The no-op self check
    SelfCheck,
    /// A command for the dispatcher
    Flash(FlashCommand<'a>),
    /// An identifier this stub does not know
    Unsupported(i32),
}

/// A request as it arrives through the calling convention
///
/// Argument order is fixed: address, size, buffer pointer and, for the
/// streaming write, the ring end pointer. Unused trailing slots are
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRequest {
    /// Command identifier
    pub cmd: i32,
    /// Positional arguments
    pub args: [usize; 4],
}

impl RawRequest {
    /// Build a raw request
    pub const fn new(cmd: i32, args: [usize; 4]) -> Self {
        Self { cmd, args }
    }

    fn addr(&self) -> u32 {
        self.args[0] as u32
    }

    fn size(&self) -> u32 {
        self.args[1] as u32
    }

    /// Decode into a typed request
    ///
    /// `mode` selects how `FLASH_WRITE` arguments are interpreted. Decoding
    /// never touches flash or cache state.
    ///
    /// # Safety
    ///
    /// Pointer arguments must describe memory that is valid for `'a` and
    /// not aliased by Rust code for that time, exactly as the host encoded
    /// them for the identifier. A mismatch between identifier and arguments
    /// is undefined behaviour.
    pub unsafe fn decode<'a>(&self, mode: WriteMode) -> Result<Request<'a>> {
        let Some(id) = CommandId::from_raw(self.cmd) else {
            return Ok(Request::Unsupported(self.cmd));
        };

        let command = match id {
            CommandId::Test => return Ok(Request::SelfCheck),
            CommandId::FlashRead => FlashCommand::Read {
                addr: self.addr(),
                buf: buffer_mut(self.args[2], self.size())?,
            },
            CommandId::FlashWrite => match mode {
                WriteMode::Direct => FlashCommand::Write {
                    addr: self.addr(),
                    data: buffer(self.args[2], self.size())?,
                },
                WriteMode::Streaming => FlashCommand::StreamWrite {
                    addr: self.addr(),
                    size: self.size(),
                    ring: RingConsumer::from_raw(self.args[2] as *mut u8, self.args[3] as *mut u8)?,
                },
            },
            CommandId::FlashErase => FlashCommand::Erase {
                addr: self.addr(),
                size: self.size(),
            },
            CommandId::FlashTest => FlashCommand::Test,
        };
        Ok(Request::Flash(command))
    }
}

unsafe fn buffer<'a>(ptr: usize, len: u32) -> Result<&'a [u8]> {
    match (ptr, len) {
        (_, 0) => Ok(&[]),
        (0, _) => Err(Error::InvalidBuffer),
        // SAFETY: upheld by the caller of `RawRequest::decode`
        (ptr, len) => Ok(core::slice::from_raw_parts(ptr as *const u8, len as usize)),
    }
}

unsafe fn buffer_mut<'a>(ptr: usize, len: u32) -> Result<&'a mut [u8]> {
    match (ptr, len) {
        (_, 0) => Ok(&mut []),
        (0, _) => Err(Error::InvalidBuffer),
        // SAFETY: upheld by the caller of `RawRequest::decode`
        (ptr, len) => Ok(core::slice::from_raw_parts_mut(ptr as *mut u8, len as usize)),
    }
}
