//! Error and status types for flashstub-core
//!
//! Internally every routine returns a detailed [`Error`]. Only the coarse
//! [`Status`] crosses the calling convention back to the debug host.

use core::fmt;

use crate::platform::CoreId;

/// Result code reported by a raw ROM flash primitive
///
/// Mirrors the vendor's `esp_rom_spiflash_result_t`: `0` is success and is
/// never represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomCode {
    /// The primitive reported a generic error
    Err,
    /// The primitive timed out waiting for the flash chip
    Timeout,
    /// Any other non-zero value
    Unknown(i32),
}

impl RomCode {
    /// Convert a raw ROM return value into a `Result`
    pub fn check(raw: i32) -> core::result::Result<(), RomCode> {
        match raw {
            0 => Ok(()),
            1 => Err(Self::Err),
            2 => Err(Self::Timeout),
            other => Err(Self::Unknown(other)),
        }
    }

    /// The raw integer value as the ROM reports it
    pub fn raw(self) -> i32 {
        match self {
            Self::Err => 1,
            Self::Timeout => 2,
            Self::Unknown(v) => v,
        }
    }
}

impl fmt::Display for RomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Err => write!(f, "error (1)"),
            Self::Timeout => write!(f, "timeout (2)"),
            Self::Unknown(v) => write!(f, "unknown ({})", v),
        }
    }
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Raw primitive failures
    /// Flash read primitive failed
    ReadFailed {
        /// Word-aligned address passed to the primitive
        addr: u32,
        /// Code returned by the primitive
        code: RomCode,
    },
    /// Flash program primitive failed
    WriteFailed {
        /// Word-aligned address passed to the primitive
        addr: u32,
        /// Code returned by the primitive
        code: RomCode,
    },
    /// Flash erase primitive failed
    EraseFailed {
        /// Sector-aligned address passed to the primitive
        addr: u32,
        /// Code returned by the primitive
        code: RomCode,
    },
    /// Flash unlock primitive failed
    UnlockFailed(RomCode),

    // Polling failures (only with bounded polling)
    /// Cache never reported idle on the given core
    CacheTimeout(CoreId),
    /// Ring buffer made no progress within the poll limit
    StreamStalled,

    // Argument and data errors
    /// Address or length violates a word or sector requirement
    InvalidAlignment,
    /// Caller supplied buffer or ring buffer region is unusable
    InvalidBuffer,
    /// Address window wraps past the end of the 32-bit address space
    AddressOverflow,
    /// Read-back after programming did not match
    VerifyMismatch {
        /// Address of the first mismatching byte
        addr: u32,
    },

    /// Command identifier not handled by this build
    NotSupported,
}

impl Error {
    /// Collapse the error into the status code returned to the host
    pub fn status(self) -> Status {
        match self {
            Self::NotSupported => Status::NotSupported,
            _ => Status::Fail,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed { addr, code } => {
                write!(f, "failed to read flash @ 0x{:08X}: {}", addr, code)
            }
            Self::WriteFailed { addr, code } => {
                write!(f, "failed to write flash @ 0x{:08X}: {}", addr, code)
            }
            Self::EraseFailed { addr, code } => {
                write!(f, "failed to erase flash @ 0x{:08X}: {}", addr, code)
            }
            Self::UnlockFailed(code) => write!(f, "failed to unlock flash: {}", code),
            Self::CacheTimeout(core) => write!(f, "cache on {} core never went idle", core),
            Self::StreamStalled => write!(f, "ring buffer producer stalled"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
            Self::InvalidBuffer => write!(f, "invalid buffer region"),
            Self::AddressOverflow => write!(f, "address window overflows"),
            Self::VerifyMismatch { addr } => {
                write!(f, "verify failed: data mismatch @ 0x{:08X}", addr)
            }
            Self::NotSupported => write!(f, "command not supported"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

/// Status code returned through the calling convention
///
/// These values are a stable contract with the debug host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// Operation completed
    Ok = 0,
    /// A hardware primitive (or a hardening check) failed
    Fail = -1,
    /// Command identifier is not handled
    NotSupported = -2,
}

impl Status {
    /// Raw value handed back to the caller
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Interpret a raw status value, if it is one of the defined codes
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            -1 => Some(Self::Fail),
            -2 => Some(Self::NotSupported),
            _ => None,
        }
    }

    /// `true` for [`Status::Ok`]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl From<Result<()>> for Status {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Status::Ok,
            Err(e) => e.status(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok (0)"),
            Self::Fail => write!(f, "fail (-1)"),
            Self::NotSupported => write!(f, "not supported (-2)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rom_code_check() {
        assert_eq!(RomCode::check(0), Ok(()));
        assert_eq!(RomCode::check(1), Err(RomCode::Err));
        assert_eq!(RomCode::check(2), Err(RomCode::Timeout));
        assert_eq!(RomCode::check(-7), Err(RomCode::Unknown(-7)));
        assert_eq!(RomCode::Unknown(-7).raw(), -7);
    }

    #[test]
    fn test_status_codes_are_stable() {
        assert_eq!(Status::Ok.code(), 0);
        assert_eq!(Status::Fail.code(), -1);
        assert_eq!(Status::NotSupported.code(), -2);
        assert_eq!(Status::from_code(-2), Some(Status::NotSupported));
        assert_eq!(Status::from_code(5), None);
    }

    #[test]
    fn test_error_status_mapping() {
        let hw = Error::WriteFailed {
            addr: 0x1000,
            code: RomCode::Err,
        };
        assert_eq!(hw.status(), Status::Fail);
        assert_eq!(Error::CacheTimeout(CoreId::App).status(), Status::Fail);
        assert_eq!(Error::NotSupported.status(), Status::NotSupported);
        assert_eq!(Status::from(Ok(())), Status::Ok);
        assert_eq!(Status::from(Err(Error::StreamStalled)), Status::Fail);
    }
}
