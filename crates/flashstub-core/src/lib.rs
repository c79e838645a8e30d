//! flashstub-core - Core of a RAM-resident flash stub
//!
//! A debug host uploads the stub into target RAM and calls it once per
//! command to read, write or erase the SPI flash. This crate contains
//! everything that does not depend on the concrete chip:
//!
//! - [`cache`] - quiesces both cores' caches around flash access
//! - [`flash`] - byte-addressable I/O on word/sector-granular primitives,
//!   plus the ring buffer streaming write
//! - [`dispatch`] - runs one flash command inside the cache guard
//! - [`entry`] - decodes the calling convention and routes requests
//!
//! Hardware is reached only through the traits in [`platform`].
//!
//! # Features
//!
//! - `std` - Enable standard library support (`std::error::Error` impls)
//!
//! # Example
//!
//! ```ignore
//! use flashstub_core::{entry::Stub, RawRequest, StubConfig};
//!
//! let mut stub = Stub::new(platform, StubConfig::new());
//! let status = unsafe { stub.handle_raw(&RawRequest::new(cmd, args)) };
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod cache;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod entry;
pub mod error;
pub mod flash;
pub mod platform;

pub use command::{CommandId, FlashCommand, RawRequest, Request};
pub use config::{PollLimit, StubConfig, WriteMode};
pub use error::{Error, Result, Status};
