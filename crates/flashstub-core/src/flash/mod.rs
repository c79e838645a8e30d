//! Flash operations
//!
//! `aligned` turns byte-addressed requests into word- and sector-granular
//! raw primitive calls. `stream` implements the ring buffer write.

mod aligned;
mod stream;

pub use aligned::*;
pub use stream::*;
