//! Stub configuration
//!
//! The configuration is fixed for the lifetime of one upload. On the target
//! it is assembled from cargo features; the host simulator builds it from
//! command line flags.

use log::LevelFilter;

/// Address the flash self test erases and programs
pub const DEFAULT_SELF_TEST_ADDR: u32 = 0x1D_4000;

/// Which write algorithm handles `FLASH_WRITE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Synchronous write of a complete caller buffer
    #[default]
    Direct,
    /// Incremental write fed through a caller-owned ring buffer
    Streaming,
}

/// How long a busy-wait may spin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollLimit {
    /// Spin until the condition holds, however long it takes
    #[default]
    Forever,
    /// Give up after this many unsuccessful polls
    Bounded(u32),
}

impl PollLimit {
    /// `true` once `failed_polls` unsuccessful polls exhaust the limit
    pub fn exhausted(self, failed_polls: u32) -> bool {
        match self {
            Self::Forever => false,
            Self::Bounded(max) => failed_polls >= max,
        }
    }

    /// Spin until `cond` returns `true`
    ///
    /// Returns `false` if the limit ran out first.
    pub fn spin_until(self, mut cond: impl FnMut() -> bool) -> bool {
        let mut failed = 0u32;
        while !cond() {
            if self.exhausted(failed) {
                return false;
            }
            failed = failed.saturating_add(1);
            core::hint::spin_loop();
        }
        true
    }
}

/// Runtime configuration of the stub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StubConfig {
    /// Algorithm used for `FLASH_WRITE`
    pub write_mode: WriteMode,
    /// Limit for the cache idle poll
    pub cache_poll: PollLimit,
    /// Limit for consecutive ring buffer polls without progress
    pub stream_poll: PollLimit,
    /// Sector-aligned address used by `FLASH_TEST`
    pub self_test_addr: u32,
    /// Maximum level of diagnostic output
    pub log_level: LevelFilter,
}

impl StubConfig {
    /// Reference configuration: direct writes, unbounded polling
    pub const fn new() -> Self {
        Self {
            write_mode: WriteMode::Direct,
            cache_poll: PollLimit::Forever,
            stream_poll: PollLimit::Forever,
            self_test_addr: DEFAULT_SELF_TEST_ADDR,
            log_level: LevelFilter::Debug,
        }
    }

    /// Select the write algorithm
    pub const fn with_write_mode(self, write_mode: WriteMode) -> Self {
        Self { write_mode, ..self }
    }

    /// Bound both busy-wait loops to the given number of polls
    pub const fn with_bounded_polling(self, max_polls: u32) -> Self {
        Self {
            cache_poll: PollLimit::Bounded(max_polls),
            stream_poll: PollLimit::Bounded(max_polls),
            ..self
        }
    }

    /// Move the self test to another sector
    pub const fn with_self_test_addr(self, self_test_addr: u32) -> Self {
        Self {
            self_test_addr,
            ..self
        }
    }
}

impl Default for StubConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_spin_gives_up() {
        let mut polls = 0;
        let ok = PollLimit::Bounded(3).spin_until(|| {
            polls += 1;
            false
        });
        assert!(!ok);
        // initial poll plus three retries
        assert_eq!(polls, 4);
    }

    #[test]
    fn test_spin_until_succeeds() {
        let mut polls = 0;
        let ok = PollLimit::Forever.spin_until(|| {
            polls += 1;
            polls == 10
        });
        assert!(ok);
        assert_eq!(polls, 10);
    }

    #[test]
    fn test_builder() {
        let cfg = StubConfig::new()
            .with_write_mode(WriteMode::Streaming)
            .with_bounded_polling(100)
            .with_self_test_addr(0x10_0000);
        assert_eq!(cfg.write_mode, WriteMode::Streaming);
        assert_eq!(cfg.cache_poll, PollLimit::Bounded(100));
        assert_eq!(cfg.stream_poll, PollLimit::Bounded(100));
        assert_eq!(cfg.self_test_addr, 0x10_0000);
        assert_eq!(StubConfig::default().write_mode, WriteMode::Direct);
    }
}
