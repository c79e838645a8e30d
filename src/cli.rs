//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default flash size of the emulated target (4 MiB)
pub const DEFAULT_FLASH_SIZE: u32 = 4 * 1024 * 1024;

/// Default ring data area for streaming writes
pub const DEFAULT_RING_SIZE: u32 = 4096;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a command identifier, which may be negative
fn parse_cmd_id(s: &str) -> Result<i32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
            .map(|v| v as i32)
            .map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<i32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "flashstub")]
#[command(
    author,
    version,
    about = "Run flash stub commands against an emulated target",
    long_about = None
)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flash image backing the emulated target
#[derive(clap::Args, Debug, Clone)]
pub struct ImageArgs {
    /// Image file (created erased if missing, saved back afterwards)
    #[arg(short, long)]
    pub image: PathBuf,

    /// Flash size in bytes (hex with 0x prefix)
    #[arg(long, value_parser = parse_hex_u32, default_value_t = DEFAULT_FLASH_SIZE)]
    pub size: u32,

    /// Run on the APP core instead of the PRO core
    #[arg(long)]
    pub app_core: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send the no-op self check
    Test {
        #[command(flatten)]
        image: ImageArgs,
    },

    /// Read a window of flash into a file
    Read {
        #[command(flatten)]
        image: ImageArgs,

        /// Start address (hex with 0x prefix)
        #[arg(short, long, value_parser = parse_hex_u32)]
        addr: u32,

        /// Number of bytes (hex with 0x prefix)
        #[arg(short, long, value_parser = parse_hex_u32)]
        len: u32,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Program a file into flash
    ///
    /// The target range is expected to be erased; programming only clears
    /// bits.
    Write {
        #[command(flatten)]
        image: ImageArgs,

        /// Start address (hex with 0x prefix)
        #[arg(short, long, value_parser = parse_hex_u32)]
        addr: u32,

        /// Input file path
        #[arg(short = 'f', long)]
        input: PathBuf,

        /// Feed the data through the ring buffer from a producer thread
        #[arg(long)]
        streaming: bool,

        /// Ring data area size in bytes (hex with 0x prefix)
        #[arg(long, value_parser = parse_hex_u32, default_value_t = DEFAULT_RING_SIZE)]
        ring_size: u32,
    },

    /// Erase every sector touched by a window
    Erase {
        #[command(flatten)]
        image: ImageArgs,

        /// Start address (hex with 0x prefix)
        #[arg(short, long, value_parser = parse_hex_u32)]
        addr: u32,

        /// Number of bytes (hex with 0x prefix)
        #[arg(short, long, value_parser = parse_hex_u32)]
        len: u32,
    },

    /// Run the flash self test
    FlashTest {
        #[command(flatten)]
        image: ImageArgs,

        /// Sector used by the self test (hex with 0x prefix)
        #[arg(long, value_parser = parse_hex_u32)]
        test_addr: Option<u32>,
    },

    /// Send a raw command identifier with scalar arguments
    ///
    /// Identifiers whose arguments are buffer pointers are refused.
    Raw {
        #[command(flatten)]
        image: ImageArgs,

        /// Command identifier
        #[arg(short, long, value_parser = parse_cmd_id, allow_negative_numbers = true)]
        cmd: i32,

        /// Up to four scalar arguments (hex with 0x prefix)
        #[arg(long, value_parser = parse_hex_u32, value_delimiter = ',', num_args = 0..=4)]
        args: Vec<u32>,
    },
}

impl Commands {
    /// Image options of any command
    pub fn image(&self) -> &ImageArgs {
        match self {
            Commands::Test { image }
            | Commands::Read { image, .. }
            | Commands::Write { image, .. }
            | Commands::Erase { image, .. }
            | Commands::FlashTest { image, .. }
            | Commands::Raw { image, .. } => image,
        }
    }
}
