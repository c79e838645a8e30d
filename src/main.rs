//! flashstub - Host simulator for the RAM-resident flash stub
//!
//! Runs stub commands against an emulated dual-core target whose flash is
//! backed by an image file. Every command goes through the same entry
//! point and dispatcher the target image uses, so the stub's logic can be
//! exercised without hardware.

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    log::debug!("Image: {:?}", cli.command.image().image);

    let result = match &cli.command {
        Commands::Test { image } => commands::run_test(image),
        Commands::Read {
            image,
            addr,
            len,
            output,
        } => commands::run_read(image, *addr, *len, output),
        Commands::Write {
            image,
            addr,
            input,
            streaming,
            ring_size,
        } => commands::run_write(image, *addr, input, *streaming, *ring_size),
        Commands::Erase { image, addr, len } => commands::run_erase(image, *addr, *len),
        Commands::FlashTest { image, test_addr } => commands::run_flash_test(image, *test_addr),
        Commands::Raw { image, cmd, args } => commands::run_raw(image, *cmd, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
