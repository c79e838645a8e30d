//! Write command implementation

use flashstub_core::flash::RingProducer;
use flashstub_core::{FlashCommand, Request, StubConfig, WriteMode};
use flashstub_dummy::RingStorage;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::thread;

use super::Session;
use crate::cli::ImageArgs;
use crate::error::{io_at, Result, SimError};

/// Polls without progress before the stub gives up on the producer
const STREAM_POLL_LIMIT: u32 = 1 << 30;

/// Largest slice handed to the ring at once
const PUSH_SIZE: usize = 256;

/// Run the write command
pub fn run_write(
    image: &ImageArgs,
    addr: u32,
    input: &Path,
    streaming: bool,
    ring_size: u32,
) -> Result<()> {
    let data = fs::read(input).map_err(io_at(input))?;
    println!("Read {} bytes from {:?}", data.len(), input);

    if streaming {
        run_streaming_write(image, addr, &data, ring_size)
    } else {
        let mut session = Session::open(image, StubConfig::new())?;
        session.check_range(addr, data.len() as u64)?;
        let status = session.handle(Request::Flash(FlashCommand::Write { addr, data: &data }));
        session.finish(status)
    }
}

fn run_streaming_write(image: &ImageArgs, addr: u32, data: &[u8], ring_size: u32) -> Result<()> {
    let config = StubConfig::new()
        .with_write_mode(WriteMode::Streaming)
        .with_bounded_polling(STREAM_POLL_LIMIT);
    let mut session = Session::open(image, config)?;
    session.check_range(addr, data.len() as u64)?;

    let ring = RingStorage::new(ring_size as usize);
    let consumer = ring.consumer()?;
    let producer = ring.producer()?;

    let pb = ProgressBar::new(data.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );

    let size = data.len() as u32;
    let (status, fed) = thread::scope(|s| {
        let feeder = {
            let pb = pb.clone();
            s.spawn(move || feed(producer, data, &pb))
        };
        let status = session.handle(Request::Flash(FlashCommand::StreamWrite {
            addr,
            size,
            ring: consumer,
        }));
        (status, feeder.join())
    });

    let fed = fed.map_err(|_| SimError::Producer)?;
    if status.is_ok() {
        pb.finish_with_message("Write complete");
    } else {
        pb.abandon_with_message("Write failed");
        log::warn!("stub stopped the stream after {} bytes were queued", fed);
    }
    session.finish(status)
}

/// Push `data` into the ring until it is all queued or the stub aborts
///
/// Returns the number of bytes queued.
fn feed(producer: RingProducer<'_>, data: &[u8], pb: &ProgressBar) -> usize {
    let mut sent = 0;
    while sent < data.len() {
        if producer.consumer_aborted() {
            break;
        }
        let end = (sent + PUSH_SIZE).min(data.len());
        match producer.push(&data[sent..end]) {
            0 => thread::yield_now(),
            n => {
                sent += n;
                pb.set_position(sent as u64);
            }
        }
    }
    sent
}
