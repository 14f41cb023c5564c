//! stegoloop - mount a virtual file hidden in the LSBs of cover images.
//!
//! Reads or writes made to the mounted file are dispersed, byte by byte,
//! across every image found under the target directory. Covers are only
//! rewritten on fsync and at unmount; everything in between is cached in
//! memory. Layer an encrypted volume over the virtual file if the payload
//! matters: this program hides bytes, it does not authenticate them.

use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use stegoloop::{Aggregate, Error, Result};

#[derive(Parser)]
#[command(name = "stegoloop")]
#[command(author, version)]
#[command(
    about = "Mount a single virtual file dispersed across the LSBs of cover images",
    long_about = "Exposes one regular file ('data') through FUSE. Bytes written to it are \
                  hidden bit by bit in the least significant bits of the pixel samples of \
                  every PNG, BMP and TGA image under the target directory, scattered by a \
                  permutation derived from the seed file."
)]
struct Cli {
    /// File whose entire byte contents seed the dispersion permutation
    seed_file: PathBuf,

    /// Directory of cover images, searched recursively
    target_dir: PathBuf,

    /// Where to mount the filesystem
    mount_point: PathBuf,

    /// Allow root to access the mounted filesystem
    #[arg(long)]
    allow_root: bool,

    /// Unmount automatically when the process exits
    #[arg(long)]
    auto_unmount: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("stegoloop: error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // The seed is the file's raw bytes, not a trimmed text line; a
    // trailing newline produces a different permutation.
    let seed = std::fs::read(&cli.seed_file)
        .map_err(|e| Error::io(&cli.seed_file, "read seed from", e))?;

    // Relative target paths break once FUSE changes the working directory.
    // If canonicalization fails, construction will report the real problem.
    let target = cli
        .target_dir
        .canonicalize()
        .unwrap_or_else(|_| cli.target_dir.clone());

    let started = Instant::now();
    let aggregate = Aggregate::open(&target, &seed)?;
    info!(
        "set up {} covers, {} bytes, in {:.2?}",
        aggregate.region_count(),
        aggregate.capacity(),
        started.elapsed()
    );

    let aggregate = Arc::new(Mutex::new(aggregate));
    stegoloop::mount::mount(
        Arc::clone(&aggregate),
        &cli.mount_point,
        cli.allow_root,
        cli.auto_unmount,
    )?;

    // The session's destroy hook already tried once; this retry is the one
    // that can actually tell the user about a failure.
    let started = Instant::now();
    match aggregate.lock() {
        Ok(mut agg) => agg.sync()?,
        Err(_) => {
            return Err(Error::BackingStore(
                "aggregate lock poisoned by an earlier panic".to_string(),
            ))
        }
    }
    info!("synced in {:.2?}", started.elapsed());

    Ok(())
}
