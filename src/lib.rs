//! Steganographic loop file system.
//!
//! Presents one virtual regular file whose bytes are dispersed, bit by
//! bit, into the least significant bits of the pixel samples of a
//! directory of cover images (PNG, BMP, TGA). Mount the file, attach it to
//! a loop device, put an encrypted volume on it, and your ciphertext lives
//! inside ordinary-looking pictures.
//!
//! # Architecture
//!
//! ```text
//! FUSE adapter  ->  Aggregate  -> Permutation (logical -> physical byte)
//!                       |
//!                       +-> CachedRegion<StegoCodec> per cover image
//! ```
//!
//! - [`permute::Permutation`] is a seeded bijection on the whole logical
//!   address space; the same directory and seed always reproduce it.
//! - [`region::CachedRegion`] lazily decodes its cover on first touch,
//!   buffers every mutation in memory, and only rewrites the image on an
//!   explicit sync. Buffers are scrubbed on drop.
//! - [`aggregate::Aggregate`] stitches all regions into one byte space and
//!   routes each logical byte through the permutation.
//! - [`mount`] adapts kernel file operations onto the aggregate.
//!
//! # Example
//!
//! ```rust,no_run
//! use stegoloop::Aggregate;
//! use std::path::Path;
//!
//! let mut agg: Aggregate = Aggregate::open(Path::new("./covers"), b"seed").unwrap();
//! agg.write(b"hidden", 0).unwrap();
//!
//! let mut back = [0u8; 6];
//! agg.read(&mut back, 0).unwrap();
//! assert_eq!(&back, b"hidden");
//!
//! agg.sync().unwrap(); // rewrite the cover images
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod mount;
pub mod permute;
pub mod region;

pub use aggregate::Aggregate;
pub use error::{Error, Result};
pub use permute::Permutation;
pub use region::{
    BackingCodec, CachedRegion, CoverFormat, ImageStegoRegion, RawCodec, RawFileRegion, StegoCodec,
};
