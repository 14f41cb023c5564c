//! Cached regions and their backing codecs.
//!
//! A [`CachedRegion`] is a fixed-capacity byte region that lazily loads its
//! contents from a backing file, buffers all mutations in memory, and
//! rewrites the file only on an explicit [`CachedRegion::sync`]. What
//! "loading" and "rewriting" mean is supplied by a [`BackingCodec`]:
//! [`StegoCodec`] hides the bytes in the LSBs of an image's samples, while
//! [`RawCodec`] is a plain whole-file passthrough used in tests.
//!
//! Codecs are chosen at construction via the type parameter; there is no
//! runtime polymorphism anywhere in this layer.

mod cached;
mod raw;
mod stego;

pub use cached::CachedRegion;
pub use raw::RawCodec;
pub use stego::{CoverFormat, StegoCodec};

use crate::error::Result;
use std::path::Path;

/// How a region's bytes are stored in, and recovered from, a backing file.
///
/// `probe` runs once at construction and records whatever the codec needs
/// to detect external modification later (file length, image dimensions).
/// `decode` and `encode` both re-examine the backing store and must fail
/// with the "file has changed" guard if it no longer matches the probe.
pub trait BackingCodec: Sized + Send + Sync {
    /// Examine the backing store and compute its payload capacity in bytes.
    ///
    /// Must not retain decoded contents; a probed region costs only its
    /// metadata until the first read or write touches it.
    fn probe(path: &Path) -> Result<(Self, usize)>;

    /// Fill `buf` (whose length is exactly the probed capacity) with the
    /// payload bytes decoded from the backing store.
    fn decode(&self, path: &Path, buf: &mut [u8]) -> Result<()>;

    /// Re-embed `buf` into the backing store and rewrite it in place.
    fn encode(&self, path: &Path, buf: &[u8]) -> Result<()>;
}

/// A region whose backing store is a cover image.
pub type ImageStegoRegion = CachedRegion<StegoCodec>;

/// A region whose backing store is a plain file, byte for byte.
pub type RawFileRegion = CachedRegion<RawCodec>;
