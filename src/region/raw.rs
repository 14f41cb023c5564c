//! Whole-file passthrough codec.
//!
//! Stores the region's bytes as the literal contents of the backing file.
//! No hiding happens here; this codec exists to exercise the caching layer
//! in tests without dragging image decoding into them.

use crate::error::{Error, Result};
use crate::region::BackingCodec;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Passthrough codec: capacity is the file size, payload is the file.
#[derive(Debug)]
pub struct RawCodec {
    size: u64,
}

impl BackingCodec for RawCodec {
    fn probe(path: &Path) -> Result<(Self, usize)> {
        let meta = std::fs::metadata(path)
            .map_err(|e| Error::io(path, "get size of", e))?;
        let size = meta.len();
        Ok((Self { size }, size as usize))
    }

    fn decode(&self, path: &Path, buf: &mut [u8]) -> Result<()> {
        let meta = std::fs::metadata(path)
            .map_err(|e| Error::io(path, "get size of", e))?;
        if meta.len() != self.size {
            return Err(Error::changed(path));
        }

        let mut file = File::open(path).map_err(|e| Error::io(path, "open", e))?;
        file.read_exact(buf)
            .map_err(|e| Error::io(path, "read from", e))
    }

    fn encode(&self, path: &Path, buf: &[u8]) -> Result<()> {
        let mut file = File::create(path)
            .map_err(|e| Error::io(path, "open for writing", e))?;
        file.write_all(buf)
            .map_err(|e| Error::io(path, "write to", e))
    }
}
