//! The write-caching layer shared by every region kind.

use crate::error::{Error, Result};
use crate::region::BackingCodec;
use rand::rngs::OsRng;
use rand::RngCore;
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

/// A fixed-capacity byte region backed by a file on disk.
///
/// The region's capacity is established once, at construction, by probing
/// the backing store. Contents are not loaded until the first `read` or
/// `write`; from then on all mutation happens in the in-memory buffer, and
/// nothing reaches the disk until [`sync`](CachedRegion::sync). This is how
/// write caching works: the owner keeps many regions and syncs them as
/// rarely as it can get away with.
///
/// There must be exactly one `CachedRegion` per backing file in the
/// process; two regions syncing to the same path would clobber each other.
/// The type is deliberately neither `Clone` nor `Copy`.
///
/// Dropping a region does **not** sync it. A flush can fail, and there is
/// no sound way to surface that from a destructor, so the owner is
/// responsible for an explicit `sync` before discard. What the destructor
/// does do is scrub the buffer: zeros first (with a write the compiler
/// cannot elide), then best-effort random bytes.
pub struct CachedRegion<C: BackingCodec> {
    path: PathBuf,
    capacity: usize,
    codec: C,
    buffer: Option<Vec<u8>>,
    dirty: bool,
}

impl<C: BackingCodec> CachedRegion<C> {
    /// Probe the file at `path` and construct an unloaded region over it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (codec, capacity) = C::probe(&path)?;
        Ok(Self {
            path,
            capacity,
            codec,
            buffer: None,
            dirty: false,
        })
    }

    /// How many payload bytes this region can hold.
    pub fn capacity(&self) -> u64 {
        self.capacity as u64
    }

    /// The backing file this region wraps.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy bytes from `buf` into the region starting at `offset`,
    /// analogous to `pwrite()`.
    ///
    /// Returns the number of bytes actually written: `buf.len()` if it fits,
    /// otherwise as many as remain before the end of the region. Fails with
    /// [`Error::InvalidArgument`] if `offset >= capacity`, and with whatever
    /// materialization fails with on the first touch.
    pub fn write(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        self.check_offset(offset)?;
        let offset = offset as usize;
        let n = buf.len().min(self.capacity - offset);
        let bytes = self.materialize()?;
        bytes[offset..offset + n].copy_from_slice(&buf[..n]);
        self.dirty = true;
        Ok(n)
    }

    /// Copy bytes from the region starting at `offset` into `buf`,
    /// analogous to `pread()`. Does not mark the region dirty.
    pub fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.check_offset(offset)?;
        let offset = offset as usize;
        let n = buf.len().min(self.capacity - offset);
        let bytes = self.materialize()?;
        buf[..n].copy_from_slice(&bytes[offset..offset + n]);
        Ok(n)
    }

    /// Rewrite the backing store from the buffer, then free the buffer.
    ///
    /// A no-op if nothing was written since the last load or sync. On
    /// failure the buffer and the dirty flag are left intact so the caller
    /// can retry.
    pub fn sync(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(bytes) = self.buffer.as_deref() {
            self.codec.encode(&self.path, bytes)?;
        }
        self.buffer = None;
        self.dirty = false;
        Ok(())
    }

    /// True if no writes have happened since the last load or sync.
    pub fn is_synced(&self) -> bool {
        !self.dirty
    }

    fn check_offset(&self, offset: u64) -> Result<()> {
        if offset >= self.capacity as u64 {
            return Err(Error::InvalidArgument(format!(
                "offset {} must be < capacity {} of '{}'",
                offset,
                self.capacity,
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Allocate and fill the buffer on first touch.
    ///
    /// The codec re-examines the backing store as part of `decode`, so a
    /// file that changed on disk since construction fails here rather than
    /// silently yielding garbage. On any failure the region stays unloaded.
    fn materialize(&mut self) -> Result<&mut [u8]> {
        match self.buffer {
            Some(ref mut bytes) => Ok(bytes),
            None => {
                let mut bytes = Vec::new();
                bytes
                    .try_reserve_exact(self.capacity)
                    .map_err(|_| Error::TooBig {
                        path: self.path.clone(),
                        size: self.capacity,
                    })?;
                bytes.resize(self.capacity, 0);
                self.codec.decode(&self.path, &mut bytes)?;
                self.dirty = false;
                Ok(self.buffer.insert(bytes))
            }
        }
    }
}

impl<C: BackingCodec> Drop for CachedRegion<C> {
    fn drop(&mut self) {
        // The buffer may hold plaintext that never reached the disk. Zero
        // it with a volatile write, then overlay randomness; if the OS RNG
        // fails the zeros already did the job.
        if let Some(bytes) = self.buffer.as_mut() {
            bytes.as_mut_slice().zeroize();
            let _ = OsRng.try_fill_bytes(bytes);
        }
    }
}
