//! The composite virtual file.
//!
//! An [`Aggregate`] stitches every cover file beneath a target directory
//! into one contiguous logical byte space and disperses each logical byte
//! to a pseudo-random physical byte through a seeded [`Permutation`]. Two
//! adjacent logical bytes almost always land in different covers at
//! unrelated offsets, so nothing about the on-disk layout betrays where a
//! payload starts or ends.
//!
//! The aggregate presents the same read/write/sync surface as a single
//! region, but it is its own type, not a region: the FUSE adapter is
//! written against the surface, not against either concrete type.

use crate::error::{Error, Result};
use crate::permute::Permutation;
use crate::region::{BackingCodec, CachedRegion, StegoCodec};
use log::{debug, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Many cached regions plus a permutation, addressed as one byte space.
pub struct Aggregate<C: BackingCodec = StegoCodec> {
    regions: Vec<CachedRegion<C>>,
    /// `cum_cap[i]` is the summed capacity of regions `0..=i`; the routing
    /// binary search runs over this.
    cum_cap: Vec<u64>,
    capacity: u64,
    permutation: Permutation,
}

impl<C: BackingCodec> std::fmt::Debug for Aggregate<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregate")
            .field("regions", &self.regions.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<C: BackingCodec> Aggregate<C> {
    /// Build an aggregate from every regular file beneath `root`.
    ///
    /// The directory is searched recursively and the paths are sorted, so
    /// the region order is a pure function of the directory contents.
    /// Probing the covers is fanned out across threads; the join restores
    /// sorted order. `seed` is an arbitrary byte string; the same
    /// directory contents and seed always reproduce the same dispersion.
    pub fn open(root: &Path, seed: &[u8]) -> Result<Self> {
        let paths = list_regular_files(root)?;
        if paths.is_empty() {
            return Err(Error::BackingStore(format!(
                "directory at '{}' contains no regular files",
                root.display()
            )));
        }

        // Probing decodes every image once to learn its dimensions, which
        // is CPU-bound and embarrassingly parallel.
        let regions: Vec<CachedRegion<C>> = paths
            .into_par_iter()
            .map(CachedRegion::open)
            .collect::<Result<Vec<_>>>()?;

        let mut cum_cap = Vec::with_capacity(regions.len());
        let mut capacity = 0u64;
        for region in &regions {
            capacity += region.capacity();
            cum_cap.push(capacity);
        }
        if capacity == 0 {
            return Err(Error::BackingStore(format!(
                "covers under '{}' have no usable capacity",
                root.display()
            )));
        }

        debug!(
            "aggregate over {} covers, {} bytes logical capacity",
            regions.len(),
            capacity
        );

        Ok(Self {
            regions,
            cum_cap,
            capacity,
            permutation: Permutation::new(capacity, seed),
        })
    }

    /// Total logical capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// How many covers back this aggregate.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Write `buf` at logical `offset`, dispersing byte by byte.
    ///
    /// Returns the number of bytes written, clamped at end of capacity.
    /// Fails with [`Error::InvalidArgument`] if `offset >= capacity`;
    /// region errors propagate unchanged, in which case the count of bytes
    /// already transferred is lost and the caller may simply retry.
    pub fn write(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        self.check_offset(offset)?;
        let n = (buf.len() as u64).min(self.capacity - offset) as usize;

        for i in 0..n {
            let physical = self.permutation.at(offset + i as u64);
            let (region, within) = self.locate(physical)?;
            self.regions[region].write(&buf[i..i + 1], within)?;
        }
        Ok(n)
    }

    /// Read into `buf` from logical `offset`. Symmetric to `write`.
    pub fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.check_offset(offset)?;
        let n = (buf.len() as u64).min(self.capacity - offset) as usize;

        for i in 0..n {
            let physical = self.permutation.at(offset + i as u64);
            let (region, within) = self.locate(physical)?;
            self.regions[region].read(&mut buf[i..i + 1], within)?;
        }
        Ok(n)
    }

    /// Flush every dirty region to disk, one task per region.
    ///
    /// Best-effort: every region gets an attempt even if an earlier one
    /// fails; the first error (in region order) is returned and the rest
    /// are logged. Failed regions stay dirty so a later `sync` can retry.
    pub fn sync(&mut self) -> Result<()> {
        let failures: Vec<Error> = self
            .regions
            .par_iter_mut()
            .filter_map(|region| region.sync().err())
            .collect();

        let mut failures = failures.into_iter();
        match failures.next() {
            None => Ok(()),
            Some(first) => {
                for err in failures {
                    warn!("sync: {}", err);
                }
                Err(first)
            }
        }
    }

    /// True if every region is synced.
    pub fn is_synced(&self) -> bool {
        self.regions.iter().all(|r| r.is_synced())
    }

    fn check_offset(&self, offset: u64) -> Result<()> {
        if offset >= self.capacity {
            return Err(Error::InvalidArgument(format!(
                "offset {} must be < capacity {}",
                offset, self.capacity
            )));
        }
        Ok(())
    }

    /// Map a physical byte index to (region index, offset within region).
    ///
    /// Say there are three covers of 100 bytes each: physical byte 250
    /// lives in the third cover, at offset 50. The answer is the first
    /// cumulative capacity exceeding the index; anything past the last one
    /// is an internal bug, since callers already clamped to capacity.
    fn locate(&self, physical: u64) -> Result<(usize, u64)> {
        let i = self.cum_cap.partition_point(|&c| c <= physical);
        if i == self.cum_cap.len() {
            return Err(Error::InvalidArgument(format!(
                "physical byte {} must be < capacity {}",
                physical, self.capacity
            )));
        }
        let base = if i == 0 { 0 } else { self.cum_cap[i - 1] };
        Ok((i, physical - base))
    }
}

/// Every regular file beneath `root`, recursively, sorted.
///
/// `.` and `..` never appear; symlinks are not followed. The sort makes
/// the enumeration order independent of readdir order, which is what lets
/// a remount reproduce the same region sequence.
fn list_regular_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| {
            Error::BackingStore(format!("could not list '{}': {}", root.display(), e))
        })?;
        if entry.file_type().is_file() {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}
