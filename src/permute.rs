//! Seeded permutations of the logical address space.
//!
//! A [`Permutation`] is a bijection on `[0, len)` used to disperse each
//! logical byte of the aggregate to a pseudo-random physical byte. The same
//! `(len, seed)` pair always yields the same permutation, on every platform,
//! so a directory of covers mounted twice with the same seed presents the
//! same virtual file both times.
//!
//! The seed bytes are hashed with SHA-256 and the digest keys a ChaCha20
//! PRNG that drives a Fisher-Yates shuffle of the materialized index array.
//! Draws use an explicit `u64` bound; `usize`-width draws would consume
//! different amounts of PRNG output on 32-bit targets and produce a
//! different shuffle.
//!
//! The materialized array costs eight bytes per byte of aggregate capacity.
//! A format-preserving cipher (a Feistel network with cycle walking) could
//! bring that to O(1); the `at`/`range` surface is deliberately narrow so
//! that swap would not touch any caller.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

/// A seeded bijection on `[0, len)`.
pub struct Permutation {
    table: Vec<u64>,
}

impl Permutation {
    /// Build the permutation of `[0, len)` determined by `seed`.
    ///
    /// Construction always succeeds; a zero-length permutation is valid and
    /// has nothing to index.
    pub fn new(len: u64, seed: &[u8]) -> Self {
        let mut table: Vec<u64> = (0..len).collect();

        let digest = Sha256::digest(seed);
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        let mut rng = ChaCha20Rng::from_seed(key);

        for i in 0..table.len() {
            let r = rng.gen_range(0..len) as usize;
            table.swap(i, r);
        }

        Self { table }
    }

    /// Number of elements in the permuted domain.
    pub fn len(&self) -> u64 {
        self.table.len() as u64
    }

    /// True if the domain is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The image of `i` under the permutation.
    ///
    /// # Panics
    ///
    /// Panics if `i >= len`.
    pub fn at(&self, i: u64) -> u64 {
        self.table[i as usize]
    }

    /// The images of `i, i+1, ...`, up to `n` of them or the end of the
    /// domain, whichever comes first.
    pub fn range(&self, i: u64, n: u64) -> &[u64] {
        let start = (i as usize).min(self.table.len());
        let end = (i.saturating_add(n) as usize).min(self.table.len());
        &self.table[start..end]
    }
}
