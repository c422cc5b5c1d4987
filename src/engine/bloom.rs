//! STRATA - Bloom Filter
//! Approximate-membership filter used to skip segments and blocks that
//! cannot contain a key. No false negatives; false positives are bounded
//! by the rate the filter was sized for.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

/// A Bloom filter sized from an expected element count and a target
/// false-positive rate.
///
/// ## Sizing
/// - bits: `m = -n * ln(p) / ln(2)^2`
/// - hash functions: `k = (m / n) * ln(2)`
///
/// Bit positions use double hashing, `h1 + i * h2 (mod m)`, with both halves
/// taken from a single 64-bit SipHash of the key.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    count: usize,
}

impl BloomFilter {
    /// Create a filter for `expected_count` keys at `false_positive_rate`.
    pub fn new(expected_count: usize, false_positive_rate: f64) -> Self {
        let n = expected_count.max(1) as f64;
        let p = false_positive_rate.clamp(1e-6, 0.5);
        let ln2 = std::f64::consts::LN_2;

        let num_bits = ((-n * p.ln()) / (ln2 * ln2)).ceil().max(64.0) as u64;
        let num_hashes = ((num_bits as f64 / n) * ln2).round().clamp(1.0, 30.0) as u32;
        let words = num_bits.div_ceil(64) as usize;

        Self {
            bits: vec![0; words],
            num_bits,
            num_hashes,
            count: 0,
        }
    }

    /// Record `key` as present.
    pub fn insert(&mut self, key: impl AsRef<[u8]>) {
        let (h1, h2) = Self::hash_pair(key.as_ref());
        for i in 0..self.num_hashes {
            let bit = self.bit_index(h1, h2, i);
            self.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
        self.count += 1;
    }

    /// `false` means `key` was definitely never inserted.
    pub fn might_contain(&self, key: impl AsRef<[u8]>) -> bool {
        let (h1, h2) = Self::hash_pair(key.as_ref());
        (0..self.num_hashes).all(|i| {
            let bit = self.bit_index(h1, h2, i);
            self.bits[(bit / 64) as usize] & (1 << (bit % 64)) != 0
        })
    }

    /// Number of insertions so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Bytes held by the bit array.
    pub fn memory_usage(&self) -> usize {
        self.bits.len() * std::mem::size_of::<u64>()
    }

    /// Expected false-positive rate at the current fill.
    pub fn estimated_fpr(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let k = self.num_hashes as f64;
        let m = self.num_bits as f64;
        let n = self.count as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    fn bit_index(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits
    }

    fn hash_pair(key: &[u8]) -> (u64, u64) {
        let mut hasher = DefaultHasher::new();
        hasher.write(key);
        let hash = hasher.finish();
        // odd step so the probe sequence never collapses onto one bit
        (hash & 0xFFFF_FFFF, (hash >> 32) | 1)
    }
}
