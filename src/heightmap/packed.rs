//! # Packed Heights Module
//!
//! A fixed-length array of fixed-width unsigned integers, packed end to end in a bit vector.
//! Every node stores its 256 cached heights this way; the entry width grows with the node's
//! scale so that the whole span of the node fits.
//!
//! ## Memory Layout
//!
//! Entry `i` occupies bits `i * bits .. (i + 1) * bits` of a `BitVec<u64, Lsb0>`, little
//! endian. Entries may straddle word boundaries. The backing words are exposed as-is for
//! persistence ([`PackedHeights::to_raw`] / [`PackedHeights::from_raw`]).

use bitvec::prelude::*;

/// A packed array of `len` unsigned values, each `bits` wide.
///
/// # Examples
///
/// ```
/// use surface_tracker::heightmap::PackedHeights;
///
/// let mut heights = PackedHeights::new(6, 256);
/// heights.set(3, 42);
/// assert_eq!(heights.get(3), 42);
/// assert_eq!(heights.get(4), 0);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedHeights {
    bits: usize,
    len: usize,
    data: BitVec<u64, Lsb0>,
}

impl PackedHeights {
    /// Creates a zeroed array.
    ///
    /// # Panics
    /// Panics if `bits` is not in `1..=32`.
    pub fn new(bits: usize, len: usize) -> Self {
        assert!((1..=32).contains(&bits), "unsupported entry width {bits}");
        Self {
            bits,
            len,
            data: BitVec::repeat(false, bits * len),
        }
    }

    /// Rebuilds an array from words previously returned by [`to_raw`](Self::to_raw).
    ///
    /// Returns `None` if `words` holds fewer than `bits * len` bits.
    ///
    /// # Panics
    /// Panics if `bits` is not in `1..=32`.
    pub fn from_raw(bits: usize, len: usize, words: Vec<u64>) -> Option<Self> {
        assert!((1..=32).contains(&bits), "unsupported entry width {bits}");
        let mut data = BitVec::<u64, Lsb0>::from_vec(words);
        if data.len() < bits * len {
            return None;
        }
        data.truncate(bits * len);
        Some(Self { bits, len, data })
    }

    /// The backing words, suitable for [`from_raw`](Self::from_raw).
    pub fn to_raw(&self) -> Vec<u64> {
        self.data.as_raw_slice().to_vec()
    }

    /// Width of each entry in bits.
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the array has no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Largest value an entry can hold.
    pub fn max_value(&self) -> u32 {
        if self.bits == 32 {
            u32::MAX
        } else {
            (1 << self.bits) - 1
        }
    }

    /// Reads entry `index`.
    ///
    /// # Panics
    /// Panics if `index >= len`.
    #[inline]
    pub fn get(&self, index: usize) -> u32 {
        assert!(index < self.len, "index {index} out of bounds for {}", self.len);
        let start = index * self.bits;
        self.data[start..start + self.bits].load_le::<u32>()
    }

    /// Writes entry `index`. Bits of `value` above the entry width are dropped.
    ///
    /// # Panics
    /// Panics if `index >= len`.
    #[inline]
    pub fn set(&mut self, index: usize, value: u32) {
        assert!(index < self.len, "index {index} out of bounds for {}", self.len);
        debug_assert!(
            value <= self.max_value(),
            "{value} does not fit in {} bits",
            self.bits
        );
        let start = index * self.bits;
        self.data[start..start + self.bits].store_le(value);
    }
}
