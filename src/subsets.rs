//! Colexicographic enumeration of subset ranges.
//!
//! Both iterators walk every `S` with `A ⊆ S ⊆ B` in colex order, which for
//! bitmask sets coincides with increasing numeric order: the lowest-indexed
//! free bit (a bit of `B \ A`) toggles fastest, exactly like a binary counter
//! restricted to the free positions. [`SubsetRangeK`] additionally bounds the
//! cardinality of the produced sets.
//!
//! The dynamic program, the backtracker and both samplers all re-enumerate
//! the same candidate spaces, so the iteration order here is part of their
//! shared contract.

use crate::set::VarSet;

/// Binomial coefficient `C(n, k)` for the small arguments used here.
pub fn binomial(n: u32, k: u32) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k) as u64;
    let n = n as u64;
    let mut result = 1u64;
    for i in 1..=k {
        // Exact at every step: the running value is C(n - k + i, i).
        result = result * (n - k + i) / i;
    }
    result
}

/// Number of subsets of an `n`-element set with at most `k` elements.
pub fn subsets_of_size_at_most(n: u32, k: u32) -> u64 {
    (0..=k.min(n)).map(|i| binomial(n, i)).sum()
}

/// Iterates over all sets in the range `[A, B]` in colex order.
pub struct SubsetRange {
    current: VarSet,
    index: u64,
    count: u64,
    /// Positions of the free bits `B \ A`, in increasing order.
    free_bits: Vec<u32>,
}

impl SubsetRange {
    /// Enumerates every `S` with `A ⊆ S ⊆ B`, both endpoints included.
    pub fn new(a: VarSet, b: VarSet) -> Self {
        Self::with_bounds(a, b, true, true)
    }

    /// Like [`SubsetRange::new`], optionally skipping either endpoint.
    pub fn with_bounds(a: VarSet, b: VarSet, include_a: bool, include_b: bool) -> Self {
        debug_assert!(a.is_subset_of(b), "range endpoints must nest: {} ⊆ {}", a, b);

        let free_bits: Vec<u32> = (b ^ a).iter().collect();
        let mut count = 1u64 << free_bits.len();
        if !include_b {
            count -= 1;
        }

        let mut iter = Self { current: a, index: 0, count, free_bits };
        if !include_a {
            iter.advance();
        }
        iter
    }

    fn advance(&mut self) {
        self.index += 1;
        // Flip free bits in order until the first 0 flips to 1.
        for &bit in &self.free_bits {
            self.current = self.current.toggle(bit);
            if self.current.contains(bit) {
                return;
            }
        }
    }
}

impl Iterator for SubsetRange {
    type Item = VarSet;

    fn next(&mut self) -> Option<VarSet> {
        if self.index >= self.count {
            return None;
        }
        let set = self.current;
        self.advance();
        Some(set)
    }
}

/// Iterates over the sets of cardinality at most `k` in the range `[A, B]`,
/// in colex order.
///
/// Endpoints whose cardinality exceeds `k` are never produced.
pub struct SubsetRangeK {
    current: VarSet,
    index: u64,
    count: u64,
    /// Positions of the free bits `B \ A`, in increasing order.
    free_bits: Vec<u32>,
    /// Maximum number of free bits that may be 1 at once.
    free_max: usize,
    /// Stack of currently-set free bit positions (indices into `free_bits`);
    /// the top is always the lowest set free bit.
    ones: Vec<usize>,
}

impl SubsetRangeK {
    /// Enumerates every `S` with `A ⊆ S ⊆ B` and `|S| ≤ k`, endpoints
    /// included.
    pub fn new(a: VarSet, b: VarSet, k: u32) -> Self {
        Self::with_bounds(a, b, k, true, true)
    }

    /// Like [`SubsetRangeK::new`], optionally skipping either endpoint.
    pub fn with_bounds(a: VarSet, b: VarSet, k: u32, include_a: bool, include_b: bool) -> Self {
        debug_assert!(a.is_subset_of(b), "range endpoints must nest: {} ⊆ {}", a, b);

        let card_a = a.cardinality();
        let card_b = b.cardinality();
        let card_free = card_b - card_a;

        let (free_max, mut count) = if k < card_a {
            (0usize, 0u64)
        } else {
            let free_max = (k - card_a).min(card_free);
            (free_max as usize, subsets_of_size_at_most(card_free, free_max))
        };
        if !include_b && k >= card_b {
            count -= 1;
        }

        let free_bits: Vec<u32> = (b ^ a).iter().collect();

        let mut iter = Self {
            current: a,
            index: 0,
            count,
            free_bits,
            free_max,
            ones: Vec::new(),
        };
        if !include_a {
            iter.advance();
        }
        iter
    }

    fn advance(&mut self) {
        self.index += 1;
        if self.index >= self.count {
            return;
        }

        // Start from the first free bit, or from the lowest set free bit when
        // the cardinality bound is already met.
        let mut i = if self.ones.len() == self.free_max {
            *self.ones.last().expect("bound met implies a set bit")
        } else {
            0
        };

        // Flip consecutive 1s to 0, then the first 0 to 1.
        while self.current.contains(self.free_bits[i]) {
            self.current = self.current.toggle(self.free_bits[i]);
            self.ones.pop();
            i += 1;
        }
        self.current = self.current.toggle(self.free_bits[i]);
        self.ones.push(i);
    }
}

impl Iterator for SubsetRangeK {
    type Item = VarSet;

    fn next(&mut self) -> Option<VarSet> {
        if self.index >= self.count {
            return None;
        }
        let set = self.current;
        self.advance();
        Some(set)
    }
}
