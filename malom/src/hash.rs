//! Dense indexing of the positions of a sector.
//!
//! The index of a board with `W` white and `B` black stones is
//! `f * C(24-W, B) + g`, where `f` is the rank of the canonical white pattern
//! among canonical `W`-bit patterns and `g` is the colex rank of the black pattern
//! collapsed to the `24-W` squares not occupied by white.

use std::sync::{Arc, OnceLock};

use bitm::n_lowest_bits;

use crate::bit::{next_choose, Ones, MASK24};
use crate::rules::SQUARES;
use crate::symmetry::{Symmetries, SYMMETRIES};
use crate::tables::Tables;

/// Number of canonical `W`-bit patterns, for `W` in `0..=12`.
pub const F_COUNTS: [u32; 13] = [1, 4, 30, 158, 757, 2830, 8774, 22188, 46879, 82880, 124124, 157668, 170854];

/// Ranks of the single-color patterns with given number of stones.
pub struct FTable {
    /// Canonical patterns (minima of orbits), in increasing order.
    canonical: Box<[u32]>,
    /// Indexed by colex rank of a pattern: rank of its canonical pattern.
    class: Box<[u32]>,
    /// Indexed by colex rank of a pattern: operation that maps it to the canonical one.
    sym: Box<[u8]>,
    /// Indexed by rank of a canonical pattern: bit mask of operations that fix it.
    stabilizer: Box<[u16]>
}

impl FTable {
    fn new(comb: &Combinatorics, sym: &Symmetries, stones: u8) -> Self {
        let n = comb.choose(SQUARES, stones) as usize;
        let mut class = vec![u32::MAX; n].into_boxed_slice();
        let mut to_canonical = vec![0u8; n].into_boxed_slice();
        let mut canonical = Vec::new();
        let mut stabilizer = Vec::new();
        let mut w = n_lowest_bits(stones) as u32;
        let mut rank = 0;
        while w < 1 << SQUARES {
            debug_assert_eq!(comb.rank(w, stones) as usize, rank);
            if class[rank] == u32::MAX {
                let c = canonical.len() as u32;
                let mut stab = 0u16;
                for op in 0..SYMMETRIES as u8 {
                    let sw = sym.sym24(op, w);
                    let r = comb.rank(sw, stones) as usize;
                    class[r] = c;
                    to_canonical[r] = sym.inverse(op);  // the identity is the last, so w maps to itself
                    if sw == w { stab |= 1 << sym.inverse(op); }
                }
                canonical.push(w);
                stabilizer.push(stab);
            }
            rank += 1;
            w = next_choose(w);
        }
        Self { canonical: canonical.into_boxed_slice(), class, sym: to_canonical, stabilizer: stabilizer.into_boxed_slice() }
    }

    /// Number of canonical patterns.
    #[inline(always)] pub fn count(&self) -> u32 { self.canonical.len() as u32 }

    /// Returns the canonical pattern of rank `f`.
    #[inline(always)] pub fn canonical(&self, f: u32) -> u32 { self.canonical[f as usize] }

    /// Returns the mask of operations that fix the canonical pattern of rank `f`.
    #[inline(always)] pub fn stabilizer(&self, f: u32) -> u16 { self.stabilizer[f as usize] }
}

/// Binomial coefficients, collapse tables and (lazily built) per-W rank tables.
pub struct Combinatorics {
    binom: [[u32; SQUARES as usize + 1]; SQUARES as usize + 1],
    /// `collapse[w << 8 | b]` holds the bits of byte `b` at positions not set in byte `w`, compacted.
    collapse: Box<[u8]>,
    f: [OnceLock<FTable>; SQUARES as usize + 1]
}

impl Combinatorics {
    pub fn new() -> Self {
        let mut binom = [[0u32; SQUARES as usize + 1]; SQUARES as usize + 1];
        for n in 0..=SQUARES as usize {
            binom[n][0] = 1;
            for k in 1..=n { binom[n][k] = binom[n-1][k-1] + if k < n { binom[n-1][k] } else { 0 }; }
        }
        let mut collapse = vec![0u8; 1 << 16].into_boxed_slice();
        for w in 0..256u32 {
            for b in 0..256u32 {
                if w & b == 0 { collapse[(w << 8 | b) as usize] = collapse_bits(w, b) as u8; }
            }
        }
        Self { binom, collapse, f: std::array::from_fn(|_| OnceLock::new()) }
    }

    /// Returns `n` choose `k` (0 if `k > n`).
    #[inline(always)]
    pub fn choose(&self, n: u8, k: u8) -> u32 {
        if k > n { 0 } else { self.binom[n as usize][k as usize] }
    }

    /// Returns the colex rank of `x` among the patterns with `k` ones.
    #[inline]
    pub fn rank(&self, x: u32, k: u8) -> u32 {
        debug_assert_eq!(x.count_ones(), k as u32);
        Ones(x as u64).enumerate().map(|(i, p)| self.choose(p, i as u8 + 1)).sum()
    }

    /// Returns the pattern with `k` ones whose colex rank is `rank`.
    pub fn unrank(&self, mut rank: u32, k: u8) -> u32 {
        let mut x = 0;
        let mut p = SQUARES;
        for i in (1..=k).rev() {
            loop {
                p -= 1;
                let c = self.choose(p, i);
                if c <= rank { rank -= c; break; }
            }
            x |= 1 << p;
        }
        x
    }

    /// Returns the black half of `a` with the squares occupied by white removed.
    #[inline]
    pub fn collapse(&self, a: u64) -> u32 {
        let (mut w, mut b) = ((a & MASK24) as u32, (a >> 24) as u32);
        let mut r = 0;
        let mut shift = 0;
        for _ in 0..3 {
            let (wb, bb) = (w & 255, b & 255);
            r |= (self.collapse[(wb << 8 | bb) as usize] as u32) << shift;
            shift += 8 - wb.count_ones();
            w >>= 8;
            b >>= 8;
        }
        r
    }

    /// Returns the rank table of `stones`-bit patterns, building it at first use.
    #[inline]
    pub fn f_table(&self, sym: &Symmetries, stones: u8) -> &FTable {
        self.f[stones as usize].get_or_init(|| FTable::new(self, sym, stones))
    }
}

impl Default for Combinatorics {
    fn default() -> Self { Self::new() }
}

/// Compacts the bits of `b` that are at positions not occupied by `w` (exact, bit by bit).
pub fn collapse_bits(w: u32, b: u32) -> u32 {
    let mut r = 0;
    let mut j = 0;
    for i in 0..SQUARES {
        if w & (1 << i) == 0 {
            if b & (1 << i) != 0 { r |= 1 << j; }
            j += 1;
        }
    }
    r
}

/// Inverse of collapse: spreads the bits of `c` over the positions not occupied by `w`
/// and returns the 48-bit board.
pub fn uncollapse(w: u32, c: u32) -> u64 {
    let mut b = 0u64;
    let mut j = 0;
    for i in 0..SQUARES {
        if w & (1 << i) == 0 {
            if c & (1 << j) != 0 { b |= 1 << i; }
            j += 1;
        }
    }
    w as u64 | b << 24
}

/// Hash of the boards with `w` white and `b` black stones.
#[derive(Clone)]
pub struct Hash {
    tables: Arc<Tables>,
    w: u8,
    b: u8,
    g_count: u32,
    hash_count: u32
}

impl Hash {
    pub fn new(tables: Arc<Tables>, w: u8, b: u8) -> Self {
        let g_count = tables.comb.choose(SQUARES - w, b);
        let hash_count = tables.comb.f_table(&tables.sym, w).count() * g_count;
        Self { tables, w, b, g_count, hash_count }
    }

    /// Number of indices.
    #[inline(always)] pub fn hash_count(&self) -> u32 { self.hash_count }

    #[inline(always)] pub fn tables(&self) -> &Arc<Tables> { &self.tables }

    #[inline(always)]
    fn f_table(&self) -> &FTable { self.tables.comb.f_table(&self.tables.sym, self.w) }

    /// Applies to `a` the symmetry that makes its white half canonical.
    #[inline]
    pub fn canonicalize(&self, a: u64) -> u64 {
        let r = self.tables.comb.rank((a & MASK24) as u32, self.w) as usize;
        self.tables.sym.sym48(self.f_table().sym[r], a)
    }

    /// Returns the index of `a`, whose white half must be canonical.
    #[inline]
    pub fn index_of_canonical(&self, a: u64) -> u32 {
        let comb = &self.tables.comb;
        let f = self.f_table().class[comb.rank((a & MASK24) as u32, self.w) as usize];
        debug_assert_eq!(self.f_table().canonical(f) as u64, a & MASK24);
        f * self.g_count + comb.rank(comb.collapse(a), self.b)
    }

    /// Returns the index of board `a` and its image that the index describes.
    #[inline]
    pub fn hash(&self, a: u64) -> (u32, u64) {
        let a = self.canonicalize(a);
        (self.index_of_canonical(a), a)
    }

    /// Returns the board described by index `h`.
    pub fn inverse(&self, h: u32) -> u64 {
        let (f, g) = (h / self.g_count, h % self.g_count);
        let w = self.f_table().canonical(f);
        uncollapse(w, self.tables.comb.unrank(g, self.b))
    }

    /// Returns the mask of symmetries that keep the white half of the board of index `h` unchanged.
    #[inline]
    pub fn stabilizer(&self, h: u32) -> u16 {
        self.f_table().stabilizer(h / self.g_count)
    }

    /// Returns the smallest index among the images of `a` (whose white half must be canonical)
    /// under the symmetries that fix the white half, and the operation that leads to it.
    pub fn smallest_image(&self, a: u64) -> (u32, u8) {
        let h = self.index_of_canonical(a);
        let mut best = (h, crate::symmetry::IDENTITY);
        let mut stab = self.stabilizer(h);
        while stab != 0 {
            let op = stab.trailing_zeros() as u8;
            stab &= stab - 1;
            let hs = self.index_of_canonical(self.tables.sym.sym48(op, a));
            if hs < best.0 { best = (hs, op); }
        }
        best
    }
}
