//! The 16 symmetries of the board.
//!
//! Operations 0..=6 are rotations by 90, 180 and 270 degrees and the four reflections,
//! 7 swaps the outer ring with the inner ring, 8..=14 are 0..=6 composed with the swap
//! and 15 is the identity. The identity is deliberately the last one,
//! so canonicalization prefers it when several operations give the same pattern.

use crate::bit::{Ones, MASK24};
use crate::rules::SQUARES;

/// Number of symmetry operations.
pub const SYMMETRIES: usize = 16;

/// Index of the identity operation.
pub const IDENTITY: u8 = 15;

/// Index of the operation that swaps the outer and inner rings.
pub const SWAP_RINGS: u8 = 7;

/// Maps position within a ring (0..8) by one of the operations 0..=6.
fn ring_op(op: u8, pos: u8) -> u8 {
    (match op {
        0 => pos + 2,
        1 => pos + 4,
        2 => pos + 6,
        3 => 12 - pos,
        4 => 8 - pos,
        5 => 10 - pos,
        6 => 14 - pos,
        _ => pos
    }) & 7
}

/// Returns the square to which operation `op` moves `square`.
pub fn map_square(op: u8, square: u8) -> u8 {
    let (mut ring, pos) = (square / 8, square % 8);
    if op != IDENTITY && op >= SWAP_RINGS { ring = 2 - ring; }
    let ring_local = if op >= SWAP_RINGS && op != IDENTITY { op - SWAP_RINGS - 1 } else { op };
    let pos = if op == SWAP_RINGS || op == IDENTITY { pos } else { ring_op(ring_local, pos) };
    ring * 8 + pos
}

/// Tables that apply symmetries to the board patterns.
pub struct Symmetries {
    /// `perm[op][s]` is the square to which `op` moves square `s`.
    perm: [[u8; SQUARES as usize]; SYMMETRIES],
    /// `lookup[op][k][v]` is the image of byte `v` at byte position `k` of a 24-bit pattern.
    lookup: Box<[[[u32; 256]; 3]; SYMMETRIES]>,
    inverse: [u8; SYMMETRIES],
    /// `compose[a][b]` is the operation equal to applying `a` and next `b`.
    compose: [[u8; SYMMETRIES]; SYMMETRIES]
}

impl Symmetries {
    pub fn new() -> Self {
        let mut perm = [[0u8; SQUARES as usize]; SYMMETRIES];
        for op in 0..SYMMETRIES {
            for s in 0..SQUARES {
                perm[op][s as usize] = map_square(op as u8, s);
            }
        }
        let mut lookup = Box::new([[[0u32; 256]; 3]; SYMMETRIES]);
        for op in 0..SYMMETRIES {
            for k in 0..3 {
                for v in 0..256usize {
                    lookup[op][k][v] = Ones(v as u64).fold(0, |r, bit| r | 1 << perm[op][k * 8 + bit as usize]);
                }
            }
        }
        let find = |p: &[u8; SQUARES as usize]| perm.iter().position(|q| q == p).expect("symmetries form a group") as u8;
        let mut inverse = [0u8; SYMMETRIES];
        let mut compose = [[0u8; SYMMETRIES]; SYMMETRIES];
        for a in 0..SYMMETRIES {
            let mut inv = [0u8; SQUARES as usize];
            for s in 0..SQUARES as usize { inv[perm[a][s] as usize] = s as u8; }
            inverse[a] = find(&inv);
            for b in 0..SYMMETRIES {
                let mut c = [0u8; SQUARES as usize];
                for s in 0..SQUARES as usize { c[s] = perm[b][perm[a][s] as usize]; }
                compose[a][b] = find(&c);
            }
        }
        Self { perm, lookup, inverse, compose }
    }

    /// Applies `op` to a 24-bit single-color pattern.
    #[inline(always)]
    pub fn sym24(&self, op: u8, x: u32) -> u32 {
        let t = &self.lookup[op as usize];
        t[0][(x & 255) as usize] | t[1][(x >> 8 & 255) as usize] | t[2][(x >> 16 & 255) as usize]
    }

    /// Applies `op` to both halves of a 48-bit board.
    #[inline(always)]
    pub fn sym48(&self, op: u8, a: u64) -> u64 {
        self.sym24(op, (a & MASK24) as u32) as u64 | (self.sym24(op, (a >> 24) as u32) as u64) << 24
    }

    /// Applies `op` to a 24-bit pattern square by square (slow, for verification).
    pub fn sym24_slow(&self, op: u8, x: u32) -> u32 {
        Ones(x as u64).fold(0, |r, s| r | 1 << self.perm[op as usize][s as usize])
    }

    /// Returns the square to which `op` moves `square`.
    #[inline(always)]
    pub fn square(&self, op: u8, square: u8) -> u8 { self.perm[op as usize][square as usize] }

    /// Returns the operation inverse to `op`.
    #[inline(always)]
    pub fn inverse(&self, op: u8) -> u8 { self.inverse[op as usize] }

    /// Returns the operation equal to applying `a` and next `b`.
    #[inline(always)]
    pub fn compose(&self, a: u8, b: u8) -> u8 { self.compose[a as usize][b as usize] }

    /// Returns the smallest image of a 24-bit pattern and the operation (the last in index order) that gives it.
    pub fn canonical24(&self, x: u32) -> (u32, u8) {
        let mut best = (u32::MAX, IDENTITY);
        for op in 0..SYMMETRIES as u8 {
            let y = self.sym24(op, x);
            if y <= best.0 { best = (y, op); }
        }
        best
    }
}

impl Default for Symmetries {
    fn default() -> Self { Self::new() }
}
