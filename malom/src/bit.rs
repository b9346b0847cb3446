/// Mask of the 24 squares of one color.
pub const MASK24: u64 = (1 << 24) - 1;

/// Returns the next larger number with the same number of ones as `x`
/// (Gosper's hack), or `1<<24` when `x` is `0`.
#[inline(always)]
pub const fn next_choose(x: u32) -> u32 {
    if x == 0 { return 1 << 24; }
    let c = x & x.wrapping_neg();
    let r = x + c;
    (((r ^ x) >> 2) / c) | r
}

/// Iterator over indices of ones in a bit set, from the lowest.
#[derive(Clone, Copy)]
pub struct Ones(pub u64);

impl Iterator for Ones {
    type Item = u8;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.0 == 0 { return None; }
        let r = self.0.trailing_zeros() as u8;
        self.0 &= self.0 - 1;
        Some(r)
    }

    #[inline(always)]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Ones {}

/// Swaps the 24-bit halves of a two-color board.
#[inline(always)]
pub const fn swap_halves(board: u64) -> u64 {
    ((board & MASK24) << 24) | ((board >> 24) & MASK24)
}
