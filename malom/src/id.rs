use std::fmt;

use crate::rules::{Rules, Variant, SQUARES};

/// Identity of a sector: the numbers of stones on the board (`w`, `b`) and
/// still to be placed (`wf`, `bf`) of the side to move (white) and its opponent (black).
///
/// Ordering compares `(w, b, wf, bf)` lexicographically.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct SectorId {
    pub w: u8,
    pub b: u8,
    pub wf: u8,
    pub bf: u8
}

impl SectorId {
    #[inline(always)]
    pub const fn new(w: u8, b: u8, wf: u8, bf: u8) -> Self {
        Self { w, b, wf, bf }
    }

    /// Returns the identity of the game start for given number of stones per side.
    #[inline(always)]
    pub const fn start(max_stones: u8) -> Self {
        Self::new(0, 0, max_stones, max_stones)
    }

    /// Returns the identity with colors swapped.
    #[inline(always)]
    pub const fn negate(self) -> Self {
        Self { w: self.b, b: self.w, wf: self.bf, bf: self.wf }
    }

    /// Checks whether `self` is its own negation (self-twin).
    #[inline(always)]
    pub fn eks(self) -> bool { self == self.negate() }

    /// Stones of white: on the board and to be placed.
    #[inline(always)] pub const fn white_future(self) -> u8 { self.w + self.wf }

    /// Stones of black: on the board and to be placed.
    #[inline(always)] pub const fn black_future(self) -> u8 { self.b + self.bf }

    /// Checks whether the identity respects the stone limit and fits on the board.
    pub fn is_valid(self, max_stones: u8) -> bool {
        self.white_future() <= max_stones && self.black_future() <= max_stones && self.w + self.b <= SQUARES
    }

    /// Checks whether positions of the sector can never repeat,
    /// i.e. each move leads out of the solving unit of the sector.
    pub fn transient(self, variant: Variant) -> bool {
        if variant == Variant::Lask {
            !(self.w != 0 && self.b != 0)
        } else {
            !(self.wf == 0 && self.bf == 0)
        }
    }

    /// Returns compact code `W | B<<4 | WF<<8 | BF<<12` of the identity.
    #[inline(always)]
    pub fn code(self) -> u16 {
        self.w as u16 | (self.b as u16) << 4 | (self.wf as u16) << 8 | (self.bf as u16) << 12
    }

    /// Inverse of `code`.
    #[inline(always)]
    pub fn from_code(code: u16) -> Self {
        Self::new((code & 15) as u8, (code >> 4 & 15) as u8, (code >> 8 & 15) as u8, (code >> 12) as u8)
    }

    /// Baseline value of the sector in stone difference valuation.
    #[inline(always)]
    pub fn stone_diff(self) -> i16 {
        self.white_future() as i16 - self.black_future() as i16
    }

    /// Returns the name of the file that stores the sector.
    pub fn file_name(self, variant: Variant) -> String {
        format!("{}_{}_{}_{}_{}.sec2", variant, self.w, self.b, self.wf, self.bf)
    }

    /// Returns all valid identities for given `rules`.
    pub fn all(rules: &Rules) -> impl Iterator<Item=SectorId> + '_ {
        let m = rules.max_stones;
        (0..=m).flat_map(move |w| (0..=m).flat_map(move |b| (0..=m).flat_map(move |wf| (0..=m).map(move |bf| SectorId::new(w, b, wf, bf)))))
            .filter(move |id| id.is_valid(m))
    }
}

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}_{}", self.w, self.b, self.wf, self.bf)
    }
}

impl std::ops::Neg for SectorId {
    type Output = SectorId;
    #[inline(always)] fn neg(self) -> Self::Output { self.negate() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation() {
        let id = SectorId::new(3, 4, 1, 2);
        assert_eq!(-id, SectorId::new(4, 3, 2, 1));
        assert_eq!(-(-id), id);
        assert!(!id.eks());
        assert!(SectorId::new(3, 3, 1, 1).eks());
    }

    #[test]
    fn code() {
        let id = SectorId::new(9, 8, 0, 7);
        assert_eq!(id.code(), 9 | 8 << 4 | 7 << 12);
        assert_eq!(SectorId::from_code(id.code()), id);
    }

    #[test]
    fn names_and_order() {
        assert_eq!(SectorId::new(3, 3, 0, 0).file_name(Variant::Std), "std_3_3_0_0.sec2");
        assert_eq!(SectorId::start(9).to_string(), "0_0_9_9");
        assert!(SectorId::new(3, 4, 0, 0) < SectorId::new(4, 3, 0, 0));
        assert!(SectorId::new(3, 4, 0, 1) < SectorId::new(3, 4, 1, 0));
    }

    #[test]
    fn transient() {
        assert!(SectorId::new(3, 3, 1, 0).transient(Variant::Std));
        assert!(!SectorId::new(3, 3, 0, 0).transient(Variant::Std));
        assert!(!SectorId::new(3, 3, 1, 0).transient(Variant::Lask));
        assert!(SectorId::new(0, 3, 1, 0).transient(Variant::Lask));
    }

    #[test]
    fn validity() {
        let rules = Rules::with_max_stones(Variant::Std, 3).unwrap();
        assert!(SectorId::new(3, 3, 0, 0).is_valid(3));
        assert!(!SectorId::new(3, 3, 1, 0).is_valid(3));
        assert_eq!(SectorId::all(&rules).count(), 10 * 10);   // (w, wf) with w+wf <= 3 per side
        assert!(SectorId::new(12, 12, 0, 0).is_valid(12));
    }
}
