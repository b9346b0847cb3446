use std::fmt;
use std::str::FromStr;

use arrayvec::ArrayVec;

use crate::bit::Ones;
use crate::error::{Error, Result};

/// Number of squares of the board.
pub const SQUARES: u8 = 24;

/// Live games are drawn after this many consecutive moves that neither place nor remove a stone.
pub const LAST_IRREV_LIMIT: u32 = 50;

/// A position in which the board is full (possible only in Morabaraba) and the mover is blocked is a draw.
pub const FULL_BOARD_IS_DRAW: bool = true;

/// Rule set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Variant {
    /// Standard Nine Men's Morris.
    Std,
    /// Lasker: ten stones, sliding allowed during placement.
    Lask,
    /// Morabaraba: twelve stones, diagonal lines.
    Mora
}

impl Variant {
    /// Name used in file names.
    pub fn name(self) -> &'static str {
        match self {
            Variant::Std => "std",
            Variant::Lask => "lask",
            Variant::Mora => "mora",
        }
    }

    /// Number of stones of each side in the regular game.
    pub fn default_max_stones(self) -> u8 {
        match self {
            Variant::Std => 9,
            Variant::Lask => 10,
            Variant::Mora => 12,
        }
    }

    /// Whether a side that has stones both on the board and in hand can choose to slide.
    #[inline(always)]
    pub fn slides_while_placing(self) -> bool {
        self == Variant::Lask
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "std" => Ok(Variant::Std),
            "lask" => Ok(Variant::Lask),
            "mora" => Ok(Variant::Mora),
            _ => Err(Error::UnknownVariant(s.to_owned()))
        }
    }
}

const fn sq(ring: u8, pos: u8) -> u8 { ring * 8 + (pos & 7) }

/// Board geometry and stone limit of a variant.
#[derive(Clone, Debug)]
pub struct Rules {
    pub variant: Variant,
    pub max_stones: u8,
    /// Bit masks of all mills.
    mills: Vec<u32>,
    /// Masks of mills that pass through each square.
    mills_of: [ArrayVec<u32, 3>; SQUARES as usize],
    /// Bit masks of neighbours of each square.
    neighbours: [u32; SQUARES as usize]
}

impl Rules {
    /// Returns rules of the regular game of given `variant`.
    pub fn new(variant: Variant) -> Self {
        Self::build(variant, variant.default_max_stones())
    }

    /// Returns rules of `variant` played with `max_stones` stones per side (between 3 and 12).
    pub fn with_max_stones(variant: Variant, max_stones: u8) -> Result<Self> {
        if !(3..=12).contains(&max_stones) {
            return Err(Error::InvalidConfig(format!("number of stones per side must be in 3..=12, got {max_stones}")));
        }
        Ok(Self::build(variant, max_stones))
    }

    fn build(variant: Variant, max_stones: u8) -> Self {
        let mut mills = Vec::with_capacity(20);
        for ring in 0..3 {
            for corner in [1, 3, 5, 7] {
                mills.push((1 << sq(ring, corner)) | (1 << sq(ring, corner + 1)) | (1 << sq(ring, corner + 2)));
            }
        }
        for pos in [0, 2, 4, 6] {
            mills.push((1 << sq(0, pos)) | (1 << sq(1, pos)) | (1 << sq(2, pos)));
        }
        if variant == Variant::Mora {
            for pos in [1, 3, 5, 7] {
                mills.push((1 << sq(0, pos)) | (1 << sq(1, pos)) | (1 << sq(2, pos)));
            }
        }
        let mut mills_of: [ArrayVec<u32, 3>; SQUARES as usize] = Default::default();
        for &m in &mills {
            for s in Ones(m as u64) { mills_of[s as usize].push(m); }
        }
        let mut neighbours = [0u32; SQUARES as usize];
        let mut link = |a: u8, b: u8| {
            neighbours[a as usize] |= 1 << b;
            neighbours[b as usize] |= 1 << a;
        };
        for ring in 0..3 {
            for pos in 0..8 {
                link(sq(ring, pos), sq(ring, pos + 1));
            }
        }
        for pos in 0..8 {
            if pos & 1 == 0 || variant == Variant::Mora {
                link(sq(0, pos), sq(1, pos));
                link(sq(1, pos), sq(2, pos));
            }
        }
        Self { variant, max_stones, mills, mills_of, neighbours }
    }

    /// Returns masks of all mills.
    #[inline(always)] pub fn mills(&self) -> &[u32] { &self.mills }

    /// Returns mask of squares adjacent to `square`.
    #[inline(always)] pub fn neighbours(&self, square: u8) -> u32 { self.neighbours[square as usize] }

    /// Checks whether `square` is a part of a mill formed by `stones`.
    #[inline]
    pub fn is_in_mill(&self, stones: u32, square: u8) -> bool {
        self.mills_of[square as usize].iter().any(|&m| stones & m == m)
    }

    /// Returns the union of all mills formed by `stones`.
    pub fn mill_stones(&self, stones: u32) -> u32 {
        self.mills.iter().filter(|&&m| stones & m == m).fold(0, |r, m| r | m)
    }

    /// Returns the stones of `opponent` that can be removed after closing a mill:
    /// the ones outside mills, or all of them if each stands in a mill.
    #[inline]
    pub fn removable(&self, opponent: u32) -> u32 {
        let free = opponent & !self.mill_stones(opponent);
        if free == 0 { opponent } else { free }
    }

    /// Returns the squares to which a stone standing on `from` can slide,
    /// given the empty squares and whether its owner can fly.
    #[inline]
    pub fn slide_targets(&self, from: u8, empty: u32, flying: bool) -> u32 {
        if flying { empty } else { self.neighbours(from) & empty }
    }

    /// Checks whether a side with `on_board` stones on the board and `in_hand` stones to place can slide.
    #[inline(always)]
    pub fn can_slide(&self, on_board: u8, in_hand: u8) -> bool {
        on_board > 0 && (in_hand == 0 || self.variant.slides_while_placing())
    }

    /// Checks whether a side with `on_board` + `in_hand` stones flies.
    #[inline(always)]
    pub fn flies(&self, on_board: u8, in_hand: u8) -> bool {
        on_board + in_hand == 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_std() {
        let r = Rules::new(Variant::Std);
        assert_eq!(r.mills().len(), 16);
        assert_eq!(r.neighbours(0), (1 << 1) | (1 << 7) | (1 << 8));
        assert_eq!(r.neighbours(1), (1 << 0) | (1 << 2));
        assert_eq!(r.neighbours(8), (1 << 0) | (1 << 16) | (1 << 9) | (1 << 15));
        assert_eq!(r.neighbours(23), (1 << 22) | (1 << 16));
        for s in 0..SQUARES {
            for t in Ones(r.neighbours(s) as u64) { assert!(r.neighbours(t) & (1 << s) != 0); }
        }
    }

    #[test]
    fn geometry_mora() {
        let r = Rules::new(Variant::Mora);
        assert_eq!(r.mills().len(), 20);
        assert_eq!(r.neighbours(1), (1 << 0) | (1 << 2) | (1 << 9));
        assert_eq!(r.neighbours(9).count_ones(), 4);
        assert_eq!(r.max_stones, 12);
    }

    #[test]
    fn mills() {
        let r = Rules::new(Variant::Std);
        let stones = 0b1110;    // 1, 2, 3
        assert!(r.is_in_mill(stones, 2));
        assert!(r.is_in_mill(stones, 1));
        assert!(!r.is_in_mill(stones, 0));
        assert_eq!(r.mill_stones(stones | 1 << 20), stones);
        assert_eq!(r.removable(stones | 1 << 20), 1 << 20);
        assert_eq!(r.removable(stones), stones);
        let cross = (1 << 0) | (1 << 8) | (1 << 16);
        assert!(r.is_in_mill(cross, 8));
        assert!(!Rules::new(Variant::Std).is_in_mill((1 << 1) | (1 << 9) | (1 << 17), 9));
        assert!(Rules::new(Variant::Mora).is_in_mill((1 << 1) | (1 << 9) | (1 << 17), 9));
    }

    #[test]
    fn movement() {
        let r = Rules::new(Variant::Std);
        assert!(r.can_slide(3, 0));
        assert!(!r.can_slide(3, 1));
        assert!(Rules::new(Variant::Lask).can_slide(3, 1));
        assert!(!Rules::new(Variant::Lask).can_slide(0, 5));
        assert!(r.flies(3, 0));
        assert!(r.flies(2, 1));
        assert_eq!(r.slide_targets(1, !0 & 0xFF_FFFF, false), r.neighbours(1));
    }

    #[test]
    fn variants() {
        assert_eq!("lask".parse::<Variant>().unwrap(), Variant::Lask);
        assert!("xyz".parse::<Variant>().is_err());
        assert_eq!(Variant::Mora.to_string(), "mora");
        assert!(Rules::with_max_stones(Variant::Std, 2).is_err());
        assert_eq!(Rules::with_max_stones(Variant::Std, 3).unwrap().max_stones, 3);
    }
}
