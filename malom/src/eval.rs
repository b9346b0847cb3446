//! Values of positions and their compact encoding.

use std::cmp::Ordering;
use std::fmt;

use bitm::n_lowest_bits;

use crate::id::SectorId;
use crate::rules::Variant;

/// Concrete value of a position from the perspective of the side to move.
///
/// `key1` is the value class relative to the baseline of the sector
/// (positive: better for the mover), `key2` is the distance in plies.
/// Between values of the same class, wins are better when closer and losses when farther.
/// A draw has `key1 == 0` and `key2 == 0`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Value {
    pub key1: i16,
    pub key2: i32
}

impl Value {
    pub const DRAW: Value = Value { key1: 0, key2: 0 };

    #[inline(always)] pub const fn new(key1: i16, key2: i32) -> Self { Self { key1, key2 } }

    /// Value of a position won in `distance` plies (exact valuation).
    #[inline(always)] pub const fn win(distance: i32) -> Self { Self::new(1, distance) }

    /// Value of a position lost in `distance` plies (exact valuation).
    #[inline(always)] pub const fn loss(distance: i32) -> Self { Self::new(-1, distance) }

    /// Moves the baseline of the value by `corr`, keeping the distance meaningful
    /// (the sign of `key2` follows the side of the baseline on which `key1` lands).
    #[inline]
    pub fn corr(self, corr: i16) -> Self {
        let key1 = self.key1.wrapping_add(corr);
        Self { key1, key2: (key1 as i64 * self.key1 as i64).signum() as i32 * self.key2 }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key1.cmp(&other.key1).then_with(||
            match self.key1.cmp(&0) {
                Ordering::Less => self.key2.cmp(&other.key2),
                Ordering::Greater => other.key2.cmp(&self.key2),
                Ordering::Equal => Ordering::Equal
            })
    }
}

impl PartialEq for Value {
    #[inline] fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

/// Content of a slot of a sector.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EvalElem {
    /// Decided position.
    Val(Value),
    /// Position that neither side can win.
    Draw,
    /// Number of children not yet resolved (used only while solving).
    Count(u32),
    /// The slot is not canonical, the board must be transformed by the given symmetry.
    Sym(u8)
}

impl EvalElem {
    /// Returns the fields `(key1, key2)` that represent `self` in a slot.
    #[inline]
    pub fn fields(self) -> (i16, i32) {
        match self {
            EvalElem::Val(v) => { debug_assert_ne!(v.key1, 0); (v.key1, v.key2) }
            EvalElem::Draw => (0, 0),
            EvalElem::Count(c) => { debug_assert_ne!(c, 0); (0, c as i32) }
            EvalElem::Sym(op) => (0, -(op as i32) - 1)
        }
    }

    /// Inverse of `fields`.
    #[inline]
    pub fn from_fields(key1: i16, key2: i32) -> Self {
        if key1 != 0 {
            EvalElem::Val(Value::new(key1, key2))
        } else if key2 == 0 {
            EvalElem::Draw
        } else if key2 > 0 {
            EvalElem::Count(key2 as u32)
        } else {
            EvalElem::Sym((-(key2 + 1)) as u8)
        }
    }

    /// Returns the value, or `None` if `self` is a count or a symmetry pointer.
    #[inline]
    pub fn value(self) -> Option<Value> {
        match self {
            EvalElem::Val(v) => Some(v),
            EvalElem::Draw => Some(Value::DRAW),
            _ => None
        }
    }
}

impl From<Value> for EvalElem {
    #[inline]
    fn from(v: Value) -> Self {
        if v.key1 == 0 { EvalElem::Draw } else { EvalElem::Val(v) }
    }
}

/// Raw content of a slot: either both fields or `key1` with `key2` kept in the overflow map.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Slot {
    Fields(i16, i32),
    Overflow(i16)
}

/// Bit layout of a slot: `size` bytes, little endian;
/// the lowest `field2_offset` bits hold signed `key1`, the rest holds signed `key2`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SlotLayout {
    pub size: u8,
    pub field2_offset: u8
}

#[inline(always)]
fn sign_extend(x: u32, bits: u8) -> i32 {
    let shift = 32 - bits as u32;
    ((x << shift) as i32) >> shift
}

impl SlotLayout {
    /// Number of bits of `key2`.
    #[inline(always)] pub fn field2_bits(&self) -> u8 { 8 * self.size - self.field2_offset }

    /// Value of `key2` that marks its presence in the overflow map.
    #[inline(always)] pub fn spec_field2(&self) -> i32 { -(1 << (self.field2_bits() - 1)) }

    /// The largest `key2` that fits in a slot.
    #[inline(always)] pub fn max_field2(&self) -> i32 { -self.spec_field2() - 1 }

    /// Decodes the slot stored in `bytes` (of length `size`).
    #[inline]
    pub fn decode(&self, bytes: &[u8]) -> Slot {
        let a = bytes.iter().rev().fold(0u32, |a, b| a << 8 | *b as u32);
        let key1 = sign_extend(a & n_lowest_bits(self.field2_offset) as u32, self.field2_offset) as i16;
        let key2 = sign_extend(a >> self.field2_offset, self.field2_bits());
        if key2 == self.spec_field2() { Slot::Overflow(key1) } else { Slot::Fields(key1, key2) }
    }

    /// Encodes `key1` and `key2` into `bytes` and returns `false` if `key2` must be kept in the overflow map
    /// (the slot then holds the overflow marker).
    #[inline]
    pub fn encode(&self, key1: i16, key2: i32, bytes: &mut [u8]) -> bool {
        let fits = key2 > self.spec_field2() && key2 <= self.max_field2();
        let f2 = if fits { key2 } else { self.spec_field2() };
        let a = (key1 as u32 & n_lowest_bits(self.field2_offset) as u32) | (f2 as u32) << self.field2_offset;
        for (i, b) in bytes.iter_mut().enumerate() { *b = (a >> (8 * i)) as u8; }
        fits
    }
}

/// How positions are valued.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Valuation {
    /// Win, loss or draw with distance; every sector has baseline 0.
    #[default]
    Exact,
    /// Outcome measured by the stone difference; the baseline of a sector is its stone difference.
    StoneDiff
}

impl Valuation {
    /// Flag stored in the file header.
    #[inline(always)] pub fn flag(self) -> u8 { (self == Valuation::StoneDiff) as u8 }

    /// Layout of slots of sector files.
    pub fn layout(self, variant: Variant) -> SlotLayout {
        match (self, variant) {
            (Valuation::StoneDiff, _) => SlotLayout { size: 2, field2_offset: 6 },
            (Valuation::Exact, Variant::Std) => SlotLayout { size: 3, field2_offset: 12 },
            (Valuation::Exact, _) => SlotLayout { size: 3, field2_offset: 14 },
        }
    }

    /// Returns the baselines of values for games with `max_stones` stones per side.
    pub fn sec_vals(self, max_stones: u8) -> SecVals {
        let virt_win = match self {
            Valuation::Exact => 1,
            Valuation::StoneDiff => max_stones as i16 + 1
        };
        SecVals { valuation: self, virt_win, virt_loss: -virt_win }
    }
}

/// Baselines: of sectors, of virtual wins and losses.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SecVals {
    pub valuation: Valuation,
    pub virt_win: i16,
    pub virt_loss: i16
}

impl SecVals {
    /// Baseline of sector `id`.
    #[inline]
    pub fn sval(&self, id: SectorId) -> i16 {
        match self.valuation {
            Valuation::Exact => 0,
            Valuation::StoneDiff => id.stone_diff()
        }
    }

    /// Baseline of values that do not belong to any sector (virtual wins and losses,
    /// stone taking positions). It keeps the distances of such values intact.
    #[inline(always)] pub fn virt_unique(&self) -> i16 { self.virt_loss - 1 }

    /// The smallest absolute `key1`.
    #[inline(always)] pub fn abs_min(&self) -> i16 { self.virt_loss - 2 }
}

/// Value as seen by the query layer: relative to the baseline `sval` of the sector it comes from,
/// or to the virtual baseline if `sval` is `None`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Eval {
    pub value: Value,
    pub sval: Option<i16>
}

impl Eval {
    #[inline(always)]
    pub fn new(value: Value, sval: Option<i16>) -> Self { Self { value, sval } }

    #[inline(always)]
    fn base(sval: Option<i16>, sv: &SecVals) -> i16 { sval.unwrap_or_else(|| sv.virt_unique()) }

    /// Value of a position whose side to move has lost by having less than 3 stones.
    pub fn virt_loss(sv: &SecVals) -> Self {
        Self::decided(sv.virt_loss, 0, sv)
    }

    /// Value of a decided position that does not belong to any sector: `akey1` relative to 0
    /// (`virt_win`, `virt_loss` or 0 for a draw) at given `distance`.
    pub fn decided(akey1: i16, distance: i32, sv: &SecVals) -> Self {
        Self::new(Value::new(akey1 - sv.virt_unique(), distance), None)
    }

    /// Value smaller than value of any position of a sector with baseline `sval`.
    pub fn min_value(sval: Option<i16>, sv: &SecVals) -> Self {
        Self::new(Value::new(sv.abs_min() - Self::base(sval, sv), 0), sval)
    }

    /// Converts the value of the position after a move into the value of the move,
    /// from the perspective of the side that makes it in a sector with baseline `sval`
    /// (`None` for stone taking positions, in which the distance is not increased).
    pub fn undo_negate(self, sval: Option<i16>, sv: &SecVals) -> Self {
        let mut v = self.value.corr(Self::base(sval, sv) + Self::base(self.sval, sv));
        v.key1 = -v.key1;
        if sval.is_some() { v.key2 += 1; }
        Self::new(v, sval)
    }

    /// Returns `key1` relative to 0.
    #[inline(always)]
    pub fn akey1(&self, sv: &SecVals) -> i16 { self.value.key1 + Self::base(self.sval, sv) }

    /// Checks whether the side to move wins.
    #[inline] pub fn is_win(&self, sv: &SecVals) -> bool { self.akey1(sv) > 0 }

    /// Checks whether the side to move loses.
    #[inline] pub fn is_loss(&self, sv: &SecVals) -> bool { self.akey1(sv) < 0 }

    /// Number of plies to the end of the game, or `None` for a draw.
    pub fn distance(&self, sv: &SecVals) -> Option<i32> {
        (self.akey1(sv) != 0).then(|| self.value.key2.abs())
    }

    /// Returns human readable form of `self`.
    pub fn describe(&self, sv: &SecVals) -> String {
        let a = self.akey1(sv);
        let d = self.value.key2.abs();
        if a == 0 { "D".to_owned() }
        else if a == sv.virt_win { format!("W{d}") }
        else if a == sv.virt_loss { format!("L{d}") }
        else { format!("{a} ({d})") }
    }
}

impl PartialOrd for Eval {
    /// Values are comparable only if they are relative to the same baseline.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.sval == other.sval).then(|| self.value.cmp(&other.value))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.key1, self.key2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order() {
        assert!(Value::win(1) > Value::win(3));
        assert!(Value::win(101) > Value::DRAW);
        assert!(Value::DRAW > Value::loss(100));
        assert!(Value::loss(10) > Value::loss(2));
        assert_eq!(Value::DRAW.cmp(&Value::DRAW), Ordering::Equal);
        let mut v = vec![Value::loss(0), Value::win(5), Value::DRAW, Value::win(1), Value::loss(4)];
        v.sort();
        assert_eq!(v, vec![Value::loss(0), Value::loss(4), Value::DRAW, Value::win(5), Value::win(1)]);
    }

    #[test]
    fn corr() {
        assert_eq!(Value::win(3).corr(0), Value::win(3));
        assert_eq!(Value::new(1, 4).corr(-2), Value::new(-1, -4));
        assert_eq!(Value::new(-1, 4).corr(-2), Value::new(-3, 4));
    }

    #[test]
    fn elem_fields() {
        for e in [EvalElem::Val(Value::win(7)), EvalElem::Val(Value::loss(0)), EvalElem::Draw,
                  EvalElem::Count(3), EvalElem::Sym(0), EvalElem::Sym(14)] {
            let (k1, k2) = e.fields();
            assert_eq!(EvalElem::from_fields(k1, k2), e);
        }
        assert_eq!(EvalElem::Sym(0).fields(), (0, -1));
        assert_eq!(EvalElem::from(Value::DRAW), EvalElem::Draw);
        assert_eq!(EvalElem::Count(2).value(), None);
    }

    #[test]
    fn codec() {
        let l = Valuation::Exact.layout(Variant::Std);
        assert_eq!((l.field2_bits(), l.spec_field2(), l.max_field2()), (12, -2048, 2047));
        let mut bytes = [0u8; 3];
        for (k1, k2) in [(1, 0), (-1, 6), (0, -3), (-2048, 2047), (2047, -2047), (0, 0)] {
            assert!(l.encode(k1, k2, &mut bytes));
            assert_eq!(l.decode(&bytes), Slot::Fields(k1, k2));
        }
        assert!(!l.encode(1, 5000, &mut bytes));
        assert_eq!(l.decode(&bytes), Slot::Overflow(1));
        assert!(!l.encode(-1, -2048, &mut bytes));
        assert_eq!(l.decode(&bytes), Slot::Overflow(-1));
        assert!(l.encode(1, 3, &mut bytes));
        assert_eq!(bytes, [1, 0x30, 0]);

        let l = Valuation::StoneDiff.layout(Variant::Mora);
        assert_eq!((l.size, l.field2_bits(), l.spec_field2()), (2, 10, -512));
        let mut bytes = [0u8; 2];
        assert!(l.encode(-13, 511, &mut bytes));
        assert_eq!(l.decode(&bytes), Slot::Fields(-13, 511));
        assert_eq!(Valuation::Exact.layout(Variant::Lask).field2_offset, 14);
    }

    #[test]
    fn negation_exact() {
        let sv = Valuation::Exact.sec_vals(9);
        // loss of the opponent after the move is a win of the mover, one ply farther
        let child = Eval::new(Value::loss(4), Some(0));
        let m = child.undo_negate(Some(0), &sv);
        assert_eq!(m, Eval::new(Value::win(5), Some(0)));
        assert!(m.is_win(&sv));
        assert_eq!(m.distance(&sv), Some(5));
        // moving into a virtual loss of the opponent wins at once
        assert_eq!(Eval::virt_loss(&sv).undo_negate(Some(0), &sv), Eval::new(Value::win(1), Some(0)));
        // draws stay draws
        assert_eq!(Eval::new(Value::DRAW, Some(0)).undo_negate(Some(0), &sv).value, Value::new(0, 1));
        assert!(Eval::min_value(Some(0), &sv) < Eval::new(Value::loss(0), Some(0)));
    }

    #[test]
    fn negation_stone_taking() {
        let sv = Valuation::Exact.sec_vals(9);
        let win_of_taker = Eval::new(Value::loss(6), Some(0)).undo_negate(None, &sv);
        let loss_of_taker = Eval::new(Value::win(3), Some(0)).undo_negate(None, &sv);
        let longer_loss = Eval::new(Value::win(9), Some(0)).undo_negate(None, &sv);
        assert!(win_of_taker.is_win(&sv));
        assert_eq!(win_of_taker.distance(&sv), Some(6));
        assert!(loss_of_taker.is_loss(&sv));
        assert!(win_of_taker > loss_of_taker);
        assert!(longer_loss > loss_of_taker);
        let min = Eval::min_value(None, &sv);
        assert!(min < loss_of_taker);
        assert_eq!(win_of_taker.describe(&sv), "W6");
        assert_eq!(loss_of_taker.describe(&sv), "L3");
    }

    #[test]
    fn stone_diff_baselines() {
        let sv = Valuation::StoneDiff.sec_vals(9);
        assert_eq!((sv.virt_win, sv.virt_loss, sv.virt_unique()), (10, -10, -11));
        assert_eq!(sv.sval(SectorId::new(5, 3, 1, 0)), 3);
        assert_eq!(Valuation::StoneDiff.flag(), 1);
        assert_eq!(Valuation::Exact.flag(), 0);
    }
}
