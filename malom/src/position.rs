use std::fmt;

use crate::bit::{swap_halves, Ones, MASK24};
use crate::id::SectorId;
use crate::rules::Rules;

/// A ply: placing or sliding a stone (with the stone taken if the move closes a mill),
/// or just taking a stone in a position in which a mill has already been closed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Move {
    Place { to: u8, take: Option<u8> },
    Slide { from: u8, to: u8, take: Option<u8> },
    Take(u8)
}

impl Move {
    /// Returns the square taken by the move, if any.
    #[inline]
    pub fn take(self) -> Option<u8> {
        match self {
            Move::Place { take, .. } | Move::Slide { take, .. } => take,
            Move::Take(t) => Some(t)
        }
    }

    /// Returns the mask of squares whose contents is changed by the move.
    pub fn to_bitboard(self) -> u32 {
        let mut r = match self {
            Move::Place { to, .. } => 1 << to,
            Move::Slide { from, to, .. } => (1 << to) | (1 << from),
            Move::Take(_) => 0
        };
        if let Some(t) = self.take() { r |= 1 << t; }
        r
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Move::Place { to, .. } => write!(f, "{to}")?,
            Move::Slide { from, to, .. } => write!(f, "{from}-{to}")?,
            Move::Take(_) => {}
        }
        if let Some(t) = self.take() { write!(f, "x{t}")?; }
        Ok(())
    }
}

/// Board seen by the side to move: its stones in the lower 24 bits, the opponent's in the upper ones,
/// together with the sector identity in which the side to move plays white.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Position {
    pub board: u64,
    pub id: SectorId
}

/// State needed to undo a move.
#[derive(Clone, Copy, Debug)]
pub struct Backup(Position);

/// Returns the mask of stones of `opponent` that can be taken after `to` completed a mill of `after`
/// (zero if nothing is taken).
#[inline]
fn takes(rules: &Rules, after: u32, to: u8, opponent: u32) -> u32 {
    if opponent != 0 && rules.is_in_mill(after, to) { rules.removable(opponent) } else { 0 }
}

impl Position {
    #[inline(always)]
    pub fn new(board: u64, id: SectorId) -> Self { Self { board, id } }

    /// Stones of the side to move.
    #[inline(always)] pub fn mover(&self) -> u32 { (self.board & MASK24) as u32 }

    /// Stones of the opponent.
    #[inline(always)] pub fn opponent(&self) -> u32 { (self.board >> 24) as u32 }

    /// Empty squares.
    #[inline(always)] pub fn empty(&self) -> u32 { !(self.mover() | self.opponent()) & MASK24 as u32 }

    /// Whether the side to move has already lost by having less than three stones.
    #[inline(always)] pub fn is_virtual_loss(&self) -> bool { self.id.white_future() < 3 }

    /// Whether the opponent has already lost by having less than three stones.
    #[inline(always)] pub fn is_virtual_win(&self) -> bool { self.id.black_future() < 3 }

    /// Checks whether the board agrees with the stone counts of the identity.
    pub fn is_consistent(&self) -> bool {
        self.mover() & self.opponent() == 0 && self.board >> 48 == 0
            && self.mover().count_ones() == self.id.w as u32
            && self.opponent().count_ones() == self.id.b as u32
    }

    /// Calls `f` for each move of the side to move.
    pub fn for_each_move<F: FnMut(Move)>(&self, rules: &Rules, mut f: F) {
        let (m, o, empty) = (self.mover(), self.opponent(), self.empty());
        if self.id.wf > 0 {
            for to in Ones(empty as u64) {
                let t = takes(rules, m | 1 << to, to, o);
                if t == 0 {
                    f(Move::Place { to, take: None });
                } else {
                    for r in Ones(t as u64) { f(Move::Place { to, take: Some(r) }); }
                }
            }
        }
        if rules.can_slide(self.id.w, self.id.wf) {
            let flying = rules.flies(self.id.w, self.id.wf);
            for from in Ones(m as u64) {
                for to in Ones(rules.slide_targets(from, empty, flying) as u64) {
                    let t = takes(rules, (m & !(1 << from)) | 1 << to, to, o);
                    if t == 0 {
                        f(Move::Slide { from, to, take: None });
                    } else {
                        for r in Ones(t as u64) { f(Move::Slide { from, to, take: Some(r) }); }
                    }
                }
            }
        }
    }

    /// Returns all moves of the side to move.
    pub fn moves(&self, rules: &Rules) -> Vec<Move> {
        let mut r = Vec::new();
        self.for_each_move(rules, |m| r.push(m));
        r
    }

    /// Returns the list of stones that can be taken, used when a mill has been closed and a stone is still to be taken.
    pub fn takes(&self, rules: &Rules) -> Vec<Move> {
        Ones(rules.removable(self.opponent()) as u64).map(Move::Take).collect()
    }

    /// Makes `mv`. After the move, `self` is seen by the opponent, who becomes the side to move.
    pub fn apply(&mut self, mv: Move) -> Backup {
        let backup = Backup(*self);
        let (mut m, mut o) = (self.mover(), self.opponent());
        let SectorId { mut w, mut b, mut wf, bf } = self.id;
        match mv {
            Move::Place { to, .. } => { m |= 1 << to; w += 1; wf -= 1; }
            Move::Slide { from, to, .. } => { m = (m & !(1 << from)) | 1 << to; }
            Move::Take(_) => {}
        }
        if let Some(t) = mv.take() { o &= !(1 << t); b -= 1; }
        self.board = o as u64 | (m as u64) << 24;
        self.id = SectorId::new(b, w, bf, wf);
        backup
    }

    /// Undoes the move that returned `backup`.
    #[inline(always)]
    pub fn undo(&mut self, backup: Backup) { *self = backup.0; }

    /// Returns the position after `mv`.
    #[inline]
    pub fn child(mut self, mv: Move) -> Self {
        self.apply(mv);
        self
    }

    /// Returns the position seen from the other side (stones and counts swapped).
    #[inline(always)]
    pub fn negate(self) -> Self { Self::new(swap_halves(self.board), self.id.negate()) }

    /// Calls `f` for each position from which the opponent could reach `self`
    /// by sliding a stone without taking anything.
    /// Every such position belongs to the negation of the sector of `self`.
    pub fn for_each_unslide<F: FnMut(Position)>(&self, rules: &Rules, mut f: F) {
        let SectorId { w, b, wf, bf } = self.id;
        if !rules.can_slide(b, bf) { return; }
        let (m, o, empty) = (self.mover(), self.opponent(), self.empty());
        let flying = rules.flies(b, bf);
        for to in Ones(o as u64) {
            if w != 0 && rules.is_in_mill(o, to) { continue; }
            let before_empty = empty | 1 << to;
            for from in Ones(empty as u64) {
                if rules.slide_targets(from, before_empty, flying) & (1 << to) == 0 { continue; }
                let before = (o & !(1 << to)) | 1 << from;
                f(Position::new(before as u64 | (m as u64) << 24, SectorId::new(b, w, bf, wf)));
            }
        }
    }

    /// Returns all positions from which `self` can be reached in one move
    /// (placements and slides, with or without taking a stone).
    pub fn predecessors(&self, rules: &Rules) -> Vec<Position> {
        let mut r = Vec::new();
        self.for_each_unslide(rules, |p| r.push(p));
        let SectorId { w, b, wf, bf } = self.id;
        let o = self.opponent();
        if b > 0 && bf < rules.max_stones {
            for to in Ones(o as u64) {
                let before = o & !(1 << to);
                let closes = rules.is_in_mill(o, to);
                if !closes || w == 0 {
                    r.push(Position::new(before as u64 | (self.mover() as u64) << 24, SectorId::new(b - 1, w, bf + 1, wf)));
                }
                if closes {
                    self.push_untaken(rules, before, 0, SectorId::new(b - 1, w + 1, bf + 1, wf), &mut r);
                }
            }
        }
        if rules.can_slide(b, bf) {
            let (empty, flying) = (self.empty(), rules.flies(b, bf));
            for to in Ones(o as u64) {
                if !rules.is_in_mill(o, to) { continue; }
                for from in Ones(empty as u64) {
                    if rules.slide_targets(from, empty | 1 << to, flying) & (1 << to) == 0 { continue; }
                    let before = (o & !(1 << to)) | 1 << from;
                    self.push_untaken(rules, before, 1 << from, SectorId::new(b, w + 1, bf, wf), &mut r);
                }
            }
        }
        r
    }

    /// Pushes to `r` the predecessors in which the opponent (having stones `before`) took
    /// a stone of the side to move from one of the empty squares outside `occupied_before`.
    fn push_untaken(&self, rules: &Rules, before: u32, occupied_before: u32, id: SectorId, r: &mut Vec<Position>) {
        if id.black_future() > rules.max_stones { return; }
        for t in Ones((self.empty() & !occupied_before) as u64) {
            let m = self.mover() | 1 << t;
            if rules.removable(m) & (1 << t) != 0 {
                r.push(Position::new(before as u64 | (m as u64) << 24, id));
            }
        }
    }
}
