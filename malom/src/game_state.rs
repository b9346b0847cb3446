use std::fmt;

use crate::bit::MASK24;
use crate::error::{Error, Result};
use crate::id::SectorId;
use crate::position::{Move, Position};
use crate::rules::{Rules, Variant, FULL_BOARD_IS_DRAW, LAST_IRREV_LIMIT};

/// Index of the side that starts the game.
pub const WHITE: usize = 0;
/// Index of the other side.
pub const BLACK: usize = 1;

/// State of a live game.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GameState {
    /// Bit masks of the stones of white and black.
    pub stones: [u32; 2],
    /// Numbers of stones placed so far by white and black.
    pub placed: [u8; 2],
    /// Side to move, `WHITE` or `BLACK`.
    pub side: usize,
    /// Whether the side to move has closed a mill and still has to take a stone.
    pub kle: bool,
    /// Number of moves made. A position set up by hand counts the placements that led to it.
    pub move_count: u32,
    /// Number of moves since the last placement or taking.
    pub last_irrev: u32,
    pub over: bool,
    /// Winner of the finished game, `None` for a draw.
    pub winner: Option<usize>,
    /// Whether the game has ended because the side to move could not move.
    pub block: bool,
    max_stones: u8
}

impl GameState {
    /// Returns the state at the beginning of the game.
    pub fn new(rules: &Rules) -> Self {
        Self {
            stones: [0, 0],
            placed: [0, 0],
            side: WHITE,
            kle: false,
            move_count: 0,
            last_irrev: 0,
            over: false,
            winner: None,
            block: false,
            max_stones: rules.max_stones
        }
    }

    /// Returns the state of a position set up by hand and checks whether it is valid.
    /// `over` (and `winner`) are set if the position is already decided.
    pub fn setup(rules: &Rules, white: u32, black: u32, white_to_place: i32, black_to_place: i32, side: i32, kle: bool) -> Result<Self> {
        let max = rules.max_stones;
        if white & black != 0 {
            return Err(Error::InvalidPosition("white and black bitboards overlap".to_owned()));
        }
        if (white | black) as u64 & !MASK24 != 0 {
            return Err(Error::InvalidPosition("bitboards can only use the lowest 24 bits".to_owned()));
        }
        for (name, value, upper) in [("white stones to place", white_to_place, max as i32), ("black stones to place", black_to_place, max as i32), ("side to move", side, 1)] {
            if !(0..=upper).contains(&value) {
                return Err(Error::InvalidPosition(format!("{name} must be between 0 and {upper}, got {value}")));
            }
        }
        let mut s = Self::new(rules);
        s.stones = [white, black];
        s.placed = [max - white_to_place as u8, max - black_to_place as u8];
        s.side = side as usize;
        s.kle = kle;
        s.move_count = s.placed[WHITE] as u32 + s.placed[BLACK] as u32;
        for (p, name) in [(WHITE, "white"), (BLACK, "black")] {
            if s.on_board(p) + s.to_place(p) > max {
                return Err(Error::InvalidPosition(format!("{name} has more than {max} stones on the board and to place")));
            }
        }
        if rules.variant != Variant::Lask && s.is_placing() {
            let lag = if (s.side == WHITE) ^ kle { 0 } else { 1 };
            if s.to_place(WHITE) as i32 != s.to_place(BLACK) as i32 - lag {
                return Err(Error::InvalidPosition(
                    "in the placement phase white must have as many stones to place as black when white moves, and one less when black moves (reversed in stone taking positions)".to_owned()));
            }
        }
        if kle && s.stones[1 - s.side] == 0 {
            return Err(Error::InvalidPosition("position where the opponent has no stones can not be a stone taking position".to_owned()));
        }
        let (white_lost, black_lost) = (s.future(WHITE) < 3, s.future(BLACK) < 3);
        if white_lost || black_lost {
            s.over = true;
            s.winner = match (white_lost, black_lost) {
                (true, true) => None,
                (true, false) => Some(BLACK),
                _ => Some(WHITE)
            };
        }
        if !kle && !s.can_move(rules) {
            s.set_blocked();
        }
        Ok(s)
    }

    /// Number of stones of side `p` on the board.
    #[inline] pub fn on_board(&self, p: usize) -> u8 { self.stones[p].count_ones() as u8 }

    /// Number of stones that side `p` has still to place.
    #[inline] pub fn to_place(&self, p: usize) -> u8 { self.max_stones - self.placed[p] }

    /// Number of stones of side `p` on the board and to place.
    #[inline] pub fn future(&self, p: usize) -> u8 { self.on_board(p) + self.to_place(p) }

    /// Whether any side has stones to place.
    #[inline] pub fn is_placing(&self) -> bool { self.to_place(WHITE) > 0 || self.to_place(BLACK) > 0 }

    /// Returns the identity of the sector of the state, seen by the side to move.
    pub fn sector_id(&self) -> SectorId {
        let id = SectorId::new(self.on_board(WHITE), self.on_board(BLACK), self.to_place(WHITE), self.to_place(BLACK));
        if self.side == BLACK { id.negate() } else { id }
    }

    /// Returns the position seen by the side to move.
    pub fn position(&self) -> Position {
        let (m, o) = (self.stones[self.side], self.stones[1 - self.side]);
        Position::new(m as u64 | (o as u64) << 24, self.sector_id())
    }

    /// Returns the legal moves: takes in a stone taking position, complete moves otherwise.
    pub fn moves(&self, rules: &Rules) -> Vec<Move> {
        let p = self.position();
        if self.kle { p.takes(rules) } else { p.moves(rules) }
    }

    fn can_move(&self, rules: &Rules) -> bool {
        let mut any = false;
        self.position().for_each_move(rules, |_| any = true);
        any
    }

    fn set_blocked(&mut self) {
        self.over = true;
        self.block = true;
        self.winner = Some(1 - self.side);
        if FULL_BOARD_IS_DRAW && self.on_board(WHITE) == 12 && self.on_board(BLACK) == 12 {
            self.winner = None;
        }
    }

    /// Passes the turn unless `to` has just closed a mill and a stone can be taken.
    fn after_move(&mut self, rules: &Rules, to: u8) {
        if rules.is_in_mill(self.stones[self.side], to) && self.stones[1 - self.side] != 0 {
            self.kle = true;
        } else {
            self.pass(rules);
        }
    }

    fn pass(&mut self, rules: &Rules) {
        self.side = 1 - self.side;
        if !self.can_move(rules) { self.set_blocked(); }
    }

    fn place(&mut self, rules: &Rules, to: u8) {
        self.stones[self.side] |= 1 << to;
        self.placed[self.side] += 1;
        self.last_irrev = 0;
        self.after_move(rules, to);
    }

    fn slide(&mut self, rules: &Rules, from: u8, to: u8) {
        self.stones[self.side] = (self.stones[self.side] & !(1 << from)) | 1 << to;
        self.last_irrev += 1;
        if self.last_irrev >= LAST_IRREV_LIMIT {
            self.over = true;
            self.winner = None;
        }
        self.after_move(rules, to);
    }

    fn take(&mut self, rules: &Rules, square: u8) {
        let opponent = 1 - self.side;
        self.stones[opponent] &= !(1 << square);
        self.kle = false;
        if self.future(opponent) < 3 {
            self.over = true;
            self.winner = Some(self.side);
        }
        self.last_irrev = 0;
        self.pass(rules);
    }

    /// Makes `mv`, which must be one of `self.moves(rules)`.
    pub fn make_move(&mut self, rules: &Rules, mv: Move) -> Result<()> {
        if self.over && self.winner.is_some() {
            return Err(Error::InvalidPosition(format!("move {mv} made in a finished game")));
        }
        if !self.moves(rules).contains(&mv) {
            return Err(Error::InvalidPosition(format!("illegal move {mv}")));
        }
        self.move_count += 1;
        match mv {
            Move::Place { to, .. } => self.place(rules, to),
            Move::Slide { from, to, .. } => self.slide(rules, from, to),
            Move::Take(_) => {}
        }
        if let Some(t) = mv.take() { self.take(rules, t); }
        Ok(())
    }
}

impl fmt::Display for GameState {
    /// Prints the owners of the squares (`W`, `B` or `.`) followed by the side to move and counters.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sq in 0..24 {
            let c = if self.stones[WHITE] & (1 << sq) != 0 { 'W' } else if self.stones[BLACK] & (1 << sq) != 0 { 'B' } else { '.' };
            if sq % 8 == 0 && sq != 0 { write!(f, " ")?; }
            write!(f, "{c}")?;
        }
        write!(f, " {} to move, to place {}/{}", if self.side == WHITE { "white" } else { "black" }, self.to_place(WHITE), self.to_place(BLACK))?;
        if self.kle { write!(f, ", taking")?; }
        Ok(())
    }
}
