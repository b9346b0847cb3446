//! Perfect play: evaluating positions and choosing moves with a solved database.

use std::path::Path;
use std::sync::Arc;

use log::warn;
use rand::prelude::IndexedRandom;

use crate::dbs::{Sectors, SectorsProvider};
use crate::error::{Error, Result};
use crate::eval::{Eval, SecVals, Valuation};
use crate::game_state::GameState;
use crate::id::SectorId;
use crate::position::Move;
use crate::rules::Rules;
use crate::tables::Tables;

/// Returns uniformly drawn element of `l`, or `None` if `l` is empty.
pub fn choose_random<T: Copy>(l: &[T]) -> Option<T> {
    l.choose(&mut rand::rng()).copied()
}

/// Returns all elements of `l` with the greatest value of `f`, which is at least `min_value`.
fn all_max_by<T: Copy, K: PartialOrd, F: FnMut(T) -> Result<K>>(l: &[T], min_value: K, mut f: F) -> Result<Vec<T>> {
    let mut r = Vec::new();
    let mut max = min_value;
    for m in l {
        let e = f(*m)?;
        if e > max {
            max = e;
            r.clear();
            r.push(*m);
        } else if e == max {
            r.push(*m);
        }
    }
    Ok(r)
}

/// Plays perfectly using sectors given by a provider.
pub struct PerfectPlayer<P> {
    tables: Arc<Tables>,
    secs: P,
    sv: SecVals
}

impl<P: SectorsProvider> PerfectPlayer<P> {
    /// Returns the player that reads values, stored with given `valuation`, of the sectors provided by `secs`.
    pub fn new(tables: Arc<Tables>, secs: P, valuation: Valuation) -> Self {
        let sv = valuation.sec_vals(tables.rules.max_stones);
        Self { tables, secs, sv }
    }

    #[inline] pub fn rules(&self) -> &Rules { &self.tables.rules }

    #[inline] pub fn sec_vals(&self) -> &SecVals { &self.sv }

    #[inline] pub fn sectors(&self) -> &P { &self.secs }

    /// Returns the sector of `s`, or `None` in a stone taking position, which does not belong to any sector.
    fn sector_id(&self, s: &GameState) -> Option<SectorId> {
        (!s.kle).then(|| s.sector_id())
    }

    /// Baseline of the values of moves made in `s`.
    fn sval(&self, s: &GameState) -> Option<i16> {
        self.sector_id(s).map(|id| self.sv.sval(id))
    }

    /// Returns the value of `s`, which can not be a stone taking position.
    pub fn eval(&self, s: &GameState) -> Result<Eval> {
        if s.kle {
            return Err(Error::InvalidPosition("a stone taking position has no value in the database".to_owned()));
        }
        if s.future(s.side) < 3 { return Ok(Eval::virt_loss(&self.sv)); }
        if s.future(1 - s.side) < 3 {
            return Ok(Eval::decided(self.sv.virt_win, 0, &self.sv));
        }
        let p = s.position();
        let sector = self.secs.sector(p.id)?;
        Ok(Eval::new(sector.lookup(p.board), Some(self.sv.sval(p.id))))
    }

    /// Returns the state after `mv`.
    fn after(&self, s: &GameState, mv: Move) -> Result<GameState> {
        let mut s2 = s.clone();
        s2.make_move(self.rules(), mv)?;
        Ok(s2)
    }

    /// Returns the value of `mv` made in `s`, from the perspective of the side that makes it.
    pub fn move_value(&self, s: &GameState, mv: Move) -> Result<Eval> {
        Ok(self.eval(&self.after(s, mv)?)?.undo_negate(self.sval(s), &self.sv))
    }

    /// Returns the legal moves in `s`.
    pub fn get_move_list(&self, s: &GameState) -> Vec<Move> {
        s.moves(self.rules())
    }

    /// Returns the moves of the greatest value.
    pub fn good_moves(&self, s: &GameState) -> Result<Vec<Move>> {
        all_max_by(&self.get_move_list(s), Eval::min_value(self.sval(s), &self.sv), |m| self.move_value(s, m))
    }

    /// Returns the number of moves of the greatest value.
    pub fn num_good_moves(&self, s: &GameState) -> Result<usize> {
        if s.future(s.side) < 3 { return Ok(0); }
        Ok(self.good_moves(s)?.len())
    }

    /// Returns the number of good moves of the opponent after `mv`.
    pub fn num_good_moves_after(&self, s: &GameState, mv: Move) -> Result<usize> {
        self.num_good_moves(&self.after(s, mv)?)
    }

    /// Returns one of the good moves, or any legal move if the database lacks a needed sector.
    /// Returns `None` if there is no legal move.
    pub fn best_move(&self, s: &GameState) -> Result<Option<Move>> {
        match self.good_moves(s) {
            Ok(moves) => Ok(choose_random(&moves)),
            Err(Error::SectorNotFound(id) | Error::MissingSector { id, .. }) => {
                warn!("no database entry for sector {id}, choosing a random move");
                Ok(choose_random(&self.get_move_list(s)))
            }
            Err(e) => Err(e)
        }
    }

    /// Returns the value of `s` itself. In a stone taking position this is the value of the best take.
    pub fn evaluate(&self, s: &GameState) -> Result<Eval> {
        if !s.kle { return self.eval(s); }
        let mut best = Eval::min_value(None, &self.sv);
        for m in self.get_move_list(s) {
            let e = self.move_value(s, m)?;
            if e > best { best = e; }
        }
        Ok(best)
    }

    /// Returns the value of `s` and one of its best moves.
    ///
    /// A finished game (lost by stones, blocked or drawn) gets its final value at distance 0 and no move.
    /// Lack of a needed sector is reported as an error, never as a value.
    pub fn solution(&self, s: &GameState) -> Result<(Eval, Option<Move>)> {
        if s.over {
            let akey1 = match s.winner {
                Some(w) if w == s.side => self.sv.virt_win,
                Some(_) => self.sv.virt_loss,
                None => 0
            };
            return Ok((Eval::decided(akey1, 0, &self.sv), None));
        }
        let value = self.evaluate(s)?;
        Ok((value, choose_random(&self.good_moves(s)?)))
    }

    /// Returns the value and one of the best moves in the position given by
    /// bitboards of stones of white and black, the numbers of stones they have still to place,
    /// the side to move (0 for white, 1 for black) and whether the side to move has to take a stone.
    ///
    /// All arguments are validated before any sector is read.
    pub fn solution_bitboards(&self, white: u32, black: u32, white_to_place: i32, black_to_place: i32, side: i32, only_taking: bool) -> Result<(Eval, Option<Move>)> {
        self.solution(&GameState::setup(self.rules(), white, black, white_to_place, black_to_place, side, only_taking)?)
    }

    /// Returns one of the best moves as the bitboard of squares it changes.
    /// Same arguments as `solution_bitboards`, but a finished game is an error.
    pub fn best_move_bitboards(&self, white: u32, black: u32, white_to_place: i32, black_to_place: i32, side: i32, only_taking: bool) -> Result<u32> {
        self.solution_bitboards(white, black, white_to_place, black_to_place, side, only_taking)?.1
            .map(Move::to_bitboard)
            .ok_or_else(|| Error::InvalidPosition("game is already over".to_owned()))
    }

    /// Same as `best_move_bitboards`, but takes its six arguments separated by whitespace
    /// (the last one is `0` for `false`).
    pub fn best_move_str(&self, args: &str) -> Result<u32> {
        let a: Vec<&str> = args.split_whitespace().collect();
        if a.len() != 6 {
            return Err(Error::InvalidPosition(format!("expected 6 arguments, got {}", a.len())));
        }
        let int = |i: usize| a[i].parse::<i64>().map_err(|e| Error::InvalidPosition(format!("argument {}: {e}", i + 1)));
        let board = |i: usize| int(i).and_then(|v| u32::try_from(v).map_err(|_| Error::InvalidPosition(format!("argument {} is not a bitboard", i + 1))));
        let small = |i: usize| int(i).map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32);
        self.best_move_bitboards(board(0)?, board(1)?, small(2)?, small(3)?, small(4)?, a[5] != "0")
    }
}

impl PerfectPlayer<Sectors> {
    /// Returns the player that reads the complete database of the game described by `tables` from `dir`.
    pub fn open<D: AsRef<Path>>(tables: Arc<Tables>, dir: D, valuation: Valuation) -> Result<Self> {
        let secs = Sectors::open(Arc::clone(&tables), dir, valuation)?;
        Ok(Self::new(tables, secs, valuation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::game_state::{BLACK, WHITE};
    use crate::rules::Variant;
    use crate::sector::Sector;
    use crate::sector_graph::SectorGraph;
    use crate::solver::solve_unit;

    fn bits(squares: &[u8]) -> u32 { squares.iter().fold(0, |r, s| r | 1 << s) }

    /// Player of the endgame of 3 stones per side, with the only sector it needs.
    fn endgame() -> PerfectPlayer<HashMap<SectorId, Arc<Sector>>> {
        let t = Tables::new(Rules::with_max_stones(Variant::Std, 3).unwrap());
        let graph = SectorGraph::new(&t.rules, false);
        let id = SectorId::new(3, 3, 0, 0);
        let mut secs = HashMap::new();
        for s in solve_unit(&t, graph.wu(id).unwrap(), &()).unwrap() {
            secs.insert(s.id, Arc::new(s));
        }
        PerfectPlayer::new(t, secs, Valuation::Exact)
    }

    #[test]
    fn both_sides_from_one_file() {
        let p = endgame();
        let sv = *p.sec_vals();
        let (white, black) = (bits(&[1, 2, 20]), bits(&[4, 9, 17]));
        let w = GameState::setup(p.rules(), white, black, 0, 0, WHITE as i32, false).unwrap();
        let e = p.eval(&w).unwrap();
        assert!(e.is_win(&sv));
        assert_eq!(e.distance(&sv), Some(1));
        let mv = p.best_move_bitboards(white, black, 0, 0, 0, false).unwrap();
        assert_eq!(mv & (bits(&[3, 20])), bits(&[3, 20]));
        assert_eq!((mv & black).count_ones(), 1);
        assert_eq!(p.num_good_moves(&w).unwrap(), 3);

        let b = GameState::setup(p.rules(), white, black, 0, 0, BLACK as i32, false).unwrap();
        assert!(p.eval(&b).is_ok());
        // black has to close the square that completes the white mill
        for m in p.good_moves(&b).unwrap() {
            assert!(matches!(m, Move::Slide { to: 3, .. }), "{m}");
            assert!(p.move_value(&b, m).unwrap() > p.move_value(&b, Move::Slide { from: 4, to: 5, take: None }).unwrap());
        }
    }

    #[test]
    fn stone_taking_positions() {
        let p = endgame();
        let sv = *p.sec_vals();
        let s = GameState::setup(p.rules(), bits(&[1, 2, 3]), bits(&[9, 10, 20]), 0, 0, 0, true).unwrap();
        assert!(p.eval(&s).is_err());
        let e = p.evaluate(&s).unwrap();
        assert!(e.is_win(&sv));
        assert_eq!(e.distance(&sv), Some(0));
        assert_eq!(p.good_moves(&s).unwrap().len(), 3);
        let taken = p.best_move_str("14 1050112 0 0 0 1").unwrap();
        assert_eq!(taken.count_ones(), 1);
        assert_ne!(taken & bits(&[9, 10, 20]), 0);
    }

    #[test]
    fn decided_positions() {
        let p = endgame();
        let sv = *p.sec_vals();
        let s = GameState::setup(p.rules(), bits(&[1, 2, 3]), bits(&[9, 10]), 0, 0, 0, false).unwrap();
        assert!(s.over);
        let e = p.eval(&s).unwrap();
        assert!(e.is_win(&sv));
        assert_eq!(e.distance(&sv), Some(0));
        assert!(p.best_move_bitboards(bits(&[1, 2, 3]), bits(&[9, 10]), 0, 0, 0, false).is_err());
        let lost = GameState::setup(p.rules(), bits(&[1, 2]), bits(&[9, 10, 11]), 0, 0, 0, false).unwrap();
        assert!(p.eval(&lost).unwrap().is_loss(&sv));
        assert_eq!(p.num_good_moves(&lost).unwrap(), 0);
    }

    #[test]
    fn solution_gives_value_and_move() {
        let p = endgame();
        let sv = *p.sec_vals();
        let (e, mv) = p.solution_bitboards(bits(&[1, 2, 20]), bits(&[4, 9, 17]), 0, 0, 0, false).unwrap();
        assert!(e.is_win(&sv));
        assert_eq!(e.distance(&sv), Some(1));
        assert!(matches!(mv, Some(Move::Slide { to: 3, take: Some(_), .. })), "{mv:?}");
        let (e, mv) = p.solution_bitboards(bits(&[1, 2, 3]), bits(&[9, 10]), 0, 0, 0, false).unwrap();
        assert!(e.is_win(&sv));
        assert_eq!(e.distance(&sv), Some(0));
        assert_eq!(mv, None);
    }

    #[test]
    fn blocked_position_is_lost() {
        let t = Tables::new(Rules::new(Variant::Std));
        let p = PerfectPlayer::new(t, (), Valuation::Exact);
        let sv = *p.sec_vals();
        let (white, black) = (bits(&[0, 1, 2, 8]), bits(&[3, 7, 9, 10, 15, 16]));
        let (e, mv) = p.solution_bitboards(white, black, 0, 0, 0, false).unwrap();
        assert!(e.is_loss(&sv));
        assert_eq!(e.distance(&sv), Some(0));
        assert_eq!(e.describe(&sv), "L0");
        assert_eq!(mv, None);
        // black can move, and its sector is not available
        assert!(matches!(p.solution_bitboards(white, black, 0, 0, 1, false), Err(Error::SectorNotFound(_))));
    }

    #[test]
    fn arguments_are_checked_before_reading() {
        let t = Tables::new(Rules::new(Variant::Std));
        let p = PerfectPlayer::new(t, (), Valuation::Exact);
        let invalid = |r: Result<u32>| matches!(r, Err(Error::InvalidPosition(_)));
        assert!(invalid(p.best_move_bitboards(bits(&[0, 1, 2, 3, 4]), 0, 5, 9, 0, false)));
        assert!(invalid(p.best_move_bitboards(1, 1, 8, 9, 1, false)));
        assert!(invalid(p.best_move_bitboards(0, 0, 9, 9, 3, false)));
        assert!(invalid(p.best_move_str("0 0 9 9 0")));
        assert!(invalid(p.best_move_str("0 x 9 9 0 0")));
        assert!(matches!(p.best_move_bitboards(0, 0, 9, 9, 0, false), Err(Error::SectorNotFound(_))));
    }

    #[test]
    fn random_move_without_database() {
        let t = Tables::new(Rules::new(Variant::Std));
        let p = PerfectPlayer::new(Arc::clone(&t), (), Valuation::Exact);
        let s = GameState::new(&t.rules);
        assert!(matches!(p.best_move(&s).unwrap(), Some(Move::Place { take: None, .. })));
    }
}
