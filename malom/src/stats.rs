use std::fmt;

use crate::eval::EvalElem;
use crate::sector::Sector;

/// Receives reports on build progress.
pub trait ProgressReporter {
    /// Called before building `max` units.
    #[inline(always)] fn begin(&mut self, _max: usize) {}

    /// Called after building all units.
    #[inline(always)] fn end(&mut self) {}

    /// Called just before starting to build the next unit
    /// (`current` is the number of units already processed).
    fn progress(&mut self, current: usize);
}

impl ProgressReporter for () {
    #[inline(always)] fn progress(&mut self, _current: usize) {}
}

/// Prints build progress to std-out.
#[derive(Copy, Clone, Default)]
pub struct PrintProgress {
    max: usize
}

impl ProgressReporter for PrintProgress {
    fn begin(&mut self, max: usize) {
        self.max = max;
        println!("Building {} units:", max);
    }

    fn end(&mut self) {
        println!(" DONE");
    }

    fn progress(&mut self, current: usize) {
        println!(" {}/{}", current, self.max);
    }
}

/// Counts positions of each outcome.
#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
pub struct Outcomes {
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    /// Slots that only point to their symmetric images.
    pub symmetric: u64,
    pub max_win: i32,
    pub max_loss: i32
}

macro_rules! fs { () => ("{:>12} {:>12} {:>12} {:>12} {:>9} {:>9}") }

impl Outcomes {
    /// Counts the outcomes of the positions of `sector`.
    pub fn of(sector: &Sector) -> Self {
        let mut r = Self::default();
        for i in 0..sector.hash_count() {
            match sector.get_inner(i) {
                EvalElem::Val(v) if v.key1 > 0 => { r.wins += 1; r.max_win = r.max_win.max(v.key2); }
                EvalElem::Val(v) => { r.losses += 1; r.max_loss = r.max_loss.max(v.key2); }
                EvalElem::Sym(_) => r.symmetric += 1,
                _ => r.draws += 1
            }
        }
        r
    }

    /// Number of canonical positions.
    #[inline] pub fn positions(&self) -> u64 { self.wins + self.losses + self.draws }

    /// Returns the header of the table row printed by `Display`.
    pub fn header() -> String {
        format!(fs!(), "wins", "losses", "draws", "symmetric", "max win", "max loss")
    }
}

impl fmt::Display for Outcomes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, fs!(), self.wins, self.losses, self.draws, self.symmetric, self.max_win, self.max_loss)
    }
}

impl std::ops::AddAssign<&Self> for Outcomes {
    fn add_assign(&mut self, rhs: &Self) {
        self.wins += rhs.wins;
        self.losses += rhs.losses;
        self.draws += rhs.draws;
        self.symmetric += rhs.symmetric;
        self.max_win = self.max_win.max(rhs.max_win);
        self.max_loss = self.max_loss.max(rhs.max_loss);
    }
}

impl<'a> std::iter::Sum<&'a Outcomes> for Outcomes {
    fn sum<I: Iterator<Item=&'a Self>>(iter: I) -> Self {
        let mut result = Outcomes::default();
        for e in iter { result += e; };
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{Valuation, Value};
    use crate::id::SectorId;
    use crate::rules::{Rules, Variant};
    use crate::tables::Tables;

    #[test]
    fn counting() {
        let t = Tables::new(Rules::new(Variant::Std));
        let mut s = Sector::new(&t, SectorId::new(1, 1, 0, 0), Valuation::Exact);
        s.set(0, EvalElem::Val(Value::win(3)));
        s.set(1, EvalElem::Val(Value::win(7)));
        s.set(2, EvalElem::Val(Value::loss(4)));
        s.set(3, EvalElem::Sym(2));
        let o = Outcomes::of(&s);
        assert_eq!((o.wins, o.losses, o.symmetric, o.max_win, o.max_loss), (2, 1, 1, 7, 4));
        assert_eq!(o.positions() + o.symmetric, s.hash_count() as u64);
        let total: Outcomes = [o, o].iter().sum();
        assert_eq!(total.wins, 4);
        assert_eq!(total.max_win, 7);
    }
}
