//! Retrograde analysis: solving units of sectors and building the whole database.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use crate::dbs::{Sectors, SectorsProvider};
use crate::error::Result;
use crate::eval::{EvalElem, Valuation, Value};
use crate::id::SectorId;
use crate::position::Position;
use crate::rules::FULL_BOARD_IS_DRAW;
use crate::sector::Sector;
use crate::sector_graph::{SectorGraph, Wu};
use crate::stats::ProgressReporter;
use crate::tables::Tables;
use crate::verify::Verifier;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Kind {
    /// The position can be won at the distance of the bucket (if not won earlier).
    Win,
    /// One more child of the position is won (for its mover) at the distance of the bucket.
    Decrement,
    /// The position has been lost at the distance of the bucket.
    Lost
}

#[derive(Clone, Copy, Debug)]
struct Event {
    sector: u8,
    kind: Kind,
    index: u32
}

/// Events bucketed by distance.
#[derive(Default)]
struct Queue(Vec<Vec<Event>>);

impl Queue {
    fn push(&mut self, distance: u32, event: Event) {
        let d = distance as usize;
        if self.0.len() <= d { self.0.resize_with(d + 1, Vec::new); }
        self.0[d].push(event);
    }

    fn take(&mut self, distance: u32) -> Option<Vec<Event>> {
        self.0.get_mut(distance as usize).map(std::mem::take)
    }
}

/// Solves the sectors of one unit, given the sectors of all units it leads to.
struct UnitSolver<'a, P> {
    tables: &'a Tables,
    ids: Vec<SectorId>,
    sectors: Vec<Sector>,
    solved: &'a P,
    /// Sectors outside the unit used so far.
    exits: HashMap<SectorId, Arc<Sector>>,
    queue: Queue
}

impl<'a, P: SectorsProvider> UnitSolver<'a, P> {
    fn new(tables: &'a Arc<Tables>, wu: &Wu, solved: &'a P) -> Self {
        let ids = wu.sectors();
        let sectors = ids.iter().map(|id| {
            let mut s = Sector::new(tables, *id, Valuation::Exact);
            s.init_symmetry_pointers();
            s
        }).collect();
        Self { tables, ids, sectors, solved, exits: HashMap::new(), queue: Queue::default() }
    }

    #[inline]
    fn unit_index(&self, id: SectorId) -> Option<usize> {
        self.ids.iter().position(|u| *u == id)
    }

    #[inline]
    fn position(&self, s: usize, h: u32) -> Position {
        Position::new(self.sectors[s].hash().inverse(h), self.ids[s])
    }

    #[inline]
    fn push(&mut self, distance: u32, kind: Kind, s: usize, index: u32) {
        self.queue.push(distance, Event { sector: s as u8, kind, index });
    }

    /// Returns the value of `child`, which belongs to an already solved sector.
    fn exit_value(&mut self, child: &Position) -> Result<Value> {
        let sector = match self.exits.entry(child.id) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(self.solved.sector(child.id)?)
        };
        Ok(sector.lookup(child.board))
    }

    /// Canonical indices of positions of the unit from which the position `h` of sector `s` can be reached.
    fn predecessors(&self, s: usize, h: u32) -> Vec<(usize, u32)> {
        let mut r = Vec::new();
        self.position(s, h).for_each_unslide(&self.tables.rules, |q| {
            if let Some(j) = self.unit_index(q.id) {
                r.push((j, self.sectors[j].hash_lookup(q.board).0));
            }
        });
        r.sort_unstable();
        r.dedup();
        r
    }

    /// Values every canonical position that can be decided by the moves leading out of the unit,
    /// and sets the others to the number of their undecided children.
    fn init(&mut self) -> Result<()> {
        let tables = self.tables;
        let rules = &tables.rules;
        for s in 0..self.sectors.len() {
            for h in 0..self.sectors[s].hash_count() {
                if let EvalElem::Sym(_) = self.sectors[s].get_inner(h) { continue; }
                let p = self.position(s, h);
                let moves = p.moves(rules);
                if moves.is_empty() {
                    if FULL_BOARD_IS_DRAW && p.empty() == 0 {
                        self.sectors[s].set(h, EvalElem::Draw);
                    } else {
                        self.sectors[s].set(h, EvalElem::Val(Value::loss(0)));
                        self.push(0, Kind::Lost, s, h);
                    }
                    continue;
                }
                let mut inside = Vec::new();
                let (mut win, mut exit_win, mut draw) = (None::<u32>, None::<u32>, false);
                for mv in moves {
                    let c = p.child(mv);
                    if c.is_virtual_loss() {
                        win = Some(1);
                    } else if let Some(k) = self.unit_index(c.id) {
                        inside.push((k, self.sectors[k].hash_lookup(c.board).0));
                    } else {
                        let v = self.exit_value(&c)?;
                        let d = v.key2 as u32;
                        match v.key1.cmp(&0) {
                            Ordering::Less => win = Some(win.map_or(d + 1, |w| w.min(d + 1))),
                            Ordering::Greater => exit_win = Some(exit_win.map_or(d, |w| w.max(d))),
                            Ordering::Equal => draw = true
                        }
                    }
                }
                inside.sort_unstable();
                inside.dedup();
                let count = inside.len() as u32 + draw as u32 + win.is_some() as u32 + exit_win.is_some() as u32;
                self.sectors[s].set(h, EvalElem::Count(count));
                if let Some(d) = win { self.push(d, Kind::Win, s, h); }
                if let Some(d) = exit_win { self.push(d, Kind::Decrement, s, h); }
            }
        }
        Ok(())
    }

    /// Notes that one child of the position `h` of sector `s` is won (for the opponent) at `distance`.
    fn decrement(&mut self, s: usize, h: u32, distance: u32) {
        match self.sectors[s].get_inner(h) {
            EvalElem::Count(1) => {
                self.sectors[s].set(h, EvalElem::Val(Value::loss(distance as i32 + 1)));
                self.push(distance + 1, Kind::Lost, s, h);
            }
            EvalElem::Count(c) => self.sectors[s].set(h, EvalElem::Count(c - 1)),
            _ => {}
        }
    }

    /// Processes events in the order of increasing distance.
    fn propagate(&mut self) {
        let mut distance = 0;
        while let Some(events) = self.queue.take(distance) {
            for Event { sector, kind, index } in events {
                let s = sector as usize;
                match kind {
                    Kind::Win => {
                        if !matches!(self.sectors[s].get_inner(index), EvalElem::Count(_)) { continue; }
                        self.sectors[s].set(index, EvalElem::Val(Value::win(distance as i32)));
                        for (j, q) in self.predecessors(s, index) {
                            self.decrement(j, q, distance);
                        }
                    }
                    Kind::Decrement => self.decrement(s, index, distance),
                    Kind::Lost => {
                        for (j, q) in self.predecessors(s, index) {
                            if let EvalElem::Count(_) = self.sectors[j].get_inner(q) {
                                self.push(distance + 1, Kind::Win, j, q);
                            }
                        }
                    }
                }
            }
            distance += 1;
        }
    }

    /// Marks all positions still undecided as draws and returns the sectors.
    fn finish(mut self) -> Vec<Sector> {
        for s in &mut self.sectors {
            let mut draws = 0u64;
            for h in 0..s.hash_count() {
                if let EvalElem::Count(_) = s.get_inner(h) {
                    s.set(h, EvalElem::Draw);
                    draws += 1;
                }
            }
            debug!("sector {}: {} positions drawn by repetition", s.id, draws);
        }
        self.sectors
    }
}

/// Solves the sectors of unit `wu`. The sectors of all units that `wu` leads to must be available from `solved`.
pub fn solve_unit<P: SectorsProvider>(tables: &Arc<Tables>, wu: &Wu, solved: &P) -> Result<Vec<Sector>> {
    let mut solver = UnitSolver::new(tables, wu, solved);
    solver.init()?;
    solver.propagate();
    Ok(solver.finish())
}

/// Builds the database of the game described by `tables` in a directory,
/// solving units in the order given by the sector graph.
pub struct Builder<V, R> {
    tables: Arc<Tables>,
    dir: PathBuf,
    pub verifier: V,
    pub progress: R
}

impl<V: Verifier, R: ProgressReporter> Builder<V, R> {
    pub fn new<D: AsRef<Path>>(tables: Arc<Tables>, dir: D, verifier: V, progress: R) -> Self {
        Self { tables, dir: dir.as_ref().to_owned(), verifier, progress }
    }

    /// Solves and saves every unit whose files are not present in the directory yet.
    /// Returns the number of units solved.
    pub fn build(&mut self) -> Result<usize> {
        let graph = SectorGraph::new(&self.tables.rules, false);
        let order = graph.solve_order()?;
        std::fs::create_dir_all(&self.dir)?;
        let mut db = Sectors::scan(Arc::clone(&self.tables), &self.dir, Valuation::Exact)?;
        info!("{} sectors in {} units to solve for {} with {} stones", graph.len(), order.len(), self.tables.rules.variant, self.tables.rules.max_stones);
        let mut solved = 0;
        self.progress.begin(order.len());
        for (i, wu) in order.iter().enumerate() {
            self.progress.progress(i);
            if wu.sectors().iter().all(|id| db.has_sector(*id)) {
                debug!("unit {} already solved", wu.id);
                continue;
            }
            info!("solving unit {}{}", wu.id, if wu.twine { " with its twin" } else { "" });
            let data = self.verifier.get_verification_data(wu);
            let sectors = solve_unit(&self.tables, wu, &db)?;
            self.verifier.check(data, &sectors)?;
            for s in sectors {
                let path = s.save(&self.dir)?;
                debug!("sector {} saved to {}", s.id, path.display());
                db.insert(Arc::new(s));
            }
            solved += 1;
        }
        self.progress.end();
        info!("{} units solved", solved);
        Ok(solved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Rules, Variant};
    use crate::verify::CheckAll;

    fn small() -> Arc<Tables> {
        Tables::new(Rules::with_max_stones(Variant::Std, 3).unwrap())
    }

    fn board(mover: &[u8], opponent: &[u8]) -> u64 {
        mover.iter().fold(0u64, |r, s| r | 1 << s) | opponent.iter().fold(0u64, |r, s| r | 1 << (24 + s))
    }

    #[test]
    fn queue_order() {
        let mut q = Queue::default();
        q.push(2, Event { sector: 0, kind: Kind::Lost, index: 7 });
        q.push(0, Event { sector: 1, kind: Kind::Win, index: 3 });
        assert_eq!(q.take(0).unwrap().len(), 1);
        assert!(q.take(1).unwrap().is_empty());
        assert_eq!(q.take(2).unwrap()[0].index, 7);
        assert!(q.take(3).is_none());
    }

    #[test]
    fn flying_endgame() {
        let t = small();
        let graph = SectorGraph::new(&t.rules, false);
        let wu = graph.wu(SectorId::new(3, 3, 0, 0)).unwrap();
        assert!(wu.children.is_empty());
        let sectors = solve_unit(&t, wu, &()).unwrap();
        assert_eq!(sectors.len(), 1);
        let s = &sectors[0];
        crate::verify::check_sector(s).unwrap();
        // a mill closed in one move
        assert_eq!(s.lookup(board(&[1, 2, 20], &[5, 6, 9])), Value::win(1));
        for h in 0..s.hash_count() {
            if let EvalElem::Val(v) = s.get_inner(h) {
                assert_eq!(v.key2 % 2 == 1, v.key1 > 0, "wins need odd, losses even distance");
                assert!(v.key2 >= 0);
            }
        }
    }

    #[test]
    fn build_small_game() {
        let t = small();
        let dir = tempfile::tempdir().unwrap();
        let mut builder = Builder::new(Arc::clone(&t), dir.path(), CheckAll::default(), ());
        let units = builder.build().unwrap();
        let graph = SectorGraph::new(&t.rules, false);
        assert_eq!(units, graph.wus().count());
        assert_eq!(graph.parents(graph.root()), Some(&[][..]));
        // resumed build has nothing to do
        assert_eq!(builder.build().unwrap(), 0);

        let db = Sectors::open(Arc::clone(&t), dir.path(), Valuation::Exact).unwrap();
        for id in graph.sectors() {
            assert!(db.has_sector(id), "missing file of {id}");
            crate::verify::check_sector(&db.sector(id).unwrap()).unwrap();
        }
        // solving again from the saved children gives the saved values
        let wu = graph.wu(SectorId::new(2, 2, 1, 1)).unwrap();
        for again in solve_unit(&t, wu, &db).unwrap() {
            let saved = db.sector(again.id).unwrap();
            for h in 0..again.hash_count() {
                assert_eq!(again.get_inner(h), saved.get_inner(h));
            }
        }
        for id in graph.sectors() {
            let s = db.sector(id).unwrap();
            for h in 0..s.hash_count() {
                if let EvalElem::Val(v) = s.get_inner(h) {
                    assert_eq!(v.key2 % 2 == 1, v.key1 > 0, "{id}: wins need odd, losses even distance");
                }
            }
        }

        let player = crate::player::PerfectPlayer::open(Arc::clone(&t), dir.path(), Valuation::Exact).unwrap();
        let mut g = crate::game_state::GameState::new(&t.rules);
        for _ in 0..4 {
            let (value, mv) = player.solution(&g).unwrap();
            let Some(mv) = mv else { break };
            assert_eq!(player.move_value(&g, mv).unwrap(), value, "{g}");
            g.make_move(&t.rules, mv).unwrap();
        }

        let traps = crate::trap::TrapDb::build(&player, graph.sectors()).unwrap();
        traps.save(&t, dir.path()).unwrap();
        assert_eq!(crate::trap::TrapDb::load(&t, dir.path()).unwrap().len(), traps.len());
    }

    /// Every canonical value agrees with the values of the children of its position.
    #[test]
    fn values_follow_from_children() {
        let t = small();
        let rules = &t.rules;
        let graph = SectorGraph::new(rules, false);
        let mut db: HashMap<SectorId, Arc<Sector>> = HashMap::new();
        for wu in graph.solve_order().unwrap() {
            for s in solve_unit(&t, wu, &db).unwrap() {
                db.insert(s.id, Arc::new(s));
            }
        }
        for (id, s) in &db {
            for h in 0..s.hash_count() {
                if !s.is_canonical(h) { continue; }
                let p = Position::new(s.hash().inverse(h), *id);
                let children: Vec<Value> = p.moves(rules).into_iter().map(|mv| {
                    let c = p.child(mv);
                    if c.is_virtual_loss() { Value::loss(0) } else { db[&c.id].lookup(c.board) }
                }).collect();
                let expected = if children.is_empty() {
                    if FULL_BOARD_IS_DRAW && p.empty() == 0 { Value::DRAW } else { Value::loss(0) }
                } else if let Some(d) = children.iter().filter(|v| v.key1 < 0).map(|v| v.key2).min() {
                    Value::win(d + 1)
                } else if children.iter().all(|v| v.key1 > 0) {
                    Value::loss(children.iter().map(|v| v.key2).max().unwrap_or(0) + 1)
                } else {
                    Value::DRAW
                };
                let found = s.get(h);
                assert!(found == expected && found.key2 == expected.key2, "{id} index {h}: {found} instead of {expected}");
            }
        }
    }
}
