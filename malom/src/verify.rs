use std::time::{Duration, Instant};

use cpu_time::ProcessTime;
use log::info;
use rand::Rng;

use crate::bit::MASK24;
use crate::error::{Error, Result};
use crate::eval::EvalElem;
use crate::hash::{collapse_bits, Hash};
use crate::id::SectorId;
use crate::position::Position;
use crate::sector::Sector;
use crate::sector_graph::{SectorGraph, Wu};
use crate::stats::Outcomes;
use crate::symmetry::{IDENTITY, SYMMETRIES};
use crate::tables::Tables;

/// Checks (or just reports) the sectors of each unit just after it is solved.
pub trait Verifier {
    type VerificationData;
    /// Called just before solving `wu`.
    fn get_verification_data(&mut self, wu: &Wu) -> Self::VerificationData;
    /// Called with the solved sectors of the unit.
    fn check(&mut self, data: Self::VerificationData, sectors: &[Sector]) -> Result<()>;
}

impl Verifier for () {
    type VerificationData = ();
    fn get_verification_data(&mut self, _wu: &Wu) -> Self::VerificationData {}
    fn check(&mut self, _data: Self::VerificationData, _sectors: &[Sector]) -> Result<()> { Ok(()) }
}

/// Checks the hash bijection and the slots of every index.
#[derive(Default, Copy, Clone)]
pub struct CheckAll {}

impl Verifier for CheckAll {
    type VerificationData = ();
    fn get_verification_data(&mut self, _wu: &Wu) -> Self::VerificationData {}
    fn check(&mut self, _data: Self::VerificationData, sectors: &[Sector]) -> Result<()> {
        sectors.iter().try_for_each(check_sector)
    }
}

/// Checks that each index of `sector` is a bijection point of the hash, that each symmetry pointer
/// leads directly to a canonical slot and that no slot is left unresolved.
pub fn check_sector(sector: &Sector) -> Result<()> {
    let hash = sector.hash();
    let sym = &hash.tables().sym;
    let fail = |i: u32, what: String| Err(Error::Inconsistent(format!("sector {}, index {i}: {what}", sector.id)));
    for i in 0..sector.hash_count() {
        let a = hash.inverse(i);
        let back = hash.index_of_canonical(a);
        if back != i { return fail(i, format!("board {a:#x} hashes back to {back}")); }
        match sector.get_inner(i) {
            EvalElem::Sym(op) => {
                let target = hash.index_of_canonical(sym.sym48(op, a));
                if let EvalElem::Sym(op2) = sector.get_inner(target) {
                    return fail(i, format!("symmetry {op} leads to {target}, which points further with symmetry {op2}"));
                }
                if !sector.is_canonical(target) {
                    return fail(i, format!("symmetry {op} leads to the non-canonical index {target}"));
                }
            }
            EvalElem::Count(c) => return fail(i, format!("unresolved position with {c} children left")),
            _ => if !sector.is_canonical(i) {
                return fail(i, "non-canonical slot holds a value".to_owned());
            }
        }
    }
    Ok(())
}

/// Prints time and size of building each unit, as well as the outcomes of its positions.
#[derive(Default, Copy, Clone)]
pub struct PrintStats {
    total_positions: u64,
    total_size: usize,
    total_time: Duration,
    total_cpu_time: Duration,
    total_outcomes: Outcomes
}

fn print_bps(label: &str, size_bytes: usize, elements: u64) {
    let size_bits = size_bytes * 8;
    if elements != 0 {
        print!("{}: {}/{} = {:.3}", label, size_bits, elements, size_bits as f64 / elements as f64);
    } else {
        print!("{}: {}/{}", label, size_bits, elements);
    }
}

impl Verifier for PrintStats {
    type VerificationData = (SectorId, Instant, ProcessTime);
    fn get_verification_data(&mut self, wu: &Wu) -> Self::VerificationData {
        (wu.id, Instant::now(), ProcessTime::now())
    }
    fn check(&mut self, (id, time, cpu_time): Self::VerificationData, sectors: &[Sector]) -> Result<()> {
        let cpu_time = cpu_time.elapsed();
        let time = time.elapsed();
        self.total_cpu_time += cpu_time;
        self.total_time += time;
        let outcomes: Outcomes = sectors.iter().map(Outcomes::of).collect::<Vec<_>>().iter().sum();
        let positions = outcomes.positions() + outcomes.symmetric;
        self.total_positions += positions;
        self.total_outcomes += &outcomes;
        let size: usize = sectors.iter().map(Sector::size_bytes).sum();
        self.total_size += size;
        println!("Unit {id}");
        println!("Time:  unit {:.2?}  total: {:.2?}  CPU unit: {:.2?}  CPU total: {:.2?}", time, self.total_time, cpu_time, self.total_cpu_time);
        print!("Size [bits/position]:");
        print_bps("  unit", size, positions);
        print_bps("  total", self.total_size, self.total_positions);
        println!();
        println!("{}", Outcomes::header());
        println!("{}", outcomes);
        Ok(())
    }
}

impl<V1: Verifier, V2: Verifier> Verifier for (V1, V2) {
    type VerificationData = (V1::VerificationData, V2::VerificationData);
    fn get_verification_data(&mut self, wu: &Wu) -> Self::VerificationData {
        (self.0.get_verification_data(wu), self.1.get_verification_data(wu))
    }
    fn check(&mut self, data: Self::VerificationData, sectors: &[Sector]) -> Result<()> {
        self.0.check(data.0, sectors)?;
        self.1.check(data.1, sectors)
    }
}

/// Checks that the forward and backward move generators are inverses of each other
/// on `samples` random positions of sector `id`.
pub fn check_duality<R: Rng>(tables: &std::sync::Arc<Tables>, id: SectorId, samples: usize, rng: &mut R) -> Result<()> {
    let rules = &tables.rules;
    let hash = Hash::new(std::sync::Arc::clone(tables), id.w, id.b);
    for _ in 0..samples {
        let p = Position::new(hash.inverse(rng.random_range(0..hash.hash_count())), id);
        for mv in p.moves(rules) {
            let c = p.child(mv);
            if !c.predecessors(rules).contains(&p) {
                return Err(Error::Inconsistent(format!("sector {id}: position {:#x} is not a predecessor of {:#x} (sector {}) reached by {mv}", p.board, c.board, c.id)));
            }
        }
        for q in p.predecessors(rules) {
            if !q.moves(rules).into_iter().any(|mv| q.child(mv) == p) {
                return Err(Error::Inconsistent(format!("sector {id}: predecessor {:#x} (sector {}) does not lead to {:#x}", q.board, q.id, p.board)));
            }
        }
        let mut unslides = Vec::new();
        p.for_each_unslide(rules, |q| unslides.push(q));
        for q in unslides {
            if q.id != id.negate() || !q.moves(rules).into_iter().any(|mv| mv.take().is_none() && q.child(mv) == p) {
                return Err(Error::Inconsistent(format!("sector {id}: {:#x} is not a slide predecessor of {:#x}", q.board, p.board)));
            }
        }
    }
    Ok(())
}

/// Checks the symmetry tables: group structure and table-driven application.
pub fn check_symmetries<R: Rng>(tables: &Tables, samples: usize, rng: &mut R) -> Result<()> {
    let sym = &tables.sym;
    for a in 0..SYMMETRIES as u8 {
        if sym.compose(a, sym.inverse(a)) != IDENTITY {
            return Err(Error::Inconsistent(format!("symmetry {a} composed with its inverse is not the identity")));
        }
    }
    for _ in 0..samples {
        let x = rng.random_range(0..=MASK24 as u32);
        for a in 0..SYMMETRIES as u8 {
            if sym.sym24(a, x) != sym.sym24_slow(a, x) {
                return Err(Error::Inconsistent(format!("symmetry {a} of {x:#x}: tables disagree with permutation")));
            }
            for b in 0..SYMMETRIES as u8 {
                if sym.sym24(sym.compose(a, b), x) != sym.sym24(b, sym.sym24(a, x)) {
                    return Err(Error::Inconsistent(format!("composition of {a} and {b} applied to {x:#x}")));
                }
            }
        }
    }
    Ok(())
}

/// Checks the table-driven collapse against the exact one.
pub fn check_collapse<R: Rng>(tables: &Tables, samples: usize, rng: &mut R) -> Result<()> {
    for _ in 0..samples {
        let w = rng.random_range(0..=MASK24 as u32);
        let b = rng.random_range(0..=MASK24 as u32) & !w;
        let a = w as u64 | (b as u64) << 24;
        let (fast, exact) = (tables.comb.collapse(a), collapse_bits(w, b));
        if fast != exact {
            return Err(Error::Inconsistent(format!("collapse of {a:#x}: {fast:#x} instead of {exact:#x}")));
        }
    }
    Ok(())
}

/// Runs all self checks, testing `samples` positions of each sector of the game.
pub fn selftest<R: Rng>(tables: &std::sync::Arc<Tables>, samples: usize, rng: &mut R) -> Result<()> {
    check_symmetries(tables, samples, rng)?;
    info!("symmetry tables are consistent");
    check_collapse(tables, samples * 100, rng)?;
    info!("collapse tables are consistent");
    let graph = SectorGraph::new(&tables.rules, false);
    for id in graph.sectors() {
        check_duality(tables, id, samples, rng)?;
    }
    info!("move generators are consistent on {} sectors", graph.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{Valuation, Value};
    use crate::rules::{Rules, Variant};

    #[test]
    fn detects_problems() {
        let t = Tables::new(Rules::new(Variant::Std));
        let mut s = Sector::new(&t, SectorId::new(2, 1, 0, 0), Valuation::Exact);
        s.init_symmetry_pointers();
        assert!(check_sector(&s).is_ok());
        let canonical = (0..s.hash_count()).find(|i| s.is_canonical(*i)).unwrap();
        s.set(canonical, EvalElem::Count(3));
        assert!(matches!(check_sector(&s), Err(Error::Inconsistent(_))));
        s.set(canonical, EvalElem::Val(Value::loss(2)));
        assert!(check_sector(&s).is_ok());
        let other = (0..s.hash_count()).find(|i| !s.is_canonical(*i)).unwrap();
        s.set(other, EvalElem::Draw);
        assert!(check_sector(&s).is_err());
    }

    #[test]
    fn self_checks() {
        let t = Tables::new(Rules::new(Variant::Mora));
        let mut rng = rand::rng();
        check_symmetries(&t, 20, &mut rng).unwrap();
        check_collapse(&t, 2000, &mut rng).unwrap();
        for id in [SectorId::new(4, 5, 0, 0), SectorId::new(3, 3, 6, 5), SectorId::new(3, 4, 0, 0)] {
            check_duality(&t, id, 30, &mut rng).unwrap();
        }
    }
}
