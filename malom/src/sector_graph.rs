use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{Error, Result};
use crate::id::SectorId;
use crate::rules::{Rules, Variant};

/// Returns the sectors (seen by the opponent, who moves next) that can follow a move made in sector `id`.
pub fn graph_func(id: SectorId, rules: &Rules) -> Vec<SectorId> {
    let SectorId { w, b, wf, bf } = id;
    let mut r = Vec::with_capacity(4);
    if wf > 0 {
        r.push(SectorId::new(w + 1, b, wf - 1, bf));
        if b > 0 { r.push(SectorId::new(w + 1, b - 1, wf - 1, bf)); }
    }
    if if rules.variant == Variant::Lask { w != 0 } else { wf == 0 } {
        r.push(id);
        if b > 0 { r.push(SectorId::new(w, b - 1, wf, bf)); }
    }
    let mut r: Vec<_> = r.into_iter()
        .filter(|s| s.black_future() >= 3 && s.is_valid(rules.max_stones))
        .map(SectorId::negate)
        .collect();
    r.sort_unstable();
    r.dedup();
    r
}

/// Solving unit: a sector together with its negation (if both are reachable).
///
/// Positions can repeat only inside a unit, so units are solved one at a time,
/// in the order in which each unit follows all units it leads to.
#[derive(Clone, Debug)]
pub struct Wu {
    /// The smaller of the identities of the unit.
    pub id: SectorId,
    /// Whether the unit consists of two distinct sectors.
    pub twine: bool,
    /// Whether no position of the unit can be repeated.
    pub transient: bool,
    /// Units to which moves lead from the unit.
    pub children: Vec<SectorId>,
    /// Units from which moves lead to the unit.
    pub parents: Vec<SectorId>
}

impl Wu {
    /// Returns the identities of the sectors of the unit.
    pub fn sectors(&self) -> Vec<SectorId> {
        if self.twine { vec![self.id, self.id.negate()] } else { vec![self.id] }
    }
}

/// Graph of the sectors reachable from the beginning of the game.
pub struct SectorGraph {
    root: SectorId,
    children: BTreeMap<SectorId, Vec<SectorId>>,
    parents: BTreeMap<SectorId, Vec<SectorId>>,
    wus: BTreeMap<SectorId, Wu>
}

impl SectorGraph {
    /// Builds the graph for `rules` by breadth-first search from the sector of the game beginning.
    /// If `self_loops` is `false`, edges from sectors to themselves are omitted.
    pub fn new(rules: &Rules, self_loops: bool) -> Self {
        let root = SectorId::start(rules.max_stones);
        let mut children = BTreeMap::new();
        let mut queue = VecDeque::from([root]);
        let mut seen = BTreeSet::from([root]);
        while let Some(id) = queue.pop_front() {
            let mut c = graph_func(id, rules);
            if !self_loops { c.retain(|s| *s != id); }
            for s in &c {
                if seen.insert(*s) { queue.push_back(*s); }
            }
            children.insert(id, c);
        }
        let mut parents: BTreeMap<SectorId, Vec<SectorId>> = children.keys().map(|id| (*id, Vec::new())).collect();
        for (id, c) in &children {
            for s in c {
                if let Some(p) = parents.get_mut(s) { p.push(*id); }
            }
        }

        let key = |id: SectorId| id.min(id.negate());
        let mut wus: BTreeMap<SectorId, Wu> = BTreeMap::new();
        for id in children.keys() {
            let k = key(*id);
            wus.entry(k).or_insert_with(|| Wu {
                id: k,
                twine: k != k.negate() && children.contains_key(&k) && children.contains_key(&k.negate()),
                transient: k.transient(rules.variant),
                children: Vec::new(),
                parents: Vec::new()
            });
        }
        // a unit may contain only the negation of its key
        for wu in wus.values_mut() {
            if !children.contains_key(&wu.id) { wu.id = wu.id.negate(); }
        }
        let wus_of = |id: SectorId, edges: &BTreeMap<SectorId, Vec<SectorId>>| -> Vec<SectorId> {
            let mut r: Vec<SectorId> = [id, id.negate()].iter()
                .filter_map(|s| edges.get(s))
                .flatten()
                .map(|s| key(*s))
                .filter(|s| *s != key(id))
                .collect();
            r.sort_unstable();
            r.dedup();
            r
        };
        for (k, wu) in wus.iter_mut() {
            wu.children = wus_of(*k, &children);
            wu.parents = wus_of(*k, &parents);
        }
        Self { root, children, parents, wus }
    }

    /// Identity of the sector of the game beginning.
    #[inline(always)] pub fn root(&self) -> SectorId { self.root }

    /// Identities of all reachable sectors, in increasing order.
    pub fn sectors(&self) -> impl Iterator<Item=SectorId> + '_ { self.children.keys().copied() }

    /// Number of reachable sectors.
    #[inline] pub fn len(&self) -> usize { self.children.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.children.is_empty() }

    #[inline] pub fn contains(&self, id: SectorId) -> bool { self.children.contains_key(&id) }

    /// Sectors that follow `id`, or `None` if `id` is not reachable.
    pub fn children(&self, id: SectorId) -> Option<&[SectorId]> { self.children.get(&id).map(Vec::as_slice) }

    /// Sectors that precede `id`, or `None` if `id` is not reachable.
    pub fn parents(&self, id: SectorId) -> Option<&[SectorId]> { self.parents.get(&id).map(Vec::as_slice) }

    /// Returns the unit of sector `id`.
    pub fn wu(&self, id: SectorId) -> Option<&Wu> {
        self.wus.get(&id.min(id.negate()))
    }

    /// Returns all units.
    pub fn wus(&self) -> impl Iterator<Item=&Wu> + '_ {
        self.wus.values()
    }

    /// Returns the units in the order in which they can be solved: each unit follows all of its children.
    pub fn solve_order(&self) -> Result<Vec<&Wu>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark { New, Open, Done }
        let mut marks: BTreeMap<SectorId, Mark> = self.wus.keys().map(|k| (*k, Mark::New)).collect();
        let mut order = Vec::with_capacity(self.wus.len());
        let root = self.root.min(self.root.negate());
        let mut stack = vec![(root, 0usize)];
        marks.insert(root, Mark::Open);
        while let Some(top) = stack.last_mut() {
            let (k, next) = *top;
            top.1 += 1;
            let wu = &self.wus[&k];
            if let Some(c) = wu.children.get(next) {
                match marks[c] {
                    Mark::New => {
                        marks.insert(*c, Mark::Open);
                        stack.push((*c, 0));
                    }
                    Mark::Open => return Err(Error::Inconsistent(format!("units {} and {} form a cycle", wu.id, c))),
                    Mark::Done => {}
                }
            } else {
                marks.insert(k, Mark::Done);
                order.push(wu);
                stack.pop();
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successors() {
        let std = Rules::new(Variant::Std);
        assert_eq!(graph_func(SectorId::start(9), &std), vec![SectorId::new(0, 1, 9, 8)]);
        assert_eq!(graph_func(SectorId::new(4, 4, 0, 0), &std), vec![SectorId::new(3, 4, 0, 0), SectorId::new(4, 4, 0, 0)]);
        // no successor in which black has less than three stones
        assert_eq!(graph_func(SectorId::new(3, 3, 0, 0), &std), vec![SectorId::new(3, 3, 0, 0)]);
        let lask = Rules::new(Variant::Lask);
        assert_eq!(graph_func(SectorId::new(2, 2, 6, 6), &lask).len(), 4);
        assert_eq!(graph_func(SectorId::new(2, 2, 6, 6), &std).len(), 2);
    }

    #[test]
    fn root_has_no_parents() {
        let g = SectorGraph::new(&Rules::new(Variant::Std), false);
        assert_eq!(g.root(), SectorId::new(0, 0, 9, 9));
        assert_eq!(g.parents(g.root()), Some(&[][..]));
        assert!(g.wu(g.root()).unwrap().parents.is_empty());
        assert!(g.contains(SectorId::new(3, 3, 0, 0)));
        assert!(g.contains(SectorId::new(9, 9, 0, 0)));
        assert!(!g.contains(SectorId::new(2, 3, 0, 0)));
        for id in g.sectors() {
            assert!(id.is_valid(9));
            assert!(id.white_future() >= 3 && id.black_future() >= 3);
        }
    }

    #[test]
    fn units() {
        let g = SectorGraph::new(&Rules::new(Variant::Std), false);
        let wu = g.wu(SectorId::new(5, 4, 0, 0)).unwrap();
        assert_eq!(wu.id, SectorId::new(4, 5, 0, 0));
        assert!(wu.twine);
        assert!(!wu.transient);
        assert_eq!(wu.sectors(), vec![SectorId::new(4, 5, 0, 0), SectorId::new(5, 4, 0, 0)]);
        let eks = g.wu(SectorId::new(6, 6, 0, 0)).unwrap();
        assert!(!eks.twine);
        assert!(g.wu(SectorId::new(1, 2, 8, 7)).unwrap().transient);
        for wu in g.wus() {
            assert!(!wu.children.contains(&wu.id));
            assert!(!wu.parents.contains(&wu.id));
        }
    }

    #[test]
    fn children_are_solved_first() {
        for variant in [Variant::Std, Variant::Lask, Variant::Mora] {
            let g = SectorGraph::new(&Rules::new(variant), true);
            let order = g.solve_order().unwrap();
            assert_eq!(order.len(), g.wus().count());
            let position: BTreeMap<SectorId, usize> = order.iter().enumerate().map(|(i, wu)| (wu.id.min(wu.id.negate()), i)).collect();
            for wu in &order {
                let me = position[&wu.id.min(wu.id.negate())];
                for c in &wu.children { assert!(position[c] < me, "{variant}: {c} must precede {}", wu.id); }
            }
            assert_eq!(order.last().unwrap().id, g.root());
        }
    }

    #[test]
    fn self_loops() {
        let rules = Rules::with_max_stones(Variant::Std, 4).unwrap();
        let with = SectorGraph::new(&rules, true);
        let without = SectorGraph::new(&rules, false);
        let eks = SectorId::new(4, 4, 0, 0);
        assert!(with.children(eks).unwrap().contains(&eks));
        assert!(!without.children(eks).unwrap().contains(&eks));
        assert_eq!(with.len(), without.len());
    }
}
