use std::sync::Arc;

use crate::hash::Combinatorics;
use crate::rules::Rules;
use crate::symmetry::Symmetries;

/// Read-only tables shared by all components: rules of the game,
/// symmetry tables and combinatorial tables of the hash.
///
/// Built once and shared by `Arc`; the per-W rank tables of the hash are filled lazily.
pub struct Tables {
    pub rules: Rules,
    pub sym: Symmetries,
    pub comb: Combinatorics
}

impl Tables {
    pub fn new(rules: Rules) -> Arc<Self> {
        Arc::new(Self { rules, sym: Symmetries::new(), comb: Combinatorics::new() })
    }
}
