#![doc = include_str!("../README.md")]

pub mod bit;
pub mod rules;
pub mod error;
pub mod id;
pub mod symmetry;
pub mod tables;
pub mod hash;
pub mod eval;
pub mod sector;
pub mod position;
pub mod sector_graph;
pub mod dbs;
pub mod stats;
pub mod verify;
pub mod solver;
pub mod game_state;
pub mod player;
pub mod trap;

pub use rules::{Rules, Variant};
pub use error::{Error, Result};
pub use id::SectorId;
pub use tables::Tables;
pub use hash::Hash;
pub use eval::{Eval, EvalElem, SecVals, Valuation, Value};
pub use sector::Sector;
pub use position::{Move, Position};
pub use sector_graph::{SectorGraph, Wu};
pub use dbs::{Sectors, SectorsProvider};
pub use stats::{Outcomes, PrintProgress, ProgressReporter};
pub use verify::{check_sector, selftest, CheckAll, PrintStats, Verifier};
pub use solver::{solve_unit, Builder};
pub use game_state::GameState;
pub use player::PerfectPlayer;
pub use trap::{Trap, TrapDb};
