use std::time::Instant;

use clap::{Args, ValueEnum};
use malom::{Builder, CheckAll, PerfectPlayer, PrintProgress, PrintStats, SectorGraph, TrapDb, Valuation};

use crate::db::DbConf;

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Verification {
    /// Do not check solved sectors
    None,
    /// Check every slot of each solved sector
    Check,
    /// Print time, size and outcomes of each unit
    Stats,
    /// Both check and print statistics
    All
}

#[derive(Args, Clone, Copy)]
pub struct BuildConf {
    /// What to do with each unit just after solving it
    #[arg(long, value_enum, default_value_t = Verification::Stats)]
    pub verify: Verification,
}

impl BuildConf {
    pub fn run(self, db: &DbConf) -> anyhow::Result<()> {
        anyhow::ensure!(db.valuation() == Valuation::Exact, "the solver builds only databases of exact values");
        let tables = db.tables()?;
        let now = Instant::now();
        let solved = match self.verify {
            Verification::None => Builder::new(tables, &db.dir, (), PrintProgress::default()).build()?,
            Verification::Check => Builder::new(tables, &db.dir, CheckAll::default(), PrintProgress::default()).build()?,
            Verification::Stats => Builder::new(tables, &db.dir, PrintStats::default(), PrintProgress::default()).build()?,
            Verification::All => Builder::new(tables, &db.dir, (CheckAll::default(), PrintStats::default()), PrintProgress::default()).build()?,
        };
        println!("Units solved: {solved}");
        println!("Calculation time: {:?}", now.elapsed());
        Ok(())
    }
}

/// Finds the trap positions of the complete database and saves them next to it.
pub fn build_traps(db: &DbConf) -> anyhow::Result<()> {
    let tables = db.tables()?;
    let player = PerfectPlayer::open(tables.clone(), &db.dir, db.valuation())?;
    let now = Instant::now();
    let traps = TrapDb::build(&player, SectorGraph::new(&tables.rules, false).sectors())?;
    let path = traps.save(&tables, &db.dir)?;
    println!("{} trap positions saved to {}", traps.len(), path.display());
    println!("Calculation time: {:?}", now.elapsed());
    Ok(())
}
