use clap::Args;
use malom::{check_sector, selftest, Outcomes, SectorsProvider};

use crate::db::DbConf;

/// Checks all database files found and prints the outcomes of their positions.
pub fn verify(db: &DbConf) -> anyhow::Result<()> {
    let sectors = db.scan()?;
    let ids: Vec<_> = sectors.ids().collect();
    println!("{:>12} {}", "sector", Outcomes::header());
    let mut total = Outcomes::default();
    for id in ids {
        let s = sectors.sector(id)?;
        check_sector(&s)?;
        let o = Outcomes::of(&s);
        println!("{:>12} {}", id.to_string(), o);
        total += &o;
    }
    println!("{:>12} {}", "total", total);
    Ok(())
}

#[derive(Args, Clone, Copy)]
pub struct SelftestConf {
    /// Number of positions sampled in each sector
    #[arg(short='n', long, default_value_t = 100)]
    pub samples: usize,
}

impl SelftestConf {
    pub fn run(self, db: &DbConf) -> anyhow::Result<()> {
        selftest(&db.tables()?, self.samples, &mut rand::rng())?;
        println!("Self test passed");
        Ok(())
    }
}
