use std::path::PathBuf;
use std::sync::Arc;

use malom::{Rules, Sectors, Tables, Valuation, Variant};

#[derive(clap::Args)]
pub struct DbConf {
    /// Rules: std, lask or mora
    #[arg(short='v', long, default_value = "std")]
    pub variant: Variant,

    /// Number of stones of each side. The default value depends on the variant
    #[arg(short='s', long)]
    pub max_stones: Option<u8>,

    /// Directory with database files
    #[arg(short='d', long, default_value = ".")]
    pub dir: PathBuf,

    /// Whether the files store stone differences instead of exact distances
    #[arg(long="stone-diff", default_value_t = false)]
    pub stone_diff: bool,
}

impl DbConf {
    pub fn rules(&self) -> malom::Result<Rules> {
        match self.max_stones {
            Some(m) => Rules::with_max_stones(self.variant, m),
            None => Ok(Rules::new(self.variant))
        }
    }

    pub fn tables(&self) -> malom::Result<Arc<Tables>> {
        Ok(Tables::new(self.rules()?))
    }

    pub fn valuation(&self) -> Valuation {
        if self.stone_diff { Valuation::StoneDiff } else { Valuation::Exact }
    }

    /// Scans the directory, failing if it has no database files.
    /// Unlike queries, the files found do not have to form a complete database.
    pub fn scan(&self) -> anyhow::Result<Sectors> {
        let sectors = Sectors::scan(self.tables()?, &self.dir, self.valuation())?;
        anyhow::ensure!(sectors.has_database(), "database files for {} not found in {}", self.variant, self.dir.display());
        Ok(sectors)
    }
}
