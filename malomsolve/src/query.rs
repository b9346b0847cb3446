use std::sync::Arc;

use clap::Args;
use malom::{GameState, PerfectPlayer, TrapDb};

use crate::db::DbConf;

#[derive(Args, Clone, Copy)]
pub struct QueryConf {
    /// Bitboard of white stones
    pub white: u32,

    /// Bitboard of black stones
    pub black: u32,

    /// Number of stones white has still to place
    pub white_to_place: i32,

    /// Number of stones black has still to place
    pub black_to_place: i32,

    /// Side to move: 0 for white, 1 for black
    pub side: i32,

    /// The side to move has closed a mill and has to take a stone
    #[arg(short='k', long, default_value_t = false)]
    pub kle: bool,
}

impl QueryConf {
    pub fn run(self, db: &DbConf) -> anyhow::Result<()> {
        let tables = db.tables()?;
        let player = PerfectPlayer::open(Arc::clone(&tables), &db.dir, db.valuation())?;
        let s = GameState::setup(player.rules(), self.white, self.black, self.white_to_place, self.black_to_place, self.side, self.kle)?;
        println!("{s}");
        let sv = *player.sec_vals();
        let (value, best) = player.solution(&s)?;
        println!("Value: {}", value.describe(&sv));
        let Some(best) = best else {
            println!("Game over");
            return Ok(());
        };
        let good = player.good_moves(&s)?;
        for m in player.get_move_list(&s) {
            let v = player.move_value(&s, m)?;
            println!("{:>8} {:>10}{}", m.to_string(), v.describe(&sv), if good.contains(&m) { "  *" } else { "" });
        }
        println!("Best move: {best}, bitboard: {}", best.to_bitboard());
        if TrapDb::file_path(&tables, &db.dir).is_file() {
            match TrapDb::load(&tables, &db.dir)?.get(&tables, &s) {
                Some(t) if t.self_mill_loss() && t.block_mill_loss() => println!("Trap: closing or blocking a mill loses"),
                Some(t) if t.self_mill_loss() => println!("Trap: closing a mill loses"),
                Some(_) => println!("Trap: blocking a mill loses"),
                None => {}
            }
        }
        Ok(())
    }
}
