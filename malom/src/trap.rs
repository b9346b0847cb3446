//! Trap positions: those in which every move that closes a mill, or every move that blocks
//! a mill of the opponent, loses, while some other move does not.
//!
//! The traps are found with a solved database and stored in a small separate file,
//! which is enough to warn about these common pitfalls without the sectors.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use binout::{AsIs, Serializer};
use log::{debug, info};

use crate::bit::MASK24;
use crate::dbs::SectorsProvider;
use crate::error::{Error, Result};
use crate::game_state::{GameState, BLACK, WHITE};
use crate::hash::Hash;
use crate::id::SectorId;
use crate::player::PerfectPlayer;
use crate::position::Move;
use crate::rules::{Rules, Variant};
use crate::tables::Tables;

/// Closing a mill loses, other moves do not.
pub const SELF_MILL_LOSS: u8 = 1 << 0;
/// Blocking a mill of the opponent loses, other moves do not.
pub const BLOCK_MILL_LOSS: u8 = 1 << 1;

const MAGIC: [u8; 8] = *b"MALTRAP1";

/// Trap found in a position.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Trap {
    /// `SELF_MILL_LOSS` and/or `BLOCK_MILL_LOSS`.
    pub mask: u8,
    /// Outcome for the side to move: 1 win, 0 draw, -1 loss.
    pub wdl: i8,
    /// Distance to the end of the game in plies, -1 for a draw.
    pub steps: i16
}

impl Trap {
    #[inline] pub fn self_mill_loss(&self) -> bool { self.mask & SELF_MILL_LOSS != 0 }
    #[inline] pub fn block_mill_loss(&self) -> bool { self.mask & BLOCK_MILL_LOSS != 0 }
}

/// Returns the number of squares on which the side to move in `s` can close a mill right now.
fn mill_threats(rules: &Rules, s: &GameState) -> usize {
    s.moves(rules).into_iter()
        .filter_map(|m| match m {
            Move::Place { to, take: Some(_) } | Move::Slide { to, take: Some(_), .. } => Some(to),
            _ => None
        })
        .collect::<BTreeSet<_>>().len()
}

/// Checks whether `mv` made in `s` lowers the number of mills the opponent can close at once.
fn blocks_mill(rules: &Rules, s: &GameState, mv: Move) -> Result<bool> {
    if mv.take().is_some() { return Ok(false); }
    let mut before = s.clone();
    before.side = 1 - s.side;
    let threats = mill_threats(rules, &before);
    if threats == 0 { return Ok(false); }
    let mut after = s.clone();
    after.make_move(rules, mv)?;
    if after.side == s.side { after.side = 1 - s.side; }
    Ok(mill_threats(rules, &after) < threats)
}

/// Returns the trap mask of `s`, given a function that checks whether a move loses.
pub fn classify<F: FnMut(Move) -> Result<bool>>(rules: &Rules, s: &GameState, mut loses: F) -> Result<u8> {
    let moves = s.moves(rules);
    let mut lost = Vec::with_capacity(moves.len());
    for m in &moves { lost.push(loses(*m)?); }
    let mut blocking = Vec::with_capacity(moves.len());
    for m in &moves { blocking.push(blocks_mill(rules, s, *m)?); }
    let mut mask = 0;
    for (flag, chosen) in [
        (SELF_MILL_LOSS, moves.iter().map(|m| m.take().is_some()).collect::<Vec<_>>()),
        (BLOCK_MILL_LOSS, blocking)
    ] {
        let any = chosen.iter().any(|c| *c);
        let all_lose = chosen.iter().zip(&lost).all(|(c, l)| !c || *l);
        let other_holds = chosen.iter().zip(&lost).any(|(c, l)| !c && !*l);
        if any && all_lose && other_holds { mask |= flag; }
    }
    Ok(mask)
}

/// Returns the state of a game in which the position `board` of sector `id` (mover as white) can occur.
fn state_of(rules: &Rules, id: SectorId, board: u64) -> Option<GameState> {
    let (mover, opponent) = ((board & MASK24) as u32, (board >> 24) as u32);
    let placing = id.wf > 0 || id.bf > 0;
    let mover_is_black = rules.variant != Variant::Lask && placing && id.wf == id.bf + 1;
    let r = if mover_is_black {
        GameState::setup(rules, opponent, mover, id.bf as i32, id.wf as i32, BLACK as i32, false)
    } else {
        GameState::setup(rules, mover, opponent, id.wf as i32, id.bf as i32, WHITE as i32, false)
    };
    r.ok().filter(|s| !s.over)
}

#[inline(always)]
fn key(id: SectorId, index: u32) -> u64 { (id.code() as u64) << 32 | index as u64 }

/// Traps of the positions of a game, indexed by sector and canonical index.
#[derive(Default, Debug)]
pub struct TrapDb {
    traps: HashMap<u64, Trap>
}

impl TrapDb {
    /// Finds traps in all canonical positions of the sectors `ids`, evaluating moves with `player`.
    pub fn build<P: SectorsProvider, I: IntoIterator<Item=SectorId>>(player: &PerfectPlayer<P>, ids: I) -> Result<Self> {
        let rules = player.rules();
        let sv = *player.sec_vals();
        let mut traps = HashMap::new();
        for id in ids {
            let sector = player.sectors().sector(id)?;
            let before = traps.len();
            for h in 0..sector.hash_count() {
                if !sector.is_canonical(h) { continue; }
                let Some(s) = state_of(rules, id, sector.hash().inverse(h)) else { continue };
                let mask = classify(rules, &s, |m| Ok(player.move_value(&s, m)?.is_loss(&sv)))?;
                if mask == 0 { continue; }
                let value = player.eval(&s)?;
                let wdl = if value.is_win(&sv) { 1 } else if value.is_loss(&sv) { -1 } else { 0 };
                let steps = value.distance(&sv).map_or(-1, |d| d.min(i16::MAX as i32) as i16);
                traps.insert(key(id, h), Trap { mask, wdl, steps });
            }
            debug!("sector {id}: {} traps", traps.len() - before);
        }
        info!("{} trap positions found", traps.len());
        Ok(Self { traps })
    }

    #[inline] pub fn len(&self) -> usize { self.traps.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.traps.is_empty() }

    /// Returns the trap of `s`, if any. Stone taking positions have no traps.
    pub fn get(&self, tables: &Arc<Tables>, s: &GameState) -> Option<Trap> {
        if s.kle || self.traps.is_empty() { return None; }
        let p = s.position();
        let hash = Hash::new(Arc::clone(tables), p.id.w, p.id.b);
        let (_, c) = hash.hash(p.board);
        self.traps.get(&key(p.id, hash.smallest_image(c).0)).copied()
    }

    /// Returns the path of the trap file of the game described by `tables` in `dir`.
    pub fn file_path<P: AsRef<Path>>(tables: &Tables, dir: P) -> PathBuf {
        dir.as_ref().join(format!("{}_{}_traps.sec2", tables.rules.variant, tables.rules.max_stones))
    }

    /// Writes all traps to `output`, in the order of keys.
    pub fn write(&self, output: &mut dyn Write) -> io::Result<()> {
        output.write_all(&MAGIC)?;
        AsIs::write(output, self.traps.len() as u32)?;
        let mut keys: Vec<_> = self.traps.keys().copied().collect();
        keys.sort_unstable();
        for k in keys {
            let t = self.traps[&k];
            AsIs::write(output, (k >> 32) as u16)?;
            AsIs::write(output, k as u32)?;
            AsIs::write(output, t.mask)?;
            AsIs::write(output, t.wdl as u8)?;
            AsIs::write(output, t.steps as u16)?;
        }
        Ok(())
    }

    /// Reads traps written by `write`. `path` is used only in error messages.
    pub fn read(input: &mut dyn Read, path: &Path) -> Result<Self> {
        let mut magic = [0u8; 8];
        input.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::Inconsistent(format!("{} is not a trap file", path.display())));
        }
        let len: u32 = AsIs::read(input)?;
        let mut traps = HashMap::with_capacity(len as usize);
        for _ in 0..len {
            let code: u16 = AsIs::read(input)?;
            let index: u32 = AsIs::read(input)?;
            let mask: u8 = AsIs::read(input)?;
            let wdl: u8 = AsIs::read(input)?;
            let steps: u16 = AsIs::read(input)?;
            traps.insert(key(SectorId::from_code(code), index), Trap { mask, wdl: wdl as i8, steps: steps as i16 });
        }
        Ok(Self { traps })
    }

    /// Saves the traps in the file of the game described by `tables` in `dir` and returns its path.
    pub fn save<P: AsRef<Path>>(&self, tables: &Tables, dir: P) -> Result<PathBuf> {
        let path = Self::file_path(tables, dir);
        let mut output = BufWriter::new(File::create(&path)?);
        self.write(&mut output)?;
        output.flush()?;
        Ok(path)
    }

    /// Loads the traps of the game described by `tables` from `dir`.
    pub fn load<P: AsRef<Path>>(tables: &Tables, dir: P) -> Result<Self> {
        let path = Self::file_path(tables, dir);
        let file = File::open(&path)?;
        Self::read(&mut BufReader::new(file), &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(squares: &[u8]) -> u32 { squares.iter().fold(0, |r, s| r | 1 << s) }

    #[test]
    fn closing_a_mill_that_loses() {
        let rules = Rules::new(Variant::Std);
        // white can close 1-2-3 only by sliding 4-3
        let s = GameState::setup(&rules, bits(&[1, 2, 4, 16]), bits(&[9, 12, 20, 22]), 0, 0, 0, false).unwrap();
        assert_eq!(classify(&rules, &s, |m| Ok(m.take().is_some())).unwrap(), SELF_MILL_LOSS);
        assert_eq!(classify(&rules, &s, |_| Ok(false)).unwrap(), 0);
        // no alternative
        assert_eq!(classify(&rules, &s, |_| Ok(true)).unwrap(), 0);
    }

    #[test]
    fn blocking_a_mill_that_loses() {
        let rules = Rules::new(Variant::Std);
        // black threatens to close 9-10-11
        let s = GameState::setup(&rules, bits(&[0, 4]), bits(&[9, 10]), 7, 7, 0, false).unwrap();
        let block = Move::Place { to: 11, take: None };
        assert!(blocks_mill(&rules, &s, block).unwrap());
        assert!(!blocks_mill(&rules, &s, Move::Place { to: 20, take: None }).unwrap());
        assert_eq!(classify(&rules, &s, |m| Ok(m == block)).unwrap(), BLOCK_MILL_LOSS);
        assert_eq!(classify(&rules, &s, |m| Ok(m != block)).unwrap(), 0);
    }

    #[test]
    fn file_round_trip() {
        let t = Tables::new(Rules::new(Variant::Std));
        let mut db = TrapDb::default();
        db.traps.insert(key(SectorId::new(4, 5, 3, 2), 1234), Trap { mask: SELF_MILL_LOSS, wdl: -1, steps: 17 });
        db.traps.insert(key(SectorId::new(9, 9, 0, 0), 7), Trap { mask: SELF_MILL_LOSS | BLOCK_MILL_LOSS, wdl: 0, steps: -1 });
        let dir = tempfile::tempdir().unwrap();
        let path = db.save(&t, dir.path()).unwrap();
        assert!(path.ends_with("std_9_traps.sec2"));
        let loaded = TrapDb::load(&t, dir.path()).unwrap();
        assert_eq!(loaded.traps, db.traps);
        assert!(matches!(TrapDb::read(&mut &b"MALOM..."[..], Path::new("x")), Err(Error::Inconsistent(_))));
    }

    #[test]
    fn lookup_finds_symmetric_images() {
        let t = Tables::new(Rules::new(Variant::Std));
        let s = GameState::setup(&t.rules, bits(&[0, 4]), bits(&[9, 10]), 7, 7, 0, false).unwrap();
        let p = s.position();
        let hash = Hash::new(Arc::clone(&t), p.id.w, p.id.b);
        let (_, c) = hash.hash(p.board);
        let trap = Trap { mask: BLOCK_MILL_LOSS, wdl: 0, steps: -1 };
        let mut db = TrapDb::default();
        db.traps.insert(key(p.id, hash.smallest_image(c).0), trap);
        assert_eq!(db.get(&t, &s), Some(trap));
        // the same position rotated by a quarter turn
        let rotated = GameState::setup(&t.rules, bits(&[2, 6]), bits(&[11, 12]), 7, 7, 0, false).unwrap();
        assert_eq!(db.get(&t, &rotated), Some(trap));
        let other = GameState::setup(&t.rules, bits(&[0, 5]), bits(&[9, 10]), 7, 7, 0, false).unwrap();
        assert_eq!(db.get(&t, &other), None);
    }
}
