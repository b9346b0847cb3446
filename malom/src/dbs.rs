use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};
use lru::LruCache;

use crate::error::{Error, Result};
use crate::eval::{SecVals, Valuation};
use crate::id::SectorId;
use crate::sector::Sector;
use crate::sector_graph::SectorGraph;
use crate::tables::Tables;

/// Provide solved sectors.
pub trait SectorsProvider {
    /// Returns the solved sector `id` or an error if `self` does not have it.
    fn sector(&self, id: SectorId) -> Result<Arc<Sector>>;

    /// Checks whether `self` can provide the sector `id` (without loading it).
    fn has_sector(&self, id: SectorId) -> bool;
}

impl SectorsProvider for HashMap<SectorId, Arc<Sector>> {
    #[inline]
    fn sector(&self, id: SectorId) -> Result<Arc<Sector>> {
        self.get(&id).cloned().ok_or(Error::SectorNotFound(id))
    }

    #[inline(always)]
    fn has_sector(&self, id: SectorId) -> bool { self.contains_key(&id) }
}

impl SectorsProvider for BTreeMap<SectorId, Arc<Sector>> {
    #[inline]
    fn sector(&self, id: SectorId) -> Result<Arc<Sector>> {
        self.get(&id).cloned().ok_or(Error::SectorNotFound(id))
    }

    #[inline(always)]
    fn has_sector(&self, id: SectorId) -> bool { self.contains_key(&id) }
}

impl SectorsProvider for () {
    #[inline(always)]
    fn sector(&self, id: SectorId) -> Result<Arc<Sector>> { Err(Error::SectorNotFound(id)) }

    #[inline(always)]
    fn has_sector(&self, _id: SectorId) -> bool { false }
}

impl<P: SectorsProvider + ?Sized> SectorsProvider for &P {
    #[inline(always)]
    fn sector(&self, id: SectorId) -> Result<Arc<Sector>> { (**self).sector(id) }

    #[inline(always)]
    fn has_sector(&self, id: SectorId) -> bool { (**self).has_sector(id) }
}

// Thanks to this two providers given as a tuple can be asked one after another.
impl<DB1: SectorsProvider, DB2: SectorsProvider> SectorsProvider for (DB1, DB2) {
    fn sector(&self, id: SectorId) -> Result<Arc<Sector>> {
        if self.0.has_sector(id) { self.0.sector(id) } else { self.1.sector(id) }
    }

    #[inline]
    fn has_sector(&self, id: SectorId) -> bool { self.0.has_sector(id) || self.1.has_sector(id) }
}

/// Sector files found in a directory, loaded on demand.
///
/// Recently used sectors are kept in memory and shared by `Arc`.
pub struct Sectors {
    tables: Arc<Tables>,
    dir: PathBuf,
    valuation: Valuation,
    available: BTreeSet<SectorId>,
    cache: Mutex<LruCache<SectorId, Arc<Sector>>>
}

impl Sectors {
    /// Number of sectors kept in memory.
    pub const CACHE_SIZE: usize = 8;

    /// Scans `dir` for the files of all sectors of the game described by `tables`.
    pub fn scan<P: AsRef<Path>>(tables: Arc<Tables>, dir: P, valuation: Valuation) -> Result<Self> {
        let dir = dir.as_ref().to_owned();
        if !dir.is_dir() { return Err(Error::NoDatabase(dir)); }
        let available: BTreeSet<SectorId> = SectorId::all(&tables.rules)
            .filter(|id| Sector::file_path(&tables, *id, &dir).is_file())
            .collect();
        info!("found {} {} sector files in {}", available.len(), tables.rules.variant, dir.display());
        let cache = Mutex::new(LruCache::new(NonZeroUsize::new(Self::CACHE_SIZE).unwrap_or(NonZeroUsize::MIN)));
        Ok(Self { tables, dir, valuation, available, cache })
    }

    /// Scans `dir` like `scan` and checks that it has the files of all sectors reachable from the beginning of the game.
    pub fn open<P: AsRef<Path>>(tables: Arc<Tables>, dir: P, valuation: Valuation) -> Result<Self> {
        let r = Self::scan(tables, dir, valuation)?;
        r.check_complete()?;
        Ok(r)
    }

    /// Returns `Error::MissingSector` for the first sector reachable from the beginning of the game
    /// whose file has not been found.
    pub fn check_complete(&self) -> Result<()> {
        let graph = SectorGraph::new(&self.tables.rules, false);
        let missing = graph.sectors().find(|id| !self.available.contains(id));
        match missing {
            Some(id) => Err(Error::MissingSector { id, path: Sector::file_path(&self.tables, id, &self.dir) }),
            None => Ok(())
        }
    }

    /// Whether any sector file has been found.
    #[inline] pub fn has_database(&self) -> bool { !self.available.is_empty() }

    /// Identities of the sectors whose files has been found.
    pub fn ids(&self) -> impl Iterator<Item=SectorId> + '_ { self.available.iter().copied() }

    #[inline] pub fn tables(&self) -> &Arc<Tables> { &self.tables }

    #[inline] pub fn dir(&self) -> &Path { &self.dir }

    #[inline] pub fn valuation(&self) -> Valuation { self.valuation }

    /// Returns the baselines of the values stored in the files.
    #[inline] pub fn sec_vals(&self) -> SecVals { self.valuation.sec_vals(self.tables.rules.max_stones) }

    /// Registers `sector`, whose file has just been saved in the directory, and keeps it in memory.
    pub fn insert(&mut self, sector: Arc<Sector>) {
        let id = sector.id;
        self.available.insert(id);
        self.cache.get_mut().unwrap_or_else(PoisonError::into_inner).push(id, sector);
    }
}

impl SectorsProvider for Sectors {
    fn sector(&self, id: SectorId) -> Result<Arc<Sector>> {
        if !self.available.contains(&id) { return Err(Error::SectorNotFound(id)); }
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(s) = cache.get(&id) { return Ok(Arc::clone(s)); }
        debug!("loading sector {id}");
        let s = Arc::new(Sector::load(&self.tables, id, self.valuation, &self.dir)?);
        if let Some((evicted, _)) = cache.push(id, Arc::clone(&s)) {
            if evicted != id { debug!("sector {evicted} evicted from memory"); }
        }
        Ok(s)
    }

    #[inline]
    fn has_sector(&self, id: SectorId) -> bool { self.available.contains(&id) }
}
