use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use binout::{AsIs, Serializer};

use crate::error::{Error, Result};
use crate::eval::{EvalElem, Slot, SlotLayout, Valuation, Value};
use crate::hash::Hash;
use crate::id::SectorId;
use crate::symmetry::IDENTITY;
use crate::tables::Tables;

/// Version of the file format.
pub const VERSION: i32 = 2;

/// Size of the file header in bytes (the rest after the fields is zero padding).
pub const HEADER_SIZE: usize = 64;

/// Values of all positions of one sector.
pub struct Sector {
    pub id: SectorId,
    /// Baseline of the values stored in the sector.
    pub sval: i16,
    valuation: Valuation,
    layout: SlotLayout,
    hash: Hash,
    eval: Box<[u8]>,
    /// Distances that do not fit in the slots.
    em_set: HashMap<u32, i32>
}

/// Reads little endian `int32` field of the file.
#[inline]
fn read_i32(input: &mut dyn Read) -> io::Result<i32> {
    let v: u32 = AsIs::read(input)?;
    Ok(v as i32)
}

impl Sector {
    /// Returns the sector `id` with all positions valued as draws.
    pub fn new(tables: &Arc<Tables>, id: SectorId, valuation: Valuation) -> Self {
        let hash = Hash::new(Arc::clone(tables), id.w, id.b);
        let layout = valuation.layout(tables.rules.variant);
        let sval = valuation.sec_vals(tables.rules.max_stones).sval(id);
        let eval = vec![0u8; hash.hash_count() as usize * layout.size as usize].into_boxed_slice();
        Self { id, sval, valuation, layout, hash, eval, em_set: HashMap::new() }
    }

    #[inline(always)] pub fn hash(&self) -> &Hash { &self.hash }

    #[inline(always)] pub fn hash_count(&self) -> u32 { self.hash.hash_count() }

    #[inline(always)] pub fn valuation(&self) -> Valuation { self.valuation }

    /// Number of positions whose distances are kept in the overflow map.
    #[inline(always)] pub fn overflow_len(&self) -> usize { self.em_set.len() }

    /// Returns the number of bytes occupied by the values.
    pub fn size_bytes(&self) -> usize {
        self.eval.len() + self.em_set.len() * 2 * std::mem::size_of::<i32>()
    }

    #[inline(always)]
    fn slot(&self, i: u32) -> &[u8] {
        let s = self.layout.size as usize;
        &self.eval[i as usize * s..(i as usize + 1) * s]
    }

    /// Returns the content of slot `i`, which can be a symmetry pointer.
    #[inline]
    pub fn get_inner(&self, i: u32) -> EvalElem {
        match self.layout.decode(self.slot(i)) {
            Slot::Fields(key1, key2) => EvalElem::from_fields(key1, key2),
            Slot::Overflow(key1) => EvalElem::from_fields(key1, self.em_set[&i])
        }
    }

    /// Returns the value of canonical slot `i`.
    #[inline]
    pub fn get(&self, i: u32) -> Value {
        match self.get_inner(i) {
            EvalElem::Val(v) => v,
            EvalElem::Draw => Value::DRAW,
            e => panic!("slot {i} of sector {} holds {e:?} instead of a value", self.id)
        }
    }

    /// Stores `e` in slot `i`.
    #[inline]
    pub fn set(&mut self, i: u32, e: EvalElem) {
        let (key1, key2) = e.fields();
        let s = self.layout.size as usize;
        let slot = &mut self.eval[i as usize * s..(i as usize + 1) * s];
        if self.layout.encode(key1, key2, slot) {
            if !self.em_set.is_empty() { self.em_set.remove(&i); }
        } else {
            self.em_set.insert(i, key2);
        }
    }

    /// Returns the canonical index of board `a` (white to move) and the content of its slot,
    /// following at most one symmetry pointer.
    #[inline]
    pub fn hash_lookup(&self, a: u64) -> (u32, EvalElem) {
        let (h, a) = self.hash.hash(a);
        match self.get_inner(h) {
            EvalElem::Sym(op) => {
                let h2 = self.hash.index_of_canonical(self.hash.tables().sym.sym48(op, a));
                let e = self.get_inner(h2);
                assert!(!matches!(e, EvalElem::Sym(_)), "double symmetry indirection in sector {} at {h}", self.id);
                (h2, e)
            }
            e => (h, e)
        }
    }

    /// Returns the value of board `a` (white to move).
    #[inline]
    pub fn lookup(&self, a: u64) -> Value {
        let (h, _) = self.hash_lookup(a);
        self.get(h)
    }

    /// Checks whether slot `h` is the canonical slot of its board.
    #[inline]
    pub fn is_canonical(&self, h: u32) -> bool {
        self.hash.smallest_image(self.hash.inverse(h)).0 == h
    }

    /// Points every non-canonical slot to the symmetry that leads to its canonical slot.
    /// Returns the number of canonical slots.
    pub fn init_symmetry_pointers(&mut self) -> u32 {
        let mut canonical = 0;
        for h in 0..self.hash_count() {
            let (hs, op) = self.hash.smallest_image(self.hash.inverse(h));
            if hs == h {
                canonical += 1;
            } else {
                debug_assert_ne!(op, IDENTITY);
                self.set(h, EvalElem::Sym(op));
            }
        }
        canonical
    }

    /// Returns the path of the file of sector `id` in `dir`.
    pub fn file_path<P: AsRef<Path>>(tables: &Tables, id: SectorId, dir: P) -> PathBuf {
        dir.as_ref().join(id.file_name(tables.rules.variant))
    }

    /// Writes header, values and overflow map of `self` to `output`.
    pub fn write(&self, output: &mut dyn Write) -> io::Result<()> {
        AsIs::write(output, VERSION as u32)?;
        AsIs::write(output, self.layout.size as u32)?;
        AsIs::write(output, self.layout.field2_offset as u32)?;
        AsIs::write(output, self.valuation.flag())?;
        output.write_all(&[0u8; HEADER_SIZE - 3 * 4 - 1])?;
        output.write_all(&self.eval)?;
        let mut em: Vec<_> = self.em_set.iter().map(|(i, v)| (*i, *v)).collect();
        em.sort_unstable();
        AsIs::write(output, em.len() as u32)?;
        for (i, v) in em {
            AsIs::write(output, i)?;
            AsIs::write(output, v as u32)?;
        }
        Ok(())
    }

    /// Saves `self` in its file in `dir` and returns the path of the file.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        std::fs::create_dir_all(dir.as_ref())?;
        let path = Self::file_path(self.hash.tables(), self.id, dir);
        let mut output = BufWriter::new(File::create(&path)?);
        self.write(&mut output)?;
        output.flush()?;
        Ok(path)
    }

    /// Reads the sector `id` from `input`, checking that its header matches the expected layout.
    /// `path` is used only in error messages.
    pub fn read(tables: &Arc<Tables>, id: SectorId, valuation: Valuation, input: &mut dyn Read, path: &Path) -> Result<Self> {
        let mut s = Self::new(tables, id, valuation);
        let mismatch = |field, expected: i64, found: i64| Error::HeaderMismatch { path: path.to_owned(), field, expected, found };
        let version = read_i32(input)?;
        if version != VERSION { return Err(mismatch("version", VERSION as i64, version as i64)); }
        let size = read_i32(input)?;
        if size != s.layout.size as i32 { return Err(mismatch("eval_struct_size", s.layout.size as i64, size as i64)); }
        let offset = read_i32(input)?;
        if offset != s.layout.field2_offset as i32 { return Err(mismatch("field2_offset", s.layout.field2_offset as i64, offset as i64)); }
        let flag: u8 = AsIs::read(input)?;
        if flag != valuation.flag() { return Err(mismatch("stone_diff_flag", valuation.flag() as i64, flag as i64)); }
        let mut padding = [0u8; HEADER_SIZE - 3 * 4 - 1];
        input.read_exact(&mut padding)?;
        input.read_exact(&mut s.eval)?;
        let len = read_i32(input)?;
        for _ in 0..len {
            let i = read_i32(input)?;
            let v = read_i32(input)?;
            if i < 0 || i as u32 >= s.hash_count() {
                return Err(Error::Inconsistent(format!("{}: overflow entry for index {i} out of range", path.display())));
            }
            s.em_set.insert(i as u32, v);
        }
        if let Some(i) = (0..s.hash_count()).find(|&i| matches!(s.layout.decode(s.slot(i)), Slot::Overflow(_)) && !s.em_set.contains_key(&i)) {
            return Err(Error::Inconsistent(format!("{}: slot {i} refers to a missing overflow entry", path.display())));
        }
        Ok(s)
    }

    /// Loads the sector `id` from its file in `dir`.
    pub fn load<P: AsRef<Path>>(tables: &Arc<Tables>, id: SectorId, valuation: Valuation, dir: P) -> Result<Self> {
        let path = Self::file_path(tables, id, dir);
        let file = File::open(&path).map_err(|e|
            if e.kind() == io::ErrorKind::NotFound { Error::MissingSector { id, path: path.clone() } } else { e.into() })?;
        Self::read(tables, id, valuation, &mut BufReader::new(file), &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Rules, Variant};
    use crate::symmetry::SYMMETRIES;

    fn tables() -> Arc<Tables> { Tables::new(Rules::new(Variant::Std)) }

    #[test]
    fn set_get() {
        let t = tables();
        let mut s = Sector::new(&t, SectorId::new(2, 1, 0, 0), Valuation::Exact);
        assert_eq!(s.get_inner(5), EvalElem::Draw);
        s.set(5, EvalElem::Val(Value::win(3)));
        s.set(6, EvalElem::Count(4));
        s.set(7, EvalElem::Sym(9));
        s.set(8, EvalElem::Val(Value::loss(10000)));
        assert_eq!(s.get(5), Value::win(3));
        assert_eq!(s.get_inner(6), EvalElem::Count(4));
        assert_eq!(s.get_inner(7), EvalElem::Sym(9));
        assert_eq!(s.get(8), Value::loss(10000));
        assert_eq!(s.overflow_len(), 1);
        s.set(8, EvalElem::Val(Value::loss(2)));
        assert_eq!(s.overflow_len(), 0);
        assert_eq!(s.get(4), Value::DRAW);
    }

    #[test]
    fn file_round_trip() {
        let t = tables();
        let id = SectorId::new(3, 2, 0, 1);
        let mut s = Sector::new(&t, id, Valuation::Exact);
        s.init_symmetry_pointers();
        for i in (0..s.hash_count()).step_by(7) {
            if !matches!(s.get_inner(i), EvalElem::Sym(_)) {
                s.set(i, EvalElem::Val(if i % 2 == 0 { Value::loss(i as i32 % 5000) } else { Value::win(1) }));
            }
        }
        assert!(s.overflow_len() > 0);
        let mut buf = Vec::new();
        s.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + s.hash_count() as usize * 3 + 4 + 8 * s.overflow_len());
        assert_eq!(&buf[0..4], &2i32.to_le_bytes());
        assert_eq!(&buf[4..8], &3i32.to_le_bytes());
        let em_at = HEADER_SIZE + s.hash_count() as usize * 3;
        assert_eq!(&buf[em_at..em_at + 4], &(s.overflow_len() as i32).to_le_bytes());
        let r = Sector::read(&t, id, Valuation::Exact, &mut &buf[..], Path::new("mem")).unwrap();
        for i in 0..s.hash_count() { assert_eq!(r.get_inner(i), s.get_inner(i)); }
        assert_eq!(r.overflow_len(), s.overflow_len());
    }

    #[test]
    fn header_mismatch() {
        let t = tables();
        let id = SectorId::new(1, 1, 2, 2);
        let s = Sector::new(&t, id, Valuation::Exact);
        let mut buf = Vec::new();
        s.write(&mut buf).unwrap();
        match Sector::read(&t, id, Valuation::StoneDiff, &mut &buf[..], Path::new("x")) {
            Err(Error::HeaderMismatch { field, .. }) => assert_eq!(field, "eval_struct_size"),
            _ => panic!("header mismatch not detected")
        }
        let short = &buf[..HEADER_SIZE + 5];
        assert!(matches!(Sector::read(&t, id, Valuation::Exact, &mut &short[..], Path::new("x")), Err(Error::Io(_))));
        let mut old = buf.clone();
        old[0] = 1;
        assert!(matches!(Sector::read(&t, id, Valuation::Exact, &mut &old[..], Path::new("x")),
            Err(Error::HeaderMismatch { field: "version", found: 1, .. })));
    }

    #[test]
    fn missing_file() {
        let t = tables();
        let dir = tempfile::tempdir().unwrap();
        let id = SectorId::new(3, 3, 0, 0);
        match Sector::load(&t, id, Valuation::Exact, dir.path()) {
            Err(Error::MissingSector { id: missing, .. }) => assert_eq!(missing, id),
            _ => panic!("missing file not reported")
        }
    }

    #[test]
    fn save_load() {
        let t = tables();
        let dir = tempfile::tempdir().unwrap();
        let mut s = Sector::new(&t, SectorId::new(2, 2, 1, 1), Valuation::Exact);
        s.set(11, EvalElem::Val(Value::win(5)));
        let path = s.save(dir.path()).unwrap();
        assert!(path.ends_with("std_2_2_1_1.sec2"));
        let l = Sector::load(&t, s.id, Valuation::Exact, dir.path()).unwrap();
        assert_eq!(l.get(11), Value::win(5));
    }

    #[test]
    fn one_indirection_for_all_images() {
        // white on 0, 1, 2 and black on 5, 6
        let t = tables();
        let mut s = Sector::new(&t, SectorId::new(3, 2, 0, 0), Valuation::Exact);
        s.init_symmetry_pointers();
        let a = 0b111u64 | (0b110_0000u64 << 24);
        let (h, e) = s.hash_lookup(a);
        assert!(s.is_canonical(h));
        assert_eq!(e, EvalElem::Draw);
        for op in 0..SYMMETRIES as u8 {
            assert_eq!(s.hash_lookup(t.sym.sym48(op, a)).0, h);
        }
        for i in 0..s.hash_count() {
            if let EvalElem::Sym(op) = s.get_inner(i) {
                let b = t.sym.sym48(op, s.hash().inverse(i));
                assert!(!matches!(s.get_inner(s.hash().index_of_canonical(b)), EvalElem::Sym(_)));
            }
        }
    }
}
