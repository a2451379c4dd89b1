//! Typed catalog layer over the [`Arena`]: database header, chromosome and
//! genome linked lists, per-chromosome bitmap records, and the name/allele
//! lookups built on top of them.
//!
//! Every persisted reference is a byte [`Offset`] into the arena, never a
//! pointer — see [`crate::arena`] for why. A `0` offset is the null
//! sentinel everywhere a "no next node" / "not set" value is needed, since
//! offset `0` always falls inside the header and can never be a valid
//! record start.

use rustc_hash::FxHashMap;
use std::path::Path;

use crate::arena::Arena;
use crate::bitmap::Bitmap;
use crate::config;
use crate::error::{Result, TdbError};
use crate::variant::{Variant, VariantKind};

pub type Offset = u64;

const MAGIC: &[u8; 14] = b"TERSECT_DB_01\0";
const WORD_SIZE_BITS: u16 = 64;
const HEADER_LEN: u64 = 56;
const CHROM_HDR_LEN: u64 = 40;
const GENOME_HDR_LEN: u64 = 16;
const BITARRAY_HDR_LEN: u64 = 52;
const VARIANT_LEN: u64 = 13;

fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes(buf[off..off + 2].try_into().unwrap())
}
fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}
fn read_u64(buf: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(buf[off..off + 8].try_into().unwrap())
}
fn write_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}
fn write_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}
fn write_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

#[derive(Debug, Clone, Copy)]
struct Header {
    db_size: u64,
    word_size: u16,
    chromosomes: Offset,
    chromosome_count: u32,
    genomes: Offset,
    genome_count: u32,
    free_head: Offset,
}

impl Header {
    fn read(buf: &[u8]) -> Result<Self> {
        if &buf[0..14] != MAGIC {
            return Err(TdbError::DbOpenFailed("bad magic header".into()));
        }
        let word_size = read_u16(buf, 22);
        if config::word_size_check() && word_size != WORD_SIZE_BITS {
            return Err(TdbError::DbOpenFailed(format!(
                "word size mismatch: database uses {word_size}-bit words, this build uses {WORD_SIZE_BITS}"
            )));
        }
        Ok(Self {
            db_size: read_u64(buf, 14),
            word_size,
            chromosomes: read_u64(buf, 24),
            chromosome_count: read_u32(buf, 32),
            genomes: read_u64(buf, 36),
            genome_count: read_u32(buf, 44),
            free_head: read_u64(buf, 48),
        })
    }

    fn write(&self, buf: &mut [u8]) {
        buf[0..14].copy_from_slice(MAGIC);
        write_u64(buf, 14, self.db_size);
        write_u16(buf, 22, self.word_size);
        write_u64(buf, 24, self.chromosomes);
        write_u32(buf, 32, self.chromosome_count);
        write_u64(buf, 36, self.genomes);
        write_u32(buf, 44, self.genome_count);
        write_u64(buf, 48, self.free_head);
    }
}

/// A chromosome catalog entry as read from the arena.
#[derive(Debug, Clone, Copy)]
pub struct ChromRecord {
    pub offset: Offset,
    pub name: Offset,
    pub variants: Offset,
    pub bitarrays: Offset,
    pub variant_count: u32,
    pub length: u32,
    pub next: Offset,
}

/// A genome (sample) catalog entry as read from the arena.
#[derive(Debug, Clone, Copy)]
pub struct GenomeRecord {
    pub offset: Offset,
    pub name: Offset,
    pub next: Offset,
}

#[derive(Debug, Clone, Copy)]
struct BitarrayRecord {
    offset: Offset,
    genome_offset: Offset,
    size: u64,
    array: Offset,
    word_count: u32,
    next: Offset,
}

/// An open variant database: the arena plus the typed catalog operations
/// built on top of it.
pub struct Catalog {
    arena: Arena,
}

impl Catalog {
    /// Create a fresh, empty database at `path`. Fails if a file already
    /// exists there (callers that want to overwrite must remove it first).
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(TdbError::BuildExists(path.display().to_string()));
        }
        let mut arena = Arena::create(path)
            .map_err(|_| TdbError::BuildCreate(path.display().to_string()))?;
        arena.ensure_capacity(HEADER_LEN)?;
        let header = Header {
            db_size: HEADER_LEN,
            word_size: WORD_SIZE_BITS,
            chromosomes: 0,
            chromosome_count: 0,
            genomes: 0,
            genome_count: 0,
            free_head: 0,
        };
        header.write(&mut arena.as_mut_slice()[0..HEADER_LEN as usize]);
        Ok(Self { arena })
    }

    /// Open an existing database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TdbError::DbMissing(path.display().to_string()));
        }
        let arena = Arena::open(path)?;
        Header::read(arena.as_slice())?;
        Ok(Self { arena })
    }

    fn header(&self) -> Header {
        Header::read(self.arena.as_slice()).expect("header validated on open")
    }

    fn write_header(&mut self, header: &Header) {
        header.write(&mut self.arena.as_mut_slice()[0..HEADER_LEN as usize]);
    }

    pub fn flush(&self) -> Result<()> {
        self.arena.flush()
    }

    fn allocate(&mut self, len: u64) -> Result<Offset> {
        let mut header = self.header();
        let offset = header.db_size;
        let new_size = offset + len;
        self.arena.ensure_capacity(new_size)?;
        header.db_size = new_size;
        self.write_header(&header);
        Ok(offset)
    }

    // -- byte-string helpers (length-prefixed, u16 length) --------------

    fn write_string(&mut self, s: &str) -> Result<Offset> {
        let bytes = s.as_bytes();
        let offset = self.allocate(2 + bytes.len() as u64)?;
        let at = offset as usize;
        let buf = self.arena.as_mut_slice();
        write_u16(buf, at, bytes.len() as u16);
        buf[at + 2..at + 2 + bytes.len()].copy_from_slice(bytes);
        Ok(offset)
    }

    fn read_string(&self, offset: Offset) -> String {
        let buf = self.arena.as_slice();
        let at = offset as usize;
        let len = read_u16(buf, at) as usize;
        String::from_utf8_lossy(&buf[at + 2..at + 2 + len]).into_owned()
    }

    // -- chromosome list --------------------------------------------------

    fn read_chrom(&self, offset: Offset) -> ChromRecord {
        let buf = self.arena.as_slice();
        let at = offset as usize;
        ChromRecord {
            offset,
            name: read_u64(buf, at),
            variants: read_u64(buf, at + 8),
            bitarrays: read_u64(buf, at + 16),
            variant_count: read_u32(buf, at + 24),
            length: read_u32(buf, at + 28),
            next: read_u64(buf, at + 32),
        }
    }

    fn write_chrom(&mut self, rec: &ChromRecord) {
        let at = rec.offset as usize;
        let buf = self.arena.as_mut_slice();
        write_u64(buf, at, rec.name);
        write_u64(buf, at + 8, rec.variants);
        write_u64(buf, at + 16, rec.bitarrays);
        write_u32(buf, at + 24, rec.variant_count);
        write_u32(buf, at + 28, rec.length);
        write_u64(buf, at + 32, rec.next);
    }

    /// All chromosomes in catalog (insertion) order.
    pub fn chromosomes(&self) -> Vec<ChromRecord> {
        let mut out = Vec::new();
        let mut cur = self.header().chromosomes;
        while cur != 0 {
            let rec = self.read_chrom(cur);
            out.push(rec);
            cur = rec.next;
        }
        out
    }

    /// Linear scan by name, matching the reference implementation's
    /// O(chromosome count) lookup.
    pub fn find_chromosome(&self, name: &str) -> Option<ChromRecord> {
        self.chromosomes()
            .into_iter()
            .find(|c| self.read_string(c.name) == name)
    }

    pub fn chromosome_name(&self, rec: &ChromRecord) -> String {
        self.read_string(rec.name)
    }

    /// Insert a fully-merged chromosome: its canonical variant list is
    /// known in full up front (built by the ingest merge in memory), so
    /// the variant array is allocated once at its final size rather than
    /// grown record by record.
    pub fn add_chromosome(&mut self, name: &str, variants: &[Variant], length_bp: u32) -> Result<Offset> {
        if self.find_chromosome(name).is_some() {
            return Err(TdbError::VcfParseFailed(format!(
                "chromosome {name} already present in database (out-of-order or duplicate stream)"
            )));
        }
        let name_off = self.write_string(name)?;
        let variants_off = self.write_variants(variants)?;
        let chrom_off = self.allocate(CHROM_HDR_LEN)?;

        let mut header = self.header();
        let rec = ChromRecord {
            offset: chrom_off,
            name: name_off,
            variants: variants_off,
            bitarrays: 0,
            variant_count: variants.len() as u32,
            length: length_bp,
            next: header.chromosomes,
        };
        self.write_chrom(&rec);
        header.chromosomes = chrom_off;
        header.chromosome_count += 1;
        self.write_header(&header);
        Ok(chrom_off)
    }

    fn write_variants(&mut self, variants: &[Variant]) -> Result<Offset> {
        if variants.is_empty() {
            return Ok(0);
        }
        let offset = self.allocate(VARIANT_LEN * variants.len() as u64)?;
        let at = offset as usize;
        let buf = self.arena.as_mut_slice();
        for (i, v) in variants.iter().enumerate() {
            let rec_at = at + i * VARIANT_LEN as usize;
            write_u32(buf, rec_at, v.position);
            buf[rec_at + 4] = v.kind.code();
            write_u64(buf, rec_at + 5, v.allele_offset.unwrap_or(0));
        }
        Ok(offset)
    }

    /// Read a chromosome's full variant list, in canonical ascending
    /// order (the order they were merged in at build time).
    pub fn read_variants(&self, chrom: &ChromRecord) -> Vec<Variant> {
        let buf = self.arena.as_slice();
        let at = chrom.variants as usize;
        (0..chrom.variant_count as usize)
            .map(|i| {
                let rec_at = at + i * VARIANT_LEN as usize;
                let position = read_u32(buf, rec_at);
                let kind = VariantKind::from_code(buf[rec_at + 4]).expect("valid on-disk kind code");
                let allele = read_u64(buf, rec_at + 5);
                Variant {
                    position,
                    kind,
                    allele_offset: if kind.is_indel() { Some(allele) } else { None },
                }
            })
            .collect()
    }

    pub fn indel_text(&self, allele_offset: Offset) -> (String, String) {
        let s = self.read_string(allele_offset);
        match s.split_once('\t') {
            Some((r, a)) => (r.to_string(), a.to_string()),
            None => (s, String::new()),
        }
    }

    pub fn intern_indel(&mut self, reference: &str, alternate: &str) -> Result<Offset> {
        self.write_string(&format!("{reference}\t{alternate}"))
    }

    // -- genome list -------------------------------------------------------

    fn read_genome(&self, offset: Offset) -> GenomeRecord {
        let buf = self.arena.as_slice();
        let at = offset as usize;
        GenomeRecord {
            offset,
            name: read_u64(buf, at),
            next: read_u64(buf, at + 8),
        }
    }

    fn write_genome(&mut self, rec: &GenomeRecord) {
        let at = rec.offset as usize;
        let buf = self.arena.as_mut_slice();
        write_u64(buf, at, rec.name);
        write_u64(buf, at + 8, rec.next);
    }

    pub fn genomes(&self) -> Vec<GenomeRecord> {
        let mut out = Vec::new();
        let mut cur = self.header().genomes;
        while cur != 0 {
            let rec = self.read_genome(cur);
            out.push(rec);
            cur = rec.next;
        }
        out
    }

    pub fn find_genome(&self, name: &str) -> Option<GenomeRecord> {
        self.genomes().into_iter().find(|g| self.read_string(g.name) == name)
    }

    pub fn genome_name(&self, rec: &GenomeRecord) -> String {
        self.read_string(rec.name)
    }

    pub fn add_genome(&mut self, name: &str) -> Result<Offset> {
        if self.find_genome(name).is_some() {
            return Err(TdbError::DuplicateSample(name.to_string()));
        }
        let name_off = self.write_string(name)?;
        let genome_off = self.allocate(GENOME_HDR_LEN)?;

        let mut header = self.header();
        let rec = GenomeRecord {
            offset: genome_off,
            name: name_off,
            next: header.genomes,
        };
        self.write_genome(&rec);
        header.genomes = genome_off;
        header.genome_count += 1;
        self.write_header(&header);
        Ok(genome_off)
    }

    /// Rename a genome in place. The new name string is appended first
    /// (which may grow and remap the arena), so the genome header is
    /// re-resolved by offset afterward rather than reusing a stale
    /// reference taken before the allocation.
    pub fn rename_genome(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let genome_off = self
            .find_genome(old_name)
            .ok_or_else(|| TdbError::NoSuchSample(old_name.to_string()))?
            .offset;
        let new_name_off = self.write_string(new_name)?;
        log::debug!("rename leaves old name of {old_name} as dead space in the arena");
        let mut rec = self.read_genome(genome_off);
        rec.name = new_name_off;
        self.write_genome(&rec);
        Ok(())
    }

    // -- bitmaps -----------------------------------------------------------

    fn read_bitarray(&self, offset: Offset) -> BitarrayRecord {
        let buf = self.arena.as_slice();
        let at = offset as usize;
        BitarrayRecord {
            offset,
            genome_offset: read_u64(buf, at),
            size: read_u64(buf, at + 8),
            array: read_u64(buf, at + 16),
            word_count: read_u32(buf, at + 24),
            next: read_u64(buf, at + 44),
        }
    }

    fn write_bitarray(&mut self, rec: &BitarrayRecord) {
        let at = rec.offset as usize;
        let buf = self.arena.as_mut_slice();
        write_u64(buf, at, rec.genome_offset);
        write_u64(buf, at + 8, rec.size);
        write_u64(buf, at + 16, rec.array);
        write_u32(buf, at + 24, rec.word_count);
        // start_mask / end_mask occupy bytes 28..44; persisted bitmaps are
        // always whole (never a partial view), so both are all-ones.
        write_u64(buf, at + 28, u64::MAX);
        write_u64(buf, at + 36, u64::MAX);
        write_u64(buf, at + 44, rec.next);
    }

    fn chromosome_bitarrays(&self, chrom: &ChromRecord) -> Vec<BitarrayRecord> {
        let mut out = Vec::new();
        let mut cur = chrom.bitarrays;
        while cur != 0 {
            let rec = self.read_bitarray(cur);
            out.push(rec);
            cur = rec.next;
        }
        out
    }

    /// Store `bitmap` as the given genome's bitmap for `chrom`.
    pub fn add_bitmap(&mut self, chrom: &ChromRecord, genome: &GenomeRecord, bitmap: &Bitmap) -> Result<()> {
        let words = bitmap.words();
        let array_off = if words.is_empty() {
            0
        } else {
            let off = self.allocate(8 * words.len() as u64)?;
            let at = off as usize;
            let buf = self.arena.as_mut_slice();
            for (i, w) in words.iter().enumerate() {
                write_u64(buf, at + i * 8, *w);
            }
            off
        };
        let bitarray_off = self.allocate(BITARRAY_HDR_LEN)?;
        let chrom_now = self.read_chrom(chrom.offset);
        let rec = BitarrayRecord {
            offset: bitarray_off,
            genome_offset: genome.offset,
            size: bitmap.bit_len(),
            array: array_off,
            word_count: words.len() as u32,
            next: chrom_now.bitarrays,
        };
        self.write_bitarray(&rec);
        let mut updated = chrom_now;
        updated.bitarrays = bitarray_off;
        self.write_chrom(&updated);
        Ok(())
    }

    /// Load the bitmap a genome holds for a chromosome, if any.
    pub fn get_bitmap(&self, chrom: &ChromRecord, genome: &GenomeRecord) -> Option<Bitmap> {
        let rec = self
            .chromosome_bitarrays(chrom)
            .into_iter()
            .find(|b| b.genome_offset == genome.offset)?;
        let words = if rec.array == 0 {
            Vec::new()
        } else {
            let buf = self.arena.as_slice();
            let at = rec.array as usize;
            (0..rec.word_count as usize)
                .map(|i| read_u64(buf, at + i * 8))
                .collect()
        };
        Some(Bitmap::from_persisted(words, rec.size))
    }

    // -- sample name matching ----------------------------------------------

    /// `*`-delimited wildcard match: `*` matches any run of characters.
    /// A pattern with no `*` must match `name` exactly.
    pub fn wildcard_match(pattern: &str, name: &str) -> bool {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 1 {
            return pattern == name;
        }
        let mut rest = name;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            if i == 0 {
                if !rest.starts_with(part) {
                    return false;
                }
                rest = &rest[part.len()..];
            } else if i == parts.len() - 1 {
                return rest.ends_with(part);
            } else {
                match rest.find(part) {
                    Some(idx) => rest = &rest[idx + part.len()..],
                    None => return false,
                }
            }
        }
        true
    }

    /// All genome names matching a wildcard pattern.
    pub fn genomes_matching(&self, pattern: &str) -> Vec<GenomeRecord> {
        self.genomes()
            .into_iter()
            .filter(|g| Self::wildcard_match(pattern, &self.genome_name(g)))
            .collect()
    }

    /// Does every genome in `genome_offsets` carry the given variant on
    /// `chrom`? Used by `--contains` queries.
    pub fn contains_all_variants(&self, chrom: &ChromRecord, ordinal: u64, genomes: &[GenomeRecord]) -> bool {
        genomes.iter().all(|g| match self.get_bitmap(chrom, g) {
            Some(bm) => bm.get_bit(ordinal),
            None => false,
        })
    }

    /// Resolve a `--contains` variant list (`CHR:POS:REF:ALT,...`) into
    /// `(chromosome, allele ordinal)` pairs. `Ok(None)` means the list is
    /// well-formed but names a variant this database doesn't have — per
    /// spec, that makes the whole query match nothing, not an error.
    /// A malformed entry (wrong field count, non-numeric position) is an
    /// error instead, since that's a request the CLI cannot have meant.
    pub fn flatten_contains_queries(&self, list: &str) -> Result<Option<Vec<(ChromRecord, u64)>>> {
        let mut resolved = Vec::new();
        for entry in list.split(',') {
            let (chrom_name, position, reference, alternate) = parse_variant(entry)?;
            let Some(chrom) = self.find_chromosome(&chrom_name) else {
                return Ok(None);
            };
            let Some(ordinal) = self.exact_allele_ordinal(&chrom, position, &reference, &alternate) else {
                return Ok(None);
            };
            resolved.push((chrom, ordinal));
        }
        Ok(Some(resolved))
    }

    /// Ordinal index of a variant at `position` within a chromosome's
    /// canonical list, or `None` if no variant exists at that exact
    /// position (binary search over the position-sorted array).
    pub fn variant_ordinal(&self, chrom: &ChromRecord, position: u32) -> Option<u64> {
        let buf = self.arena.as_slice();
        let at = chrom.variants as usize;
        let n = chrom.variant_count as usize;
        let mut lo = 0usize;
        let mut hi = n;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let p = read_u32(buf, at + mid * VARIANT_LEN as usize);
            match p.cmp(&position) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Some(mid as u64),
            }
        }
        None
    }

    /// Ordinal of the exact allele `(position, ref, alt)`, disambiguating
    /// between multiple alleles that share a position (multi-allelic
    /// sites produce one variant record per alt, all at the same
    /// position). Used by `--contains` queries, which name a specific
    /// allele rather than "any variant at this position".
    pub fn exact_allele_ordinal(
        &self,
        chrom: &ChromRecord,
        position: u32,
        reference: &str,
        alternate: &str,
    ) -> Option<u64> {
        let anchor = self.variant_ordinal(chrom, position)?;
        let kind = crate::variant::snv_type(reference, alternate);
        let variants = self.read_variants(chrom);
        let mut lo = anchor as usize;
        while lo > 0 && variants[lo - 1].position == position {
            lo -= 1;
        }
        let mut idx = lo;
        while idx < variants.len() && variants[idx].position == position {
            let v = variants[idx];
            let matches = if kind.is_indel() {
                v.kind.is_indel()
                    && v.allele_offset
                        .map(|off| self.indel_text(off) == (reference.to_string(), alternate.to_string()))
                        .unwrap_or(false)
            } else {
                v.kind == kind
            };
            if matches {
                return Some(idx as u64);
            }
            idx += 1;
        }
        None
    }
}

/// Parse one `CHR:POS:REF:ALT` entry from a `--contains` variant list.
fn parse_variant(entry: &str) -> Result<(String, u32, String, String)> {
    let mut parts = entry.splitn(4, ':');
    let chrom = parts.next().filter(|s| !s.is_empty());
    let position = parts.next();
    let reference = parts.next().filter(|s| !s.is_empty());
    let alternate = parts.next().filter(|s| !s.is_empty());
    match (chrom, position, reference, alternate) {
        (Some(chrom), Some(pos), Some(reference), Some(alternate)) => {
            let position: u32 = pos.parse().map_err(|_| TdbError::BadAllele(entry.to_string()))?;
            Ok((chrom.to_string(), position, reference.to_string(), alternate.to_string()))
        }
        _ => Err(TdbError::BadAllele(entry.to_string())),
    }
}

/// A transient (not persisted) intern table mapping `"REF\tALT"` text to
/// the offset of its on-disk interned copy, used while ingesting a single
/// chromosome to avoid writing the same indel text twice.
#[derive(Default)]
pub struct IndelInterner {
    seen: FxHashMap<(String, String), Offset>,
}

impl IndelInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, catalog: &mut Catalog, reference: &str, alternate: &str) -> Result<Offset> {
        let key = (reference.to_string(), alternate.to_string());
        if let Some(&off) = self.seen.get(&key) {
            return Ok(off);
        }
        let off = catalog.intern_indel(reference, alternate)?;
        self.seen.insert(key, off);
        Ok(off)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn temp_db_path() -> std::path::PathBuf {
        let f = NamedTempFile::new().unwrap();
        let path = f.path().to_path_buf();
        drop(f);
        std::fs::remove_file(&path).ok();
        path
    }

    #[test]
    fn create_then_open_round_trips_header() {
        let path = temp_db_path();
        {
            Catalog::create(&path).unwrap();
        }
        let cat = Catalog::open(&path).unwrap();
        assert_eq!(cat.chromosomes().len(), 0);
        assert_eq!(cat.genomes().len(), 0);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn add_and_find_genome() {
        let path = temp_db_path();
        let mut cat = Catalog::create(&path).unwrap();
        cat.add_genome("sample_a").unwrap();
        cat.add_genome("sample_b").unwrap();
        assert!(cat.find_genome("sample_a").is_some());
        assert!(cat.find_genome("sample_c").is_none());
        assert!(cat.add_genome("sample_a").is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn add_chromosome_and_bitmap_round_trip() {
        let path = temp_db_path();
        let mut cat = Catalog::create(&path).unwrap();
        let variants = vec![
            Variant::snv(100, VariantKind::AC),
            Variant::snv(200, VariantKind::GT),
        ];
        let chrom_off = cat.add_chromosome("chr1", &variants, 1_000_000).unwrap();
        let chrom = cat.find_chromosome("chr1").unwrap();
        assert_eq!(chrom.offset, chrom_off);
        assert_eq!(cat.read_variants(&chrom).len(), 2);

        let genome_off = cat.add_genome("sample_a").unwrap();
        let genome = cat.find_genome("sample_a").unwrap();
        assert_eq!(genome.offset, genome_off);

        let mut bm = Bitmap::new();
        bm.set_bit(0).unwrap();
        cat.add_bitmap(&chrom, &genome, &bm).unwrap();

        let loaded = cat.get_bitmap(&chrom, &genome).unwrap();
        assert!(loaded.get_bit(0));
        assert!(!loaded.get_bit(1));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rename_genome_updates_lookup() {
        let path = temp_db_path();
        let mut cat = Catalog::create(&path).unwrap();
        cat.add_genome("old_name").unwrap();
        cat.rename_genome("old_name", "new_name").unwrap();
        assert!(cat.find_genome("old_name").is_none());
        assert!(cat.find_genome("new_name").is_some());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn wildcard_match_handles_prefix_suffix_and_middle() {
        assert!(Catalog::wildcard_match("sample_*", "sample_a"));
        assert!(Catalog::wildcard_match("*_a", "sample_a"));
        assert!(Catalog::wildcard_match("sample_*_v2", "sample_x_v2"));
        assert!(!Catalog::wildcard_match("sample_*_v2", "sample_x_v3"));
        assert!(Catalog::wildcard_match("exact", "exact"));
        assert!(!Catalog::wildcard_match("exact", "exactly"));
    }

    #[test]
    fn contains_query_matches_genome_carrying_every_listed_variant() {
        let path = temp_db_path();
        let mut cat = Catalog::create(&path).unwrap();
        let variants = vec![Variant::snv(100, VariantKind::AC), Variant::snv(200, VariantKind::GT)];
        cat.add_chromosome("chr1", &variants, 1_000).unwrap();
        let chrom = cat.find_chromosome("chr1").unwrap();

        cat.add_genome("carrier").unwrap();
        let carrier = cat.find_genome("carrier").unwrap();
        cat.add_genome("partial").unwrap();
        let partial = cat.find_genome("partial").unwrap();

        let mut both = Bitmap::new();
        both.set_bit(0).unwrap();
        both.set_bit(1).unwrap();
        cat.add_bitmap(&chrom, &carrier, &both).unwrap();

        let mut only_first = Bitmap::new();
        only_first.set_bit(0).unwrap();
        cat.add_bitmap(&chrom, &partial, &only_first).unwrap();

        let list = "chr1:100:A:C,chr1:200:G:T";
        let resolved = cat.flatten_contains_queries(list).unwrap().unwrap();
        assert_eq!(resolved.len(), 2);

        let carrier_matches = resolved
            .iter()
            .all(|(c, ord)| cat.contains_all_variants(c, *ord, std::slice::from_ref(&carrier)));
        assert!(carrier_matches);

        let partial_matches = resolved
            .iter()
            .all(|(c, ord)| cat.contains_all_variants(c, *ord, std::slice::from_ref(&partial)));
        assert!(!partial_matches);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn contains_query_with_unknown_variant_is_an_empty_match_not_an_error() {
        let path = temp_db_path();
        let mut cat = Catalog::create(&path).unwrap();
        cat.add_chromosome("chr1", &[Variant::snv(100, VariantKind::AC)], 1_000)
            .unwrap();

        assert!(cat.flatten_contains_queries("chr2:1:A:C").unwrap().is_none());
        assert!(cat.flatten_contains_queries("chr1:999:A:C").unwrap().is_none());
        assert!(cat.flatten_contains_queries("chr1:100:A:G").unwrap().is_none());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn contains_query_rejects_malformed_entries() {
        let path = temp_db_path();
        let cat = Catalog::create(&path).unwrap();
        assert!(cat.flatten_contains_queries("chr1:notanumber:A:C").is_err());
        assert!(cat.flatten_contains_queries("chr1:100:A").is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn duplicate_chromosome_insert_is_rejected() {
        let path = temp_db_path();
        let mut cat = Catalog::create(&path).unwrap();
        cat.add_chromosome("chr1", &[], 0).unwrap();
        assert!(cat.add_chromosome("chr1", &[], 0).is_err());
        std::fs::remove_file(&path).ok();
    }
}
