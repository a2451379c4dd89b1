//! K-way merge ingest: combine N sorted variant streams into a database.
//!
//! Streams are merged one chromosome at a time. Within a chromosome, a
//! min-heap orders pending alleles by `(position, ref, alt)`; repeated
//! pops of an identical key merge into the same canonical variant ordinal
//! instead of creating a duplicate, exactly as multiple input files
//! covering overlapping samples at the same site should.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::bitmap::Bitmap;
use crate::catalog::{Catalog, ChromRecord, GenomeRecord, IndelInterner};
use crate::config::{self, GenotypeFilter};
use crate::error::{Result, TdbError};
use crate::variant::{snv_type, Variant};
use crate::vcf::{AlleleRecord, Carrier, VariantStream};

/// Summary of what a build produced, for CLI reporting.
pub struct IngestSummary {
    pub chromosomes: Vec<String>,
    pub samples: Vec<String>,
}

/// Build a new database at `db_path` by k-way merging `streams`.
pub fn build_database(
    db_path: impl AsRef<Path>,
    mut streams: Vec<Box<dyn VariantStream>>,
) -> Result<IngestSummary> {
    if streams.is_empty() {
        return Err(TdbError::BuildNoInputs);
    }

    let mut all_samples: Vec<String> = Vec::new();
    let mut global_index: Vec<Vec<usize>> = Vec::with_capacity(streams.len());
    let mut seen: FxHashSet<String> = FxHashSet::default();
    for stream in &streams {
        let mut idxs = Vec::with_capacity(stream.sample_names().len());
        for name in stream.sample_names() {
            if !seen.insert(name.clone()) {
                return Err(TdbError::DuplicateSample(name.clone()));
            }
            idxs.push(all_samples.len());
            all_samples.push(name.clone());
        }
        global_index.push(idxs);
    }

    let mut catalog = Catalog::create(db_path)?;
    for name in &all_samples {
        catalog.add_genome(name)?;
    }
    let genome_records: Vec<GenomeRecord> = all_samples
        .iter()
        .map(|n| catalog.find_genome(n).expect("just inserted"))
        .collect();

    let mut chromosome_order: Vec<String> = Vec::new();
    let mut closed: FxHashSet<String> = FxHashSet::default();

    loop {
        let mut candidate: Option<String> = None;
        for s in &streams {
            if let Some(c) = s.current_chromosome() {
                candidate = Some(match candidate {
                    Some(best) if best <= c => best,
                    _ => c,
                });
            }
        }
        let chrom = match candidate {
            Some(c) => c,
            None => break,
        };

        if closed.contains(&chrom) {
            return Err(TdbError::VcfParseFailed(format!(
                "chromosome {chrom} reappeared after its block was already closed; \
                 every input stream must present a chromosome's records contiguously"
            )));
        }

        process_chromosome(&mut catalog, &mut streams, &global_index, &genome_records, &chrom)?;
        closed.insert(chrom.clone());
        chromosome_order.push(chrom);
    }

    catalog.flush()?;
    Ok(IngestSummary {
        chromosomes: chromosome_order,
        samples: all_samples,
    })
}

#[derive(Clone)]
struct HeapItem {
    position: u32,
    reference: String,
    alternate: String,
    stream: usize,
    carriers: Vec<Carrier>,
}

impl HeapItem {
    fn key(&self) -> (u32, &str, &str) {
        (self.position, &self.reference, &self.alternate)
    }
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for HeapItem {}
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

fn push_next(streams: &mut [Box<dyn VariantStream>], heap: &mut BinaryHeap<Reverse<HeapItem>>, stream: usize, chrom: &str) -> Result<()> {
    if let Some(rec) = streams[stream].next_in_chromosome(chrom)? {
        heap.push(Reverse(HeapItem {
            position: rec.position,
            reference: rec.reference,
            alternate: rec.alternate,
            stream,
            carriers: rec.carriers,
        }));
    }
    Ok(())
}

fn carrier_is_present(filter: GenotypeFilter, carrier: Carrier) -> bool {
    match (filter, carrier) {
        (_, Carrier::Missing) | (_, Carrier::HomRef) => false,
        (GenotypeFilter::HomozygousAltOnly, Carrier::Het) => false,
        (_, Carrier::Het) | (_, Carrier::HomAlt) => true,
    }
}

fn process_chromosome(
    catalog: &mut Catalog,
    streams: &mut [Box<dyn VariantStream>],
    global_index: &[Vec<usize>],
    genome_records: &[GenomeRecord],
    chrom: &str,
) -> Result<()> {
    let mut heap: BinaryHeap<Reverse<HeapItem>> = BinaryHeap::new();
    for i in 0..streams.len() {
        push_next(streams, &mut heap, i, chrom)?;
    }

    let filter = config::genotype_filter();
    let mut variants: Vec<Variant> = Vec::new();
    let mut bitmaps: FxHashMap<usize, Bitmap> = FxHashMap::default();
    let mut interner = IndelInterner::new();
    let mut previous_key: Option<(u32, String, String)> = None;
    let mut current_ordinal: Option<u64> = None;

    while let Some(Reverse(item)) = heap.pop() {
        let key = (item.position, item.reference.clone(), item.alternate.clone());
        if previous_key.as_ref() != Some(&key) {
            let kind = snv_type(&item.reference, &item.alternate);
            let include = match filter {
                GenotypeFilter::SnvOnly => !kind.is_indel(),
                GenotypeFilter::IndelOnly => kind.is_indel(),
                _ => true,
            };
            current_ordinal = if include {
                let allele_offset = if kind.is_indel() {
                    Some(interner.intern(catalog, &item.reference, &item.alternate)?)
                } else {
                    None
                };
                variants.push(Variant {
                    position: item.position,
                    kind,
                    allele_offset,
                });
                Some(variants.len() as u64 - 1)
            } else {
                None
            };
            previous_key = Some(key);
        }

        if let Some(ordinal) = current_ordinal {
            for (local_idx, carrier) in item.carriers.iter().enumerate() {
                if carrier_is_present(filter, *carrier) {
                    let global = global_index[item.stream][local_idx];
                    bitmaps.entry(global).or_default().set_bit(ordinal)?;
                }
            }
        }

        push_next(streams, &mut heap, item.stream, chrom)?;
    }

    let chrom_off = catalog.add_chromosome(chrom, &variants, 0)?;
    let chrom_rec: ChromRecord = catalog
        .find_chromosome(chrom)
        .filter(|c| c.offset == chrom_off)
        .expect("just inserted");

    for (global, genome) in genome_records.iter().enumerate() {
        let mut bm = bitmaps.remove(&global).unwrap_or_default();
        while bm.bit_len() < variants.len() as u64 {
            bm.append_bit(false);
        }
        catalog.add_bitmap(&chrom_rec, genome, &bm)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcf::VcfReader;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_vcf(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    fn temp_db_path() -> std::path::PathBuf {
        let f = NamedTempFile::new().unwrap();
        let path = f.path().to_path_buf();
        drop(f);
        std::fs::remove_file(&path).ok();
        path
    }

    #[test]
    #[serial]
    fn merges_two_files_sharing_a_variant() {
        config::set_genotype_filter(GenotypeFilter::AllNonRef);
        let vcf_a = write_vcf(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsampleA\n\
             chr1\t100\t.\tA\tC\t.\t.\t.\tGT\t0/1\n\
             chr1\t200\t.\tG\tT\t.\t.\t.\tGT\t0/0\n",
        );
        let vcf_b = write_vcf(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsampleB\n\
             chr1\t100\t.\tA\tC\t.\t.\t.\tGT\t1/1\n",
        );
        let streams: Vec<Box<dyn VariantStream>> = vec![
            Box::new(VcfReader::open(vcf_a.path()).unwrap()),
            Box::new(VcfReader::open(vcf_b.path()).unwrap()),
        ];
        let path = temp_db_path();
        let summary = build_database(&path, streams).unwrap();
        assert_eq!(summary.chromosomes, vec!["chr1".to_string()]);
        assert_eq!(summary.samples, vec!["sampleA".to_string(), "sampleB".to_string()]);

        let cat = Catalog::open(&path).unwrap();
        let chrom = cat.find_chromosome("chr1").unwrap();
        let vs = cat.read_variants(&chrom);
        assert_eq!(vs.len(), 2);

        let sample_a = cat.find_genome("sampleA").unwrap();
        let sample_b = cat.find_genome("sampleB").unwrap();
        let bm_a = cat.get_bitmap(&chrom, &sample_a).unwrap();
        let bm_b = cat.get_bitmap(&chrom, &sample_b).unwrap();
        assert!(bm_a.get_bit(0));
        assert!(!bm_a.get_bit(1));
        assert!(bm_b.get_bit(0));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn duplicate_sample_name_across_files_is_rejected() {
        let vcf_a = write_vcf(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsampleA\n\
             chr1\t100\t.\tA\tC\t.\t.\t.\tGT\t0/1\n",
        );
        let vcf_b = write_vcf(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsampleA\n\
             chr1\t100\t.\tA\tC\t.\t.\t.\tGT\t1/1\n",
        );
        let streams: Vec<Box<dyn VariantStream>> = vec![
            Box::new(VcfReader::open(vcf_a.path()).unwrap()),
            Box::new(VcfReader::open(vcf_b.path()).unwrap()),
        ];
        let path = temp_db_path();
        assert!(build_database(&path, streams).is_err());
    }

    #[test]
    #[serial]
    fn homozygous_alt_only_filter_drops_het_calls() {
        config::set_genotype_filter(GenotypeFilter::HomozygousAltOnly);
        let vcf = write_vcf(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsampleA\n\
             chr1\t100\t.\tA\tC\t.\t.\t.\tGT\t0/1\n",
        );
        let streams: Vec<Box<dyn VariantStream>> = vec![Box::new(VcfReader::open(vcf.path()).unwrap())];
        let path = temp_db_path();
        build_database(&path, streams).unwrap();
        let cat = Catalog::open(&path).unwrap();
        let chrom = cat.find_chromosome("chr1").unwrap();
        let sample = cat.find_genome("sampleA").unwrap();
        let bm = cat.get_bitmap(&chrom, &sample).unwrap();
        assert!(!bm.get_bit(0));
        config::set_genotype_filter(GenotypeFilter::AllNonRef);
        std::fs::remove_file(&path).ok();
    }
}
