//! A minimal VCF line cursor.
//!
//! This is intentionally thin: tab-split fields, a diploid `GT` genotype
//! parse, multi-allelic expansion into individual alt alleles. It exists
//! so the ingest merge has a real, working collaborator to drive; it is
//! not a hardened VCF parser (no header validation, no INFO/FORMAT
//! beyond `GT`, no structural-variant or multi-sample FORMAT reordering).

use memchr::memchr;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Result, TdbError};

/// A single sample's genotype call relative to one specific alt allele.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    HomRef,
    Het,
    HomAlt,
    Missing,
}

/// One (position, ref, alt) allele expanded out of a (possibly
/// multi-allelic) VCF record, with each input sample's carrier status
/// for that specific alt.
#[derive(Debug, Clone)]
pub struct AlleleRecord {
    pub position: u32,
    pub reference: String,
    pub alternate: String,
    pub carriers: Vec<Carrier>,
}

/// Source of sorted-by-position variant records for one chromosome at a
/// time; the ingest merge drives N of these concurrently.
pub trait VariantStream {
    fn sample_names(&self) -> &[String];
    /// Chromosome of the next unconsumed record, or `None` if exhausted.
    fn current_chromosome(&self) -> Option<String>;
    /// Pop the next allele if its chromosome is `chrom`. Returns `Ok(None)`
    /// once every record for `chrom` has been consumed (whether or not
    /// more chromosomes follow).
    fn next_in_chromosome(&mut self, chrom: &str) -> Result<Option<AlleleRecord>>;
}

/// A [`VariantStream`] reading from a single VCF file.
pub struct VcfReader {
    lines: BufReader<File>,
    samples: Vec<String>,
    /// Alleles expanded from the most recently read line, in ascending
    /// order, held back to front so `pop()` yields them ascending.
    pending: Vec<AlleleRecord>,
    pending_chrom: Option<String>,
    path_for_errors: String,
    exhausted: bool,
}

impl VcfReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)
            .map_err(|e| TdbError::VcfParseFailed(format!("{}: {e}", path_ref.display())))?;
        let mut reader = Self {
            lines: BufReader::new(file),
            samples: Vec::new(),
            pending: Vec::new(),
            pending_chrom: None,
            path_for_errors: path_ref.display().to_string(),
            exhausted: false,
        };
        reader.read_header()?;
        reader.advance_line()?;
        Ok(reader)
    }

    fn read_header(&mut self) -> Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.lines.read_line(&mut line)?;
            if n == 0 {
                return Err(TdbError::VcfParseFailed(format!(
                    "{}: no #CHROM header line found",
                    self.path_for_errors
                )));
            }
            if line.starts_with("##") {
                continue;
            }
            if let Some(rest) = line.trim_end().strip_prefix("#CHROM") {
                let fields: Vec<&str> = rest.split('\t').filter(|f| !f.is_empty()).collect();
                // Standard columns after #CHROM: POS ID REF ALT QUAL FILTER INFO FORMAT, then samples.
                self.samples = fields.iter().skip(8).map(|s| s.to_string()).collect();
                return Ok(());
            }
            return Err(TdbError::VcfParseFailed(format!(
                "{}: expected #CHROM header line",
                self.path_for_errors
            )));
        }
    }

    /// Parse the next data line (skipping blanks), expanding multi-allelic
    /// ALT fields and loading `self.pending` in pop-ascending order.
    fn advance_line(&mut self) -> Result<()> {
        self.pending.clear();
        loop {
            let mut line = String::new();
            let n = self.lines.read_line(&mut line)?;
            if n == 0 {
                self.exhausted = true;
                self.pending_chrom = None;
                return Ok(());
            }
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let (chrom, alleles) = self.parse_line(line)?;
            self.pending_chrom = Some(chrom);
            // Push descending so `.pop()` yields ascending alt order.
            let mut alleles = alleles;
            alleles.sort_by(|a, b| b.alternate.cmp(&a.alternate));
            self.pending = alleles;
            return Ok(());
        }
    }

    fn parse_line(&self, line: &str) -> Result<(String, Vec<AlleleRecord>)> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 8 {
            return Err(TdbError::VcfParseFailed(format!(
                "{}: malformed record: {line}",
                self.path_for_errors
            )));
        }
        let chrom = fields[0].to_string();
        let position: u32 = fields[1]
            .parse()
            .map_err(|_| TdbError::VcfParseFailed(format!("{}: bad POS '{}'", self.path_for_errors, fields[1])))?;
        let reference = fields[3].to_string();
        let alts: Vec<&str> = fields[4].split(',').collect();
        let gt_idx = fields
            .get(8)
            .and_then(|fmt| fmt.split(':').position(|f| f == "GT"));
        let sample_fields = &fields[9.min(fields.len())..];

        let mut genotypes: Vec<(u8, u8, bool)> = Vec::with_capacity(sample_fields.len());
        for sample in sample_fields {
            let gt_raw = match gt_idx {
                Some(i) => sample.split(':').nth(i).unwrap_or("."),
                None => sample,
            };
            genotypes.push(parse_genotype(gt_raw));
        }

        let mut out = Vec::with_capacity(alts.len());
        for (alt_idx, alt) in alts.iter().enumerate() {
            let allele_number = (alt_idx + 1) as u8;
            let carriers = genotypes
                .iter()
                .map(|&(a, b, missing)| {
                    if missing {
                        Carrier::Missing
                    } else {
                        let hits = (a == allele_number) as u8 + (b == allele_number) as u8;
                        match hits {
                            0 => Carrier::HomRef,
                            1 => Carrier::Het,
                            _ => Carrier::HomAlt,
                        }
                    }
                })
                .collect();
            out.push(AlleleRecord {
                position,
                reference: reference.clone(),
                alternate: (*alt).to_string(),
                carriers,
            });
        }
        Ok((chrom, out))
    }
}

/// Parse a `GT` field like `0/1`, `1|1`, `./.`, `2/1` into (allele_a,
/// allele_b, is_missing). Allele `0` is the reference.
fn parse_genotype(gt: &str) -> (u8, u8, bool) {
    let sep = memchr(b'/', gt.as_bytes())
        .or_else(|| memchr(b'|', gt.as_bytes()));
    let (left, right) = match sep {
        Some(i) => (&gt[..i], &gt[i + 1..]),
        None => (gt, gt),
    };
    if left == "." || right == "." || left.is_empty() {
        return (0, 0, true);
    }
    let a = left.parse().unwrap_or(0);
    let b = right.parse().unwrap_or(0);
    (a, b, false)
}

impl VariantStream for VcfReader {
    fn sample_names(&self) -> &[String] {
        &self.samples
    }

    fn current_chromosome(&self) -> Option<String> {
        self.pending_chrom.clone()
    }

    fn next_in_chromosome(&mut self, chrom: &str) -> Result<Option<AlleleRecord>> {
        if self.pending_chrom.as_deref() != Some(chrom) {
            return Ok(None);
        }
        let rec = self.pending.pop();
        if self.pending.is_empty() {
            self.advance_line()?;
        }
        Ok(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_vcf(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn reads_samples_and_single_alt_record() {
        let vcf = write_vcf(
            "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\ts2\n\
             chr1\t100\t.\tA\tC\t.\t.\t.\tGT\t0/1\t1/1\n",
        );
        let mut reader = VcfReader::open(vcf.path()).unwrap();
        assert_eq!(reader.sample_names(), &["s1".to_string(), "s2".to_string()]);
        assert_eq!(reader.current_chromosome(), Some("chr1".to_string()));
        let rec = reader.next_in_chromosome("chr1").unwrap().unwrap();
        assert_eq!(rec.position, 100);
        assert_eq!(rec.carriers, vec![Carrier::Het, Carrier::HomAlt]);
        assert!(reader.next_in_chromosome("chr1").unwrap().is_none());
    }

    #[test]
    fn multi_allelic_expands_in_ascending_alt_order() {
        let vcf = write_vcf(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\n\
             chr1\t50\t.\tA\tC,G,T\t.\t.\t.\tGT\t2/3\n",
        );
        let mut reader = VcfReader::open(vcf.path()).unwrap();
        let a = reader.next_in_chromosome("chr1").unwrap().unwrap();
        let b = reader.next_in_chromosome("chr1").unwrap().unwrap();
        let c = reader.next_in_chromosome("chr1").unwrap().unwrap();
        assert_eq!([a.alternate, b.alternate, c.alternate], ["C", "G", "T"]);
        assert_eq!(a.carriers[0], Carrier::HomRef);
        assert_eq!(b.carriers[0], Carrier::Het);
        assert_eq!(c.carriers[0], Carrier::Het);
    }

    #[test]
    fn missing_genotype_is_missing_not_hom_ref() {
        let vcf = write_vcf(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\n\
             chr1\t1\t.\tA\tC\t.\t.\t.\tGT\t./.\n",
        );
        let mut reader = VcfReader::open(vcf.path()).unwrap();
        let rec = reader.next_in_chromosome("chr1").unwrap().unwrap();
        assert_eq!(rec.carriers, vec![Carrier::Missing]);
    }
}
