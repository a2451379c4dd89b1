//! Region and bin slicing: translating a `(chromosome, start_bp, end_bp)`
//! range into a variant-ordinal interval, and splitting that interval
//! into equal-width bins.

use crate::catalog::{Catalog, ChromRecord};
use crate::error::{Result, TdbError};

/// A half-open `[start, end)` ordinal interval into a chromosome's
/// variant array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Translate a base-pair range on `chrom` into the ordinal interval of
/// variants whose position falls within `[start_bp, end_bp)`. Uses a
/// linear scan over the (position-sorted) variant array.
pub fn region_to_interval(catalog: &Catalog, chrom: &ChromRecord, start_bp: u32, end_bp: u32) -> Result<Interval> {
    if start_bp >= end_bp {
        return Err(TdbError::BadRegionBounds(format!(
            "region start {start_bp} must be less than end {end_bp}"
        )));
    }
    let variants = catalog.read_variants(chrom);
    let start = variants.partition_point(|v| v.position < start_bp) as u64;
    let end = variants.partition_point(|v| v.position < end_bp) as u64;
    Ok(Interval { start, end })
}

/// Split `interval` into `bin_count` equal-width ordinal bins (the last
/// bin absorbs any remainder).
pub fn bins(interval: Interval, bin_count: u64) -> Vec<Interval> {
    if bin_count == 0 || interval.is_empty() {
        return Vec::new();
    }
    let total = interval.len();
    let width = total / bin_count;
    let mut out = Vec::with_capacity(bin_count as usize);
    let mut cursor = interval.start;
    for i in 0..bin_count {
        let end = if i == bin_count - 1 {
            interval.end
        } else {
            cursor + width
        };
        out.push(Interval { start: cursor, end });
        cursor = end;
    }
    out
}

/// Parse a region string: either a bare chromosome name (the whole
/// chromosome) or `CHR:START-END` (1-based, inclusive, per VCF/BED-like
/// convention — converted here to the half-open `[start-1, end)` form
/// the rest of the engine uses).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub chromosome: String,
    pub bounds: Option<(u32, u32)>,
}

pub fn parse_region(input: &str) -> Result<Region> {
    match input.split_once(':') {
        None => Ok(Region {
            chromosome: input.to_string(),
            bounds: None,
        }),
        Some((chrom, range)) => {
            if chrom.is_empty() {
                return Err(TdbError::BadRegion(input.to_string()));
            }
            let (start_s, end_s) = range
                .split_once('-')
                .ok_or_else(|| TdbError::BadRegion(input.to_string()))?;
            let start: u32 = start_s
                .parse()
                .map_err(|_| TdbError::BadRegion(input.to_string()))?;
            let end: u32 = end_s
                .parse()
                .map_err(|_| TdbError::BadRegion(input.to_string()))?;
            if start == 0 || start > end {
                return Err(TdbError::BadRegionBounds(input.to_string()));
            }
            Ok(Region {
                chromosome: chrom.to_string(),
                bounds: Some((start - 1, end)),
            })
        }
    }
}
