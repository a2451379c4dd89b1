//! Pairwise Hamming distance matrix over genome bitmaps.

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::bitmap::{hamming_distance, Bitmap};
use crate::catalog::{Catalog, ChromRecord};
use crate::error::{Result, TdbError};

/// A (possibly rectangular) distance matrix between two sample lists
/// over one region.
pub struct DistanceMatrix {
    pub rows: Vec<String>,
    pub cols: Vec<String>,
    pub values: Vec<Vec<u64>>,
}

fn load_bitmaps(catalog: &Catalog, chrom: &ChromRecord, names: &[String]) -> Result<FxHashMap<String, Bitmap>> {
    let mut out = FxHashMap::default();
    for name in names {
        if out.contains_key(name) {
            continue;
        }
        let genome = catalog
            .find_genome(name)
            .ok_or_else(|| TdbError::NoSuchSample(name.clone()))?;
        let bm = catalog.get_bitmap(chrom, &genome).unwrap_or_default();
        out.insert(name.clone(), bm);
    }
    Ok(out)
}

/// Build the distance matrix between `row_samples` and `col_samples`
/// restricted to `[start, end)`. When the two slices are the literal
/// same allocation (`row_samples` and `col_samples` passed as the same
/// value), only the upper triangle is computed and mirrored, and the
/// diagonal is reported as zero without touching the bitmaps.
pub fn build(
    catalog: &Catalog,
    chrom: &ChromRecord,
    start: u64,
    end: u64,
    row_samples: &[String],
    col_samples: &[String],
) -> Result<DistanceMatrix> {
    let symmetric = std::ptr::eq(row_samples, col_samples);

    let mut all_names = row_samples.to_vec();
    all_names.extend_from_slice(col_samples);
    let bitmaps = load_bitmaps(catalog, chrom, &all_names)?;

    let row_views: Vec<_> = row_samples
        .iter()
        .map(|n| bitmaps.get(n).expect("loaded above").view(start, end))
        .collect();
    let col_views: Vec<_> = col_samples
        .iter()
        .map(|n| bitmaps.get(n).expect("loaded above").view(start, end))
        .collect();

    let mut values: Vec<Vec<u64>> = vec![vec![0u64; col_samples.len()]; row_samples.len()];

    values
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, row_out)| {
            let lo = if symmetric { i } else { 0 };
            for j in lo..col_samples.len() {
                let d = if symmetric && i == j {
                    0
                } else {
                    hamming_distance(&row_views[i], &col_views[j])
                };
                row_out[j] = d;
            }
        });

    if symmetric {
        for i in 0..row_samples.len() {
            for j in 0..i {
                values[i][j] = values[j][i];
            }
        }
    }

    Ok(DistanceMatrix {
        rows: row_samples.to_vec(),
        cols: col_samples.to_vec(),
        values,
    })
}

impl DistanceMatrix {
    /// Render as a phylip-style distance matrix, valid for the symmetric
    /// (rows == cols) case.
    pub fn to_phylip(&self) -> String {
        let mut buf = itoa::Buffer::new();
        let mut out = format!("{}\n", self.rows.len());
        for (i, name) in self.rows.iter().enumerate() {
            out.push_str(name);
            for value in &self.values[i] {
                out.push('\t');
                out.push_str(buf.format(*value));
            }
            out.push('\n');
        }
        out
    }

    /// Render as a minimal JSON object, for the general rectangular case.
    pub fn to_json(&self) -> String {
        let mut buf = itoa::Buffer::new();
        let mut out = String::from("{\"rows\":[");
        write_json_strings(&mut out, &self.rows);
        out.push_str("],\"cols\":[");
        write_json_strings(&mut out, &self.cols);
        out.push_str("],\"values\":[");
        for (i, row) in self.values.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push('[');
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    out.push(',');
                }
                out.push_str(buf.format(*value));
            }
            out.push(']');
        }
        out.push_str("]}");
        out
    }
}

fn write_json_strings(out: &mut String, names: &[String]) {
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('"');
        out.push_str(name);
        out.push('"');
    }
}

/// Bin-mode distance: one matrix per bin, sharing the same sample lists.
pub fn build_binned(
    catalog: &Catalog,
    chrom: &ChromRecord,
    bins: &[crate::slice::Interval],
    row_samples: &[String],
    col_samples: &[String],
) -> Result<Vec<DistanceMatrix>> {
    bins.iter()
        .map(|bin| build(catalog, chrom, bin.start, bin.end, row_samples, col_samples))
        .collect()
}
