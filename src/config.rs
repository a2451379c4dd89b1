//! Global configuration for ingest-time runtime behavior.
//!
//! This module provides thread-safe global configuration that affects
//! parsing semantics without adding overhead to hot loops.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Which genotypes count as "present" when a VCF record is merged into a
/// bitmap during ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenotypeFilter {
    /// Only homozygous-alt genotypes (`1/1`) set a bit.
    HomozygousAltOnly,
    /// Any non-reference genotype (`0/1`, `1/1`, `1/2`, ...) sets a bit.
    AllNonRef,
    /// Only SNV alleles are ingested; indels are skipped entirely.
    SnvOnly,
    /// Only indel alleles are ingested; SNVs are skipped entirely.
    IndelOnly,
}

impl GenotypeFilter {
    fn to_code(self) -> u8 {
        match self {
            GenotypeFilter::HomozygousAltOnly => 0,
            GenotypeFilter::AllNonRef => 1,
            GenotypeFilter::SnvOnly => 2,
            GenotypeFilter::IndelOnly => 3,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            0 => GenotypeFilter::HomozygousAltOnly,
            2 => GenotypeFilter::SnvOnly,
            3 => GenotypeFilter::IndelOnly,
            _ => GenotypeFilter::AllNonRef,
        }
    }
}

/// Global genotype filter, set once at ingest startup and read on the
/// merge hot path. The atomic load has negligible overhead compared to
/// the surrounding allele comparison work.
static GENOTYPE_FILTER: AtomicU8 = AtomicU8::new(1); // AllNonRef

/// Whether opening a database should refuse a mismatched on-disk word
/// size rather than trusting the caller's platform.
static WORD_SIZE_CHECK: AtomicBool = AtomicBool::new(true);

#[inline]
pub fn set_genotype_filter(filter: GenotypeFilter) {
    GENOTYPE_FILTER.store(filter.to_code(), Ordering::Release);
}

#[inline]
pub fn genotype_filter() -> GenotypeFilter {
    GenotypeFilter::from_code(GENOTYPE_FILTER.load(Ordering::Acquire))
}

#[inline]
pub fn set_word_size_check(enabled: bool) {
    WORD_SIZE_CHECK.store(enabled, Ordering::Release);
}

#[inline]
pub fn word_size_check() -> bool {
    WORD_SIZE_CHECK.load(Ordering::Acquire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn default_filter_is_all_non_ref() {
        set_genotype_filter(GenotypeFilter::AllNonRef);
        assert_eq!(genotype_filter(), GenotypeFilter::AllNonRef);
    }

    #[test]
    #[serial]
    fn filter_round_trips_through_global_state() {
        set_genotype_filter(GenotypeFilter::HomozygousAltOnly);
        assert_eq!(genotype_filter(), GenotypeFilter::HomozygousAltOnly);
        set_genotype_filter(GenotypeFilter::SnvOnly);
        assert_eq!(genotype_filter(), GenotypeFilter::SnvOnly);
        set_genotype_filter(GenotypeFilter::AllNonRef);
    }

    #[test]
    #[serial]
    fn word_size_check_defaults_on() {
        set_word_size_check(true);
        assert!(word_size_check());
        set_word_size_check(false);
        assert!(!word_size_check());
        set_word_size_check(true);
    }
}
