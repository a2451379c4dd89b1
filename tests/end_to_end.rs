//! End-to-end coverage: build a database from VCF inputs, then query,
//! slice, and measure distance over it through the public API.

use std::io::Write;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::NamedTempFile;
use tersect_rs::catalog::Catalog;
use tersect_rs::config::{self, GenotypeFilter};
use tersect_rs::distance;
use tersect_rs::ingest::build_database;
use tersect_rs::query::{self, LoadedGenomes};
use tersect_rs::slice;
use tersect_rs::vcf::{VariantStream, VcfReader};

fn write_vcf(contents: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

fn temp_db_path() -> PathBuf {
    let f = NamedTempFile::new().unwrap();
    let path = f.path().to_path_buf();
    drop(f);
    std::fs::remove_file(&path).ok();
    path
}

fn build_cohort() -> PathBuf {
    config::set_genotype_filter(GenotypeFilter::AllNonRef);
    let a = write_vcf(
        "##fileformat=VCFv4.2\n\
         #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\ts2\n\
         chr1\t100\t.\tA\tC\t.\t.\t.\tGT\t0/1\t0/0\n\
         chr1\t200\t.\tG\tT,A\t.\t.\t.\tGT\t1/2\t0/0\n\
         chr2\t50\t.\tC\tCA\t.\t.\t.\tGT\t1/1\t0/1\n",
    );
    let b = write_vcf(
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts3\n\
         chr1\t100\t.\tA\tC\t.\t.\t.\tGT\t1/1\n\
         chr1\t300\t.\tG\tA\t.\t.\t.\tGT\t0/1\n\
         chr2\t50\t.\tC\tCA\t.\t.\t.\tGT\t0/0\n",
    );
    let streams: Vec<Box<dyn VariantStream>> = vec![
        Box::new(VcfReader::open(a.path()).unwrap()),
        Box::new(VcfReader::open(b.path()).unwrap()),
    ];
    let path = temp_db_path();
    let summary = build_database(&path, streams).unwrap();
    assert_eq!(summary.samples, vec!["s1".to_string(), "s2".to_string(), "s3".to_string()]);
    assert_eq!(summary.chromosomes, vec!["chr1".to_string(), "chr2".to_string()]);
    path
}

#[test]
#[serial]
fn merges_multiple_files_and_lists_chromosomes_and_samples() {
    let path = build_cohort();
    let catalog = Catalog::open(&path).unwrap();

    let chroms: Vec<String> = catalog
        .chromosomes()
        .iter()
        .map(|c| catalog.chromosome_name(c))
        .collect();
    assert!(chroms.contains(&"chr1".to_string()));
    assert!(chroms.contains(&"chr2".to_string()));

    let chr1 = catalog.find_chromosome("chr1").unwrap();
    // 100/A/C, 200/G/T, 200/G/A, 300/G/A — four distinct alleles
    assert_eq!(chr1.variant_count, 4);

    std::fs::remove_file(&path).ok();
}

#[test]
#[serial]
fn set_algebra_query_matches_expected_carriers() {
    let path = build_cohort();
    let catalog = Catalog::open(&path).unwrap();
    let chrom = catalog.find_chromosome("chr1").unwrap();

    // s1 is het at 100/A/C, s3 is hom-alt at the same site: union and
    // intersection should both include it, difference should not.
    let union_ast = query::parse("s1 | s3").unwrap();
    let loaded = LoadedGenomes::load(&catalog, &chrom, &union_ast.genome_names()).unwrap();
    let union = union_ast.eval(&loaded, 0, chrom.variant_count as u64).unwrap();
    assert!(union.get_bit(0));

    let inter_ast = query::parse("s1 & s3").unwrap();
    let loaded2 = LoadedGenomes::load(&catalog, &chrom, &inter_ast.genome_names()).unwrap();
    let inter = inter_ast.eval(&loaded2, 0, chrom.variant_count as u64).unwrap();
    assert!(inter.get_bit(0));

    let diff_ast = query::parse("s1 - s3").unwrap();
    let loaded3 = LoadedGenomes::load(&catalog, &chrom, &diff_ast.genome_names()).unwrap();
    let diff = diff_ast.eval(&loaded3, 0, chrom.variant_count as u64).unwrap();
    assert!(!diff.get_bit(0));

    std::fs::remove_file(&path).ok();
}

#[test]
#[serial]
fn region_slicing_restricts_to_base_pair_window() {
    let path = build_cohort();
    let catalog = Catalog::open(&path).unwrap();
    let chrom = catalog.find_chromosome("chr1").unwrap();

    // Window [1, 250) should cover ordinals for positions 100 and 200
    // (two alleles at 200) but not 300.
    let interval = slice::region_to_interval(&catalog, &chrom, 1, 250).unwrap();
    assert_eq!(interval.len(), 3);

    let region = slice::parse_region("chr1:1-250").unwrap();
    assert_eq!(region.chromosome, "chr1");
    assert_eq!(region.bounds, Some((0, 250)));

    std::fs::remove_file(&path).ok();
}

#[test]
#[serial]
fn distance_matrix_is_symmetric_with_zero_diagonal() {
    let path = build_cohort();
    let catalog = Catalog::open(&path).unwrap();
    let chrom = catalog.find_chromosome("chr1").unwrap();
    let names = vec!["s1".to_string(), "s2".to_string(), "s3".to_string()];

    let matrix = distance::build(&catalog, &chrom, 0, chrom.variant_count as u64, &names, &names).unwrap();
    for i in 0..names.len() {
        assert_eq!(matrix.values[i][i], 0);
        for j in 0..names.len() {
            assert_eq!(matrix.values[i][j], matrix.values[j][i]);
        }
    }

    std::fs::remove_file(&path).ok();
}

#[test]
#[serial]
fn rename_genome_persists_across_reopen() {
    let path = build_cohort();
    {
        let mut catalog = Catalog::open(&path).unwrap();
        catalog.rename_genome("s2", "sample_two").unwrap();
        catalog.flush().unwrap();
    }
    let catalog = Catalog::open(&path).unwrap();
    assert!(catalog.find_genome("s2").is_none());
    assert!(catalog.find_genome("sample_two").is_some());

    std::fs::remove_file(&path).ok();
}

#[test]
fn reappearing_chromosome_across_non_interleaved_streams_is_rejected() {
    let a = write_vcf(
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsA\n\
         chr1\t10\t.\tA\tC\t.\t.\t.\tGT\t0/1\n\
         chr2\t10\t.\tA\tC\t.\t.\t.\tGT\t0/1\n\
         chr1\t20\t.\tA\tC\t.\t.\t.\tGT\t0/1\n",
    );
    let streams: Vec<Box<dyn VariantStream>> = vec![Box::new(VcfReader::open(a.path()).unwrap())];
    let path = temp_db_path();
    let err = build_database(&path, streams).unwrap_err();
    assert!(err.to_string().contains("chr1"));
}
