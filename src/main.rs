// Clippy allows
#![allow(clippy::too_many_arguments)]

//! tersect: query and build compact variant databases.
//!
//! Usage: tersect <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;

use tersect_rs::catalog::Catalog;
use tersect_rs::config::{self, GenotypeFilter};
use tersect_rs::error::{Result, TdbError};
use tersect_rs::ingest::build_database;
use tersect_rs::query::{self, LoadedGenomes};
use tersect_rs::slice::{self, Interval};
use tersect_rs::distance;
use tersect_rs::vcf::{VariantStream, VcfReader};

#[derive(Parser)]
#[command(name = "tersect")]
#[command(version)]
#[command(about = "Compact indexed storage and set-algebra queries over biallelic variants", long_about = None)]
struct Cli {
    /// Number of threads to use (default: number of CPUs)
    #[arg(long, short = 't', global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum GenotypeFilterArg {
    HomAlt,
    AllNonRef,
    SnvOnly,
    IndelOnly,
}

impl From<GenotypeFilterArg> for GenotypeFilter {
    fn from(a: GenotypeFilterArg) -> Self {
        match a {
            GenotypeFilterArg::HomAlt => GenotypeFilter::HomozygousAltOnly,
            GenotypeFilterArg::AllNonRef => GenotypeFilter::AllNonRef,
            GenotypeFilterArg::SnvOnly => GenotypeFilter::SnvOnly,
            GenotypeFilterArg::IndelOnly => GenotypeFilter::IndelOnly,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DistFormat {
    Phylip,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a new database by k-way merging one or more sorted VCF files
    Build {
        /// Input VCF files, each sorted by position within a chromosome
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Path of the database file to create
        #[arg(short, long)]
        output: PathBuf,

        /// Which genotypes count as "present" in a genome's bitmap
        #[arg(long, value_enum, default_value = "all-non-ref")]
        genotype_filter: GenotypeFilterArg,

        /// Skip the on-disk word-size check when later opening this database
        /// on a platform with a different native word size
        #[arg(long)]
        allow_word_size_mismatch: bool,
    },

    /// List the chromosomes stored in a database
    Chroms {
        /// Database file
        db: PathBuf,
    },

    /// List the genome (sample) names stored in a database
    Samples {
        /// Database file
        db: PathBuf,

        /// Only list names matching this `*`-wildcard pattern
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Evaluate a set-algebra query over genomes and print matching variants
    View {
        /// Database file
        db: PathBuf,

        /// Query expression, e.g. "sampleA & sampleB", "sampleA - (sampleB | sampleC)"
        query: String,

        /// Region to restrict the query to: `CHR` or `CHR:START-END` (1-based, inclusive)
        #[arg(short, long)]
        region: String,
    },

    /// Compute a pairwise Hamming distance matrix between genomes
    Dist {
        /// Database file
        db: PathBuf,

        /// Region(s) to compute over: `CHR` or `CHR:START-END`
        #[arg(short, long = "region", required = true, num_args = 1..)]
        regions: Vec<String>,

        /// `*`-wildcard pattern selecting the row genomes
        #[arg(long, default_value = "*")]
        rows: String,

        /// `*`-wildcard pattern selecting the column genomes (defaults to
        /// the row pattern, producing a symmetric matrix)
        #[arg(long)]
        cols: Option<String>,

        /// Split each region into this many equal-width bins (requires
        /// exactly one region)
        #[arg(long)]
        bins: Option<u64>,

        /// Output format
        #[arg(long, value_enum, default_value = "phylip")]
        format: DistFormat,
    },

    /// List genomes that carry every variant in a --contains list
    Contains {
        /// Database file
        db: PathBuf,

        /// Comma-separated `CHR:POS:REF:ALT` entries; a genome is printed
        /// iff it carries every one. A well-formed entry naming a variant
        /// this database doesn't have makes the whole query match nothing.
        variants: String,

        /// Only consider genomes matching this `*`-wildcard pattern
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Rename a genome in place
    Rename {
        /// Database file
        db: PathBuf,

        /// Current genome name
        old_name: String,

        /// New genome name
        new_name: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Some(n) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .expect("failed to initialize thread pool");
    }

    let result = match cli.command {
        Commands::Build {
            inputs,
            output,
            genotype_filter,
            allow_word_size_mismatch,
        } => run_build(inputs, output, genotype_filter, allow_word_size_mismatch),
        Commands::Chroms { db } => run_chroms(db),
        Commands::Samples { db, pattern } => run_samples(db, pattern),
        Commands::View { db, query, region } => run_view(db, query, region),
        Commands::Dist {
            db,
            regions,
            rows,
            cols,
            bins,
            format,
        } => run_dist(db, regions, rows, cols, bins, format),
        Commands::Contains { db, variants, pattern } => run_contains(db, variants, pattern),
        Commands::Rename {
            db,
            old_name,
            new_name,
        } => run_rename(db, old_name, new_name),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_build(
    inputs: Vec<PathBuf>,
    output: PathBuf,
    genotype_filter: GenotypeFilterArg,
    allow_word_size_mismatch: bool,
) -> Result<()> {
    if allow_word_size_mismatch {
        config::set_word_size_check(false);
    }
    config::set_genotype_filter(genotype_filter.into());

    let streams: Result<Vec<Box<dyn VariantStream>>> = inputs
        .iter()
        .map(|p| Ok(Box::new(VcfReader::open(p)?) as Box<dyn VariantStream>))
        .collect();
    let streams = streams?;

    log::info!("building {} from {} input file(s)", output.display(), inputs.len());
    let summary = build_database(&output, streams)?;
    println!(
        "built {} with {} chromosome(s), {} sample(s)",
        output.display(),
        summary.chromosomes.len(),
        summary.samples.len()
    );
    Ok(())
}

fn run_chroms(db: PathBuf) -> Result<()> {
    let catalog = Catalog::open(db)?;
    for chrom in catalog.chromosomes() {
        println!(
            "{}\t{}\t{}",
            catalog.chromosome_name(&chrom),
            chrom.length,
            chrom.variant_count
        );
    }
    Ok(())
}

fn run_samples(db: PathBuf, pattern: Option<String>) -> Result<()> {
    let catalog = Catalog::open(db)?;
    let genomes = match &pattern {
        Some(p) => catalog.genomes_matching(p),
        None => catalog.genomes(),
    };
    for genome in genomes {
        println!("{}", catalog.genome_name(&genome));
    }
    Ok(())
}

fn run_view(db: PathBuf, query_str: String, region_str: String) -> Result<()> {
    let catalog = Catalog::open(db)?;
    let region = slice::parse_region(&region_str)?;
    let chrom = catalog
        .find_chromosome(&region.chromosome)
        .ok_or_else(|| TdbError::NoSuchChromosome(region.chromosome.clone()))?;

    let interval = match region.bounds {
        Some((start_bp, end_bp)) => slice::region_to_interval(&catalog, &chrom, start_bp, end_bp)?,
        None => Interval {
            start: 0,
            end: chrom.variant_count as u64,
        },
    };

    let ast = query::parse(&query_str)?;
    let loaded = LoadedGenomes::load(&catalog, &chrom, &ast.genome_names())?;
    let result = ast.eval(&loaded, interval.start, interval.end)?;

    let variants = catalog.read_variants(&chrom);
    for local in result.set_indices() {
        let global = interval.start + local;
        let v = variants[global as usize];
        match v.kind.ref_alt() {
            Some((r, a)) => println!(
                "{}\t{}\t{}\t{}",
                region.chromosome,
                v.position,
                r as char,
                a as char
            ),
            None => {
                let (r, a) = catalog.indel_text(v.allele_offset.unwrap_or(0));
                println!("{}\t{}\t{r}\t{a}", region.chromosome, v.position);
            }
        }
    }
    Ok(())
}

fn run_contains(db: PathBuf, variants: String, pattern: Option<String>) -> Result<()> {
    let catalog = Catalog::open(db)?;
    let Some(resolved) = catalog.flatten_contains_queries(&variants)? else {
        return Ok(());
    };
    let genomes = match &pattern {
        Some(p) => catalog.genomes_matching(p),
        None => catalog.genomes(),
    };
    for genome in &genomes {
        let carries_all = resolved
            .iter()
            .all(|(chrom, ordinal)| catalog.contains_all_variants(chrom, *ordinal, std::slice::from_ref(genome)));
        if carries_all {
            println!("{}", catalog.genome_name(genome));
        }
    }
    Ok(())
}

fn run_dist(
    db: PathBuf,
    regions: Vec<String>,
    rows_pattern: String,
    cols_pattern: Option<String>,
    bins: Option<u64>,
    format: DistFormat,
) -> Result<()> {
    if bins.is_some() && regions.len() != 1 {
        return Err(TdbError::BinningRequiresSingleRegion);
    }

    let catalog = Catalog::open(db)?;
    let row_genomes = catalog.genomes_matching(&rows_pattern);
    let row_names: Vec<String> = row_genomes.iter().map(|g| catalog.genome_name(g)).collect();
    let col_names = match &cols_pattern {
        Some(p) => catalog
            .genomes_matching(p)
            .iter()
            .map(|g| catalog.genome_name(g))
            .collect(),
        None => row_names.clone(),
    };
    // `col_names` only shares `row_names`'s allocation (and thus triggers the
    // symmetric fast path) when no distinct column pattern was given.
    let cols_ref: &[String] = if cols_pattern.is_none() { &row_names } else { &col_names };

    for region_str in &regions {
        let region = slice::parse_region(region_str)?;
        let chrom = catalog
            .find_chromosome(&region.chromosome)
            .ok_or_else(|| TdbError::NoSuchChromosome(region.chromosome.clone()))?;
        let interval = match region.bounds {
            Some((start_bp, end_bp)) => slice::region_to_interval(&catalog, &chrom, start_bp, end_bp)?,
            None => Interval {
                start: 0,
                end: chrom.variant_count as u64,
            },
        };

        if let Some(bin_count) = bins {
            let bin_list = slice::bins(interval, bin_count);
            let matrices = distance::build_binned(&catalog, &chrom, &bin_list, &row_names, cols_ref)?;
            for (i, matrix) in matrices.iter().enumerate() {
                println!("# {} bin {i}", region.chromosome);
                print_matrix(matrix, format);
            }
        } else {
            let matrix = distance::build(&catalog, &chrom, interval.start, interval.end, &row_names, cols_ref)?;
            println!("# {region_str}");
            print_matrix(&matrix, format);
        }
    }
    Ok(())
}

fn print_matrix(matrix: &distance::DistanceMatrix, format: DistFormat) {
    match format {
        DistFormat::Phylip => print!("{}", matrix.to_phylip()),
        DistFormat::Json => println!("{}", matrix.to_json()),
    }
}

fn run_rename(db: PathBuf, old_name: String, new_name: String) -> Result<()> {
    let mut catalog = Catalog::open(db)?;
    catalog.rename_genome(&old_name, &new_name)?;
    catalog.flush()?;
    Ok(())
}
