//! Error taxonomy for the variant database.

use std::io;
use thiserror::Error;

/// Errors that can occur while building, opening, or querying a database.
#[derive(Error, Debug)]
pub enum TdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("memory allocation failed (requested {0} bytes)")]
    Alloc(usize),

    #[error("no such sample: {0}")]
    NoSuchSample(String),

    #[error("database file does not exist: {0}")]
    DbMissing(String),

    #[error("failed to open database: {0}")]
    DbOpenFailed(String),

    #[error("build: no output name given")]
    BuildNoOutput,

    #[error("build: no input files given")]
    BuildNoInputs,

    #[error("build: failed to create database file: {0}")]
    BuildCreate(String),

    #[error("build: database already exists: {0}")]
    BuildExists(String),

    #[error("build: cannot write to output: {0}")]
    BuildNoWrite(String),

    #[error("build: duplicate sample name: {0}")]
    DuplicateSample(String),

    #[error("could not parse region: {0}")]
    BadRegion(String),

    #[error("no such chromosome: {0}")]
    NoSuchChromosome(String),

    #[error("region bounds out of range: {0}")]
    BadRegionBounds(String),

    #[error("could not parse allele: {0}")]
    BadAllele(String),

    #[error("no such chromosome for allele: {0}")]
    NoSuchChromosomeForAllele(String),

    #[error("bad allele position: {0}")]
    BadAllelePosition(String),

    #[error("unknown allele: {0}")]
    UnknownAllele(String),

    #[error("failed to parse VCF input: {0}")]
    VcfParseFailed(String),

    #[error("view: no query given")]
    NoQuery,

    #[error("rename: could not open name file: {0}")]
    RenameOpenFailed(String),

    #[error("rename: could not parse name file at line {line}: {message}")]
    RenameParse { line: usize, message: String },

    #[error("distance: binning requires exactly one region")]
    BinningRequiresSingleRegion,

    #[error("could not open sample match list: {0}")]
    MatchListOpenFailed(String),
}

pub type Result<T> = std::result::Result<T, TdbError>;
