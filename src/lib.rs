// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

//! tersect-rs: a compact on-disk index for biallelic variants across many
//! genomes.
//!
//! A database is a single memory-mapped file holding, per chromosome, a
//! canonical ascending `(position, ref, alt)` variant list and one
//! word-aligned-hybrid compressed presence bitmap per genome. Building a
//! database k-way merges any number of sorted VCF inputs; querying
//! combines named genomes with set algebra (`|`, `&`, `-`, `^`) over a
//! chromosome or a region of it.
//!
//! # Example
//!
//! ```rust,no_run
//! use tersect_rs::{catalog::Catalog, query};
//!
//! let catalog = Catalog::open("cohort.tdb").unwrap();
//! let chrom = catalog.find_chromosome("chr1").unwrap();
//! let ast = query::parse("sampleA & sampleB").unwrap();
//! let loaded = query::LoadedGenomes::load(&catalog, &chrom, &ast.genome_names()).unwrap();
//! let result = ast.eval(&loaded, 0, chrom.variant_count as u64).unwrap();
//! ```

pub mod arena;
pub mod bitmap;
pub mod catalog;
pub mod config;
pub mod distance;
pub mod error;
pub mod ingest;
pub mod query;
pub mod slice;
pub mod variant;
pub mod vcf;

pub use error::{Result, TdbError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bitmap::{Bitmap, BitmapLike};
    pub use crate::catalog::Catalog;
    pub use crate::error::{Result, TdbError};
    pub use crate::ingest::build_database;
    pub use crate::query::{self, Ast, LoadedGenomes};
    pub use crate::slice::{self, Interval, Region};
    pub use crate::vcf::{VariantStream, VcfReader};
}
