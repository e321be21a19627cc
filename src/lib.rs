//! # ldlookup
//!
//! On-disk lookup tables for linkage-disequilibrium (LD) data between
//! genetic variants. From a source file of pairwise
//! (index variant, surrogate variant, r², MAF) records, [`build`] produces
//! a write-once dataset that answers four queries efficiently:
//!
//! - all variants in LD with an index variant
//! - summary statistics (MAF, number of LD surrogates) for an index variant
//! - all variants stratified-similar (similar MAF *and* similar surrogate
//!   count) to a given variant or target pair
//! - uniform random samples, with replacement, from a similarity stratum
//!
//! # Quick start
//!
//! ```no_run
//! use ldlookup::{build, Binning, BuildConfig, ParserConfig, Reader};
//!
//! fn main() -> ldlookup::Result<()> {
//!     build(&BuildConfig {
//!         source: "plink.ld".into(),
//!         dataset_dir: "./dataset".into(),
//!         parser: ParserConfig {
//!             r2_threshold: 0.8,
//!             ..ParserConfig::default()
//!         },
//!         ld_binning: Binning::Bins(15),
//!         maf_binning: Binning::Bins(15),
//!         max_variant_id_len: None,
//!     })?;
//!
//!     let mut reader = Reader::open("./dataset".as_ref())?;
//!     let surrogates = reader.variants_in_ld_with("rs123")?;
//!     let similar = reader.sample_similar("rs123", 100)?;
//!     # let _ = (surrogates, similar);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! A dataset directory holds three persistent vector disk hashes — `ld`,
//! `summary`, and `strata` — built in three streaming passes over the
//! source file and opened read-only for querying. The storage and table
//! layers are available through [`ldlookup_storage`] and the re-exported
//! engine types for lower-level use.

pub use ldlookup_core::{Error, Histogram, LdPair, Maf, Result, VariantSummary};
pub use ldlookup_engine::{
    build, Binning, BuildConfig, BuildReport, ColumnSpec, LdPairParser, LdTable, ParserConfig,
    Reader, StrataTable, SummaryTable,
};
pub use ldlookup_storage::VectorDiskHash;
