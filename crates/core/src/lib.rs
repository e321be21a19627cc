//! Core data model for ldlookup.
//!
//! This crate holds the pieces shared by every layer of the system:
//!
//! - [`Error`] / [`Result`] — the unified error type returned by all
//!   fallible operations
//! - [`LdPair`] and [`VariantSummary`] — parsed linkage-disequilibrium
//!   records and per-index-variant summary statistics
//! - [`Maf`] — a totally-ordered minor-allele-frequency key
//! - [`Histogram`] — frequency counts with equi-count stratification
//!
//! Nothing in this crate touches the filesystem.

pub mod error;
pub mod histogram;
pub mod types;

pub use error::{Error, Result};
pub use histogram::Histogram;
pub use types::{LdPair, Maf, VariantSummary};
