//! Dataset construction and querying for ldlookup.
//!
//! A dataset is a directory of three [vector disk hashes][ldlookup_storage]:
//!
//! - `ld` — index variant → its LD surrogates
//! - `summary` — index variant → (MAF, number of surrogates)
//! - `strata` — composite stratum → the index variants inside it, plus the
//!   stratification cutpoints themselves under two meta-keys
//!
//! [`build`] creates a dataset from a delimited LD data file using a
//! three-pass protocol; [`Reader`] opens a sealed dataset and serves the
//! four query kinds.

pub mod builder;
pub mod parse;
pub mod reader;
pub mod tables;

pub use builder::{build, Binning, BuildConfig, BuildReport};
pub use parse::{for_each_key, scan, ColumnSpec, LdPairParser, ParserConfig, ScanStats};
pub use reader::Reader;
pub use tables::{LdTable, StrataTable, SummaryTable};
