//! Three-pass dataset construction.
//!
//! The source file may hold many millions of records, so nothing but the
//! key index is held in memory: every pass is a fresh streamed read of the
//! same file (the input file is the ordering contract between passes).
//!
//! 1. **Pass 1** fills the LD and summary tables and accumulates the MAF
//!    and surrogate-count histograms.
//! 2. The histograms are stratified into equi-count cutpoints, the strata
//!    table is created around them, and **pass 2** totals the exact byte
//!    budget of every stratum, which is then reserved. Reservations cannot
//!    grow, so sizing must be exact.
//! 3. **Pass 3** appends each index variant into its stratum's reserved
//!    region.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use ldlookup_core::{Error, Histogram, Maf, Result};

use crate::parse::{scan, LdPairParser, ParserConfig, ScanStats};
use crate::tables::{LdTable, StrataTable, SummaryTable};

/// How one stratification axis is sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binning {
    /// A fixed number of strata.
    Bins(u64),
    /// A target number of index variants per stratum; the number of strata
    /// becomes `total / per_bin`.
    PerBin(u64),
}

impl Binning {
    fn n_bins(&self, total: u64) -> Result<u64> {
        match *self {
            Binning::Bins(n) => Ok(n),
            Binning::PerBin(0) => Err(Error::invalid_input("per-bin size must be positive")),
            Binning::PerBin(per_bin) => Ok(total / per_bin),
        }
    }
}

/// Configuration for one dataset build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Delimited LD data to ingest.
    pub source: PathBuf,
    /// Directory to create the dataset in. Must not exist.
    pub dataset_dir: PathBuf,
    /// Parser configuration (delimiter, columns, r² threshold).
    pub parser: ParserConfig,
    /// Stratification of the surrogate-count axis.
    pub ld_binning: Binning,
    /// Stratification of the MAF axis.
    pub maf_binning: Binning,
    /// Key size bound for the LD and summary tables. When `None`, a
    /// preliminary scan observes the longest index variant ID.
    pub max_variant_id_len: Option<usize>,
}

/// Counters from a completed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    /// Distinct index variants ingested.
    pub n_index_variants: u64,
    /// Pairs at or above the r² threshold.
    pub n_pairs_in_ld: u64,
    /// Input lines skipped as invalid.
    pub n_invalid_lines: u64,
    /// Strata on the surrogate-count axis.
    pub n_ld_strata: usize,
    /// Strata on the MAF axis.
    pub n_maf_strata: usize,
    /// Key size the tables were created with.
    pub max_variant_id_len: usize,
}

/// Build a dataset from `config.source` into `config.dataset_dir`.
pub fn build(config: &BuildConfig) -> Result<BuildReport> {
    let parser = resolve_parser(config)?;

    let max_variant_id_len = match config.max_variant_id_len {
        Some(bound) => bound,
        None => observe_max_id_len(&config.source, &parser)?,
    };

    if config.dataset_dir.exists() {
        return Err(Error::AlreadyExists {
            path: config.dataset_dir.clone(),
        });
    }
    std::fs::create_dir(&config.dataset_dir)?;
    let dir = config.dataset_dir.as_path();

    // Pass 1: primary tables and the two observed distributions.
    let mut ld_table = LdTable::create(dir, max_variant_id_len)?;
    let mut summary_table = SummaryTable::create(dir, max_variant_id_len)?;
    let mut ld_hist: Histogram<u64> = Histogram::new();
    let mut maf_hist: Histogram<Maf> = Histogram::new();
    let mut n_pairs_in_ld = 0u64;
    let mut n_index_variants = 0u64;

    let stats: ScanStats = scan(
        &config.source,
        &parser,
        |pair| {
            n_pairs_in_ld += 1;
            ld_table.append(&pair.index_id, &pair.ld_id)
        },
        |summary| {
            n_index_variants += 1;
            summary_table.append(summary)?;
            ld_hist.increase_count(summary.n_surrogates, 1);
            maf_hist.increase_count(Maf::new(summary.maf), 1);
            Ok(())
        },
    )?;
    info!(
        n_index_variants,
        n_pairs_in_ld,
        n_invalid = stats.n_invalid,
        "pass 1 complete"
    );

    // Derive the stratification from the observed distributions.
    let ld_strata = ld_hist.stratify(config.ld_binning.n_bins(ld_hist.total_count())?)?;
    let maf_strata = maf_hist.stratify(config.maf_binning.n_bins(maf_hist.total_count())?)?;
    let mut strata_table = StrataTable::create(dir, ld_strata, maf_strata)?;

    // Pass 2: exact byte budget per stratum, then reserve.
    let mut strata_sizes: Histogram<String> = Histogram::new();
    scan(
        &config.source,
        &parser,
        |_| Ok(()),
        |summary| {
            let stratum = strata_table.get_stratum(summary.maf, summary.n_surrogates)?;
            // One byte per value covers the separator overhead of
            // reserved-region writes.
            strata_sizes.increase_count(stratum, summary.variant_id.len() as u64 + 1);
            Ok(())
        },
    )?;
    strata_table.reserve(&strata_sizes)?;
    info!(n_strata = strata_sizes.strata().len(), "pass 2 complete");

    // Pass 3: place every variant into its reserved stratum.
    scan(
        &config.source,
        &parser,
        |_| Ok(()),
        |summary| strata_table.append(summary),
    )?;

    let report = BuildReport {
        n_index_variants,
        n_pairs_in_ld,
        n_invalid_lines: stats.n_invalid,
        n_ld_strata: strata_table.n_surrogates_strata().len(),
        n_maf_strata: strata_table.maf_strata().len(),
        max_variant_id_len,
    };

    ld_table.close()?;
    summary_table.close()?;
    strata_table.close()?;
    info!(?report, "dataset sealed");

    Ok(report)
}

fn resolve_parser(config: &BuildConfig) -> Result<LdPairParser> {
    let header = if config.parser.needs_header() {
        Some(read_first_line(&config.source)?)
    } else {
        None
    };
    LdPairParser::resolve(&config.parser, header.as_deref())
}

/// Preliminary scan for the longest index variant ID.
fn observe_max_id_len(source: &Path, parser: &LdPairParser) -> Result<usize> {
    let mut max_len = 0usize;
    scan(source, parser, |_| Ok(()), |summary| {
        max_len = max_len.max(summary.variant_id.len());
        Ok(())
    })?;
    if max_len == 0 {
        return Err(Error::invalid_input("source contains no valid records"));
    }
    debug!(max_len, "observed maximum index variant ID length");
    Ok(max_len)
}

fn read_first_line(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })?;
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line)?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}
