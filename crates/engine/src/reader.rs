//! Read-only access to a sealed dataset.

use std::path::Path;

use ldlookup_core::{Result, VariantSummary};

use crate::tables::{LdTable, StrataTable, SummaryTable};

/// Opens the three tables of a dataset read-only and serves the four query
/// kinds.
///
/// Queries take `&mut self` because lookups reposition the underlying file
/// handles; the caller serialises access (the dataset itself is immutable,
/// so any number of separate `Reader`s may coexist).
pub struct Reader {
    ld: LdTable,
    summary: SummaryTable,
    strata: StrataTable,
}

impl Reader {
    /// Open the dataset in `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        Ok(Reader {
            ld: LdTable::open(dir)?,
            summary: SummaryTable::open(dir)?,
            strata: StrataTable::open(dir)?,
        })
    }

    /// All variants in LD with `variant_id`, in input order.
    pub fn variants_in_ld_with(&mut self, variant_id: &str) -> Result<Vec<String>> {
        self.ld.lookup(variant_id)
    }

    /// Summary statistics of `variant_id`.
    pub fn variant_stats(&mut self, variant_id: &str) -> Result<VariantSummary> {
        self.summary.lookup(variant_id)
    }

    /// All variants in the same stratum as `variant_id`.
    pub fn variants_similar_to(&mut self, variant_id: &str) -> Result<Vec<String>> {
        let stats = self.summary.lookup(variant_id)?;
        self.strata.lookup(stats.maf, stats.n_surrogates)
    }

    /// All variants in the stratum of a target (MAF, surrogate count) pair.
    ///
    /// A target outside every stratum, or inside a stratum no variant
    /// occupies, yields an empty list rather than an error.
    pub fn variants_with_stats_like(
        &mut self,
        target_maf: f64,
        target_n_surrogates: u64,
    ) -> Result<Vec<String>> {
        match self.strata.lookup(target_maf, target_n_surrogates) {
            Ok(variants) => Ok(variants),
            Err(e) if e.is_out_of_range() || e.is_missing_key() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// `k` uniform draws, with replacement, from the stratum of
    /// `variant_id`.
    pub fn sample_similar(&mut self, variant_id: &str, k: usize) -> Result<Vec<String>> {
        let stats = self.summary.lookup(variant_id)?;
        self.strata.lookup_sample(stats.maf, stats.n_surrogates, k)
    }
}
