//! The three tables of a dataset, each a thin facade over one
//! [`VectorDiskHash`].
//!
//! File stems within a dataset directory are fixed: `ld`, `summary`,
//! `strata` (each with `.vdhdat` and `.vdhdht` files).

use std::path::Path;

use ldlookup_core::{Error, Histogram, Maf, Result, VariantSummary};
use ldlookup_storage::VectorDiskHash;

/// File stem of the LD table.
pub const LD_TABLE: &str = "ld";
/// File stem of the summary table.
pub const SUMMARY_TABLE: &str = "summary";
/// File stem of the strata table.
pub const STRATA_TABLE: &str = "strata";

/// Key size of the strata table: composite stratum keys and the meta-keys
/// both fit comfortably.
const STRATA_MAX_KEY_SIZE: usize = 64;

/// Meta-key holding the n-surrogates cutpoints. The leading underscores
/// keep it disjoint from every composite stratum key, which always starts
/// with a digit.
const N_SURROGATES_KEY: &str = "__N_SURROGATES_KEY__";
/// Meta-key holding the MAF cutpoints.
const MAF_KEY: &str = "__MAF_KEY__";

/// Maps an index variant to its LD surrogates, in insertion order.
///
/// The builder feeds every surrogate of one index variant consecutively,
/// so this table never reserves.
pub struct LdTable {
    vdh: VectorDiskHash,
}

impl LdTable {
    /// Create the LD table inside a dataset directory.
    pub fn create(dir: &Path, max_key_size: usize) -> Result<Self> {
        Ok(LdTable {
            vdh: VectorDiskHash::create(LD_TABLE, dir, max_key_size)?,
        })
    }

    /// Open an existing LD table read-only.
    pub fn open(dir: &Path) -> Result<Self> {
        Ok(LdTable {
            vdh: VectorDiskHash::open(LD_TABLE, dir)?,
        })
    }

    /// Record that `surrogate_id` is in LD with `index_id`.
    pub fn append(&mut self, index_id: &str, surrogate_id: &str) -> Result<()> {
        self.vdh.append(index_id, surrogate_id)
    }

    /// The surrogates of `index_id`.
    pub fn lookup(&mut self, index_id: &str) -> Result<Vec<String>> {
        self.vdh.lookup(index_id)
    }

    /// Seal the table.
    pub fn close(self) -> Result<()> {
        self.vdh.close()
    }
}

/// Maps an index variant to its summary statistics.
pub struct SummaryTable {
    vdh: VectorDiskHash,
}

impl SummaryTable {
    /// Create the summary table inside a dataset directory.
    pub fn create(dir: &Path, max_key_size: usize) -> Result<Self> {
        Ok(SummaryTable {
            vdh: VectorDiskHash::create(SUMMARY_TABLE, dir, max_key_size)?,
        })
    }

    /// Open an existing summary table read-only.
    pub fn open(dir: &Path) -> Result<Self> {
        Ok(SummaryTable {
            vdh: VectorDiskHash::open(SUMMARY_TABLE, dir)?,
        })
    }

    /// Store one variant's statistics. Values use the dataset decimal form.
    pub fn append(&mut self, summary: &VariantSummary) -> Result<()> {
        self.vdh
            .append(&summary.variant_id, &Maf::new(summary.maf).to_string())?;
        self.vdh
            .append(&summary.variant_id, &summary.n_surrogates.to_string())
    }

    /// Retrieve one variant's statistics.
    pub fn lookup(&mut self, variant_id: &str) -> Result<VariantSummary> {
        let values = self.vdh.lookup(variant_id)?;
        if values.len() < 2 {
            return Err(Error::corrupt(format!(
                "summary for '{}' holds {} values, expected 2",
                variant_id,
                values.len()
            )));
        }
        let maf: f64 = values[0].parse().map_err(|_| {
            Error::corrupt(format!("unparseable MAF for '{}'", variant_id))
        })?;
        let n_surrogates: u64 = values[1].parse().map_err(|_| {
            Error::corrupt(format!("unparseable surrogate count for '{}'", variant_id))
        })?;
        Ok(VariantSummary {
            variant_id: variant_id.to_string(),
            maf,
            n_surrogates,
        })
    }

    /// Seal the table.
    pub fn close(self) -> Result<()> {
        self.vdh.close()
    }
}

/// Two-axis stratification index over index variants.
///
/// Owns the cutpoint histograms for both axes and persists them under the
/// meta-keys, so reopening a dataset restores the stratification. Every
/// other key is a composite stratum key `"<n_surrogates> <maf>"` mapping to
/// the variants inside that stratum.
pub struct StrataTable {
    vdh: VectorDiskHash,
    n_surrogates_strata: Histogram<u64>,
    maf_strata: Histogram<Maf>,
}

impl StrataTable {
    /// Create the strata table from freshly stratified histograms.
    ///
    /// A zero cutpoint is added to each axis as a catch-all, so every
    /// non-negative observation falls into some stratum. The cutpoints are
    /// written under the meta-keys before any stratum is reserved.
    pub fn create(
        dir: &Path,
        mut n_surrogates_strata: Histogram<u64>,
        mut maf_strata: Histogram<Maf>,
    ) -> Result<Self> {
        let mut vdh = VectorDiskHash::create(STRATA_TABLE, dir, STRATA_MAX_KEY_SIZE)?;

        n_surrogates_strata.increase_count(0, 0);
        for cutpoint in n_surrogates_strata.strata() {
            vdh.append(N_SURROGATES_KEY, &cutpoint.to_string())?;
        }

        maf_strata.increase_count(Maf::new(0.0), 0);
        for cutpoint in maf_strata.strata() {
            vdh.append(MAF_KEY, &cutpoint.to_string())?;
        }

        Ok(StrataTable {
            vdh,
            n_surrogates_strata,
            maf_strata,
        })
    }

    /// Open an existing strata table read-only, restoring both axes from
    /// the meta-keys.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut vdh = VectorDiskHash::open(STRATA_TABLE, dir)?;

        let mut n_surrogates_strata = Histogram::new();
        for value in vdh.lookup(N_SURROGATES_KEY)? {
            let cutpoint: u64 = value.parse().map_err(|_| {
                Error::corrupt(format!("unreadable n-surrogates cutpoint '{}'", value))
            })?;
            n_surrogates_strata.increase_count(cutpoint, 0);
        }

        let mut maf_strata = Histogram::new();
        for value in vdh.lookup(MAF_KEY)? {
            let cutpoint: Maf = value.parse()?;
            maf_strata.increase_count(cutpoint, 0);
        }

        Ok(StrataTable {
            vdh,
            n_surrogates_strata,
            maf_strata,
        })
    }

    /// The composite stratum key for a (MAF, surrogate count) pair.
    pub fn get_stratum(&self, maf: f64, n_surrogates: u64) -> Result<String> {
        let n_stratum = self.n_surrogates_strata.get_stratum(&n_surrogates)?;
        let maf_stratum = self.maf_strata.get_stratum(&Maf::new(maf))?;
        Ok(format!("{} {}", n_stratum, maf_stratum))
    }

    /// Reserve each stratum's byte budget ahead of pass 3.
    pub fn reserve(&mut self, strata_sizes: &Histogram<String>) -> Result<()> {
        for stratum in strata_sizes.strata() {
            let bytes = strata_sizes.get_count(&stratum)?;
            self.vdh.reserve(&stratum, bytes)?;
        }
        Ok(())
    }

    /// Place a variant into its stratum.
    pub fn append(&mut self, summary: &VariantSummary) -> Result<()> {
        let stratum = self.get_stratum(summary.maf, summary.n_surrogates)?;
        self.vdh.append(&stratum, &summary.variant_id)
    }

    /// All variants in the stratum of a (MAF, surrogate count) pair.
    pub fn lookup(&mut self, maf: f64, n_surrogates: u64) -> Result<Vec<String>> {
        let stratum = self.get_stratum(maf, n_surrogates)?;
        self.vdh.lookup(&stratum)
    }

    /// `k` uniform draws, with replacement, from a stratum.
    pub fn lookup_sample(&mut self, maf: f64, n_surrogates: u64, k: usize) -> Result<Vec<String>> {
        let stratum = self.get_stratum(maf, n_surrogates)?;
        self.vdh.lookup_sample(&stratum, k)
    }

    /// Cutpoints of the n-surrogates axis, ascending.
    pub fn n_surrogates_strata(&self) -> Vec<u64> {
        self.n_surrogates_strata.strata()
    }

    /// Cutpoints of the MAF axis, ascending.
    pub fn maf_strata(&self) -> Vec<Maf> {
        self.maf_strata.strata()
    }

    /// Seal the table.
    pub fn close(self) -> Result<()> {
        self.vdh.close()
    }
}
