//! Parsed LD records, per-variant summaries, and the ordered MAF key.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One parsed record of pairwise linkage-disequilibrium data.
///
/// A pair is *in LD* iff its r² meets the configured threshold. Rows for a
/// given `index_id` must appear contiguously in the source file; the builder
/// relies on that ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct LdPair {
    /// Identifier of the index variant (the query key).
    pub index_id: String,
    /// Identifier of the variant correlated with the index variant.
    pub ld_id: String,
    /// Minor allele frequency of the index variant, in [0, 0.5].
    pub index_maf: f64,
    /// Squared correlation between the two variants, in [0, 1].
    pub r2: f64,
}

impl LdPair {
    /// Whether this pair counts as "in LD" at the given r² threshold.
    pub fn is_in_ld(&self, r2_threshold: f64) -> bool {
        self.r2 >= r2_threshold
    }
}

/// Summary statistics for one index variant, produced once all of its LD
/// rows have been seen.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSummary {
    /// Identifier of the index variant.
    pub variant_id: String,
    /// Minor allele frequency of the index variant.
    pub maf: f64,
    /// Number of surrogates in LD with the index variant.
    pub n_surrogates: u64,
}

/// A minor allele frequency usable as an ordered map key.
///
/// `f64` has no total order, so MAF values cannot key a `BTreeMap` directly;
/// this wrapper orders by `f64::total_cmp`. Its `Display` form is the
/// locale-independent shortest round-trip decimal used throughout a dataset,
/// and `FromStr` parses that form back.
#[derive(Debug, Clone, Copy)]
pub struct Maf(f64);

impl Maf {
    /// Wrap a raw MAF value.
    pub fn new(value: f64) -> Self {
        Maf(value)
    }

    /// The raw MAF value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for Maf {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Maf {}

impl PartialOrd for Maf {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Maf {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Maf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Maf {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .parse()
            .map_err(|_| Error::corrupt(format!("unparseable MAF '{}'", s)))?;
        Ok(Maf(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_ld_is_inclusive() {
        let pair = LdPair {
            index_id: "rs1".into(),
            ld_id: "rs2".into(),
            index_maf: 0.1,
            r2: 0.5,
        };
        assert!(pair.is_in_ld(0.5));
        assert!(pair.is_in_ld(0.2));
        assert!(!pair.is_in_ld(0.51));
    }

    #[test]
    fn maf_orders_totally() {
        let mut mafs = vec![Maf::new(0.5), Maf::new(0.0), Maf::new(0.25)];
        mafs.sort();
        assert_eq!(mafs, vec![Maf::new(0.0), Maf::new(0.25), Maf::new(0.5)]);
    }

    #[test]
    fn maf_display_round_trips() {
        for v in [0.0, 0.1, 0.25, 0.333333333333, 0.5] {
            let shown = Maf::new(v).to_string();
            let parsed: Maf = shown.parse().unwrap();
            assert_eq!(parsed, Maf::new(v));
        }
    }

    #[test]
    fn maf_rejects_garbage() {
        assert!("not-a-maf".parse::<Maf>().is_err());
    }
}
