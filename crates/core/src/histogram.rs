//! Frequency counts with equi-count stratification.
//!
//! A [`Histogram`] maps totally-ordered keys to observation counts. Its keys
//! double as stratum cutpoints: a value belongs to the stratum whose key is
//! the greatest one not exceeding it. [`Histogram::stratify`] rebins an
//! observed distribution into roughly equal-count strata.

use std::collections::BTreeMap;
use std::fmt::Display;

use crate::error::{Error, Result};

/// A mapping from ordered keys to non-negative counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram<K> {
    counts: BTreeMap<K, u64>,
}

impl<K: Ord + Clone + Display> Histogram<K> {
    /// Create an empty histogram.
    pub fn new() -> Self {
        Histogram {
            counts: BTreeMap::new(),
        }
    }

    /// Add `by` to the count at `key`, creating the entry if absent.
    ///
    /// `increase_count(key, 0)` registers a key with no observations; the
    /// strata tables use this to install catch-all cutpoints.
    pub fn increase_count(&mut self, key: K, by: u64) {
        *self.counts.entry(key).or_insert(0) += by;
    }

    /// Sum of all counts.
    pub fn total_count(&self) -> u64 {
        self.counts.values().sum()
    }

    /// The stored keys in ascending order.
    pub fn strata(&self) -> Vec<K> {
        self.counts.keys().cloned().collect()
    }

    /// The count stored at `key`.
    pub fn get_count(&self, key: &K) -> Result<u64> {
        self.counts.get(key).copied().ok_or_else(|| Error::MissingKey {
            key: key.to_string(),
        })
    }

    /// The greatest stored key that does not exceed `key`.
    ///
    /// Fails with `OutOfRange` if `key` is below the minimum stored key.
    pub fn get_stratum(&self, key: &K) -> Result<K> {
        self.counts
            .range(..=key.clone())
            .next_back()
            .map(|(k, _)| k.clone())
            .ok_or(Error::OutOfRange)
    }

    /// Rebin into `n_bins` equi-count strata.
    ///
    /// Keys are traversed in descending order, accumulating counts into a
    /// running bucket; a cutpoint is emitted whenever the bucket reaches
    /// `total_count / n_bins`. Any residual is added to the smallest-key
    /// cutpoint. The descending traversal makes the greatest key of each bin
    /// the bin's lower bound, which is exactly what [`Histogram::get_stratum`]
    /// looks up.
    pub fn stratify(&self, n_bins: u64) -> Result<Histogram<K>> {
        if n_bins == 0 {
            return Err(Error::invalid_input("cannot stratify into 0 bins"));
        }
        let total = self.total_count();
        if total == 0 {
            return Err(Error::invalid_input("cannot stratify an empty histogram"));
        }

        let bin_size = total / n_bins;
        let mut bins: BTreeMap<K, u64> = BTreeMap::new();
        let mut running = 0u64;
        for (key, count) in self.counts.iter().rev() {
            running += count;
            if running >= bin_size {
                bins.insert(key.clone(), running);
                running = 0;
            }
        }

        if running != 0 {
            // Keys below the last emitted cutpoint still need a home.
            let min_key = self
                .counts
                .keys()
                .next()
                .expect("non-empty histogram has a minimum key")
                .clone();
            *bins.entry(min_key).or_insert(0) += running;
        }

        Ok(Histogram { counts: bins })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(pairs: &[(u64, u64)]) -> Histogram<u64> {
        let mut h = Histogram::new();
        for &(k, c) in pairs {
            h.increase_count(k, c);
        }
        h
    }

    #[test]
    fn counts_accumulate() {
        let mut h = Histogram::new();
        h.increase_count(3u64, 1);
        h.increase_count(3, 2);
        h.increase_count(7, 5);
        assert_eq!(h.get_count(&3).unwrap(), 3);
        assert_eq!(h.get_count(&7).unwrap(), 5);
        assert_eq!(h.total_count(), 8);
    }

    #[test]
    fn zero_increase_registers_key() {
        let mut h = Histogram::new();
        h.increase_count(0u64, 0);
        assert_eq!(h.get_count(&0).unwrap(), 0);
        assert_eq!(h.total_count(), 0);
        assert_eq!(h.strata(), vec![0]);
    }

    #[test]
    fn get_count_missing_key() {
        let h = histogram(&[(1, 1)]);
        assert!(matches!(
            h.get_count(&2),
            Err(Error::MissingKey { .. })
        ));
    }

    #[test]
    fn strata_ascending() {
        let h = histogram(&[(8, 1), (1, 1), (5, 1)]);
        assert_eq!(h.strata(), vec![1, 5, 8]);
    }

    #[test]
    fn get_stratum_semantics() {
        let h = histogram(&[(2, 1), (5, 1), (9, 1)]);
        // Exact match maps to itself.
        assert_eq!(h.get_stratum(&5).unwrap(), 5);
        // Between cutpoints: greatest key below.
        assert_eq!(h.get_stratum(&8).unwrap(), 5);
        // Above the maximum: the maximum.
        assert_eq!(h.get_stratum(&100).unwrap(), 9);
        // Below the minimum: out of range.
        assert!(matches!(h.get_stratum(&1), Err(Error::OutOfRange)));
    }

    #[test]
    fn stratify_splits_evenly() {
        // {1:1, 2:2, 3:1, 5:1, 8:1}, two bins of ~3.
        let h = histogram(&[(1, 1), (2, 2), (3, 1), (5, 1), (8, 1)]);
        let strata = h.stratify(2).unwrap();
        assert_eq!(strata.strata(), vec![1, 3]);
        assert_eq!(strata.get_count(&3).unwrap(), 3);
        assert_eq!(strata.get_count(&1).unwrap(), 3);
        let c = strata.get_stratum(&4).unwrap();
        assert!(c <= 4);
    }

    #[test]
    fn stratify_residual_joins_smallest_cutpoint() {
        // bin_size = 7 / 2 = 3; descending: 9(1), 7(3) -> cutpoint 7,
        // then 4(2), 1(1) leaves residual 3 on key 1.
        let h = histogram(&[(1, 1), (4, 2), (7, 3), (9, 1)]);
        let strata = h.stratify(2).unwrap();
        assert_eq!(strata.strata(), vec![1, 7]);
        assert_eq!(strata.total_count(), h.total_count());
    }

    #[test]
    fn stratify_more_bins_than_items() {
        let h = histogram(&[(1, 1), (2, 1)]);
        // bin_size is 0: every key becomes its own cutpoint.
        let strata = h.stratify(10).unwrap();
        assert_eq!(strata.strata(), vec![1, 2]);
    }

    #[test]
    fn stratify_rejects_degenerate_input() {
        let h = histogram(&[(1, 1)]);
        assert!(h.stratify(0).is_err());
        let empty: Histogram<u64> = Histogram::new();
        assert!(empty.stratify(2).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Stratification preserves mass, and every observed key lands
            // in a stratum at or below itself.
            #[test]
            fn stratify_preserves_totals(
                entries in proptest::collection::btree_map(0u64..1000, 1u64..50, 1..40),
                n_bins in 1u64..20,
            ) {
                let mut h = Histogram::new();
                for (&k, &c) in &entries {
                    h.increase_count(k, c);
                }
                let strata = h.stratify(n_bins).unwrap();
                prop_assert_eq!(strata.total_count(), h.total_count());
                for k in h.strata() {
                    let s = strata.get_stratum(&k).unwrap();
                    prop_assert!(s <= k);
                }
            }
        }
    }
}
