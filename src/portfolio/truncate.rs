//! Top-N truncation of a continuous allocation
//!
//! Keeps the `n_max` largest weights, rounds each to 3 decimal places and
//! rescales the survivors to sum to one.

use crate::types::{Allocation, AssetId};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::cmp::Ordering;
use tracing::debug;

const WEIGHT_DECIMALS: u32 = 3;

/// Truncate continuous solver weights to at most `n_max` holdings.
///
/// Non-finite weights are discarded. Returns an empty allocation when
/// nothing survives rounding (including `n_max == 0`).
pub fn truncate(weights: &[(AssetId, f64)], n_max: usize) -> Allocation {
    let holdings: Vec<(AssetId, Decimal)> = weights
        .iter()
        .filter_map(|(asset, w)| Decimal::from_f64(*w).map(|d| (asset.clone(), d)))
        .collect();
    if holdings.len() < weights.len() {
        debug!(
            discarded = weights.len() - holdings.len(),
            "Discarded non-finite weights before truncation"
        );
    }
    truncate_rounded(holdings, n_max)
}

/// Largest weight first, ties by ascending id.
fn sort_holdings(holdings: &mut [(AssetId, Decimal)]) {
    holdings.sort_by(|(a, wa), (b, wb)| match wb.cmp(wa) {
        Ordering::Equal => a.cmp(b),
        other => other,
    });
}

pub(crate) fn truncate_rounded(mut holdings: Vec<(AssetId, Decimal)>, n_max: usize) -> Allocation {
    // Survivors are chosen on the unrounded weights
    sort_holdings(&mut holdings);
    holdings.truncate(n_max);

    let mut kept: Vec<(AssetId, Decimal)> = holdings
        .into_iter()
        .map(|(asset, w)| {
            let rounded =
                w.round_dp_with_strategy(WEIGHT_DECIMALS, RoundingStrategy::MidpointNearestEven);
            (asset, rounded)
        })
        .filter(|(_, w)| *w > Decimal::ZERO)
        .collect();
    // Weights that tie after rounding must be ordered the same way a
    // second truncation would order them
    sort_holdings(&mut kept);

    Allocation::from_holdings(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rust_decimal_macros::dec;

    fn weights(entries: &[(&str, f64)]) -> Vec<(AssetId, f64)> {
        entries.iter().map(|(a, w)| (a.to_string(), *w)).collect()
    }

    #[test]
    fn test_keeps_top_three_and_renormalizes() {
        let w = weights(&[("A", 0.4), ("B", 0.3), ("C", 0.2), ("D", 0.08), ("E", 0.02)]);
        let alloc = truncate(&w, 3);

        assert_eq!(alloc.len(), 3);
        assert_eq!(alloc.assets().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert!((alloc.weight("A").unwrap() - 0.4 / 0.9).abs() < 1e-12);
        assert!((alloc.weight("B").unwrap() - 0.3 / 0.9).abs() < 1e-12);
        assert!((alloc.weight("C").unwrap() - 0.2 / 0.9).abs() < 1e-12);
        assert!(alloc.weight("D").is_none());
        assert!((alloc.total_weight() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_truncation_is_idempotent() {
        let w = weights(&[("A", 0.4), ("B", 0.3), ("C", 0.2), ("D", 0.08), ("E", 0.02)]);
        let once = truncate(&w, 3);
        let twice = once.truncate(3);
        assert_eq!(once, twice);
        assert_eq!(once.weights(), twice.weights());
    }

    #[test]
    fn test_rounding_ties_reordered_by_asset_id() {
        let w = weights(&[("zeta", 0.5004), ("alpha", 0.4996)]);
        let once = truncate(&w, 5);
        assert_eq!(once.assets().collect::<Vec<_>>(), vec!["alpha", "zeta"]);
        assert_eq!(once.truncate(5), once);
        assert_eq!(once.truncate(5).weights(), once.weights());
    }

    #[test]
    fn test_rounding_to_zero_drops_entry() {
        let w = weights(&[("A", 0.9994), ("B", 0.0004), ("C", 0.0002)]);
        let alloc = truncate(&w, 10);
        assert_eq!(alloc.len(), 1);
        assert_eq!(alloc.holdings()[0].1, dec!(0.999));
        assert!((alloc.weight("A").unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rounding_is_half_even() {
        let alloc = truncate_rounded(
            vec![("A".to_string(), dec!(0.4625)), ("B".to_string(), dec!(0.5375))],
            5,
        );
        assert_eq!(alloc.holdings()[0], ("B".to_string(), dec!(0.538)));
        assert_eq!(alloc.holdings()[1], ("A".to_string(), dec!(0.462)));
    }

    #[test]
    fn test_ties_broken_by_asset_id() {
        let w = weights(&[("zcash", 0.25), ("aave", 0.25), ("monero", 0.25), ("bitcoin", 0.25)]);
        let alloc = truncate(&w, 2);
        assert_eq!(alloc.assets().collect::<Vec<_>>(), vec!["aave", "bitcoin"]);
    }

    #[test]
    fn test_empty_results() {
        assert!(truncate(&[], 5).is_empty());

        let w = weights(&[("A", 0.6), ("B", 0.4)]);
        let alloc = truncate(&w, 0);
        assert!(alloc.is_empty());
        assert_eq!(alloc.total_weight(), 0.0);

        let w = weights(&[("A", 0.0001), ("B", -0.0)]);
        assert!(truncate(&w, 5).is_empty());
    }

    #[test]
    fn test_non_finite_weights_discarded() {
        let w = weights(&[("A", f64::NAN), ("B", 0.5), ("C", f64::INFINITY)]);
        let alloc = truncate(&w, 5);
        assert_eq!(alloc.assets().collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn test_random_allocations_hold_invariants() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let n = rng.random_range(1..30);
            let raw: Vec<f64> = (0..n).map(|_| rng.random_range(0.0..1.0)).collect();
            let total: f64 = raw.iter().sum();
            let w: Vec<(AssetId, f64)> = raw
                .iter()
                .enumerate()
                .map(|(i, x)| (format!("asset-{:02}", i), x / total))
                .collect();
            let n_max = rng.random_range(0..12);

            let alloc = truncate(&w, n_max);
            assert!(alloc.len() <= n_max);
            if !alloc.is_empty() {
                assert!((alloc.total_weight() - 1.0).abs() < 1e-9);
            }
            assert!(alloc.weights().iter().all(|(_, x)| *x > 0.0));
            assert_eq!(alloc.truncate(n_max), alloc);
        }
    }
}
