//! Core data model shared by the estimator, constraint builder and solver

use crate::error::{Error, Result};
use crate::validation::ValidationError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Asset identifier (e.g. a CoinGecko id such as `"bitcoin"`)
pub type AssetId = String;

/// Minimum / maximum portfolio weight attached to an asset or a category.
///
/// Serialized as a two element array `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct WeightBound {
    pub min: f64,
    pub max: f64,
}

impl WeightBound {
    /// The default bound, `[0, 1]`
    pub const UNBOUNDED: WeightBound = WeightBound { min: 0.0, max: 1.0 };

    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Both ends lie within `[0, 1]` (NaN never does)
    pub fn is_within_unit(&self) -> bool {
        (0.0..=1.0).contains(&self.min) && (0.0..=1.0).contains(&self.max)
    }

    /// Upper end clamped to a synthetic ceiling
    pub fn capped_max(&self, ceiling: f64) -> f64 {
        self.max.min(ceiling)
    }
}

impl Default for WeightBound {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

impl From<[f64; 2]> for WeightBound {
    fn from([min, max]: [f64; 2]) -> Self {
        Self { min, max }
    }
}

impl From<WeightBound> for [f64; 2] {
    fn from(bound: WeightBound) -> Self {
        [bound.min, bound.max]
    }
}

/// Per-asset bounds keyed by asset id
pub type AssetBounds = BTreeMap<AssetId, WeightBound>;

/// Per-category bounds keyed by grouping, then category
pub type CategoryBounds = BTreeMap<String, BTreeMap<String, WeightBound>>;

/// Upper bound on portfolio variance `wᵀ Σ w`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskBudget(f64);

impl RiskBudget {
    pub fn new(variance: f64) -> Result<Self> {
        if !variance.is_finite() || variance < 0.0 {
            return Err(Error::Validation(ValidationError::InvalidParameter {
                name: "risk_budget".to_string(),
                reason: format!("must be a non-negative finite variance, got {}", variance),
            }));
        }
        Ok(Self(variance))
    }

    pub fn variance(&self) -> f64 {
        self.0
    }
}

/// Final, truncated allocation.
///
/// Holds the 3 d.p. rounded holdings it was formed from, sorted by weight
/// descending, and exposes them renormalized to sum to one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Allocation {
    holdings: Vec<(AssetId, Decimal)>,
    total: Decimal,
}

impl Allocation {
    /// Build from rounded, strictly positive holdings in descending order
    pub(crate) fn from_holdings(holdings: Vec<(AssetId, Decimal)>) -> Self {
        let total = holdings.iter().map(|(_, w)| *w).sum();
        Self { holdings, total }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    /// Renormalized weights, largest first
    pub fn weights(&self) -> Vec<(AssetId, f64)> {
        self.holdings
            .iter()
            .map(|(asset, w)| (asset.clone(), self.normalize(*w)))
            .collect()
    }

    pub fn weight(&self, asset: &str) -> Option<f64> {
        self.holdings
            .iter()
            .find(|(a, _)| a == asset)
            .map(|(_, w)| self.normalize(*w))
    }

    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.holdings.iter().map(|(a, _)| a.as_str())
    }

    /// Rounded holdings before renormalization
    pub fn holdings(&self) -> &[(AssetId, Decimal)] {
        &self.holdings
    }

    pub fn to_map(&self) -> BTreeMap<AssetId, f64> {
        self.weights().into_iter().collect()
    }

    /// Sum of renormalized weights (1.0 up to float error, 0.0 when empty)
    pub fn total_weight(&self) -> f64 {
        self.holdings.iter().map(|(_, w)| self.normalize(*w)).sum()
    }

    /// Re-apply top-N truncation to this allocation's holdings
    pub fn truncate(&self, n_max: usize) -> Allocation {
        crate::portfolio::truncate::truncate_rounded(self.holdings.clone(), n_max)
    }

    fn normalize(&self, w: Decimal) -> f64 {
        if self.total.is_zero() {
            return 0.0;
        }
        w.to_f64().unwrap_or(0.0) / self.total.to_f64().unwrap_or(1.0)
    }
}
