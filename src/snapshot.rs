//! Immutable market snapshot and its cache
//!
//! A [`MarketSnapshot`] bundles everything derived from the loaded data
//! for one [`Selection`]: estimates, the category index over the active
//! universe, and the default bound maps. Snapshots are shared through
//! `Arc` and never mutated; [`SnapshotCache`] swaps in a new one when the
//! selection changes.

use crate::category::{
    AssetMetadata, CategoryGroupings, CategoryIndex, MarketCapTiers, UniverseFilter,
};
use crate::error::Result;
use crate::estimator::{EstimatorSettings, PriceTable, ReturnEstimates};
use crate::profile::{default_bounds, InvestorProfile, MarketCapSelection};
use crate::types::{AssetBounds, AssetId, CategoryBounds};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// User-facing choices that determine a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    /// Category groupings document
    pub groupings_path: PathBuf,
    #[serde(default)]
    pub market_caps: MarketCapSelection,
    #[serde(default)]
    pub profile: InvestorProfile,
}

impl Selection {
    pub fn key(&self) -> SelectionKey {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        SelectionKey(hasher.finish())
    }
}

/// Hash of a [`Selection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectionKey(u64);

#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    key: SelectionKey,
    estimates: ReturnEstimates,
    index: CategoryIndex,
    mu: Vec<f64>,
    sigma: Vec<Vec<f64>>,
    asset_bounds: AssetBounds,
    category_bounds: CategoryBounds,
}

impl MarketSnapshot {
    /// Estimate returns from `prices`, then index the surviving assets
    pub fn build(
        prices: &PriceTable,
        metadata: &[AssetMetadata],
        groupings: &CategoryGroupings,
        tiers: &MarketCapTiers,
        settings: &EstimatorSettings,
        selection: &Selection,
    ) -> Result<Self> {
        let estimates = ReturnEstimates::estimate(prices, settings)?;
        Self::from_estimates(estimates, metadata, groupings, tiers, selection)
    }

    /// Index already-computed estimates
    pub fn from_estimates(
        estimates: ReturnEstimates,
        metadata: &[AssetMetadata],
        groupings: &CategoryGroupings,
        tiers: &MarketCapTiers,
        selection: &Selection,
    ) -> Result<Self> {
        let filter = UniverseFilter {
            estimated: Some(estimates.assets().iter().cloned().collect()),
            allowed_tiers: selection.market_caps.allowed_tiers(tiers),
        };
        let index = CategoryIndex::build(metadata, groupings, tiers, &filter);
        let (mu, sigma) = estimates.restrict(index.assets())?;
        let (asset_bounds, category_bounds) = default_bounds(&index, selection.profile);

        info!(
            active = index.assets().len(),
            estimated = estimates.assets().len(),
            dropped = estimates.dropped().len(),
            market_caps = ?selection.market_caps,
            profile = ?selection.profile,
            "Built market snapshot"
        );

        Ok(Self {
            key: selection.key(),
            estimates,
            index,
            mu,
            sigma,
            asset_bounds,
            category_bounds,
        })
    }

    pub fn key(&self) -> SelectionKey {
        self.key
    }

    /// Active assets in weight-vector order
    pub fn assets(&self) -> &[AssetId] {
        self.index.assets()
    }

    pub fn estimates(&self) -> &ReturnEstimates {
        &self.estimates
    }

    pub fn index(&self) -> &CategoryIndex {
        &self.index
    }

    /// Expected returns aligned to [`assets`](Self::assets)
    pub fn mu(&self) -> &[f64] {
        &self.mu
    }

    /// Covariance aligned to [`assets`](Self::assets)
    pub fn sigma(&self) -> &[Vec<f64>] {
        &self.sigma
    }

    pub fn default_asset_bounds(&self) -> &AssetBounds {
        &self.asset_bounds
    }

    pub fn default_category_bounds(&self) -> &CategoryBounds {
        &self.category_bounds
    }
}

/// Holds the snapshot of the most recent selection
#[derive(Default)]
pub struct SnapshotCache {
    current: RwLock<Option<(SelectionKey, Arc<MarketSnapshot>)>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached snapshot for `key`, or build and install a new one.
    ///
    /// A failed build leaves the previous snapshot in place.
    pub fn get_or_build<F>(&self, key: SelectionKey, build: F) -> Result<Arc<MarketSnapshot>>
    where
        F: FnOnce() -> Result<MarketSnapshot>,
    {
        if let Some((cached, snapshot)) = self.current.read().as_ref() {
            if *cached == key {
                debug!(?key, "Snapshot cache hit");
                return Ok(Arc::clone(snapshot));
            }
        }

        let snapshot = Arc::new(build()?);
        *self.current.write() = Some((key, Arc::clone(&snapshot)));
        debug!(?key, "Snapshot cache replaced");
        Ok(snapshot)
    }

    pub fn current(&self) -> Option<Arc<MarketSnapshot>> {
        self.current.read().as_ref().map(|(_, s)| Arc::clone(s))
    }

    pub fn clear(&self) {
        *self.current.write() = None;
    }
}
