//! Category membership and groupings
//!
//! Maps each asset to its categories (explicit tags plus a derived
//! market-cap tier) and each grouping to the categories that actually have
//! members in the active universe.

mod tiers;
#[cfg(test)]
mod tests;

pub use tiers::{
    MarketCapTier, MarketCapTiers, LARGE_MARKET_CAP, MEDIUM_MARKET_CAP, SMALL_MARKET_CAP,
    XL_MARKET_CAP, XS_MARKET_CAP,
};

use crate::types::AssetId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Descriptive data for one asset
#[derive(Debug, Clone, PartialEq)]
pub struct AssetMetadata {
    pub id: AssetId,
    pub name: String,
    /// NaN when unknown
    pub market_cap: f64,
    pub categories: Vec<String>,
}

/// Grouping name -> category names, as read from the groupings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryGroupings(pub BTreeMap<String, Vec<String>>);

impl CategoryGroupings {
    /// Every category named by any grouping
    pub fn all_categories(&self) -> BTreeSet<&str> {
        self.0
            .values()
            .flat_map(|cats| cats.iter().map(String::as_str))
            .collect()
    }
}

/// Which assets are eligible for the index
#[derive(Debug, Clone, Default)]
pub struct UniverseFilter {
    /// Assets with usable estimates; `None` admits every asset
    pub estimated: Option<BTreeSet<AssetId>>,
    /// Allowed market-cap tier names; `None` admits every tier
    pub allowed_tiers: Option<BTreeSet<String>>,
}

impl UniverseFilter {
    fn admits(&self, asset: &str, tier: &str) -> bool {
        let estimated = self
            .estimated
            .as_ref()
            .map_or(true, |set| set.contains(asset));
        let tier_ok = self
            .allowed_tiers
            .as_ref()
            .map_or(true, |set| set.contains(tier));
        estimated && tier_ok
    }
}

/// Read-only category index over the active universe
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    assets: Vec<AssetId>,
    names: BTreeMap<AssetId, String>,
    tiers: BTreeMap<AssetId, String>,
    members: BTreeMap<String, Vec<AssetId>>,
    groupings: BTreeMap<String, Vec<String>>,
}

impl CategoryIndex {
    pub fn build(
        metadata: &[AssetMetadata],
        groupings: &CategoryGroupings,
        tiers: &MarketCapTiers,
        filter: &UniverseFilter,
    ) -> Self {
        let grouped = groupings.all_categories();

        let mut assets = BTreeSet::new();
        let mut names = BTreeMap::new();
        let mut asset_tiers = BTreeMap::new();
        let mut members: BTreeMap<String, BTreeSet<AssetId>> = BTreeMap::new();

        for meta in metadata {
            let tier = tiers.classify(meta.market_cap);
            if !filter.admits(&meta.id, tier) {
                continue;
            }

            assets.insert(meta.id.clone());
            names.insert(meta.id.clone(), meta.name.clone());
            asset_tiers.insert(meta.id.clone(), tier.to_string());

            for category in &meta.categories {
                if grouped.contains(category.as_str()) {
                    members
                        .entry(category.clone())
                        .or_default()
                        .insert(meta.id.clone());
                }
            }
            members
                .entry(tier.to_string())
                .or_default()
                .insert(meta.id.clone());
        }

        let members: BTreeMap<String, Vec<AssetId>> = members
            .into_iter()
            .map(|(cat, ids)| (cat, ids.into_iter().collect()))
            .collect();

        let groupings: BTreeMap<String, Vec<String>> = groupings
            .0
            .iter()
            .map(|(grouping, cats)| {
                let kept: Vec<String> = cats
                    .iter()
                    .filter(|c| members.contains_key(c.as_str()))
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    debug!(grouping = %grouping, "Grouping has no populated categories");
                }
                (grouping.clone(), kept)
            })
            .collect();

        Self {
            assets: assets.into_iter().collect(),
            names,
            tiers: asset_tiers,
            members,
            groupings,
        }
    }

    /// Active assets, sorted by id
    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    pub fn contains_asset(&self, asset: &str) -> bool {
        self.names.contains_key(asset)
    }

    /// Display name, falling back to the id
    pub fn display_name<'a>(&'a self, asset: &'a str) -> &'a str {
        self.names.get(asset).map(String::as_str).unwrap_or(asset)
    }

    pub fn tier_of(&self, asset: &str) -> Option<&str> {
        self.tiers.get(asset).map(String::as_str)
    }

    /// Members of a category (empty if unknown)
    pub fn members(&self, category: &str) -> &[AssetId] {
        self.members
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Categories of an asset, in name order
    pub fn categories_of(&self, asset: &str) -> Vec<&str> {
        self.members
            .iter()
            .filter(|(_, ids)| ids.iter().any(|a| a == asset))
            .map(|(cat, _)| cat.as_str())
            .collect()
    }

    /// Grouping -> populated categories
    pub fn groupings(&self) -> &BTreeMap<String, Vec<String>> {
        &self.groupings
    }

    pub fn grouping(&self, name: &str) -> Option<&[String]> {
        self.groupings.get(name).map(Vec::as_slice)
    }

    /// Groupings whose every category was filtered out. They impose no
    /// constraint.
    pub fn empty_groupings(&self) -> Vec<&str> {
        self.groupings
            .iter()
            .filter(|(_, cats)| cats.is_empty())
            .map(|(g, _)| g.as_str())
            .collect()
    }
}
