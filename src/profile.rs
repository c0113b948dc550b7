//! Investor presets
//!
//! A [`MarketCapSelection`] narrows the universe by market-cap tier and an
//! [`InvestorProfile`] seeds the default category bounds of the `Category`
//! grouping.

use crate::category::{CategoryIndex, MarketCapTiers};
use crate::types::{AssetBounds, CategoryBounds, WeightBound};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Grouping the profile presets apply to
pub const PROFILE_GROUPING: &str = "Category";

pub const STABLECOINS: &str = "Stablecoins";
pub const CENTRALIZED_EXCHANGE: &str = "Centralized Exchange (CEX)";
pub const DEFI: &str = "Decentralized Finance (DeFi)";
pub const NFT: &str = "NFT";
pub const MEME: &str = "Meme";

/// Which market-cap tiers are admitted to the universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarketCapSelection {
    LargeOnly,
    MediumAndUp,
    SmallAndUp,
    #[default]
    Any,
}

impl MarketCapSelection {
    /// How many of the highest tiers are admitted; `None` admits every tier
    pub fn tier_count(&self) -> Option<usize> {
        match self {
            MarketCapSelection::LargeOnly => Some(2),
            MarketCapSelection::MediumAndUp => Some(3),
            MarketCapSelection::SmallAndUp => Some(4),
            MarketCapSelection::Any => None,
        }
    }

    /// Allowed tier names, taken by position from the configured tiers
    /// (highest threshold first). `None` admits every tier.
    pub fn allowed_tiers(&self, tiers: &MarketCapTiers) -> Option<BTreeSet<String>> {
        let count = self.tier_count()?;
        let names = tiers.names();
        // the catch-all tier is last and never admitted by a restriction
        let thresholded = names.len().saturating_sub(1);
        Some(
            names
                .into_iter()
                .take(count.min(thresholded))
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Risk appetite preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvestorProfile {
    /// All categories unconstrained
    #[default]
    SelfDirected,
    Conservative,
    Adventurous,
    Degen,
}

impl InvestorProfile {
    /// Category bound overrides on the `Category` grouping
    pub fn overrides(&self) -> &'static [(&'static str, WeightBound)] {
        const CONSERVATIVE: [(&str, WeightBound); 5] = [
            (STABLECOINS, WeightBound::new(0.0, 0.1)),
            (CENTRALIZED_EXCHANGE, WeightBound::new(0.0, 0.05)),
            (DEFI, WeightBound::new(0.2, 1.0)),
            (NFT, WeightBound::new(0.0, 0.1)),
            (MEME, WeightBound::new(0.0, 0.0)),
        ];
        const ADVENTUROUS: [(&str, WeightBound); 5] = [
            (STABLECOINS, WeightBound::new(0.0, 0.1)),
            (CENTRALIZED_EXCHANGE, WeightBound::new(0.0, 0.05)),
            (DEFI, WeightBound::new(0.1, 1.0)),
            (NFT, WeightBound::new(0.0, 1.0)),
            (MEME, WeightBound::new(0.0, 1.0)),
        ];
        const DEGEN: [(&str, WeightBound); 5] = [
            (STABLECOINS, WeightBound::new(0.0, 0.0)),
            (CENTRALIZED_EXCHANGE, WeightBound::new(0.0, 0.0)),
            (DEFI, WeightBound::new(0.0, 1.0)),
            (NFT, WeightBound::new(0.1, 1.0)),
            (MEME, WeightBound::new(0.5, 1.0)),
        ];

        match self {
            InvestorProfile::SelfDirected => &[],
            InvestorProfile::Conservative => &CONSERVATIVE,
            InvestorProfile::Adventurous => &ADVENTUROUS,
            InvestorProfile::Degen => &DEGEN,
        }
    }
}

/// Default bound maps for an index: `[0, 1]` for every active asset and
/// every populated category, with the profile's overrides applied to
/// categories present in the `Category` grouping.
pub fn default_bounds(
    index: &CategoryIndex,
    profile: InvestorProfile,
) -> (AssetBounds, CategoryBounds) {
    let assets: AssetBounds = index
        .assets()
        .iter()
        .map(|a| (a.clone(), WeightBound::UNBOUNDED))
        .collect();

    let mut categories: CategoryBounds = index
        .groupings()
        .iter()
        .map(|(grouping, cats)| {
            let bounds: BTreeMap<String, WeightBound> = cats
                .iter()
                .map(|c| (c.clone(), WeightBound::UNBOUNDED))
                .collect();
            (grouping.clone(), bounds)
        })
        .collect();

    if let Some(cats) = categories.get_mut(PROFILE_GROUPING) {
        for (category, bound) in profile.overrides() {
            if let Some(slot) = cats.get_mut(*category) {
                *slot = *bound;
            } else {
                debug!(?profile, category, "Profile category not in universe");
            }
        }
    }

    (assets, categories)
}
