//! Market-cap tiering

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCapTier {
    pub name: String,
    /// Market cap must strictly exceed this to fall in the tier
    pub threshold: f64,
}

/// Ordered thresholds mapping a market cap to exactly one tier name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TierTable")]
pub struct MarketCapTiers {
    tiers: Vec<MarketCapTier>,
    fallback: String,
}

pub const XL_MARKET_CAP: &str = "XL Market Cap";
pub const LARGE_MARKET_CAP: &str = "Large Market Cap";
pub const MEDIUM_MARKET_CAP: &str = "Medium Market Cap";
pub const SMALL_MARKET_CAP: &str = "Small Market Cap";
pub const XS_MARKET_CAP: &str = "XS Market Cap";

impl Default for MarketCapTiers {
    fn default() -> Self {
        Self::new(
            vec![
                MarketCapTier {
                    name: XL_MARKET_CAP.to_string(),
                    threshold: 5e10,
                },
                MarketCapTier {
                    name: LARGE_MARKET_CAP.to_string(),
                    threshold: 1e10,
                },
                MarketCapTier {
                    name: MEDIUM_MARKET_CAP.to_string(),
                    threshold: 5e9,
                },
                MarketCapTier {
                    name: SMALL_MARKET_CAP.to_string(),
                    threshold: 1e9,
                },
            ],
            XS_MARKET_CAP,
        )
    }
}

/// Deserialization shape; thresholds may arrive in any order
#[derive(Deserialize)]
#[serde(default)]
struct TierTable {
    tiers: Vec<MarketCapTier>,
    fallback: String,
}

impl Default for TierTable {
    fn default() -> Self {
        let defaults = MarketCapTiers::default();
        Self {
            tiers: defaults.tiers,
            fallback: defaults.fallback,
        }
    }
}

impl From<TierTable> for MarketCapTiers {
    fn from(table: TierTable) -> Self {
        Self::new(table.tiers, table.fallback)
    }
}

impl MarketCapTiers {
    /// Thresholds are re-sorted descending so the first match is the
    /// largest tier exceeded.
    pub fn new(mut tiers: Vec<MarketCapTier>, fallback: impl Into<String>) -> Self {
        tiers.sort_by(|a, b| b.threshold.total_cmp(&a.threshold));
        Self {
            tiers,
            fallback: fallback.into(),
        }
    }

    /// Tier for a market cap. NaN falls through to the fallback tier.
    pub fn classify(&self, market_cap: f64) -> &str {
        self.tiers
            .iter()
            .find(|t| market_cap > t.threshold)
            .map(|t| t.name.as_str())
            .unwrap_or(self.fallback.as_str())
    }

    /// All tier names, largest first, fallback last
    pub fn names(&self) -> Vec<&str> {
        self.tiers
            .iter()
            .map(|t| t.name.as_str())
            .chain(std::iter::once(self.fallback.as_str()))
            .collect()
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}
