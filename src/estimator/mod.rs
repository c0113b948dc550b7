//! # Return / Risk Estimation
//!
//! Turns a long-format price table into an expected-return vector and a
//! covariance matrix of lagged percentage changes:
//!
//! ```text
//! pct_change[t] = (price[t] - price[t - W]) / price[t]
//! mu[a]         = mean over defined pct_change[a]
//! sigma[i, j]   = sample covariance over periods where both are defined
//! ```
//!
//! Assets with too many missing prices, or too little history to produce a
//! variance, are excluded from the universe and reported in
//! [`ReturnEstimates::dropped`].

#[cfg(test)]
mod tests;

use crate::error::{Error, Result};
use crate::types::AssetId;
use crate::validation::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Default lookback window, in periods
pub const DEFAULT_WINDOW: usize = 7;

/// Default maximum number of missing prices before an asset is dropped
pub const DEFAULT_MAX_NULL_PRICES: usize = 50;

/// One row of the long-format price table
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub coin: AssetId,
    /// `None` for a missing observation
    pub price: Option<f64>,
}

impl PricePoint {
    pub fn new(date: NaiveDate, coin: impl Into<AssetId>, price: Option<f64>) -> Self {
        Self {
            date,
            coin: coin.into(),
            price,
        }
    }
}

/// Date x asset price matrix, NaN for missing observations
#[derive(Debug, Clone)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    assets: Vec<AssetId>,
    /// `prices[asset][t]`
    prices: Vec<Vec<f64>>,
}

impl PriceTable {
    /// Pivot long-format rows onto a shared, ascending date index.
    ///
    /// Fails on a duplicated `(date, coin)` pair.
    pub fn from_long<I>(points: I) -> Result<Self>
    where
        I: IntoIterator<Item = PricePoint>,
    {
        let mut cells: BTreeMap<(AssetId, NaiveDate), f64> = BTreeMap::new();
        let mut dates = BTreeSet::new();
        let mut assets = BTreeSet::new();

        for point in points {
            dates.insert(point.date);
            assets.insert(point.coin.clone());
            let value = point.price.filter(|p| p.is_finite()).unwrap_or(f64::NAN);
            let key = (point.coin, point.date);
            if cells.contains_key(&key) {
                return Err(Error::data_format(
                    "price table",
                    format!("duplicate price for {} on {}", key.0, key.1),
                ));
            }
            cells.insert(key, value);
        }

        let dates: Vec<NaiveDate> = dates.into_iter().collect();
        let assets: Vec<AssetId> = assets.into_iter().collect();
        let prices = assets
            .iter()
            .map(|asset| {
                dates
                    .iter()
                    .map(|date| {
                        cells
                            .get(&(asset.clone(), *date))
                            .copied()
                            .unwrap_or(f64::NAN)
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            dates,
            assets,
            prices,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    pub fn n_periods(&self) -> usize {
        self.dates.len()
    }

    /// Price column for one asset
    pub fn series(&self, asset: &str) -> Option<&[f64]> {
        self.assets
            .iter()
            .position(|a| a == asset)
            .map(|i| self.prices[i].as_slice())
    }

    /// Number of missing observations per asset
    pub fn null_counts(&self) -> Vec<(AssetId, usize)> {
        self.assets
            .iter()
            .zip(&self.prices)
            .map(|(asset, series)| (asset.clone(), series.iter().filter(|p| p.is_nan()).count()))
            .collect()
    }
}

/// Estimator parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorSettings {
    /// Lag, in periods, of the percentage change
    pub window: usize,
    /// Assets with strictly more missing prices than this are dropped
    pub max_null_prices: usize,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_null_prices: DEFAULT_MAX_NULL_PRICES,
        }
    }
}

/// Why an asset was excluded from the estimates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    MissingPrices { missing: usize, threshold: usize },
    InsufficientHistory { observations: usize, required: usize },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingPrices { missing, threshold } => {
                write!(f, "{} missing prices (max {})", missing, threshold)
            }
            DropReason::InsufficientHistory {
                observations,
                required,
            } => write!(
                f,
                "{} usable return observations (need {})",
                observations, required
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedAsset {
    pub asset: AssetId,
    pub reason: DropReason,
}

/// Expected returns and covariance over the assets that survived estimation
#[derive(Debug, Clone)]
pub struct ReturnEstimates {
    assets: Vec<AssetId>,
    mu: Vec<f64>,
    sigma: Vec<Vec<f64>>,
    dropped: Vec<DroppedAsset>,
}

/// Minimum defined return observations for a sample variance
const MIN_RETURN_OBSERVATIONS: usize = 2;

impl ReturnEstimates {
    /// Estimate expected returns and covariance from a price table
    pub fn estimate(table: &PriceTable, settings: &EstimatorSettings) -> Result<Self> {
        if settings.window == 0 {
            return Err(Error::Validation(ValidationError::InvalidParameter {
                name: "window".to_string(),
                reason: "lookback window must be at least one period".to_string(),
            }));
        }

        let mut dropped = Vec::new();
        let mut assets = Vec::new();
        let mut returns: Vec<Vec<f64>> = Vec::new();

        for (asset, series) in table.assets.iter().zip(&table.prices) {
            let missing = series.iter().filter(|p| p.is_nan()).count();
            if missing > settings.max_null_prices {
                debug!(asset = %asset, missing, "Dropping asset with too many missing prices");
                dropped.push(DroppedAsset {
                    asset: asset.clone(),
                    reason: DropReason::MissingPrices {
                        missing,
                        threshold: settings.max_null_prices,
                    },
                });
                continue;
            }

            let pct = pct_change(series, settings.window);
            let observations = pct.iter().filter(|r| !r.is_nan()).count();
            if observations < MIN_RETURN_OBSERVATIONS {
                debug!(asset = %asset, observations, "Dropping asset with insufficient history");
                dropped.push(DroppedAsset {
                    asset: asset.clone(),
                    reason: DropReason::InsufficientHistory {
                        observations,
                        required: MIN_RETURN_OBSERVATIONS,
                    },
                });
                continue;
            }

            assets.push(asset.clone());
            returns.push(pct);
        }

        let mu: Vec<f64> = returns.iter().map(|r| nan_mean(r)).collect();

        let n = assets.len();
        let mut sigma = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let cov = match pairwise_covariance(&returns[i], &returns[j]) {
                    Some(c) => c,
                    None => {
                        warn!(
                            a = %assets[i],
                            b = %assets[j],
                            "Too few overlapping periods for covariance, using 0"
                        );
                        0.0
                    }
                };
                sigma[i][j] = cov;
                sigma[j][i] = cov;
            }
        }

        info!(
            active = n,
            dropped = dropped.len(),
            window = settings.window,
            "Estimated returns and covariance"
        );

        Ok(Self {
            assets,
            mu,
            sigma,
            dropped,
        })
    }

    /// Build from pre-computed statistics.
    ///
    /// `sigma` must be square and aligned with `assets`.
    pub fn from_statistics(
        assets: Vec<AssetId>,
        mu: Vec<f64>,
        sigma: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let n = assets.len();
        if mu.len() != n || sigma.len() != n || sigma.iter().any(|row| row.len() != n) {
            return Err(Error::Numerical(format!(
                "statistics dimension mismatch: {} assets, {} returns, {} covariance rows",
                n,
                mu.len(),
                sigma.len()
            )));
        }
        Ok(Self {
            assets,
            mu,
            sigma,
            dropped: Vec::new(),
        })
    }

    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    pub fn mu(&self) -> &[f64] {
        &self.mu
    }

    pub fn sigma(&self) -> &[Vec<f64>] {
        &self.sigma
    }

    pub fn dropped(&self) -> &[DroppedAsset] {
        &self.dropped
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.index_of(asset).is_some()
    }

    pub fn expected_return(&self, asset: &str) -> Option<f64> {
        self.index_of(asset).map(|i| self.mu[i])
    }

    /// Expected returns and covariance submatrix aligned to `order`
    pub fn restrict(&self, order: &[AssetId]) -> Result<(Vec<f64>, Vec<Vec<f64>>)> {
        let idx: Vec<usize> = order
            .iter()
            .map(|asset| {
                self.index_of(asset).ok_or_else(|| Error::DataGap {
                    asset: asset.clone(),
                })
            })
            .collect::<Result<_>>()?;

        let mu = idx.iter().map(|&i| self.mu[i]).collect();
        let sigma = idx
            .iter()
            .map(|&i| idx.iter().map(|&j| self.sigma[i][j]).collect())
            .collect();
        Ok((mu, sigma))
    }

    fn index_of(&self, asset: &str) -> Option<usize> {
        self.assets.iter().position(|a| a == asset)
    }
}

/// Lagged percentage change, NaN where undefined
pub fn pct_change(prices: &[f64], window: usize) -> Vec<f64> {
    prices
        .iter()
        .enumerate()
        .map(|(t, &current)| {
            if t < window {
                return f64::NAN;
            }
            let change = (current - prices[t - window]) / current;
            if change.is_finite() {
                change
            } else {
                f64::NAN
            }
        })
        .collect()
}

fn nan_mean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Sample covariance (ddof = 1) over pairwise-complete periods
fn pairwise_covariance(a: &[f64], b: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(x, y)| (*x, *y))
        .collect();

    if pairs.len() < MIN_RETURN_OBSERVATIONS {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let sum: f64 = pairs
        .iter()
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum();
    Some(sum / (n - 1.0))
}
