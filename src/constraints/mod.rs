//! # Constraint Builder
//!
//! Translates per-asset bounds, per-(grouping, category) bounds and an
//! optional risk budget into a [`ConstraintSet`] over a weight vector whose
//! index order is the active asset list:
//!
//! ```text
//! sum(w) = 1
//! w >= 0
//! asset_min[i] <= w[i] <= min(asset_max[i], artificial_max)
//! cat_min      <= sum(w[cat]) <= min(cat_max, artificial_max)
//! wᵀ Σ w       <= risk_budget                         (optional)
//! ```
//!
//! `artificial_max = 1 - 0.5 / n_max` keeps any single asset or category
//! from absorbing the whole portfolio ahead of top-N truncation.


use crate::category::CategoryIndex;
use crate::error::{Error, Result};
use crate::types::{AssetBounds, AssetId, CategoryBounds, RiskBudget, WeightBound};
use crate::validation::ValidationError;
use std::collections::HashMap;
use tracing::debug;

/// Synthetic per-asset / per-category ceiling derived from the holdings cap
pub fn artificial_max(n_max_assets: usize) -> f64 {
    1.0 - 0.5 / n_max_assets as f64
}

/// Bound on the summed weight of a set of assets
#[derive(Debug, Clone, PartialEq)]
pub struct GroupConstraint {
    pub grouping: String,
    pub category: String,
    /// Indices into the asset list
    pub members: Vec<usize>,
    pub min: f64,
    pub max: f64,
}

impl GroupConstraint {
    pub fn label(&self) -> String {
        format!("{}/{}", self.grouping, self.category)
    }
}

/// Quadratic variance ceiling over the active covariance submatrix
#[derive(Debug, Clone, PartialEq)]
pub struct RiskConstraint {
    pub budget: RiskBudget,
    pub covariance: Vec<Vec<f64>>,
}

/// All constraints of one solve, aligned to `assets`
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSet {
    pub assets: Vec<AssetId>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub groups: Vec<GroupConstraint>,
    pub risk: Option<RiskConstraint>,
}

impl ConstraintSet {
    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn has_risk_budget(&self) -> bool {
        self.risk.is_some()
    }

    /// Largest violation of the linear constraints by `weights` (0 if none)
    pub fn max_violation(&self, weights: &[f64]) -> f64 {
        let mut worst = (weights.iter().sum::<f64>() - 1.0).abs();

        for (i, &w) in weights.iter().enumerate() {
            worst = worst.max(self.lower[i] - w).max(w - self.upper[i]);
        }

        for group in &self.groups {
            let total: f64 = group.members.iter().map(|&i| weights[i]).sum();
            worst = worst.max(group.min - total).max(total - group.max);
        }

        worst.max(0.0)
    }

    /// Amount by which `weights` exceed the risk budget (0 if within or none)
    pub fn risk_excess(&self, weights: &[f64]) -> f64 {
        match &self.risk {
            Some(risk) => {
                (quadratic_form(weights, &risk.covariance) - risk.budget.variance()).max(0.0)
            }
            None => 0.0,
        }
    }
}

/// `wᵀ Σ w`
pub fn quadratic_form(weights: &[f64], covariance: &[Vec<f64>]) -> f64 {
    weights
        .iter()
        .enumerate()
        .map(|(i, wi)| {
            weights
                .iter()
                .enumerate()
                .map(|(j, wj)| wi * wj * covariance[i][j])
                .sum::<f64>()
        })
        .sum()
}

/// Builder for [`ConstraintSet`]
pub struct ConstraintBuilder<'a> {
    assets: &'a [AssetId],
    n_max_assets: usize,
    asset_bounds: Option<&'a AssetBounds>,
    category_bounds: Option<(&'a CategoryBounds, &'a CategoryIndex)>,
    risk: Option<(RiskBudget, &'a [Vec<f64>])>,
}

impl<'a> ConstraintBuilder<'a> {
    /// `assets` fixes the weight-vector order
    pub fn new(assets: &'a [AssetId], n_max_assets: usize) -> Self {
        Self {
            assets,
            n_max_assets,
            asset_bounds: None,
            category_bounds: None,
            risk: None,
        }
    }

    pub fn asset_bounds(mut self, bounds: &'a AssetBounds) -> Self {
        self.asset_bounds = Some(bounds);
        self
    }

    /// Category bounds are applied to every category of every grouping in
    /// `index`; unspecified ones default to `[0, 1]`.
    pub fn category_bounds(mut self, bounds: &'a CategoryBounds, index: &'a CategoryIndex) -> Self {
        self.category_bounds = Some((bounds, index));
        self
    }

    /// `covariance` must be aligned to the asset list
    pub fn risk_budget(mut self, budget: Option<RiskBudget>, covariance: &'a [Vec<f64>]) -> Self {
        self.risk = budget.map(|b| (b, covariance));
        self
    }

    pub fn build(self) -> Result<ConstraintSet> {
        if self.n_max_assets == 0 {
            return Err(Error::Validation(ValidationError::InvalidParameter {
                name: "n_max_assets".to_string(),
                reason: "at least one holding is required".to_string(),
            }));
        }

        let n = self.assets.len();
        let cap = artificial_max(self.n_max_assets);
        let position: HashMap<&str, usize> = self
            .assets
            .iter()
            .enumerate()
            .map(|(i, a)| (a.as_str(), i))
            .collect();

        let mut lower = vec![0.0; n];
        let mut upper = vec![cap; n];

        if let Some(bounds) = self.asset_bounds {
            for (asset, bound) in bounds {
                match position.get(asset.as_str()) {
                    Some(&i) => {
                        lower[i] = bound.min.max(0.0);
                        upper[i] = bound.capped_max(cap);
                    }
                    None => debug!(asset = %asset, "Ignoring bound on inactive asset"),
                }
            }
        }

        let mut groups = Vec::new();
        if let Some((bounds, index)) = self.category_bounds {
            for (grouping, categories) in index.groupings() {
                for category in categories {
                    let members: Vec<usize> = index
                        .members(category)
                        .iter()
                        .filter_map(|a| position.get(a.as_str()).copied())
                        .collect();
                    if members.is_empty() {
                        continue;
                    }

                    let bound = bounds
                        .get(grouping)
                        .and_then(|cats| cats.get(category))
                        .copied()
                        .unwrap_or(WeightBound::UNBOUNDED);

                    groups.push(GroupConstraint {
                        grouping: grouping.clone(),
                        category: category.clone(),
                        members,
                        min: bound.min.max(0.0),
                        max: bound.capped_max(cap),
                    });
                }
            }

            for (grouping, cats) in bounds {
                for category in cats.keys() {
                    let known = index
                        .grouping(grouping)
                        .is_some_and(|c| c.iter().any(|x| x == category));
                    if !known {
                        debug!(grouping = %grouping, category = %category, "Ignoring bound on unpopulated category");
                    }
                }
            }
        }

        let risk = match self.risk {
            Some((budget, covariance)) => {
                if covariance.len() != n || covariance.iter().any(|row| row.len() != n) {
                    return Err(Error::Numerical(format!(
                        "covariance is not {}x{} for the active universe",
                        n, n
                    )));
                }
                Some(RiskConstraint {
                    budget,
                    covariance: covariance.to_vec(),
                })
            }
            None => None,
        };

        debug!(
            assets = n,
            groups = groups.len(),
            risk = risk.is_some(),
            cap,
            "Built constraint set"
        );

        Ok(ConstraintSet {
            assets: self.assets.to_vec(),
            lower,
            upper,
            groups,
            risk,
        })
    }
}
