//! # Portfolio Optimization Module
//!
//! Ties the pipeline together for one request:
//! - Input validation of the asset and category bound maps
//! - Constraint construction over the snapshot's active universe
//! - Return maximization under those constraints
//! - Top-N truncation and portfolio statistics
//!
//! ```rust,ignore
//! use crypto_portfolio::portfolio::{AllocationRequest, PortfolioOptimizer};
//!
//! let optimizer = PortfolioOptimizer::new(SolverSettings::default());
//! let request = AllocationRequest::from_snapshot(&snapshot).with_n_max_assets(10);
//! let portfolio = optimizer.optimize(&snapshot, &request)?;
//! ```

pub mod truncate;

pub use truncate::truncate;

use crate::constraints::{quadratic_form, ConstraintBuilder};
use crate::error::Result;
use crate::snapshot::MarketSnapshot;
use crate::solver::{AllocationSolver, SolveStrategy, SolverSettings};
use crate::types::{Allocation, AssetBounds, AssetId, CategoryBounds, RiskBudget};
use crate::validation::{validate_bounds, validate_category_bounds};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Default cap on the number of holdings
pub const DEFAULT_MAX_ASSETS: usize = 10;

/// What the caller wants from one optimization
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRequest {
    pub asset_bounds: AssetBounds,
    pub category_bounds: CategoryBounds,
    pub risk_budget: Option<RiskBudget>,
    /// Maximum number of holdings after truncation
    pub n_max_assets: usize,
}

impl Default for AllocationRequest {
    fn default() -> Self {
        Self {
            asset_bounds: AssetBounds::new(),
            category_bounds: CategoryBounds::new(),
            risk_budget: None,
            n_max_assets: DEFAULT_MAX_ASSETS,
        }
    }
}

impl AllocationRequest {
    /// Start from the snapshot's default bound maps
    pub fn from_snapshot(snapshot: &MarketSnapshot) -> Self {
        Self {
            asset_bounds: snapshot.default_asset_bounds().clone(),
            category_bounds: snapshot.default_category_bounds().clone(),
            ..Self::default()
        }
    }

    pub fn with_n_max_assets(mut self, n_max_assets: usize) -> Self {
        self.n_max_assets = n_max_assets;
        self
    }

    pub fn with_risk_budget(mut self, risk_budget: Option<RiskBudget>) -> Self {
        self.risk_budget = risk_budget;
        self
    }

    /// Overlay bounds on top of the current maps
    pub fn with_overrides(mut self, assets: &AssetBounds, categories: &CategoryBounds) -> Self {
        for (asset, bound) in assets {
            self.asset_bounds.insert(asset.clone(), *bound);
        }
        for (grouping, cats) in categories {
            let entry = self.category_bounds.entry(grouping.clone()).or_default();
            for (category, bound) in cats {
                entry.insert(category.clone(), *bound);
            }
        }
        self
    }

    /// Check the merged bound maps, profile defaults included
    pub fn validate(&self) -> Result<()> {
        validate_bounds(&self.asset_bounds)?;
        validate_category_bounds(&self.category_bounds)?;
        Ok(())
    }
}

/// Optimized portfolio result
#[derive(Debug, Clone)]
pub struct OptimizedPortfolio {
    /// Solver weights over the whole active universe, largest first
    pub continuous: Vec<(AssetId, f64)>,
    /// Truncated, renormalized holdings
    pub allocation: Allocation,
    pub strategy: SolveStrategy,
    /// Expected return of the truncated allocation
    pub expected_return: f64,
    /// Variance of the truncated allocation
    pub variance: f64,
    pub volatility: f64,
    /// Effective number of assets (1/sum(w^2))
    pub effective_n: f64,
}

/// Portfolio optimizer
pub struct PortfolioOptimizer {
    solver: AllocationSolver,
}

impl PortfolioOptimizer {
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            solver: AllocationSolver::new(settings),
        }
    }

    pub fn solver(&self) -> &AllocationSolver {
        &self.solver
    }

    /// Validate, constrain, solve and truncate
    pub fn optimize(
        &self,
        snapshot: &MarketSnapshot,
        request: &AllocationRequest,
    ) -> Result<OptimizedPortfolio> {
        request.validate()?;

        let assets = snapshot.assets();
        let constraints = ConstraintBuilder::new(assets, request.n_max_assets)
            .asset_bounds(&request.asset_bounds)
            .category_bounds(&request.category_bounds, snapshot.index())
            .risk_budget(request.risk_budget, snapshot.sigma())
            .build()?;

        for grouping in snapshot.index().empty_groupings() {
            debug!(grouping, "Grouping has no active categories, no constraint applied");
        }

        let solution = self.solver.solve(snapshot.mu(), &constraints)?;

        let mut continuous: Vec<(AssetId, f64)> = assets
            .iter()
            .cloned()
            .zip(solution.weights.iter().copied())
            .collect();
        continuous.sort_by(|(a, wa), (b, wb)| {
            wb.partial_cmp(wa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cmp(b))
        });

        let allocation = truncate(&continuous, request.n_max_assets);
        let result = self.build_result(snapshot, continuous, allocation, solution.strategy);

        info!(
            holdings = result.allocation.len(),
            strategy = %result.strategy,
            expected_return = result.expected_return,
            volatility = result.volatility,
            "Optimized portfolio"
        );

        Ok(result)
    }

    fn build_result(
        &self,
        snapshot: &MarketSnapshot,
        continuous: Vec<(AssetId, f64)>,
        allocation: Allocation,
        strategy: SolveStrategy,
    ) -> OptimizedPortfolio {
        // Truncated weights spread back over the full asset order
        let weights: Vec<f64> = snapshot
            .assets()
            .iter()
            .map(|a| allocation.weight(a).unwrap_or(0.0))
            .collect();

        let expected_return: f64 = weights
            .iter()
            .zip(snapshot.mu())
            .map(|(w, r)| w * r)
            .sum();

        let variance = quadratic_form(&weights, snapshot.sigma()).max(0.0);
        let volatility = variance.sqrt();

        let sum_w_sq: f64 = weights.iter().map(|w| w * w).sum();
        let effective_n = if sum_w_sq > 0.0 { 1.0 / sum_w_sq } else { 0.0 };

        OptimizedPortfolio {
            continuous,
            allocation,
            strategy,
            expected_return,
            variance,
            volatility,
            effective_n,
        }
    }
}

impl Default for PortfolioOptimizer {
    fn default() -> Self {
        Self::new(SolverSettings::default())
    }
}
