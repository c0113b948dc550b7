//! Configuration management

use crate::category::MarketCapTiers;
use crate::error::Result;
use crate::estimator::EstimatorSettings;
use crate::portfolio::DEFAULT_MAX_ASSETS;
use crate::profile::{InvestorProfile, MarketCapSelection};
use crate::snapshot::Selection;
use crate::solver::SolverSettings;
use crate::types::{AssetBounds, CategoryBounds, RiskBudget};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `CRYPTO_PORTFOLIO__SOLVER__N_MAX_ASSETS`
pub const ENV_PREFIX: &str = "CRYPTO_PORTFOLIO";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub estimator: EstimatorSettings,
    #[serde(default)]
    pub market_cap: MarketCapTiers,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
}

/// Input file locations. `~` and `$VAR` are expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_prices_path")]
    pub prices_path: String,
    #[serde(default = "default_metadata_path")]
    pub metadata_path: String,
    #[serde(default = "default_groupings_path")]
    pub groupings_path: String,
    #[serde(default = "default_simple_groupings_path")]
    pub simple_groupings_path: String,
}

fn default_prices_path() -> String {
    "data/prices.csv".to_string()
}
fn default_metadata_path() -> String {
    "data/coin_metadata.csv".to_string()
}
fn default_groupings_path() -> String {
    "data/category_groupings.json".to_string()
}
fn default_simple_groupings_path() -> String {
    "data/category_groupings_simple.json".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            prices_path: default_prices_path(),
            metadata_path: default_metadata_path(),
            groupings_path: default_groupings_path(),
            simple_groupings_path: default_simple_groupings_path(),
        }
    }
}

impl DataConfig {
    pub fn prices(&self) -> PathBuf {
        expand_path(&self.prices_path)
    }

    pub fn metadata(&self) -> PathBuf {
        expand_path(&self.metadata_path)
    }

    /// Groupings document for a mode
    pub fn groupings(&self, mode: GroupingMode) -> PathBuf {
        match mode {
            GroupingMode::Full => expand_path(&self.groupings_path),
            GroupingMode::Simple => expand_path(&self.simple_groupings_path),
        }
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::full(path).map_or_else(|_| path.to_string(), |p| p.into_owned()))
}

/// Allocation and solver parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_n_max_assets")]
    pub n_max_assets: usize,
    /// Variance ceiling; omitted for a purely linear solve
    #[serde(default)]
    pub risk_budget: Option<f64>,
    #[serde(default = "default_max_iter")]
    pub max_iter: u32,
    #[serde(default = "default_solver_tolerance")]
    pub tol_feas: f64,
    #[serde(default = "default_solver_tolerance")]
    pub tol_gap: f64,
    #[serde(default = "default_acceptance_tolerance")]
    pub acceptance_tolerance: f64,
    #[serde(default = "default_eigen_tolerance")]
    pub eigen_tolerance: f64,
    #[serde(default)]
    pub verbose: bool,
}

fn default_n_max_assets() -> usize {
    DEFAULT_MAX_ASSETS
}
fn default_max_iter() -> u32 {
    SolverSettings::default().max_iter
}
fn default_solver_tolerance() -> f64 {
    SolverSettings::default().tol_feas
}
fn default_acceptance_tolerance() -> f64 {
    SolverSettings::default().acceptance_tolerance
}
fn default_eigen_tolerance() -> f64 {
    SolverSettings::default().eigen_tolerance
}

impl Default for SolverConfig {
    fn default() -> Self {
        let settings = SolverSettings::default();
        Self {
            n_max_assets: DEFAULT_MAX_ASSETS,
            risk_budget: None,
            max_iter: settings.max_iter,
            tol_feas: settings.tol_feas,
            tol_gap: settings.tol_gap,
            acceptance_tolerance: settings.acceptance_tolerance,
            eigen_tolerance: settings.eigen_tolerance,
            verbose: settings.verbose,
        }
    }
}

impl SolverConfig {
    pub fn settings(&self) -> SolverSettings {
        SolverSettings {
            max_iter: self.max_iter,
            tol_feas: self.tol_feas,
            tol_gap: self.tol_gap,
            acceptance_tolerance: self.acceptance_tolerance,
            eigen_tolerance: self.eigen_tolerance,
            verbose: self.verbose,
        }
    }

    pub fn risk_budget(&self) -> Result<Option<RiskBudget>> {
        self.risk_budget.map(RiskBudget::new).transpose()
    }
}

/// Which groupings document to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMode {
    /// Fewer, broader groupings
    Simple,
    #[default]
    Full,
}

/// Universe selection and user bound overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub mode: GroupingMode,
    pub market_caps: MarketCapSelection,
    pub profile: InvestorProfile,
    /// `{asset = [min, max]}` applied over the profile defaults
    pub asset_bounds: AssetBounds,
    /// `{grouping = {category = [min, max]}}` applied over the profile defaults
    pub category_bounds: CategoryBounds,
}

impl Config {
    /// Load configuration from a file, with `CRYPTO_PORTFOLIO__*` environment
    /// overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Snapshot selection for the configured mode, caps and profile
    pub fn selection(&self) -> Selection {
        Selection {
            groupings_path: self.data.groupings(self.selection.mode),
            market_caps: self.selection.market_caps,
            profile: self.selection.profile,
        }
    }
}
