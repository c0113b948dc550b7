//! Crypto Portfolio Optimiser
//!
//! Constrained, return-maximizing allocation over a universe of crypto
//! assets, with per-asset and per-category bounds, an optional variance
//! budget and a cap on the number of holdings.
//!
//! ## Architecture
//!
//! ```text
//! prices.csv ──→ Estimator (mu, Σ) ──┐
//!                                    ├─→ MarketSnapshot ─→ ConstraintBuilder ─→ Solver ─→ Truncator
//! metadata.csv ─→ CategoryIndex ─────┘         ↑                  ↑
//! groupings.json ───────┘             Profile defaults     Validated bounds
//! ```

pub mod category;
pub mod config;
pub mod constraints;
pub mod data;
pub mod error;
pub mod estimator;
pub mod portfolio;
pub mod profile;
pub mod snapshot;
pub mod solver;
pub mod types;
pub mod validation;

pub use error::{Error, Result};

#[cfg(test)]
mod integration_tests;
