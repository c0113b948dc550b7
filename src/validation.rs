//! Pre-solve validation of user supplied weight-bound maps
//!
//! A cheap gate that gives fast feedback before the solver runs. Passing it
//! is necessary but not sufficient for feasibility: group bounds from
//! different groupings compound, and only the solver can detect that.

use crate::types::{CategoryBounds, WeightBound};
use std::collections::BTreeMap;
use std::fmt::Display;
use thiserror::Error;

/// Float noise tolerated when summing minimums (e.g. ten bounds of 0.1)
const SUM_TOLERANCE: f64 = 1e-9;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Bound for {key} is outside [0, 1]: [{min}, {max}]")]
    OutOfRange { key: String, min: f64, max: f64 },

    #[error("Minimum weights sum to {sum:.4}, which exceeds 1")]
    MinimumsExceedOne { sum: f64 },

    #[error("Grouping {grouping}: {source}")]
    Grouping {
        grouping: String,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("Invalid {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// Check one bound collection.
///
/// Every min and max must lie in `[0, 1]` and the minimums must sum to at
/// most one. `min <= max` is left to the caller.
pub fn validate_bounds<K: Display>(
    bounds: &BTreeMap<K, WeightBound>,
) -> Result<(), ValidationError> {
    for (key, bound) in bounds {
        if !bound.is_within_unit() {
            return Err(ValidationError::OutOfRange {
                key: key.to_string(),
                min: bound.min,
                max: bound.max,
            });
        }
    }

    let sum: f64 = bounds.values().map(|b| b.min).sum();
    if sum > 1.0 + SUM_TOLERANCE {
        return Err(ValidationError::MinimumsExceedOne { sum });
    }

    Ok(())
}

/// Convenience wrapper returning a plain verdict
pub fn is_valid<K: Display>(bounds: &BTreeMap<K, WeightBound>) -> bool {
    validate_bounds(bounds).is_ok()
}

/// Check each grouping's bounds independently
pub fn validate_category_bounds(bounds: &CategoryBounds) -> Result<(), ValidationError> {
    for (grouping, categories) in bounds {
        validate_bounds(categories).map_err(|e| ValidationError::Grouping {
            grouping: grouping.clone(),
            source: Box::new(e),
        })?;
    }
    Ok(())
}
