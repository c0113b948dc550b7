//! Positive semi-definite handling of sample covariance matrices
//!
//! A sample covariance is PSD in exact arithmetic but can pick up tiny
//! negative eigenvalues in floating point. The solver needs a factor `F`
//! with `Σ ≈ F Fᵀ`; we get it from the eigen-decomposition with negative
//! eigenvalues clipped to zero, which is also the nearest PSD matrix in
//! Frobenius norm.

use crate::error::{Error, Result};
use nalgebra::{DMatrix, SymmetricEigen};
use tracing::{debug, warn};

/// `Σ ≈ F Fᵀ` with `F` of shape `n x rank`
#[derive(Debug, Clone)]
pub struct CovarianceFactor {
    factor: DMatrix<f64>,
    clipped: usize,
}

impl CovarianceFactor {
    pub fn n_assets(&self) -> usize {
        self.factor.nrows()
    }

    pub fn rank(&self) -> usize {
        self.factor.ncols()
    }

    /// Eigenvalues discarded as non-positive
    pub fn clipped(&self) -> usize {
        self.clipped
    }

    /// Entry `(asset, column)` of `F`
    pub fn get(&self, asset: usize, column: usize) -> f64 {
        self.factor[(asset, column)]
    }

    /// `F Fᵀ` as nested rows
    pub fn reconstruct(&self) -> Vec<Vec<f64>> {
        let m = &self.factor * self.factor.transpose();
        (0..m.nrows())
            .map(|i| (0..m.ncols()).map(|j| m[(i, j)]).collect())
            .collect()
    }
}

/// Factor a covariance matrix, projecting onto the PSD cone first.
///
/// Eigenvalues at or below `tolerance * max|λ|` are treated as zero.
pub fn factorize(covariance: &[Vec<f64>], tolerance: f64) -> Result<CovarianceFactor> {
    let n = covariance.len();
    if covariance.iter().any(|row| row.len() != n) {
        return Err(Error::Numerical("covariance matrix is not square".to_string()));
    }
    if covariance.iter().flatten().any(|v| !v.is_finite()) {
        return Err(Error::Numerical(
            "covariance matrix has non-finite entries".to_string(),
        ));
    }

    let symmetric = DMatrix::from_fn(n, n, |i, j| 0.5 * (covariance[i][j] + covariance[j][i]));
    let eigen = SymmetricEigen::new(symmetric);

    let scale = eigen
        .eigenvalues
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let threshold = tolerance * scale;

    let kept: Vec<usize> = (0..n)
        .filter(|&k| eigen.eigenvalues[k] > threshold)
        .collect();
    let clipped = n - kept.len();

    let most_negative = eigen
        .eigenvalues
        .iter()
        .fold(0.0_f64, |acc, &v| acc.min(v));
    if most_negative < -threshold.max(f64::EPSILON) * 1e3 {
        warn!(
            eigenvalue = most_negative,
            "Covariance is indefinite beyond rounding noise, projecting to nearest PSD"
        );
    } else if clipped > 0 {
        debug!(clipped, "Clipped non-positive covariance eigenvalues");
    }

    let factor = DMatrix::from_fn(n, kept.len(), |i, c| {
        let k = kept[c];
        eigen.eigenvectors[(i, k)] * eigen.eigenvalues[k].sqrt()
    });

    Ok(CovarianceFactor { factor, clipped })
}

/// Nearest PSD matrix to `covariance`
pub fn nearest_psd(covariance: &[Vec<f64>], tolerance: f64) -> Result<Vec<Vec<f64>>> {
    Ok(factorize(covariance, tolerance)?.reconstruct())
}
