//! # Allocation Solver
//!
//! Maximizes expected return over a [`ConstraintSet`] with the Clarabel
//! interior-point solver. Clarabel solves
//!
//! ```text
//! minimize    ½ xᵀ P x + qᵀ x
//! subject to  A x + s = b,  s ∈ K
//! ```
//!
//! so the objective is `q = -mu` with `P = 0`, linear constraints become
//! zero / nonnegative cone rows, and the variance ceiling `wᵀ Σ w <= r`
//! becomes the second-order cone `(√r, Fᵀ w)` with `Σ ≈ F Fᵀ`.
//!
//! ```rust,ignore
//! use crypto_portfolio::solver::AllocationSolver;
//!
//! let solver = AllocationSolver::new(SolverSettings::default());
//! let solution = solver.solve(&mu, &constraints)?;
//! ```

pub mod psd;

use crate::constraints::ConstraintSet;
use crate::error::{Error, Result};
use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Numerical problem class picked from the constraint set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStrategy {
    /// No risk budget: a linear program
    Linear,
    /// Risk budget present: a second-order cone program
    Conic,
}

impl SolveStrategy {
    pub fn for_constraints(constraints: &ConstraintSet) -> Self {
        if constraints.has_risk_budget() {
            SolveStrategy::Conic
        } else {
            SolveStrategy::Linear
        }
    }
}

impl fmt::Display for SolveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStrategy::Linear => write!(f, "linear"),
            SolveStrategy::Conic => write!(f, "conic"),
        }
    }
}

/// Solver tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub max_iter: u32,
    /// Primal / dual feasibility tolerance handed to Clarabel
    pub tol_feas: f64,
    /// Absolute and relative duality gap tolerance handed to Clarabel
    pub tol_gap: f64,
    /// Largest constraint violation accepted when post-checking a solution
    pub acceptance_tolerance: f64,
    /// Relative eigenvalue cut-off for the covariance factor
    pub eigen_tolerance: f64,
    pub verbose: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol_feas: 1e-8,
            tol_gap: 1e-8,
            acceptance_tolerance: 1e-6,
            eigen_tolerance: 1e-12,
            verbose: false,
        }
    }
}

/// Continuous solution aligned to the constraint set's asset order
#[derive(Debug, Clone)]
pub struct Solution {
    pub weights: Vec<f64>,
    pub strategy: SolveStrategy,
    /// `muᵀ w`
    pub expected_return: f64,
}

/// Rows of `A x + s = b` grouped by cone
#[derive(Default)]
struct ConicProblem {
    rows: Vec<Vec<f64>>,
    b: Vec<f64>,
    cones: Vec<SupportedConeT<f64>>,
}

impl ConicProblem {
    fn push_row(&mut self, row: Vec<f64>, rhs: f64) {
        self.rows.push(row);
        self.b.push(rhs);
    }

    /// `A` in compressed sparse column form
    fn a_matrix(&self, n: usize) -> CscMatrix<f64> {
        let m = self.rows.len();
        let mut colptr = Vec::with_capacity(n + 1);
        let mut rowval = Vec::new();
        let mut nzval = Vec::new();
        colptr.push(0);
        for j in 0..n {
            for (i, row) in self.rows.iter().enumerate() {
                if row[j] != 0.0 {
                    rowval.push(i);
                    nzval.push(row[j]);
                }
            }
            colptr.push(nzval.len());
        }
        CscMatrix::new(m, n, colptr, rowval, nzval)
    }
}

pub struct AllocationSolver {
    settings: SolverSettings,
}

impl AllocationSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Maximize `muᵀ w` subject to `constraints`.
    ///
    /// Fails with [`Error::Infeasible`] when the feasible region is empty and
    /// [`Error::DidNotConverge`] when the solver stalls or its answer does
    /// not satisfy the constraints to within the acceptance tolerance.
    pub fn solve(&self, mu: &[f64], constraints: &ConstraintSet) -> Result<Solution> {
        let n = constraints.n_assets();
        if mu.len() != n {
            return Err(Error::Numerical(format!(
                "expected {} returns, got {}",
                n,
                mu.len()
            )));
        }
        if n == 0 {
            return Err(Error::Infeasible);
        }
        if mu.iter().any(|m| !m.is_finite()) {
            return Err(Error::Numerical(
                "expected returns contain non-finite values".to_string(),
            ));
        }

        let strategy = SolveStrategy::for_constraints(constraints);
        let problem = self.formulate(constraints)?;

        debug!(
            %strategy,
            assets = n,
            rows = problem.rows.len(),
            "Formulated allocation problem"
        );

        let p = CscMatrix::new(n, n, vec![0; n + 1], Vec::new(), Vec::new());
        let q: Vec<f64> = mu.iter().map(|m| -m).collect();
        let a = problem.a_matrix(n);

        let settings = DefaultSettingsBuilder::default()
            .max_iter(self.settings.max_iter)
            .tol_feas(self.settings.tol_feas)
            .tol_gap_abs(self.settings.tol_gap)
            .tol_gap_rel(self.settings.tol_gap)
            .verbose(self.settings.verbose)
            .build()
            .map_err(|e| Error::Numerical(format!("invalid solver settings: {}", e)))?;

        let mut solver = DefaultSolver::new(&p, &q, &a, &problem.b, &problem.cones, settings);
        solver.solve();

        let status = solver.solution.status;
        match status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {}
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                info!(%strategy, "Allocation problem is infeasible");
                return Err(Error::Infeasible);
            }
            other => {
                warn!(%strategy, status = ?other, "Solver did not converge");
                return Err(Error::DidNotConverge {
                    status: format!("{:?}", other),
                });
            }
        }

        let raw = solver.solution.x.clone();
        let tolerance = self.settings.acceptance_tolerance;
        let violation = constraints.max_violation(&raw);
        let excess = constraints.risk_excess(&raw);
        if violation > tolerance || excess > tolerance {
            warn!(
                status = ?status,
                violation,
                excess,
                "Solver answer fails constraint post-check"
            );
            return Err(Error::DidNotConverge {
                status: format!(
                    "{:?} with constraint violation {:.3e} and risk excess {:.3e}",
                    status, violation, excess
                ),
            });
        }

        let weights: Vec<f64> = raw.iter().map(|w| w.max(0.0)).collect();
        let expected_return = weights.iter().zip(mu).map(|(w, m)| w * m).sum();

        info!(
            %strategy,
            status = ?status,
            expected_return,
            "Solved allocation"
        );

        Ok(Solution {
            weights,
            strategy,
            expected_return,
        })
    }

    fn formulate(&self, constraints: &ConstraintSet) -> Result<ConicProblem> {
        let n = constraints.n_assets();
        let mut problem = ConicProblem::default();

        // sum(w) = 1
        problem.push_row(vec![1.0; n], 1.0);
        problem.cones.push(SupportedConeT::ZeroConeT(1));

        let mut nonneg = 0;
        for i in 0..n {
            // w_i >= lower_i  <=>  -w_i + s = -lower_i
            let mut row = vec![0.0; n];
            row[i] = -1.0;
            problem.push_row(row, -constraints.lower[i]);

            let mut row = vec![0.0; n];
            row[i] = 1.0;
            problem.push_row(row, constraints.upper[i]);
            nonneg += 2;
        }

        for group in &constraints.groups {
            if group.min > 0.0 {
                let mut row = vec![0.0; n];
                for &i in &group.members {
                    row[i] = -1.0;
                }
                problem.push_row(row, -group.min);
                nonneg += 1;
            }

            let mut row = vec![0.0; n];
            for &i in &group.members {
                row[i] = 1.0;
            }
            problem.push_row(row, group.max);
            nonneg += 1;
        }
        problem.cones.push(SupportedConeT::NonnegativeConeT(nonneg));

        if let Some(risk) = &constraints.risk {
            let factor = psd::factorize(&risk.covariance, self.settings.eigen_tolerance)?;
            if factor.rank() == 0 {
                debug!("Covariance is zero, risk budget is slack");
                return Ok(problem);
            }

            // (√budget, Fᵀ w) in the second-order cone
            problem.push_row(vec![0.0; n], risk.budget.variance().sqrt());
            for c in 0..factor.rank() {
                let row = (0..n).map(|i| -factor.get(i, c)).collect();
                problem.push_row(row, 0.0);
            }
            problem
                .cones
                .push(SupportedConeT::SecondOrderConeT(1 + factor.rank()));
        }

        Ok(problem)
    }
}

impl Default for AllocationSolver {
    fn default() -> Self {
        Self::new(SolverSettings::default())
    }
}
