//! # Tracking Optimizer
//!
//! $$
//! \min_{\mathbf{x}}\ \mathbf{x}^\top P\mathbf{x}+\lambda\lVert\mathbf{x}-\mathbf{w}\rVert_2
//! \quad\text{s.t.}\quad \mathbf{x}\ge 0,\ \mathbf{1}^\top\mathbf{x}=1
//! $$
//!
//! Minimum-variance, index-tracking, long-only weights. The norm term is lifted into
//! an epigraph variable `t` with `(t, x − w)` in the second-order cone, so the
//! problem handed to the conic solver is
//!
//! $$
//! \min_{(\mathbf{x},t)}\ \tfrac12 (\mathbf{x},t)^\top\begin{pmatrix}2P&0\\0&0\end{pmatrix}(\mathbf{x},t)+\lambda t
//! $$

use std::time::Duration;

use clarabel::algebra::CscMatrix;
use clarabel::solver::*;
use ndarray::array;
use ndarray::Array1;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::error::PortfolioError;
use crate::error::PortfolioResult;
use crate::traits::TrackingProblem;
use crate::traits::TrackingSolver;

/// Default penalty on the distance to the index weights.
pub const DEFAULT_SCALE: f64 = 2.0;

/// Maximum admissible deviation of `Σx` from one in a solver result.
pub const BUDGET_TOLERANCE: f64 = 1e-4;

/// Interior-point settings for [`ClarabelSolver`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
  /// Iteration cap per solve.
  pub max_iter: u32,
  /// Wall-clock limit per solve. `None` means unlimited.
  pub time_limit: Option<Duration>,
  /// Print the solver's iteration log.
  pub verbose: bool,
}

impl Default for SolverSettings {
  fn default() -> Self {
    Self {
      max_iter: 200,
      time_limit: None,
      verbose: false,
    }
  }
}

/// [`TrackingSolver`] backed by the Clarabel interior-point conic solver.
#[derive(Clone, Debug, Default)]
pub struct ClarabelSolver {
  settings: SolverSettings,
}

impl ClarabelSolver {
  pub fn new(settings: SolverSettings) -> Self {
    Self { settings }
  }

  pub fn settings(&self) -> &SolverSettings {
    &self.settings
  }
}

impl TrackingSolver for ClarabelSolver {
  fn solve(&self, problem: &TrackingProblem<'_>) -> PortfolioResult<Array1<f64>> {
    let m = problem.assets();
    let failure = |status: String| PortfolioError::OptimizationFailure {
      day: None,
      assets: m,
      observations: None,
      status,
    };

    let p = quadratic_term(problem.covariance);
    let mut q = vec![0.0; m + 1];
    q[m] = problem.scale;
    let (a, b) = constraint_system(problem.index_weights);
    let cones = [ZeroConeT(1), NonnegativeConeT(m), SecondOrderConeT(m + 1)];

    let time_limit = self
      .settings
      .time_limit
      .map(|d| d.as_secs_f64())
      .unwrap_or(f64::INFINITY);
    let settings = DefaultSettingsBuilder::default()
      .max_iter(self.settings.max_iter)
      .time_limit(time_limit)
      .verbose(self.settings.verbose)
      .build()
      .map_err(|e| failure(format!("invalid solver settings: {e}")))?;

    let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings)
      .map_err(|e| failure(format!("solver setup failed: {e:?}")))?;
    solver.solve();

    match &solver.solution.status {
      SolverStatus::Solved => {}
      SolverStatus::AlmostSolved => {
        warn!(
          assets = m,
          iterations = solver.solution.iterations,
          "tracking problem solved to reduced accuracy"
        );
      }
      status => return Err(failure(format!("{status:?}"))),
    }

    Ok(Array1::from_iter(solver.solution.x.iter().take(m).copied()))
  }
}

/// Upper triangle of `2P`, padded with an empty column for the epigraph variable.
fn quadratic_term(cov: ArrayView2<'_, f64>) -> CscMatrix<f64> {
  let m = cov.nrows();
  let mut colptr = Vec::with_capacity(m + 2);
  let mut rowval = Vec::new();
  let mut nzval = Vec::new();

  colptr.push(0);
  for j in 0..m {
    for i in 0..=j {
      let v = cov[[i, j]] + cov[[j, i]];
      if v != 0.0 {
        rowval.push(i);
        nzval.push(v);
      }
    }
    colptr.push(nzval.len());
  }
  colptr.push(nzval.len());

  CscMatrix::new(m + 1, m + 1, colptr, rowval, nzval)
}

/// Rows: budget (zero cone), long-only (non-negative cone), `(t, x − w)` (second-order cone).
fn constraint_system(index_weights: ArrayView1<'_, f64>) -> (CscMatrix<f64>, Vec<f64>) {
  let m = index_weights.len();
  let rows = 2 * m + 2;
  let mut colptr = Vec::with_capacity(m + 2);
  let mut rowval = Vec::with_capacity(3 * m + 1);
  let mut nzval = Vec::with_capacity(3 * m + 1);

  colptr.push(0);
  for j in 0..m {
    rowval.extend([0, 1 + j, m + 2 + j]);
    nzval.extend([1.0, -1.0, -1.0]);
    colptr.push(nzval.len());
  }
  rowval.push(m + 1);
  nzval.push(-1.0);
  colptr.push(nzval.len());

  let mut b = Vec::with_capacity(rows);
  b.push(1.0);
  b.extend(std::iter::repeat(0.0).take(m + 1));
  b.extend(index_weights.iter().map(|w| -w));

  (CscMatrix::new(rows, m + 1, colptr, rowval, nzval), b)
}

/// Optimal long-only, fully invested weights with the default solver.
pub fn optimal_weights(
  covariance: ArrayView2<'_, f64>,
  index_weights: ArrayView1<'_, f64>,
  scale: f64,
) -> PortfolioResult<Array1<f64>> {
  optimal_weights_with(&ClarabelSolver::default(), covariance, index_weights, scale)
}

/// Optimal long-only, fully invested weights using `solver`.
///
/// Inputs are validated before the solver runs: `index_weights` must lie on the
/// simplex within [`BUDGET_TOLERANCE`]. The raw solution must be finite and
/// sum to one within [`BUDGET_TOLERANCE`]; tiny negative entries left by the
/// interior-point iterations are clipped and the vector renormalised.
pub fn optimal_weights_with<S: TrackingSolver + ?Sized>(
  solver: &S,
  covariance: ArrayView2<'_, f64>,
  index_weights: ArrayView1<'_, f64>,
  scale: f64,
) -> PortfolioResult<Array1<f64>> {
  validate(covariance, index_weights, scale)?;

  let m = index_weights.len();
  if m == 1 {
    return Ok(array![1.0]);
  }

  let problem = TrackingProblem::new(covariance.view(), index_weights.view(), scale);
  let mut x = solver.solve(&problem)?;

  let failure = |status: String| PortfolioError::OptimizationFailure {
    day: None,
    assets: m,
    observations: None,
    status,
  };

  if x.len() != m {
    return Err(failure(format!("solver returned {} weights for {m} assets", x.len())));
  }
  if x.iter().any(|v| !v.is_finite()) {
    return Err(failure("solver returned non-finite weights".to_string()));
  }
  let raw_sum = x.sum();
  if (raw_sum - 1.0).abs() > BUDGET_TOLERANCE {
    return Err(failure(format!("weights sum to {raw_sum:.6}, expected 1")));
  }

  x.mapv_inplace(|v| v.max(0.0));
  let total = x.sum();
  x /= total;

  Ok(x)
}

fn validate(
  covariance: ArrayView2<'_, f64>,
  index_weights: ArrayView1<'_, f64>,
  scale: f64,
) -> PortfolioResult<()> {
  let m = index_weights.len();
  if m == 0 {
    return Err(PortfolioError::shape("optimal_weights", "at least 1 asset", "0 assets"));
  }
  if covariance.dim() != (m, m) {
    return Err(PortfolioError::shape(
      "optimal_weights",
      format!("{m}x{m} covariance"),
      format!("{}x{} covariance", covariance.nrows(), covariance.ncols()),
    ));
  }
  if !(scale.is_finite() && scale > 0.0) {
    return Err(PortfolioError::invalid("scale", format!("must be positive and finite, got {scale}")));
  }
  if covariance.iter().any(|v| !v.is_finite()) {
    return Err(PortfolioError::invalid("covariance", "contains non-finite entries"));
  }
  if index_weights.iter().any(|v| !v.is_finite()) {
    return Err(PortfolioError::invalid("index_weights", "contains non-finite entries"));
  }
  if index_weights.iter().any(|&v| v < 0.0) {
    return Err(PortfolioError::invalid("index_weights", "contains negative entries"));
  }
  let total = index_weights.sum();
  if (total - 1.0).abs() > BUDGET_TOLERANCE {
    return Err(PortfolioError::invalid(
      "index_weights",
      format!("must sum to 1, got {total:.6}"),
    ));
  }
  Ok(())
}
