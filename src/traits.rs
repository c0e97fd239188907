//! # Traits
//!
//! $$
//! \mathcal{S}:(\Sigma,\ \mathbf{w}^{idx},\ \lambda)\to\mathbf{x}\in\Delta
//! $$
//!
use ndarray::Array1;
use ndarray::ArrayView1;
use ndarray::ArrayView2;

use crate::error::PortfolioResult;

/// Index-tracking quadratic program over the long-only simplex.
///
/// minimize `xᵀ covariance x + scale · ‖x − index_weights‖₂`
/// subject to `x ≥ 0`, `Σx = 1`.
#[derive(Clone, Debug)]
pub struct TrackingProblem<'a> {
  /// Square asset covariance matrix.
  pub covariance: ArrayView2<'a, f64>,
  /// Reference (benchmark) weights.
  pub index_weights: ArrayView1<'a, f64>,
  /// Penalty on the distance to the reference weights.
  pub scale: f64,
}

impl<'a> TrackingProblem<'a> {
  pub fn new(
    covariance: ArrayView2<'a, f64>,
    index_weights: ArrayView1<'a, f64>,
    scale: f64,
  ) -> Self {
    Self {
      covariance,
      index_weights,
      scale,
    }
  }

  /// Number of assets.
  pub fn assets(&self) -> usize {
    self.index_weights.len()
  }
}

/// A convex solver capable of solving a [`TrackingProblem`].
///
/// Implementations receive validated problems and must report any
/// non-optimal termination as [`crate::PortfolioError::OptimizationFailure`].
pub trait TrackingSolver: Send + Sync {
  /// Solve the problem and return the raw weight vector.
  fn solve(&self, problem: &TrackingProblem<'_>) -> PortfolioResult<Array1<f64>>;
}

impl<S: TrackingSolver + ?Sized> TrackingSolver for &S {
  fn solve(&self, problem: &TrackingProblem<'_>) -> PortfolioResult<Array1<f64>> {
    (**self).solve(problem)
  }
}

impl<S: TrackingSolver + ?Sized> TrackingSolver for std::sync::Arc<S> {
  fn solve(&self, problem: &TrackingProblem<'_>) -> PortfolioResult<Array1<f64>> {
    (**self).solve(problem)
  }
}
