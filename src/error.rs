//! # Errors
//!
//! $$
//! f:\text{inputs}\to\text{Result}\langle T,\ \text{PortfolioError}\rangle
//! $$
//!
//! Every failure in the pipeline is local and synchronous, and is surfaced to the
//! caller of the operation that produced it. Nothing is downgraded to a default value.

use thiserror::Error;

/// Result type for portfolio operations.
pub type PortfolioResult<T> = Result<T, PortfolioError>;

/// Errors produced by the rebalancing pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
  /// Inputs with misaligned date or asset indices, or inconsistent dimensions.
  #[error("shape mismatch in {context}: expected {expected}, got {got}")]
  ShapeMismatch {
    /// Operation that rejected the input.
    context: &'static str,
    /// Expected shape or index.
    expected: String,
    /// Shape or index actually supplied.
    got: String,
  },

  /// Too few observations for a sample statistic.
  #[error("degenerate window in {context}: {observations} observation(s), at least {required} required")]
  DegenerateWindow {
    /// Operation that rejected the input.
    context: &'static str,
    /// Observations supplied.
    observations: usize,
    /// Minimum number of observations.
    required: usize,
  },

  /// The convex solver did not produce an acceptable solution.
  #[error("optimization failed{}: {status} ({assets} assets)", tick_context(.day, .observations))]
  OptimizationFailure {
    /// Rebalance day, when the failure happened inside a schedule.
    day: Option<usize>,
    /// Number of assets in the problem.
    assets: usize,
    /// Window length used to estimate the covariance, when known.
    observations: Option<usize>,
    /// Solver status or reason.
    status: String,
  },

  /// A parameter outside its admissible range.
  #[error("invalid parameter `{name}`: {reason}")]
  InvalidParameter {
    /// Parameter name.
    name: &'static str,
    /// Why the value was rejected.
    reason: String,
  },

  /// The schedule was cancelled before the solve for `day` started.
  #[error("rebalance cancelled before day {day}")]
  Cancelled {
    /// First day that was not solved.
    day: usize,
  },
}

impl PortfolioError {
  pub(crate) fn shape(context: &'static str, expected: impl ToString, got: impl ToString) -> Self {
    Self::ShapeMismatch {
      context,
      expected: expected.to_string(),
      got: got.to_string(),
    }
  }

  pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
    Self::InvalidParameter {
      name,
      reason: reason.into(),
    }
  }

  /// Attach the rebalance day and window length to an optimization failure.
  ///
  /// Other variants are returned unchanged.
  pub fn at_tick(self, tick_day: usize, window: usize) -> Self {
    match self {
      Self::OptimizationFailure { assets, status, .. } => Self::OptimizationFailure {
        day: Some(tick_day),
        assets,
        observations: Some(window),
        status,
      },
      other => other,
    }
  }
}

fn tick_context(day: &Option<usize>, observations: &Option<usize>) -> String {
  match (day, observations) {
    (Some(d), Some(n)) => format!(" at day {d} (window of {n} observations)"),
    (Some(d), None) => format!(" at day {d}"),
    (None, Some(n)) => format!(" (window of {n} observations)"),
    (None, None) => String::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn at_tick_annotates_optimization_failures_only() {
    let err = PortfolioError::OptimizationFailure {
      day: None,
      assets: 3,
      observations: None,
      status: "PrimalInfeasible".to_string(),
    }
    .at_tick(42, 250);

    assert_eq!(
      err,
      PortfolioError::OptimizationFailure {
        day: Some(42),
        assets: 3,
        observations: Some(250),
        status: "PrimalInfeasible".to_string(),
      }
    );
    assert_eq!(
      err.to_string(),
      "optimization failed at day 42 (window of 250 observations): PrimalInfeasible (3 assets)"
    );

    let other = PortfolioError::Cancelled { day: 7 }.at_tick(9, 10);
    assert_eq!(other, PortfolioError::Cancelled { day: 7 });
  }
}
