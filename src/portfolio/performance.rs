//! # Performance
//!
//! $$
//! TE=\sqrt{252}\ \operatorname{sd}_{1}(r^p-r^b),\qquad
//! \tau=\frac{1}{K}\sum_{t}\sum_{n}\lvert x_{t,n}-x_{t+1,n}\rvert\cdot\frac{D}{s}
//! $$
//!
//! Tracking error and annualised turnover of a rebalanced portfolio.

use ndarray::Array1;
use ndarray::ArrayView1;

use crate::error::PortfolioError;
use crate::error::PortfolioResult;
use crate::TRADING_DAYS_PER_YEAR;

/// Annualised tracking error over 252 trading days.
///
/// Both arguments are per-date aggregate returns (weights · returns summed over
/// assets) on the same date index.
pub fn tracking_error(
  benchmark_returns: ArrayView1<'_, f64>,
  portfolio_returns: ArrayView1<'_, f64>,
) -> PortfolioResult<f64> {
  tracking_error_with_periods(benchmark_returns, portfolio_returns, TRADING_DAYS_PER_YEAR)
}

/// Annualised tracking error with an explicit number of periods per year.
///
/// Dates where either series is `NaN` are skipped. The Bessel-corrected standard
/// deviation needs at least two remaining observations.
pub fn tracking_error_with_periods(
  benchmark_returns: ArrayView1<'_, f64>,
  portfolio_returns: ArrayView1<'_, f64>,
  periods_per_year: usize,
) -> PortfolioResult<f64> {
  if benchmark_returns.len() != portfolio_returns.len() {
    return Err(PortfolioError::shape(
      "tracking_error",
      format!("{} benchmark observations", benchmark_returns.len()),
      format!("{} portfolio observations", portfolio_returns.len()),
    ));
  }
  if periods_per_year == 0 {
    return Err(PortfolioError::invalid("periods_per_year", "must be positive"));
  }

  let diff: Array1<f64> = portfolio_returns
    .iter()
    .zip(benchmark_returns.iter())
    .filter(|(p, b)| !p.is_nan() && !b.is_nan())
    .map(|(p, b)| p - b)
    .collect();

  if diff.len() < 2 {
    return Err(PortfolioError::DegenerateWindow {
      context: "tracking_error",
      observations: diff.len(),
      required: 2,
    });
  }

  Ok((periods_per_year as f64).sqrt() * diff.std(1.0))
}

/// Annualised portfolio turnover.
///
/// Sums `|x_{t,n} − x_{t+1,n}|` over consecutive weight vectors and all assets,
/// divides by `rebalance_count` (the number of transitions) and scales by
/// `trading_days_per_year / shift_size`.
pub fn portfolio_turnover(
  all_rebalance_weights: &[Array1<f64>],
  shift_size: usize,
  rebalance_count: usize,
  trading_days_per_year: usize,
) -> PortfolioResult<f64> {
  if shift_size == 0 {
    return Err(PortfolioError::invalid("shift_size", "must be positive"));
  }
  if rebalance_count == 0 {
    return Err(PortfolioError::invalid("rebalance_count", "must be positive"));
  }
  if all_rebalance_weights.len() < 2 {
    return Err(PortfolioError::DegenerateWindow {
      context: "portfolio_turnover",
      observations: all_rebalance_weights.len(),
      required: 2,
    });
  }

  let m = all_rebalance_weights[0].len();
  let mut total = 0.0;
  for pair in all_rebalance_weights.windows(2) {
    if pair[1].len() != m {
      return Err(PortfolioError::shape(
        "portfolio_turnover",
        format!("{m} weights"),
        format!("{} weights", pair[1].len()),
      ));
    }
    total += (&pair[0] - &pair[1]).mapv(f64::abs).sum();
  }

  Ok(total / rebalance_count as f64 * (trading_days_per_year as f64 / shift_size as f64))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use ndarray::s;

  use super::*;

  #[test]
  fn turnover_of_single_transition() {
    let weights = vec![array![0.5, 0.5], array![0.7, 0.3]];
    let turnover = portfolio_turnover(&weights, 5, 1, 252).unwrap();
    assert_abs_diff_eq!(turnover, 20.16, epsilon = 1e-9);
  }

  #[test]
  fn turnover_averages_over_transitions() {
    let weights = vec![array![1.0, 0.0], array![0.0, 1.0], array![0.0, 1.0]];
    let turnover = portfolio_turnover(&weights, 21, 2, 252).unwrap();
    assert_abs_diff_eq!(turnover, 2.0 / 2.0 * 12.0, epsilon = 1e-12);
  }

  #[test]
  fn turnover_validates_inputs() {
    let weights = vec![array![0.5, 0.5], array![0.7, 0.3]];
    assert!(matches!(
      portfolio_turnover(&weights, 0, 1, 252),
      Err(PortfolioError::InvalidParameter { name: "shift_size", .. })
    ));
    assert!(matches!(
      portfolio_turnover(&weights, 5, 0, 252),
      Err(PortfolioError::InvalidParameter { name: "rebalance_count", .. })
    ));
    assert!(matches!(
      portfolio_turnover(&weights[..1], 5, 1, 252),
      Err(PortfolioError::DegenerateWindow { observations: 1, .. })
    ));
    assert!(matches!(
      portfolio_turnover(&[array![0.5, 0.5], array![1.0]], 5, 1, 252),
      Err(PortfolioError::ShapeMismatch { .. })
    ));
  }

  #[test]
  fn tracking_error_of_known_series() {
    let benchmark = array![0.01, 0.02, 0.03, 0.04];
    let portfolio = array![0.02, 0.01, 0.05, 0.04];
    // diff = [0.01, -0.01, 0.02, 0.0], mean 0.005, sum of squared deviations 0.0005
    let sd = (0.0005_f64 / 3.0).sqrt();

    let te = tracking_error(benchmark.view(), portfolio.view()).unwrap();
    assert_abs_diff_eq!(te, 252f64.sqrt() * sd, epsilon = 1e-12);
  }

  #[test]
  fn tracking_error_skips_missing_dates() {
    let benchmark = array![f64::NAN, 0.01, 0.02, 0.03, 0.04];
    let portfolio = array![0.3, 0.02, 0.01, 0.05, 0.04];

    let with_gap = tracking_error(benchmark.view(), portfolio.view()).unwrap();
    let without = tracking_error(benchmark.slice(s![1..]), portfolio.slice(s![1..])).unwrap();
    assert_eq!(with_gap, without);
  }

  #[test]
  fn tracking_error_of_identical_series_is_zero() {
    let r = array![0.01, -0.02, 0.005];
    assert_eq!(tracking_error(r.view(), r.view()).unwrap(), 0.0);
  }

  #[test]
  fn tracking_error_needs_two_observations() {
    let err = tracking_error(array![0.01].view(), array![0.02].view()).unwrap_err();
    assert!(matches!(err, PortfolioError::DegenerateWindow { observations: 1, .. }));

    let err = tracking_error(array![0.01, 0.02].view(), array![0.02].view()).unwrap_err();
    assert!(matches!(err, PortfolioError::ShapeMismatch { .. }));
  }
}
