//! # Portfolio Data Utilities
//!
//! $$
//! r_{t,i}=\frac{p_{t,i}-p_{t-1,i}}{p_{t-1,i}},\qquad w_{t,i}=\frac{p_{t,i}v_{t,i}}{\sum_j p_{t,j}v_{t,j}}
//! $$
//!
//! Elementwise helpers that prepare the inputs of a rebalance run and post-process
//! its weights. None of them carry state.

use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray::Zip;

use super::types::RebalanceEvent;
use super::types::ReturnSeries;
use super::types::TimePanel;
use super::types::WeightPanel;
use crate::error::PortfolioError;
use crate::error::PortfolioResult;

fn nan_to_zero(x: f64) -> f64 {
  if x.is_nan() {
    0.0
  } else {
    x
  }
}

/// Normalise every row by its sum, skipping missing entries.
///
/// Rows whose total is zero or undefined have no shares and become `NaN`.
fn row_shares(values: &Array2<f64>) -> Array2<f64> {
  let mut out = values.mapv(nan_to_zero);
  for mut row in out.axis_iter_mut(Axis(0)) {
    let total = row.sum();
    if total != 0.0 && total.is_finite() {
      row /= total;
    } else {
      row.fill(f64::NAN);
    }
  }
  out
}

/// Simple returns per asset. The first row is `NaN` (no prior price).
pub fn generate_returns(prices: &TimePanel) -> PortfolioResult<ReturnSeries> {
  let p = prices.values();
  let mut out = Array2::from_elem(p.dim(), f64::NAN);

  if p.nrows() > 1 {
    Zip::from(out.slice_mut(s![1.., ..]))
      .and(p.slice(s![1.., ..]))
      .and(p.slice(s![..-1, ..]))
      .for_each(|r, &now, &prev| *r = (now - prev) / prev);
  }

  prices.with_values(out)
}

/// Dollar-volume share of each asset per date. Dates with no traded value are `NaN`.
pub fn dollar_volume_weights(close: &TimePanel, volume: &TimePanel) -> PortfolioResult<WeightPanel> {
  close.ensure_aligned(volume, "dollar_volume_weights")?;
  let dollar_volume = &close.values() * &volume.values();
  close.with_values(row_shares(&dollar_volume))
}

/// Share of cumulative dividends paid by each asset up to each date.
///
/// Dates before the first payment are `NaN`.
pub fn dividend_weights(dividends: &TimePanel) -> PortfolioResult<WeightPanel> {
  let mut cumulative = dividends.values().mapv(nan_to_zero);
  cumulative.accumulate_axis_inplace(Axis(0), |&prev, curr| *curr += prev);

  dividends.with_values(row_shares(&cumulative))
}

/// Elementwise product of returns and weights.
pub fn weighted_returns(returns: &ReturnSeries, weights: &WeightPanel) -> PortfolioResult<TimePanel> {
  returns.ensure_aligned(weights, "weighted_returns")?;
  returns.with_values(&returns.values() * &weights.values())
}

/// Per-date sum across assets, skipping missing entries.
pub fn aggregate_returns(weighted: ArrayView2<'_, f64>) -> Array1<f64> {
  weighted.map_axis(Axis(1), |row| row.iter().copied().map(nan_to_zero).sum())
}

/// Growth of one unit invested: `∏(1 + Σᵢ rₜ,ᵢ)`.
pub fn cumulative_returns(weighted: ArrayView2<'_, f64>) -> Array1<f64> {
  let mut growth = aggregate_returns(weighted) + 1.0;
  growth.accumulate_axis_inplace(Axis(0), |&prev, curr| *curr *= prev);
  growth
}

/// Correlation matrix `D^{-1/2} C D^{-1/2}` from a covariance matrix.
///
/// Assets with zero variance get zero off-diagonal correlation.
pub fn correlation_from_covariance(cov: ArrayView2<'_, f64>) -> PortfolioResult<Array2<f64>> {
  let (n, m) = cov.dim();
  if n != m {
    return Err(PortfolioError::shape(
      "correlation_from_covariance",
      "square matrix",
      format!("{n}x{m}"),
    ));
  }

  let sd: Vec<f64> = (0..n).map(|i| cov[[i, i]].max(0.0).sqrt()).collect();
  Ok(Array2::from_shape_fn((n, n), |(i, j)| {
    let denom = sd[i] * sd[j];
    if i == j {
      1.0
    } else if denom > 1e-15 {
      (cov[[i, j]] / denom).clamp(-1.0, 1.0)
    } else {
      0.0
    }
  }))
}

/// Expand rebalance events into a per-date weight matrix.
///
/// Weights chosen on day `d` are held from `d + 1` until the day after the next
/// rebalance. Rows before the first holding period are `NaN`.
pub fn hold_rebalance_weights(
  events: &[RebalanceEvent],
  total_days: usize,
) -> PortfolioResult<Array2<f64>> {
  let Some(first) = events.first() else {
    return Err(PortfolioError::DegenerateWindow {
      context: "hold_rebalance_weights",
      observations: 0,
      required: 1,
    });
  };
  let m = first.weights.len();
  let mut held = Array2::from_elem((total_days, m), f64::NAN);

  for (k, event) in events.iter().enumerate() {
    if event.weights.len() != m {
      return Err(PortfolioError::shape(
        "hold_rebalance_weights",
        format!("{m} weights"),
        format!("{} weights at day {}", event.weights.len(), event.day),
      ));
    }
    if k > 0 && event.day <= events[k - 1].day {
      return Err(PortfolioError::invalid(
        "events",
        format!("days must be strictly increasing, got {} after {}", event.day, events[k - 1].day),
      ));
    }

    let start = (event.day + 1).min(total_days);
    let end = events
      .get(k + 1)
      .map(|next| (next.day + 1).min(total_days))
      .unwrap_or(total_days);
    for mut row in held.slice_mut(s![start..end, ..]).axis_iter_mut(Axis(0)) {
      row.assign(&event.weights);
    }
  }

  Ok(held)
}
