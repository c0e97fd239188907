//! # Portfolio Types
//!
//! $$
//! R\in\mathbb{R}^{T\times M},\qquad W\in\Delta^{T}
//! $$
//!
//! Date/asset indexed matrices and the records produced by a rebalance schedule.

use chrono::NaiveDate;
use impl_new_derive::ImplNew;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;

use crate::error::PortfolioError;
use crate::error::PortfolioResult;

/// A dates × assets matrix sharing its index with every other panel in a run.
///
/// Missing observations are stored as `NaN`.
#[derive(Clone, Debug, PartialEq)]
pub struct TimePanel {
  dates: Vec<NaiveDate>,
  assets: Vec<String>,
  values: Array2<f64>,
}

/// Simple periodic returns, first row undefined.
pub type ReturnSeries = TimePanel;

/// Per-date weights, each row non-negative and summing to one.
pub type WeightPanel = TimePanel;

impl TimePanel {
  /// Build a panel, checking that `values` is `dates.len() × assets.len()`.
  pub fn new(
    dates: Vec<NaiveDate>,
    assets: Vec<String>,
    values: Array2<f64>,
  ) -> PortfolioResult<Self> {
    let expected = (dates.len(), assets.len());
    if values.dim() != expected {
      return Err(PortfolioError::shape(
        "TimePanel::new",
        format!("{}x{}", expected.0, expected.1),
        format!("{}x{}", values.nrows(), values.ncols()),
      ));
    }

    Ok(Self {
      dates,
      assets,
      values,
    })
  }

  /// Same index as `self`, different values.
  pub fn with_values(&self, values: Array2<f64>) -> PortfolioResult<Self> {
    Self::new(self.dates.clone(), self.assets.clone(), values)
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn values(&self) -> ArrayView2<'_, f64> {
    self.values.view()
  }

  pub fn into_values(self) -> Array2<f64> {
    self.values
  }

  /// Number of dates (rows).
  pub fn n_dates(&self) -> usize {
    self.dates.len()
  }

  /// Number of assets (columns).
  pub fn n_assets(&self) -> usize {
    self.assets.len()
  }

  /// Row for date index `day`.
  pub fn row(&self, day: usize) -> ArrayView1<'_, f64> {
    self.values.row(day)
  }

  /// Fail fast unless `other` shares both the date and the asset index.
  pub fn ensure_aligned(&self, other: &TimePanel, context: &'static str) -> PortfolioResult<()> {
    if self.assets != other.assets {
      return Err(PortfolioError::shape(
        context,
        format!("assets {:?}", self.assets),
        format!("assets {:?}", other.assets),
      ));
    }
    if self.dates != other.dates {
      return Err(PortfolioError::shape(
        context,
        format!("{} dates {:?}..{:?}", self.dates.len(), self.dates.first(), self.dates.last()),
        format!("{} dates {:?}..{:?}", other.dates.len(), other.dates.first(), other.dates.last()),
      ));
    }
    Ok(())
  }
}

/// Weights chosen at one scheduled rebalance.
#[derive(ImplNew, Clone, Debug, PartialEq)]
pub struct RebalanceEvent {
  /// Row index of the rebalance date in the return history.
  pub day: usize,
  /// Calendar date of that row.
  pub date: NaiveDate,
  /// Optimal long-only weights, summing to one.
  pub weights: Array1<f64>,
}

/// Output of a full rebalance run.
#[derive(Clone, Debug)]
pub struct RebalanceReport {
  /// Rebalance events in ascending day order.
  pub events: Vec<RebalanceEvent>,
  /// Annualised tracking error of the held portfolio against the benchmark.
  pub tracking_error: f64,
  /// Annualised turnover across consecutive rebalances.
  pub turnover: f64,
}

#[cfg(test)]
pub(crate) mod fixtures {
  use chrono::Duration;
  use chrono::NaiveDate;

  pub fn dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2016, 1, 4).unwrap();
    (0..n).map(|i| start + Duration::days(i as i64)).collect()
  }

  pub fn assets(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
  }
}

#[cfg(test)]
mod tests {
  use ndarray::array;

  use super::fixtures;
  use super::*;

  #[test]
  fn new_rejects_wrong_dimensions() {
    let err = TimePanel::new(
      fixtures::dates(3),
      fixtures::assets(&["A", "B"]),
      Array2::zeros((2, 2)),
    )
    .unwrap_err();

    assert!(matches!(err, PortfolioError::ShapeMismatch { .. }));
  }

  #[test]
  fn ensure_aligned_checks_assets_and_dates() {
    let a = TimePanel::new(
      fixtures::dates(2),
      fixtures::assets(&["A", "B"]),
      array![[0.1, 0.2], [0.3, 0.4]],
    )
    .unwrap();
    let swapped = TimePanel::new(
      fixtures::dates(2),
      fixtures::assets(&["B", "A"]),
      array![[0.1, 0.2], [0.3, 0.4]],
    )
    .unwrap();
    let shifted = TimePanel::new(
      fixtures::dates(3)[1..].to_vec(),
      fixtures::assets(&["A", "B"]),
      array![[0.1, 0.2], [0.3, 0.4]],
    )
    .unwrap();

    assert!(a.ensure_aligned(&a.clone(), "test").is_ok());
    assert!(a.ensure_aligned(&swapped, "test").is_err());
    assert!(a.ensure_aligned(&shifted, "test").is_err());
  }
}
