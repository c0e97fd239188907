//! # Sample Covariance
//!
//! $$
//! \hat\Sigma_{ij}=\frac{1}{T-1}\sum_{t=1}^{T}(r_{t,i}-\bar r_i)(r_{t,j}-\bar r_j)
//! $$
//!
//! Missing observations are replaced with zero before estimation rather than
//! dropped row-wise. This biases the estimate toward zero for sparse assets but keeps
//! every window the same length.

use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;

use crate::error::PortfolioError;
use crate::error::PortfolioResult;

/// Sample covariance of a `T × M` window of returns.
///
/// Returns an `M × M` symmetric matrix using the unbiased `T − 1` denominator.
/// Fails with [`PortfolioError::DegenerateWindow`] when `T ≤ 1` and with
/// [`PortfolioError::ShapeMismatch`] when there are no assets.
pub fn sample_covariance(window: ArrayView2<'_, f64>) -> PortfolioResult<Array2<f64>> {
  let (t, m) = window.dim();
  if m == 0 {
    return Err(PortfolioError::shape("sample_covariance", "at least 1 asset", "0 assets"));
  }
  if t < 2 {
    return Err(PortfolioError::DegenerateWindow {
      context: "sample_covariance",
      observations: t,
      required: 2,
    });
  }

  let filled = window.mapv(|r| if r.is_nan() { 0.0 } else { r });
  let Some(mean) = filled.mean_axis(Axis(0)) else {
    return Err(PortfolioError::DegenerateWindow {
      context: "sample_covariance",
      observations: t,
      required: 2,
    });
  };

  let centered = &filled - &mean;
  let mut cov = centered.t().dot(&centered) / (t - 1) as f64;

  // Exact symmetry regardless of summation order.
  for i in 0..m {
    for j in (i + 1)..m {
      let avg = 0.5 * (cov[[i, j]] + cov[[j, i]]);
      cov[[i, j]] = avg;
      cov[[j, i]] = avg;
    }
  }

  Ok(cov)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;

  #[test]
  fn matches_hand_computed_covariance() {
    let window = array![[1.5, 2.0], [-0.8, -0.666_666_666_666_666_6], [5.0, 1.5]];
    let cov = sample_covariance(window.view()).unwrap();

    let a = [1.5, -0.8, 5.0];
    let b = [2.0, -0.666_666_666_666_666_6, 1.5];
    let ma = a.iter().sum::<f64>() / 3.0;
    let mb = b.iter().sum::<f64>() / 3.0;
    let var_a = a.iter().map(|x| (x - ma).powi(2)).sum::<f64>() / 2.0;
    let cov_ab = a
      .iter()
      .zip(b.iter())
      .map(|(x, y)| (x - ma) * (y - mb))
      .sum::<f64>()
      / 2.0;

    assert_abs_diff_eq!(cov[[0, 0]], var_a, epsilon = 1e-12);
    assert_abs_diff_eq!(cov[[0, 1]], cov_ab, epsilon = 1e-12);
  }

  #[test]
  fn missing_values_are_treated_as_zero() {
    let with_nan = array![[f64::NAN, 0.01], [0.02, -0.01], [-0.01, 0.03]];
    let with_zero = array![[0.0, 0.01], [0.02, -0.01], [-0.01, 0.03]];

    let a = sample_covariance(with_nan.view()).unwrap();
    let b = sample_covariance(with_zero.view()).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn infinite_returns_are_not_zero_filled() {
    let window = array![[f64::INFINITY, 0.01], [0.02, -0.01], [-0.01, 0.03]];
    let cov = sample_covariance(window.view()).unwrap();

    assert!(!cov[[0, 0]].is_finite());
    assert!(cov[[1, 1]].is_finite());
  }

  #[test]
  fn output_is_symmetric_and_has_non_negative_diagonal() {
    let mut rng = StdRng::seed_from_u64(7);
    let normal = Normal::new(0.0, 0.02).unwrap();
    let window = Array2::from_shape_fn((40, 12), |_| normal.sample(&mut rng));

    let cov = sample_covariance(window.view()).unwrap();
    assert_eq!(cov.dim(), (12, 12));
    for i in 0..12 {
      assert!(cov[[i, i]] >= 0.0);
      for j in 0..12 {
        assert_eq!(cov[[i, j]], cov[[j, i]]);
      }
    }
  }

  #[test]
  fn single_observation_is_degenerate() {
    let err = sample_covariance(array![[0.1, 0.2]].view()).unwrap_err();
    assert_eq!(
      err,
      PortfolioError::DegenerateWindow {
        context: "sample_covariance",
        observations: 1,
        required: 2,
      }
    );
  }

  #[test]
  fn empty_asset_set_is_rejected() {
    let err = sample_covariance(Array2::<f64>::zeros((5, 0)).view()).unwrap_err();
    assert!(matches!(err, PortfolioError::ShapeMismatch { .. }));
  }
}
