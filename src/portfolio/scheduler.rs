//! # Rebalance Scheduler
//!
//! $$
//! d_k=(c-1)+k\,s,\qquad d_k<T-1,\qquad \mathbf{x}_{d_k}=\mathcal{S}\big(\hat\Sigma(R_{d_k-c+1:d_k}),\ \mathbf{w}^{idx}_{d_k}\big)
//! $$
//!
//! Walks the return history at a fixed cadence and solves one tracking problem per
//! tick. Ticks share nothing but the read-only inputs, so they can run on the rayon
//! pool; results are always gathered in ascending day order.
//!
//! A failed tick is fatal: the schedule returns the error of the earliest failing
//! day, annotated with that day and its window length, and no partial sequence.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use ndarray::s;
use rayon::prelude::*;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::covariance::sample_covariance;
use super::optimizer::optimal_weights_with;
use super::optimizer::ClarabelSolver;
use super::optimizer::DEFAULT_SCALE;
use super::types::RebalanceEvent;
use super::types::ReturnSeries;
use super::types::WeightPanel;
use crate::error::PortfolioError;
use crate::error::PortfolioResult;
use crate::traits::TrackingSolver;

/// Rolling-window rebalance schedule.
#[derive(Clone, Debug)]
pub struct RebalanceScheduler<S: TrackingSolver = ClarabelSolver> {
  chunk_size: usize,
  shift_size: usize,
  scale: f64,
  parallel: bool,
  solver: S,
  cancel: Option<Arc<AtomicBool>>,
}

impl RebalanceScheduler<ClarabelSolver> {
  /// Schedule with a `chunk_size` look-back and a rebalance every `shift_size` days.
  pub fn new(chunk_size: usize, shift_size: usize) -> PortfolioResult<Self> {
    Self::with_solver(chunk_size, shift_size, ClarabelSolver::default())
  }
}

impl<S: TrackingSolver> RebalanceScheduler<S> {
  pub fn with_solver(chunk_size: usize, shift_size: usize, solver: S) -> PortfolioResult<Self> {
    if shift_size == 0 {
      return Err(PortfolioError::invalid("shift_size", "must be positive"));
    }
    if chunk_size == 0 {
      return Err(PortfolioError::invalid(
        "chunk_size",
        "must be positive, an empty look-back has no covariance",
      ));
    }

    Ok(Self {
      chunk_size,
      shift_size,
      scale: DEFAULT_SCALE,
      parallel: false,
      solver,
      cancel: None,
    })
  }

  /// Override the tracking penalty (default [`DEFAULT_SCALE`]).
  pub fn scale(mut self, scale: f64) -> PortfolioResult<Self> {
    if !(scale.is_finite() && scale > 0.0) {
      return Err(PortfolioError::invalid("scale", format!("must be positive and finite, got {scale}")));
    }
    self.scale = scale;
    Ok(self)
  }

  /// Evaluate ticks on the rayon pool.
  pub fn parallel(mut self, parallel: bool) -> Self {
    self.parallel = parallel;
    self
  }

  /// Flag checked before every solve; once raised, remaining ticks fail with
  /// [`PortfolioError::Cancelled`].
  pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
    self.cancel = Some(flag);
    self
  }

  pub fn chunk_size(&self) -> usize {
    self.chunk_size
  }

  pub fn shift_size(&self) -> usize {
    self.shift_size
  }

  /// Rebalance days for a history of `total_days` rows.
  ///
  /// The last row is never a rebalance day.
  pub fn ticks(&self, total_days: usize) -> Vec<usize> {
    (self.chunk_size - 1..total_days.saturating_sub(1))
      .step_by(self.shift_size)
      .collect()
  }

  /// Run the schedule over aligned returns and benchmark weights.
  pub fn run(
    &self,
    returns: &ReturnSeries,
    index_weights: &WeightPanel,
  ) -> PortfolioResult<Vec<RebalanceEvent>> {
    returns.ensure_aligned(index_weights, "RebalanceScheduler::run")?;

    let ticks = self.ticks(returns.n_dates());
    debug!(
      ticks = ticks.len(),
      chunk_size = self.chunk_size,
      shift_size = self.shift_size,
      parallel = self.parallel,
      "starting rebalance schedule"
    );

    let results: Vec<PortfolioResult<RebalanceEvent>> = if self.parallel {
      ticks
        .par_iter()
        .map(|&day| self.rebalance_at(day, returns, index_weights))
        .collect()
    } else {
      ticks
        .iter()
        .map(|&day| self.rebalance_at(day, returns, index_weights))
        .collect()
    };

    // In tick order, so the earliest failure wins even when run in parallel.
    let events = results.into_iter().collect::<PortfolioResult<Vec<_>>>()?;
    info!(
      rebalances = events.len(),
      assets = returns.n_assets(),
      "rebalance schedule complete"
    );
    Ok(events)
  }

  fn rebalance_at(
    &self,
    day: usize,
    returns: &ReturnSeries,
    index_weights: &WeightPanel,
  ) -> PortfolioResult<RebalanceEvent> {
    if self
      .cancel
      .as_ref()
      .is_some_and(|flag| flag.load(Ordering::Relaxed))
    {
      return Err(PortfolioError::Cancelled { day });
    }

    let start = day + 1 - self.chunk_size;
    let window = returns.values().slice_move(s![start..=day, ..]);
    debug!(day, assets = window.ncols(), window = window.nrows(), "rebalancing");

    let solved = sample_covariance(window).and_then(|cov| {
      optimal_weights_with(&self.solver, cov.view(), index_weights.row(day), self.scale)
    });

    match solved {
      Ok(weights) => Ok(RebalanceEvent::new(day, returns.dates()[day], weights)),
      Err(err) => {
        let err = err.at_tick(day, self.chunk_size);
        error!(day, %err, "rebalance failed");
        Err(err)
      }
    }
  }
}
