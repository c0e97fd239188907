//! # Portfolio Engine
//!
//! $$
//! (R,\ W^{idx})\ \to\ \{(d_k,\mathbf{x}_{d_k})\}_k\ \to\ (TE,\ \tau)
//! $$
//!
//! High-level orchestration of the rebalance pipeline under one configuration.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use ndarray::s;
use ndarray::Array1;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use super::covariance::sample_covariance;
use super::data::aggregate_returns;
use super::data::hold_rebalance_weights;
use super::optimizer::optimal_weights_with;
use super::optimizer::ClarabelSolver;
use super::optimizer::SolverSettings;
use super::optimizer::DEFAULT_SCALE;
use super::performance::portfolio_turnover;
use super::performance::tracking_error_with_periods;
use super::scheduler::RebalanceScheduler;
use super::types::RebalanceEvent;
use super::types::RebalanceReport;
use super::types::ReturnSeries;
use super::types::WeightPanel;
use crate::error::PortfolioError;
use crate::error::PortfolioResult;
use crate::traits::TrackingSolver;
use crate::TRADING_DAYS_PER_YEAR;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioEngineConfig {
  /// Look-back window, in rows, used for each covariance estimate.
  pub chunk_size: usize,
  /// Rows between consecutive rebalances.
  pub shift_size: usize,
  /// Penalty on the distance to the index weights.
  pub scale: f64,
  /// Periods used to annualise turnover and tracking error.
  pub trading_days_per_year: usize,
  /// Solve rebalance windows on the rayon pool.
  pub parallel: bool,
  /// Settings of the default Clarabel solver.
  pub solver: SolverSettings,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      chunk_size: 250,
      shift_size: 5,
      scale: DEFAULT_SCALE,
      trading_days_per_year: TRADING_DAYS_PER_YEAR,
      parallel: true,
      solver: SolverSettings::default(),
    }
  }
}

/// Single entry point for optimisation, rebalancing and reporting.
#[derive(Clone, Debug)]
pub struct PortfolioEngine<S: TrackingSolver = ClarabelSolver> {
  config: PortfolioEngineConfig,
  solver: S,
  cancel: Option<Arc<AtomicBool>>,
}

impl PortfolioEngine<ClarabelSolver> {
  /// Construct an engine using Clarabel configured from `config.solver`.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    let solver = ClarabelSolver::new(config.solver.clone());
    Self::with_solver(config, solver)
  }
}

impl<S: TrackingSolver> PortfolioEngine<S> {
  /// Construct an engine around a custom solver. `config.solver` is ignored.
  pub fn with_solver(config: PortfolioEngineConfig, solver: S) -> Self {
    Self {
      config,
      solver,
      cancel: None,
    }
  }

  /// Attach a cancellation flag checked before every rebalance solve.
  pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
    self.cancel = Some(flag);
    self
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  /// One solve over the whole history with the most recent index weights.
  pub fn optimize_single(
    &self,
    returns: &ReturnSeries,
    index_weights: &WeightPanel,
  ) -> PortfolioResult<Array1<f64>> {
    returns.ensure_aligned(index_weights, "PortfolioEngine::optimize_single")?;
    let Some(last) = returns.n_dates().checked_sub(1) else {
      return Err(PortfolioError::DegenerateWindow {
        context: "PortfolioEngine::optimize_single",
        observations: 0,
        required: 2,
      });
    };

    let cov = sample_covariance(returns.values())?;
    optimal_weights_with(&self.solver, cov.view(), index_weights.row(last), self.config.scale)
  }

  /// Rolling rebalance schedule over the whole history.
  pub fn rebalance(
    &self,
    returns: &ReturnSeries,
    index_weights: &WeightPanel,
  ) -> PortfolioResult<Vec<RebalanceEvent>> {
    let mut scheduler =
      RebalanceScheduler::with_solver(self.config.chunk_size, self.config.shift_size, &self.solver)?
        .scale(self.config.scale)?
        .parallel(self.config.parallel);
    if let Some(flag) = &self.cancel {
      scheduler = scheduler.cancel_flag(Arc::clone(flag));
    }
    scheduler.run(returns, index_weights)
  }

  /// Rebalance, then measure turnover and the held portfolio's tracking error.
  ///
  /// Tracking error is computed over the dates on which rebalanced weights are held,
  /// comparing `Σ x·r` against `Σ w^{idx}·r`. At least two rebalances are required.
  pub fn run(
    &self,
    returns: &ReturnSeries,
    index_weights: &WeightPanel,
  ) -> PortfolioResult<RebalanceReport> {
    let events = self.rebalance(returns, index_weights)?;

    let weights: Vec<Array1<f64>> = events.iter().map(|e| e.weights.clone()).collect();
    let turnover = portfolio_turnover(
      &weights,
      self.config.shift_size,
      events.len().saturating_sub(1),
      self.config.trading_days_per_year,
    )?;

    let held = hold_rebalance_weights(&events, returns.n_dates())?;
    let first_held = events[0].day + 1;
    let held_returns = returns.values().slice_move(s![first_held.., ..]);
    let held_index = index_weights.values().slice_move(s![first_held.., ..]);
    let portfolio = aggregate_returns((&held.slice(s![first_held.., ..]) * &held_returns).view());
    let benchmark = aggregate_returns((&held_index * &held_returns).view());
    let tracking_error = tracking_error_with_periods(
      benchmark.view(),
      portfolio.view(),
      self.config.trading_days_per_year,
    )?;

    info!(
      rebalances = events.len(),
      turnover,
      tracking_error,
      "rebalance report ready"
    );

    Ok(RebalanceReport {
      events,
      tracking_error,
      turnover,
    })
  }
}

#[cfg(test)]
mod tests {
  use ndarray::Array2;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;
  use tracing_test::traced_test;

  use super::*;
  use crate::portfolio::data::dollar_volume_weights;
  use crate::portfolio::data::generate_returns;
  use crate::portfolio::types::fixtures;
  use crate::portfolio::types::TimePanel;
  use crate::traits::TrackingProblem;

  fn market(days: usize, assets: usize, seed: u64) -> (TimePanel, TimePanel) {
    let mut rng = StdRng::seed_from_u64(seed);
    let shock = Normal::new(0.0003, 0.012).unwrap();
    let noise = Normal::new(0.0, 0.2).unwrap();
    let names: Vec<String> = (0..assets).map(|i| format!("T{i}")).collect();

    let mut close = Array2::zeros((days, assets));
    let mut volume = Array2::zeros((days, assets));
    for j in 0..assets {
      let mut p = 20.0 + 10.0 * j as f64;
      for d in 0..days {
        p *= 1.0 + shock.sample(&mut rng);
        close[[d, j]] = p;
        volume[[d, j]] = 1_000.0 * (1.0 + j as f64) * f64::exp(noise.sample(&mut rng));
      }
    }

    let close = TimePanel::new(fixtures::dates(days), names.clone(), close).unwrap();
    let volume = TimePanel::new(fixtures::dates(days), names, volume).unwrap();
    let returns = generate_returns(&close).unwrap();
    let weights = dollar_volume_weights(&close, &volume).unwrap();
    (returns, weights)
  }

  fn small_config() -> PortfolioEngineConfig {
    PortfolioEngineConfig {
      chunk_size: 30,
      shift_size: 10,
      ..PortfolioEngineConfig::default()
    }
  }

  struct Echo;

  impl TrackingSolver for Echo {
    fn solve(&self, problem: &TrackingProblem<'_>) -> PortfolioResult<Array1<f64>> {
      Ok(problem.index_weights.to_owned())
    }
  }

  #[test]
  fn default_config_matches_notebook_parameters() {
    let config = PortfolioEngineConfig::default();
    assert_eq!(config.chunk_size, 250);
    assert_eq!(config.shift_size, 5);
    assert_eq!(config.scale, 2.0);
    assert_eq!(config.trading_days_per_year, 252);
  }

  #[test]
  fn config_deserializes_with_defaults() {
    let config: PortfolioEngineConfig =
      serde_json::from_str(r#"{ "chunk_size": 60, "solver": { "max_iter": 50 } }"#).unwrap();

    assert_eq!(config.chunk_size, 60);
    assert_eq!(config.shift_size, 5);
    assert_eq!(config.solver.max_iter, 50);
    assert_eq!(config.solver.time_limit, None);
  }

  #[test]
  fn optimize_single_uses_last_index_row() {
    let (returns, weights) = market(40, 4, 1);
    let engine = PortfolioEngine::with_solver(small_config(), Echo);

    let x = engine.optimize_single(&returns, &weights).unwrap();
    assert_eq!(x, weights.row(39).to_owned());
  }

  #[test]
  fn echo_solver_run_reports_every_tick() {
    let (returns, weights) = market(80, 3, 2);
    let engine = PortfolioEngine::with_solver(small_config(), Echo);

    let report = engine.run(&returns, &weights).unwrap();
    let days: Vec<usize> = report.events.iter().map(|e| e.day).collect();
    assert_eq!(days, vec![29, 39, 49, 59, 69]);
    assert!(report.turnover > 0.0);
    // Held weights lag the index by up to one shift, so tracking error is small but
    // not zero unless index weights are constant.
    assert!(report.tracking_error.is_finite());
  }

  #[traced_test]
  #[test]
  fn full_run_produces_feasible_report() {
    let (returns, weights) = market(120, 5, 3);
    let engine = PortfolioEngine::new(small_config());

    let report = engine.run(&returns, &weights).unwrap();
    assert_eq!(report.events.len(), 9);
    for e in &report.events {
      assert!((e.weights.sum() - 1.0).abs() < 1e-4);
      assert!(e.weights.iter().all(|&w| w >= -1e-6));
    }
    assert!(report.turnover >= 0.0);
    assert!(report.tracking_error >= 0.0);
    assert!(logs_contain("rebalance report ready"));
  }

  #[test]
  fn single_rebalance_has_no_turnover() {
    let (returns, weights) = market(35, 3, 4);
    let engine = PortfolioEngine::with_solver(small_config(), Echo);

    let err = engine.run(&returns, &weights).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidParameter { name: "rebalance_count", .. }));
  }

  #[test]
  fn cancelled_engine_reports_first_day() {
    let (returns, weights) = market(80, 3, 5);
    let engine = PortfolioEngine::with_solver(small_config(), Echo)
      .with_cancel_flag(Arc::new(AtomicBool::new(true)));

    let err = engine.rebalance(&returns, &weights).unwrap_err();
    assert_eq!(err, PortfolioError::Cancelled { day: 29 });
  }
}
