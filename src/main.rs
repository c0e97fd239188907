use anyhow::Context;
use anyhow::Result;
use chrono::Duration;
use chrono::NaiveDate;
use ndarray::Array2;
use prettytable::row;
use prettytable::Table;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Normal;
use tracing_subscriber::EnvFilter;

use smart_beta_rs::portfolio::aggregate_returns;
use smart_beta_rs::portfolio::cumulative_returns;
use smart_beta_rs::portfolio::dividend_weights;
use smart_beta_rs::portfolio::dollar_volume_weights;
use smart_beta_rs::portfolio::generate_returns;
use smart_beta_rs::portfolio::tracking_error;
use smart_beta_rs::portfolio::weighted_returns;
use smart_beta_rs::portfolio::PortfolioEngine;
use smart_beta_rs::portfolio::PortfolioEngineConfig;
use smart_beta_rs::portfolio::TimePanel;

const DAYS: usize = 504;
const ASSETS: usize = 12;

struct Market {
  close: TimePanel,
  volume: TimePanel,
  dividends: TimePanel,
}

/// Correlated GBM prices with log-normal volumes and quarterly dividends.
fn simulate_market(seed: u64) -> Result<Market> {
  let mut rng = StdRng::seed_from_u64(seed);
  let common = Normal::new(0.0, 0.008)?;
  let idio = Normal::new(0.0, 0.012)?;
  let volume_noise = Normal::<f64>::new(0.0, 0.3)?;

  let start = NaiveDate::from_ymd_opt(2015, 1, 2).context("invalid start date")?;
  let dates: Vec<NaiveDate> = (0..DAYS).map(|d| start + Duration::days(d as i64)).collect();
  let assets: Vec<String> = (0..ASSETS).map(|i| format!("TCK{i:02}")).collect();

  let drift: Vec<f64> = (0..ASSETS).map(|_| rng.gen_range(-0.0002..0.0006)).collect();
  let beta: Vec<f64> = (0..ASSETS).map(|_| rng.gen_range(0.5..1.5)).collect();
  let yield_q: Vec<f64> = (0..ASSETS).map(|_| rng.gen_range(0.0..0.01)).collect();

  let mut close = Array2::zeros((DAYS, ASSETS));
  let mut volume = Array2::zeros((DAYS, ASSETS));
  let mut dividends = Array2::zeros((DAYS, ASSETS));
  let mut price: Vec<f64> = (0..ASSETS).map(|_| rng.gen_range(20.0..200.0)).collect();

  for d in 0..DAYS {
    let market_shock = common.sample(&mut rng);
    for j in 0..ASSETS {
      let r = drift[j] + beta[j] * market_shock + idio.sample(&mut rng);
      price[j] *= r.exp();
      close[[d, j]] = price[j];
      volume[[d, j]] = 1e5 * (1.0 + j as f64) * volume_noise.sample(&mut rng).exp();
      if d % 63 == 62 {
        dividends[[d, j]] = yield_q[j] * price[j];
      }
    }
  }

  Ok(Market {
    close: TimePanel::new(dates.clone(), assets.clone(), close)?,
    volume: TimePanel::new(dates.clone(), assets.clone(), volume)?,
    dividends: TimePanel::new(dates, assets, dividends)?,
  })
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let market = simulate_market(42)?;
  let returns = generate_returns(&market.close)?;
  let index_weights = dollar_volume_weights(&market.close, &market.volume)?;
  let etf_weights = dividend_weights(&market.dividends)?;

  let index_returns = weighted_returns(&returns, &index_weights)?;
  let etf_returns = weighted_returns(&returns, &etf_weights)?;
  let index_growth = cumulative_returns(index_returns.values());
  let etf_growth = cumulative_returns(etf_returns.values());
  let smart_beta_te = tracking_error(
    aggregate_returns(index_returns.values()).view(),
    aggregate_returns(etf_returns.values()).view(),
  )?;

  let engine = PortfolioEngine::new(PortfolioEngineConfig {
    chunk_size: 250,
    shift_size: 5,
    ..PortfolioEngineConfig::default()
  });
  let single = engine.optimize_single(&returns, &index_weights)?;
  let report = engine.run(&returns, &index_weights)?;

  let mut table = Table::new();
  table.set_titles(row!["Metric", "Value"]);
  table.add_row(row!["Index cumulative return", format!("{:.4}", index_growth[DAYS - 1] - 1.0)]);
  table.add_row(row!["Dividend ETF cumulative return", format!("{:.4}", etf_growth[DAYS - 1] - 1.0)]);
  table.add_row(row!["Dividend ETF tracking error", format!("{smart_beta_te:.6}")]);
  table.add_row(row!["Rebalances", report.events.len()]);
  table.add_row(row!["Rebalanced tracking error", format!("{:.6}", report.tracking_error)]);
  table.add_row(row!["Annualised turnover", format!("{:.4}", report.turnover)]);
  table.printstd();

  let mut weights = Table::new();
  weights.set_titles(row!["Asset", "Index (last)", "Single solve", "Last rebalance"]);
  let last_index = index_weights.row(DAYS - 1);
  let last_event = report.events.last().context("no rebalance events")?;
  for (j, asset) in returns.assets().iter().enumerate() {
    weights.add_row(row![
      asset,
      format!("{:.4}", last_index[j]),
      format!("{:.4}", single[j]),
      format!("{:.4}", last_event.weights[j])
    ]);
  }
  weights.printstd();

  Ok(())
}
